// Fixed 256-byte record buffers: length header, packed payload, zero padding.
use tracing::trace;

use crate::core::error::{Error, ErrorKind};
use crate::core::scalar::{self, NUMERIC_WIDTH, Scalar};
use crate::core::schema::Schema;

pub const RECORD_LEN: usize = 256;
pub const RECORD_HEADER_LEN: usize = 8;
pub const MAX_PAYLOAD: usize = RECORD_LEN - RECORD_HEADER_LEN;

pub type Record = Vec<Scalar>;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct EncodedBuffer([u8; RECORD_LEN]);

impl EncodedBuffer {
    pub fn from_bytes(bytes: [u8; RECORD_LEN]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, Error> {
        let buf = <[u8; RECORD_LEN]>::try_from(bytes).map_err(|_| {
            Error::new(ErrorKind::CorruptHeader).with_message(format!(
                "encoded record must be {RECORD_LEN} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self(buf))
    }

    pub fn as_bytes(&self) -> &[u8; RECORD_LEN] {
        &self.0
    }

    /// Raw header value; may exceed [`MAX_PAYLOAD`] on a corrupt buffer.
    pub fn payload_len(&self) -> u64 {
        u64::from_le_bytes(read_8(&self.0, 0))
    }

    pub fn payload(&self) -> Result<&[u8], Error> {
        let len = checked_payload_len(self.payload_len())?;
        Ok(&self.0[RECORD_HEADER_LEN..RECORD_HEADER_LEN + len])
    }

    /// True when every byte after the payload is zero.
    pub fn padding_is_zero(&self) -> bool {
        let end = match checked_payload_len(self.payload_len()) {
            Ok(len) => RECORD_HEADER_LEN + len,
            Err(_) => return false,
        };
        self.0[end..].iter().all(|byte| *byte == 0)
    }
}

impl AsRef<[u8]> for EncodedBuffer {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

pub fn encode_record(record: &[Scalar], schema: &Schema) -> Result<EncodedBuffer, Error> {
    schema.check(record)?;

    let payload_len: usize = record.iter().map(scalar::encoded_len).sum();
    if RECORD_HEADER_LEN + payload_len > RECORD_LEN {
        return Err(Error::new(ErrorKind::RecordTooLarge)
            .with_message(format!(
                "record needs {} bytes, limit is {RECORD_LEN}",
                RECORD_HEADER_LEN + payload_len
            ))
            .with_hint(format!(
                "Shorten text fields; at most {} text bytes fit with this schema.",
                MAX_PAYLOAD.saturating_sub(schema.fixed_width())
            )));
    }

    let mut payload = Vec::with_capacity(payload_len);
    for value in record {
        scalar::encode_scalar_into(value, &mut payload);
    }

    let mut buf = [0u8; RECORD_LEN];
    write_u64(&mut buf, 0, payload_len as u64);
    buf[RECORD_HEADER_LEN..RECORD_HEADER_LEN + payload_len].copy_from_slice(&payload);
    trace!(fields = record.len(), payload_len, "encoded record");
    Ok(EncodedBuffer(buf))
}

/// Encodes using the schema implied by the record's own scalar kinds.
pub fn encode_record_inferred(record: &[Scalar]) -> Result<EncodedBuffer, Error> {
    let schema = Schema::of(record)?;
    encode_record(record, &schema)
}

pub fn decode_record(buffer: &EncodedBuffer, schema: &Schema) -> Result<Record, Error> {
    let payload = buffer.payload()?;
    let mut record = Vec::with_capacity(schema.len());
    let mut offset = 0usize;

    for (index, kind) in schema.kinds().iter().enumerate() {
        let end = match kind.width() {
            Some(width) => offset + width,
            None => payload.len(),
        };
        if end > payload.len() {
            return Err(Error::new(ErrorKind::MalformedScalar)
                .with_message(format!(
                    "payload ends at byte {} before {} field",
                    payload.len(),
                    kind.name()
                ))
                .with_field(index));
        }
        let value = scalar::decode_scalar(&payload[offset..end], *kind)
            .map_err(|err| err.with_field(index))?;
        record.push(value);
        offset = end;
    }

    if offset != payload.len() {
        return Err(Error::new(ErrorKind::MalformedScalar).with_message(format!(
            "{} trailing payload bytes not covered by schema",
            payload.len() - offset
        )));
    }
    trace!(fields = record.len(), payload_len = payload.len(), "decoded record");
    Ok(record)
}

fn checked_payload_len(raw: u64) -> Result<usize, Error> {
    if raw > MAX_PAYLOAD as u64 {
        return Err(Error::new(ErrorKind::CorruptHeader)
            .with_message(format!("payload length {raw} exceeds {MAX_PAYLOAD}")));
    }
    Ok(raw as usize)
}

fn read_8(buf: &[u8], offset: usize) -> [u8; NUMERIC_WIDTH] {
    let mut out = [0u8; NUMERIC_WIDTH];
    out.copy_from_slice(&buf[offset..offset + NUMERIC_WIDTH]);
    out
}

fn write_u64(buf: &mut [u8], offset: usize, value: u64) {
    buf[offset..offset + NUMERIC_WIDTH].copy_from_slice(&value.to_le_bytes());
}
