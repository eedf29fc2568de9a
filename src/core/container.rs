// Container file: one 256-byte header block (schema hints + column names) then matrix rows.
use std::io::{self, Read, Write};

use tracing::debug;

use crate::core::error::{Error, ErrorKind};
use crate::core::format::{self, CONTAINER_FORMAT_VERSION};
use crate::core::record::RECORD_LEN;
use crate::core::schema::Schema;
use crate::core::table::ByteMatrix;

pub const CONTAINER_MAGIC: [u8; 4] = *b"PIR1";
pub const CONTAINER_HEADER_LEN: usize = RECORD_LEN;

const HINTS_OFFSET: usize = 18;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Container {
    pub columns: Vec<String>,
    pub schema: Schema,
    pub matrix: ByteMatrix,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ContainerHeader {
    pub version: u32,
    pub row_count: u64,
    pub columns: Vec<String>,
    pub schema: Schema,
}

impl ContainerHeader {
    pub fn encode(&self) -> Result<[u8; CONTAINER_HEADER_LEN], Error> {
        if self.columns.len() != self.schema.len() {
            return Err(Error::new(ErrorKind::Usage).with_message(format!(
                "{} column names for {} schema fields",
                self.columns.len(),
                self.schema.len()
            )));
        }
        let field_count = u16::try_from(self.schema.len()).map_err(|_| {
            Error::new(ErrorKind::RecordTooLarge).with_message("too many columns for header")
        })?;
        if let Some(index) = self.columns.iter().position(|name| name.contains('\0')) {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("column name contains a NUL byte")
                .with_field(index));
        }

        let hints = self.schema.to_hints()?;
        let names_len: usize = self.columns.iter().map(|name| name.len() + 1).sum();
        let total = HINTS_OFFSET + hints.len() + names_len;
        if total > CONTAINER_HEADER_LEN {
            return Err(Error::new(ErrorKind::RecordTooLarge)
                .with_message(format!(
                    "container header needs {total} bytes, limit is {CONTAINER_HEADER_LEN}"
                ))
                .with_hint("Use shorter column names."));
        }

        let mut buf = [0u8; CONTAINER_HEADER_LEN];
        buf[0..4].copy_from_slice(&CONTAINER_MAGIC);
        buf[4..8].copy_from_slice(&self.version.to_le_bytes());
        buf[8..16].copy_from_slice(&self.row_count.to_le_bytes());
        buf[16..18].copy_from_slice(&field_count.to_le_bytes());
        let mut offset = HINTS_OFFSET;
        buf[offset..offset + hints.len()].copy_from_slice(&hints);
        offset += hints.len();
        for name in &self.columns {
            buf[offset..offset + name.len()].copy_from_slice(name.as_bytes());
            offset += name.len() + 1;
        }
        Ok(buf)
    }

    pub fn decode(buf: &[u8]) -> Result<Self, Error> {
        if buf.len() < CONTAINER_HEADER_LEN {
            return Err(
                Error::new(ErrorKind::CorruptHeader).with_message("container header too small")
            );
        }
        if buf[0..4] != CONTAINER_MAGIC {
            return Err(Error::new(ErrorKind::CorruptHeader).with_message("bad container magic"));
        }
        let version = u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]);
        if !format::is_supported(version) {
            return Err(format::container_version_error(version));
        }
        let mut row_count = [0u8; 8];
        row_count.copy_from_slice(&buf[8..16]);
        let row_count = u64::from_le_bytes(row_count);
        let field_count = u16::from_le_bytes([buf[16], buf[17]]) as usize;

        let names_offset = HINTS_OFFSET + field_count;
        if names_offset > CONTAINER_HEADER_LEN {
            return Err(Error::new(ErrorKind::CorruptHeader)
                .with_message(format!("field count {field_count} overflows header")));
        }
        let schema = Schema::from_hints(&buf[HINTS_OFFSET..names_offset])?;

        let mut columns = Vec::with_capacity(field_count);
        let mut rest = &buf[names_offset..CONTAINER_HEADER_LEN];
        for index in 0..field_count {
            let end = rest.iter().position(|byte| *byte == 0).ok_or_else(|| {
                Error::new(ErrorKind::CorruptHeader)
                    .with_message("unterminated column name")
                    .with_field(index)
            })?;
            let name = std::str::from_utf8(&rest[..end]).map_err(|err| {
                Error::new(ErrorKind::CorruptHeader)
                    .with_message("column name is not valid utf-8")
                    .with_field(index)
                    .with_source(err)
            })?;
            columns.push(name.to_string());
            rest = &rest[end + 1..];
        }

        Ok(Self {
            version,
            row_count,
            columns,
            schema,
        })
    }
}

pub fn write_container<W: Write>(
    mut writer: W,
    columns: &[String],
    schema: &Schema,
    matrix: &ByteMatrix,
) -> Result<(), Error> {
    let header = ContainerHeader {
        version: CONTAINER_FORMAT_VERSION,
        row_count: matrix.row_count() as u64,
        columns: columns.to_vec(),
        schema: schema.clone(),
    };
    let encoded = header.encode()?;
    writer.write_all(&encoded).map_err(io_error("failed to write container header"))?;
    writer
        .write_all(matrix.as_bytes())
        .map_err(io_error("failed to write container rows"))?;
    writer.flush().map_err(io_error("failed to flush container"))?;
    debug!(rows = header.row_count, fields = schema.len(), "wrote container");
    Ok(())
}

pub fn read_container<R: Read>(mut reader: R) -> Result<Container, Error> {
    let mut header_buf = [0u8; CONTAINER_HEADER_LEN];
    reader.read_exact(&mut header_buf).map_err(|err| {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            Error::new(ErrorKind::CorruptHeader)
                .with_message("container header too small")
                .with_source(err)
        } else {
            io_error("failed to read container header")(err)
        }
    })?;
    let header = ContainerHeader::decode(&header_buf)?;

    let mut bytes = Vec::new();
    reader
        .read_to_end(&mut bytes)
        .map_err(io_error("failed to read container rows"))?;
    let expected = header.row_count.checked_mul(RECORD_LEN as u64);
    if expected != Some(bytes.len() as u64) {
        return Err(Error::new(ErrorKind::CorruptHeader).with_message(format!(
            "header declares {} rows but {} bytes of rows follow",
            header.row_count,
            bytes.len()
        )));
    }
    let matrix = ByteMatrix::from_bytes(bytes)?;
    debug!(rows = header.row_count, fields = header.schema.len(), "read container");
    Ok(Container {
        columns: header.columns,
        schema: header.schema,
        matrix,
    })
}

fn io_error(message: &'static str) -> impl Fn(io::Error) -> Error {
    move |err| Error::new(ErrorKind::Io).with_message(message).with_source(err)
}
