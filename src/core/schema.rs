// Record schemas and the one-byte type hints used to persist them.
use serde::Serialize;

use crate::core::error::{Error, ErrorKind};
use crate::core::scalar::{Scalar, ScalarKind};

pub const HINT_MAX_BITS: u8 = 63;

const HINT_INTEGER: u8 = 1;
const HINT_FLOAT: u8 = 2;
const HINT_TEXT: u8 = 3;

/// Ordered scalar kinds shared by the encoder and decoder of a record.
///
/// At most one text field is allowed and it must come last, since text
/// consumes whatever payload remains after the fixed-width fields.
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash, Serialize)]
#[serde(transparent)]
pub struct Schema {
    kinds: Vec<ScalarKind>,
}

impl Schema {
    pub fn new(kinds: Vec<ScalarKind>) -> Result<Self, Error> {
        if let Some(pos) = kinds.iter().position(|kind| *kind == ScalarKind::Text) {
            if pos + 1 != kinds.len() {
                return Err(Error::new(ErrorKind::SchemaMismatch)
                    .with_message("text field must be the last field")
                    .with_field(pos)
                    .with_hint("Reorder columns so integers and floats come before text."));
            }
        }
        Ok(Self { kinds })
    }

    /// Derives the schema from a row's own scalar kinds.
    pub fn of(record: &[Scalar]) -> Result<Self, Error> {
        Self::new(record.iter().map(Scalar::kind).collect())
    }

    /// Parses a comma-separated list such as `int,float,text`.
    pub fn parse(list: &str) -> Result<Self, Error> {
        if list.trim().is_empty() {
            return Self::new(Vec::new());
        }
        let kinds = list
            .split(',')
            .map(ScalarKind::parse)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(kinds)
    }

    pub fn kinds(&self) -> &[ScalarKind] {
        &self.kinds
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    pub fn has_text(&self) -> bool {
        self.kinds.last() == Some(&ScalarKind::Text)
    }

    /// Bytes taken by the integer and float fields together.
    pub fn fixed_width(&self) -> usize {
        self.kinds.iter().filter_map(|kind| kind.width()).sum()
    }

    /// Checks that `record` has exactly this schema's field count and kinds.
    pub fn check(&self, record: &[Scalar]) -> Result<(), Error> {
        if record.len() != self.kinds.len() {
            return Err(Error::new(ErrorKind::SchemaMismatch).with_message(format!(
                "record has {} fields, schema expects {}",
                record.len(),
                self.kinds.len()
            )));
        }
        for (index, (value, expected)) in record.iter().zip(&self.kinds).enumerate() {
            if value.kind() != *expected {
                return Err(Error::new(ErrorKind::SchemaMismatch)
                    .with_message(format!(
                        "field is {}, schema expects {}",
                        value.kind().name(),
                        expected.name()
                    ))
                    .with_field(index));
            }
        }
        Ok(())
    }

    /// One hint per field: numeric kinds carry their width, text carries 0 (variable).
    pub fn to_hints(&self) -> Result<Vec<u8>, Error> {
        self.kinds
            .iter()
            .map(|kind| encode_hint(*kind, kind.width().unwrap_or(0) as u8))
            .collect()
    }

    pub fn from_hints(hints: &[u8]) -> Result<Self, Error> {
        let kinds = hints
            .iter()
            .enumerate()
            .map(|(index, hint)| {
                decode_hint(*hint)
                    .map(|(kind, _)| kind)
                    .map_err(|err| err.with_field(index))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(kinds).map_err(|err| {
            Error::new(ErrorKind::CorruptHeader)
                .with_message("stored schema places text before other fields")
                .with_source(err)
        })
    }

    pub fn describe(&self) -> String {
        self.kinds
            .iter()
            .map(|kind| kind.name())
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Packs a kind and a bit count into one byte: `(kind_code << 6) | bits`.
pub fn encode_hint(kind: ScalarKind, bits: u8) -> Result<u8, Error> {
    if bits > HINT_MAX_BITS {
        return Err(Error::new(ErrorKind::Usage)
            .with_message(format!("hint bits must be within 0..={HINT_MAX_BITS}, got {bits}")));
    }
    Ok((kind_code(kind) << 6) | bits)
}

pub fn decode_hint(hint: u8) -> Result<(ScalarKind, u8), Error> {
    let bits = hint & 0x3F;
    let kind = match hint >> 6 {
        HINT_INTEGER => ScalarKind::Integer,
        HINT_FLOAT => ScalarKind::Float,
        HINT_TEXT => ScalarKind::Text,
        code => {
            return Err(Error::new(ErrorKind::CorruptHeader)
                .with_message(format!("unknown type hint code {code} in byte {hint:#04x}")));
        }
    };
    Ok((kind, bits))
}

fn kind_code(kind: ScalarKind) -> u8 {
    match kind {
        ScalarKind::Integer => HINT_INTEGER,
        ScalarKind::Float => HINT_FLOAT,
        ScalarKind::Text => HINT_TEXT,
    }
}
