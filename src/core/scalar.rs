// Scalar values and their fixed little-endian byte encodings.
use serde::Serialize;
use serde_json::Value;

use crate::core::error::{Error, ErrorKind};

pub const NUMERIC_WIDTH: usize = 8;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize)]
pub enum ScalarKind {
    #[serde(rename = "int")]
    Integer,
    #[serde(rename = "float")]
    Float,
    #[serde(rename = "text")]
    Text,
}

impl ScalarKind {
    /// Fixed encoded width in bytes, or `None` for variable-length text.
    pub fn width(self) -> Option<usize> {
        match self {
            ScalarKind::Integer | ScalarKind::Float => Some(NUMERIC_WIDTH),
            ScalarKind::Text => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ScalarKind::Integer => "int",
            ScalarKind::Float => "float",
            ScalarKind::Text => "text",
        }
    }

    pub fn parse(value: &str) -> Result<Self, Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "int" | "integer" | "i64" => Ok(ScalarKind::Integer),
            "float" | "f64" | "double" => Ok(ScalarKind::Float),
            "text" | "str" | "string" => Ok(ScalarKind::Text),
            other => Err(Error::new(ErrorKind::Usage)
                .with_message(format!("unknown scalar kind `{other}`"))
                .with_hint("Use one of: int, float, text.")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Scalar {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    pub fn kind(&self) -> ScalarKind {
        match self {
            Scalar::Integer(_) => ScalarKind::Integer,
            Scalar::Float(_) => ScalarKind::Float,
            Scalar::Text(_) => ScalarKind::Text,
        }
    }

    /// Converts a JSON value; integral numbers that fit `i64` become integers.
    pub fn from_json(value: &Value) -> Result<Self, Error> {
        match value {
            Value::Number(number) => {
                if let Some(int) = number.as_i64() {
                    return Ok(Scalar::Integer(int));
                }
                if number.is_u64() {
                    return Err(Error::new(ErrorKind::Usage)
                        .with_message(format!("integer {number} exceeds i64 range")));
                }
                number.as_f64().map(Scalar::Float).ok_or_else(|| {
                    Error::new(ErrorKind::Usage)
                        .with_message(format!("number {number} is not representable"))
                })
            }
            Value::String(text) => Ok(Scalar::Text(text.clone())),
            other => Err(Error::new(ErrorKind::Usage)
                .with_message(format!("unsupported JSON value `{other}`"))
                .with_hint("Cells must be integers, floats, or strings.")),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Scalar::Integer(value) => Value::from(*value),
            Scalar::Float(value) => Value::from(*value),
            Scalar::Text(value) => Value::from(value.as_str()),
        }
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Integer(value)
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::Float(value)
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Text(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::Text(value)
    }
}

pub fn encode_scalar(value: &Scalar) -> Vec<u8> {
    match value {
        Scalar::Integer(value) => value.to_le_bytes().to_vec(),
        Scalar::Float(value) => value.to_bits().to_le_bytes().to_vec(),
        Scalar::Text(value) => value.as_bytes().to_vec(),
    }
}

/// Appends the encoding of `value` without an intermediate allocation.
pub fn encode_scalar_into(value: &Scalar, out: &mut Vec<u8>) {
    match value {
        Scalar::Integer(value) => out.extend_from_slice(&value.to_le_bytes()),
        Scalar::Float(value) => out.extend_from_slice(&value.to_bits().to_le_bytes()),
        Scalar::Text(value) => out.extend_from_slice(value.as_bytes()),
    }
}

pub fn encoded_len(value: &Scalar) -> usize {
    match value {
        Scalar::Text(value) => value.len(),
        _ => NUMERIC_WIDTH,
    }
}

pub fn decode_scalar(bytes: &[u8], kind: ScalarKind) -> Result<Scalar, Error> {
    match kind {
        ScalarKind::Integer => {
            read_8(bytes, kind).map(|buf| Scalar::Integer(i64::from_le_bytes(buf)))
        }
        ScalarKind::Float => {
            read_8(bytes, kind).map(|buf| Scalar::Float(f64::from_bits(u64::from_le_bytes(buf))))
        }
        ScalarKind::Text => std::str::from_utf8(bytes)
            .map(|text| Scalar::Text(text.to_string()))
            .map_err(|err| {
                Error::new(ErrorKind::MalformedScalar)
                    .with_message("text field is not valid utf-8")
                    .with_source(err)
            }),
    }
}

fn read_8(bytes: &[u8], kind: ScalarKind) -> Result<[u8; NUMERIC_WIDTH], Error> {
    <[u8; NUMERIC_WIDTH]>::try_from(bytes).map_err(|_| {
        Error::new(ErrorKind::MalformedScalar).with_message(format!(
            "{} field needs {NUMERIC_WIDTH} bytes, got {}",
            kind.name(),
            bytes.len()
        ))
    })
}
