//! Purpose: Define the stable public Rust API boundary for pircodec.
//! Exports: Codec entry points, value types, and error types used by the CLI and callers.
//! Role: Public, additive-only surface over `core`.
//! Invariants: Record layout constants exported here are part of the wire contract.

pub use crate::core::container::{
    CONTAINER_HEADER_LEN, Container, ContainerHeader, read_container, write_container,
};
#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::format::CONTAINER_FORMAT_VERSION;
pub use crate::core::record::{
    EncodedBuffer, MAX_PAYLOAD, RECORD_HEADER_LEN, RECORD_LEN, Record, decode_record,
    encode_record, encode_record_inferred,
};
pub use crate::core::scalar::{Scalar, ScalarKind, decode_scalar, encode_scalar};
pub use crate::core::schema::{Schema, decode_hint, encode_hint};
pub use crate::core::table::{
    ByteMatrix, DecodedRows, RowFailure, Table, decode_database, encode_database,
    positional_columns,
};
