// Core codec modules: scalars, schemas, records, tables, and the container file.
pub mod container;
pub mod error;
pub mod format;
pub mod record;
pub mod scalar;
pub mod schema;
pub mod table;
