// Batch codec: tables of records to row-major byte matrices and back.
use tracing::{debug, trace};

use crate::core::error::{Error, ErrorKind};
use crate::core::record::{self, EncodedBuffer, RECORD_LEN, Record};
use crate::core::schema::Schema;

/// Named columns plus rows that share one schema.
///
/// The schema is either declared up front or inferred from the first row at
/// encode time.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    schema: Option<Schema>,
    rows: Vec<Record>,
}

impl Table {
    pub fn new(rows: Vec<Record>) -> Self {
        Self {
            columns: Vec::new(),
            schema: None,
            rows,
        }
    }

    pub fn with_columns(mut self, columns: Vec<String>) -> Self {
        self.columns = columns;
        self
    }

    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn rows(&self) -> &[Record] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        match (&self.schema, self.rows.first()) {
            (Some(schema), _) => schema.len(),
            (None, Some(row)) => row.len(),
            (None, None) => self.columns.len(),
        }
    }

    /// Column names, falling back to positional names `"0"`, `"1"`, ...
    pub fn columns(&self) -> Vec<String> {
        if !self.columns.is_empty() {
            return self.columns.clone();
        }
        positional_columns(self.column_count())
    }

    /// Declared schema, else the schema of the first row.
    pub fn resolve_schema(&self) -> Result<Schema, Error> {
        if let Some(schema) = &self.schema {
            return Ok(schema.clone());
        }
        match self.rows.first() {
            Some(first) => Schema::of(first).map_err(|err| err.with_row(0)),
            None => Ok(Schema::default()),
        }
    }
}

pub fn positional_columns(count: usize) -> Vec<String> {
    (0..count).map(|index| index.to_string()).collect()
}

/// Row-major `(rows, 256)` byte matrix.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ByteMatrix {
    bytes: Vec<u8>,
}

impl ByteMatrix {
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, Error> {
        if bytes.len() % RECORD_LEN != 0 {
            return Err(Error::new(ErrorKind::CorruptHeader).with_message(format!(
                "matrix length {} is not a multiple of {RECORD_LEN}",
                bytes.len()
            )));
        }
        Ok(Self { bytes })
    }

    pub fn from_buffers(buffers: &[EncodedBuffer]) -> Self {
        let mut bytes = Vec::with_capacity(buffers.len() * RECORD_LEN);
        for buffer in buffers {
            bytes.extend_from_slice(buffer.as_bytes());
        }
        Self { bytes }
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.row_count(), RECORD_LEN)
    }

    pub fn row_count(&self) -> usize {
        self.bytes.len() / RECORD_LEN
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn row(&self, index: usize) -> Option<EncodedBuffer> {
        let start = index.checked_mul(RECORD_LEN)?;
        let end = start.checked_add(RECORD_LEN)?;
        let slice = self.bytes.get(start..end)?;
        EncodedBuffer::from_slice(slice).ok()
    }

    pub fn buffers(&self) -> impl Iterator<Item = EncodedBuffer> + '_ {
        self.bytes.chunks_exact(RECORD_LEN).filter_map(|chunk| {
            <[u8; RECORD_LEN]>::try_from(chunk)
                .ok()
                .map(EncodedBuffer::from_bytes)
        })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Encodes every row in order; the first failing row aborts with its index.
pub fn encode_database(table: &Table) -> Result<ByteMatrix, Error> {
    let schema = table.resolve_schema()?;
    let mut bytes = Vec::with_capacity(table.row_count() * RECORD_LEN);
    for (index, row) in table.rows().iter().enumerate() {
        let buffer =
            record::encode_record(row, &schema).map_err(|err| err.with_row(index as u64))?;
        bytes.extend_from_slice(buffer.as_bytes());
        trace!(row = index, "encoded row");
    }
    debug!(
        rows = table.row_count(),
        schema = %schema.describe(),
        "encoded database"
    );
    Ok(ByteMatrix { bytes })
}

/// Per-row outcomes of a batch decode, in matrix row order.
#[derive(Debug)]
pub struct DecodedRows {
    schema: Schema,
    rows: Vec<Result<Record, Error>>,
}

#[derive(Debug)]
pub struct RowFailure {
    pub row: u64,
    pub error: Error,
}

impl DecodedRows {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn results(&self) -> &[Result<Record, Error>] {
        &self.rows
    }

    pub fn failed(&self) -> usize {
        self.rows.iter().filter(|row| row.is_err()).count()
    }

    /// Builds a table, failing on the first bad row.
    pub fn into_table(self, columns: Vec<String>) -> Result<Table, Error> {
        let schema = self.schema;
        let rows = self.rows.into_iter().collect::<Result<Vec<_>, _>>()?;
        let table = Table::new(rows).with_schema(schema);
        Ok(if columns.is_empty() {
            table
        } else {
            table.with_columns(columns)
        })
    }

    /// Splits into the rows that decoded and the failures, for skip-and-report callers.
    pub fn into_parts(self) -> (Vec<Record>, Vec<RowFailure>) {
        let mut good = Vec::new();
        let mut failures = Vec::new();
        for (index, row) in self.rows.into_iter().enumerate() {
            match row {
                Ok(record) => good.push(record),
                Err(error) => failures.push(RowFailure {
                    row: index as u64,
                    error,
                }),
            }
        }
        (good, failures)
    }

    pub fn into_results(self) -> impl Iterator<Item = Result<Record, Error>> {
        self.rows.into_iter()
    }
}

/// Decodes each row independently; a bad row never stops the rest.
pub fn decode_database(matrix: &ByteMatrix, schema: &Schema) -> DecodedRows {
    let rows = matrix
        .buffers()
        .enumerate()
        .map(|(index, buffer)| {
            record::decode_record(&buffer, schema).map_err(|err| err.with_row(index as u64))
        })
        .collect::<Vec<_>>();
    let decoded = DecodedRows {
        schema: schema.clone(),
        rows,
    };
    debug!(
        rows = decoded.len(),
        failed = decoded.failed(),
        schema = %schema.describe(),
        "decoded database"
    );
    decoded
}

#[cfg(test)]
mod tests {
    use super::{ByteMatrix, Table, decode_database, encode_database};
    use crate::core::error::ErrorKind;
    use crate::core::record::RECORD_LEN;
    use crate::core::scalar::Scalar;
    use crate::core::schema::Schema;

    fn row(int: i64, float: f64, text: &str) -> Vec<Scalar> {
        vec![Scalar::Integer(int), Scalar::Float(float), Scalar::from(text)]
    }

    #[test]
    #[allow(clippy::approx_constant)]
    fn two_row_table_round_trip() {
        let table = Table::new(vec![row(42, 3.14, "a"), row(123, 2.71, "b")]);
        let matrix = encode_database(&table).expect("encode");
        assert_eq!(matrix.shape(), (2, RECORD_LEN));

        let schema = table.resolve_schema().expect("schema");
        let decoded = decode_database(&matrix, &schema)
            .into_table(Vec::new())
            .expect("decode");
        assert_eq!(decoded.row_count(), 2);
        assert_eq!(decoded.column_count(), 3);
        assert_eq!(decoded.rows(), table.rows());
        assert_eq!(decoded.columns(), vec!["0", "1", "2"]);
    }

    #[test]
    fn zero_and_empty_cells_round_trip() {
        let table = Table::new(vec![row(0, 0.0, ""), row(999, 999.999, "test")])
            .with_columns(vec!["id".into(), "score".into(), "label".into()]);
        let matrix = encode_database(&table).expect("encode");
        let schema = Schema::parse("int,float,text").expect("schema");
        let decoded = decode_database(&matrix, &schema)
            .into_table(table.columns())
            .expect("decode");
        assert_eq!(decoded.rows(), table.rows());
        assert_eq!(decoded.columns(), vec!["id", "score", "label"]);
    }

    #[test]
    fn deviating_row_is_schema_mismatch_with_row_index() {
        let table = Table::new(vec![
            row(1, 1.0, "a"),
            vec![Scalar::Integer(2), Scalar::Integer(3), Scalar::from("b")],
        ]);
        let err = encode_database(&table).expect_err("mismatch");
        assert_eq!(err.kind(), ErrorKind::SchemaMismatch);
        assert_eq!(err.row(), Some(1));
        assert_eq!(err.field(), Some(1));
    }

    #[test]
    fn declared_schema_overrides_first_row() {
        let table = Table::new(vec![vec![Scalar::Integer(1)]])
            .with_schema(Schema::parse("float").expect("schema"));
        let err = encode_database(&table).expect_err("mismatch");
        assert_eq!(err.kind(), ErrorKind::SchemaMismatch);
        assert_eq!(err.row(), Some(0));
    }

    #[test]
    fn oversized_row_aborts_whole_batch() {
        let table = Table::new(vec![row(1, 1.0, "ok"), row(2, 2.0, &"x".repeat(300))]);
        let err = encode_database(&table).expect_err("too large");
        assert_eq!(err.kind(), ErrorKind::RecordTooLarge);
        assert_eq!(err.row(), Some(1));
    }

    #[test]
    fn empty_table_encodes_to_empty_matrix() {
        let matrix = encode_database(&Table::default()).expect("encode");
        assert!(matrix.is_empty());
        assert_eq!(matrix.shape(), (0, RECORD_LEN));
    }

    #[test]
    fn bad_row_is_reported_without_stopping_batch() {
        let table = Table::new(vec![row(1, 1.0, "a"), row(2, 2.0, "b"), row(3, 3.0, "c")]);
        let mut bytes = encode_database(&table).expect("encode").into_bytes();
        // Corrupt the header of row 1.
        bytes[RECORD_LEN..RECORD_LEN + 8].copy_from_slice(&1000u64.to_le_bytes());
        let matrix = ByteMatrix::from_bytes(bytes).expect("matrix");

        let schema = table.resolve_schema().expect("schema");
        let decoded = decode_database(&matrix, &schema);
        assert_eq!(decoded.len(), 3);
        assert_eq!(decoded.failed(), 1);

        let (good, failures) = decoded.into_parts();
        assert_eq!(good, vec![row(1, 1.0, "a"), row(3, 3.0, "c")]);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].row, 1);
        assert_eq!(failures[0].error.kind(), ErrorKind::CorruptHeader);

        let err = decode_database(&matrix, &schema)
            .into_table(Vec::new())
            .expect_err("strict");
        assert_eq!(err.row(), Some(1));
    }

    #[test]
    fn matrix_rejects_ragged_length() {
        let err = ByteMatrix::from_bytes(vec![0u8; RECORD_LEN + 1]).expect_err("ragged");
        assert_eq!(err.kind(), ErrorKind::CorruptHeader);
    }

    #[test]
    fn matrix_row_access() {
        let table = Table::new(vec![row(1, 1.0, "a"), row(2, 2.0, "bb")]);
        let matrix = encode_database(&table).expect("encode");
        assert_eq!(matrix.row(1).expect("row").payload_len(), 18);
        assert!(matrix.row(2).is_none());
        assert!(matrix.row(usize::MAX / RECORD_LEN).is_none());
        assert!(matrix.row(usize::MAX).is_none());
    }
}
