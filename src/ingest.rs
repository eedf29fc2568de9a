//! Purpose: Parse JSON Lines tables into typed rows for `encode` with explicit error policies.
//! Exports: `ErrorPolicy`, `IngestConfig`, `IngestOutcome`, `IngestFailure`, `ingest_rows`.
//! Role: Input ingestion used by the CLI; isolates JSON handling from the codec.
//! Invariants: Each non-blank line is one row: a JSON array, or an object keyed by column.
//! Invariants: Skip mode only continues at line boundaries.
//! Invariants: At most `max_line_bytes + 1` bytes of any line are buffered.
use std::io::{self, BufRead, BufReader, Read};

use bstr::ByteSlice;
use pircodec::api::{Error, ErrorKind, Record, Scalar};
use serde_json::{Map, Value};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ErrorPolicy {
    Stop,
    Skip,
}

#[derive(Clone, Debug)]
pub struct IngestConfig {
    pub errors: ErrorPolicy,
    pub columns: Option<Vec<String>>,
    pub max_line_bytes: usize,
    pub max_snippet_bytes: usize,
}

impl IngestConfig {
    pub fn new(errors: ErrorPolicy) -> Self {
        Self {
            errors,
            columns: None,
            max_line_bytes: 1024 * 1024,
            max_snippet_bytes: 80,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct IngestOutcome {
    pub columns: Option<Vec<String>>,
    pub lines_total: u64,
    pub ok: u64,
    pub failed: u64,
}

#[derive(Clone, Debug)]
pub struct IngestFailure {
    pub line: u64,
    pub message: String,
    pub error_kind: String,
    pub snippet: Option<String>,
}

fn io_error(err: io::Error, message: &str) -> Error {
    Error::new(ErrorKind::Io)
        .with_message(message)
        .with_source(err)
}

/// Reads rows line by line, handing each parsed row to `on_row`.
///
/// `on_row` may itself reject a row; under [`ErrorPolicy::Skip`] that
/// rejection is reported through `on_failure` like a parse failure.
pub fn ingest_rows<R, F, N>(
    reader: R,
    config: &IngestConfig,
    mut on_row: F,
    mut on_failure: N,
) -> Result<IngestOutcome, Error>
where
    R: Read,
    F: FnMut(Record) -> Result<(), Error>,
    N: FnMut(IngestFailure),
{
    let mut outcome = IngestOutcome {
        columns: config.columns.clone(),
        ..IngestOutcome::default()
    };
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    let mut line_no = 0u64;

    loop {
        buf.clear();
        let Some(truncated) = read_line_capped(&mut reader, &mut buf, config.max_line_bytes)?
        else {
            break;
        };
        line_no += 1;
        let line = buf.trim();
        if line.is_empty() {
            continue;
        }
        outcome.lines_total += 1;

        let result = if truncated || line.len() > config.max_line_bytes {
            Err(Error::new(ErrorKind::Usage).with_message(format!(
                "line exceeds {} bytes",
                config.max_line_bytes
            )))
        } else {
            parse_row(line, &mut outcome.columns).and_then(&mut on_row)
        };

        match result {
            Ok(()) => outcome.ok += 1,
            Err(err) => match config.errors {
                ErrorPolicy::Stop => {
                    let err = err.with_row(outcome.lines_total - 1);
                    return Err(if err.hint().is_some() {
                        err
                    } else {
                        err.with_hint("Use --errors skip to continue past bad rows.")
                    });
                }
                ErrorPolicy::Skip => {
                    outcome.failed += 1;
                    on_failure(IngestFailure {
                        line: line_no,
                        message: err.message().unwrap_or("invalid row").to_string(),
                        error_kind: format!("{:?}", err.kind()),
                        snippet: Some(snippet(line, config.max_snippet_bytes)),
                    });
                }
            },
        }
    }

    Ok(outcome)
}

/// Reads one line into `buf`, keeping at most `limit + 1` bytes of it.
///
/// The remainder of a longer line is consumed and dropped. Returns `None` at end
/// of input, otherwise whether the line was cut short.
fn read_line_capped<R: BufRead>(
    reader: &mut R,
    buf: &mut Vec<u8>,
    limit: usize,
) -> Result<Option<bool>, Error> {
    let mut seen = false;
    let mut truncated = false;
    loop {
        let available = reader
            .fill_buf()
            .map_err(|err| io_error(err, "failed to read input"))?;
        if available.is_empty() {
            break;
        }
        seen = true;
        let (take, done) = match available.iter().position(|byte| *byte == b'\n') {
            Some(pos) => (pos + 1, true),
            None => (available.len(), false),
        };
        let room = limit.saturating_add(1).saturating_sub(buf.len());
        let keep = take.min(room);
        buf.extend_from_slice(&available[..keep]);
        truncated |= keep < take;
        reader.consume(take);
        if done {
            break;
        }
    }
    Ok(seen.then_some(truncated))
}

fn parse_row(line: &[u8], columns: &mut Option<Vec<String>>) -> Result<Record, Error> {
    let value: Value = serde_json::from_slice(line).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message(format!("invalid JSON: {err}"))
            .with_source(err)
    })?;
    match value {
        Value::Array(cells) => cells
            .iter()
            .enumerate()
            .map(|(index, cell)| Scalar::from_json(cell).map_err(|err| err.with_field(index)))
            .collect(),
        Value::Object(map) => {
            let names = columns.get_or_insert_with(|| map.keys().cloned().collect());
            object_row(&map, names)
        }
        _ => Err(Error::new(ErrorKind::Usage)
            .with_message("row must be a JSON array or object")
            .with_hint("Write one row per line, e.g. [42, 3.14, \"hello\"].")),
    }
}

fn object_row(map: &Map<String, Value>, columns: &[String]) -> Result<Record, Error> {
    if map.len() != columns.len() {
        return Err(Error::new(ErrorKind::SchemaMismatch).with_message(format!(
            "object has {} keys, expected columns {:?}",
            map.len(),
            columns
        )));
    }
    columns
        .iter()
        .enumerate()
        .map(|(index, name)| {
            let cell = map.get(name).ok_or_else(|| {
                Error::new(ErrorKind::SchemaMismatch)
                    .with_message(format!("missing column `{name}`"))
                    .with_field(index)
            })?;
            Scalar::from_json(cell).map_err(|err| err.with_field(index))
        })
        .collect()
}

fn snippet(line: &[u8], max_bytes: usize) -> String {
    let text = line.to_str_lossy();
    if text.len() <= max_bytes {
        return text.into_owned();
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}
