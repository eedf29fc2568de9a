//! Purpose: Hold top-level CLI command dispatch for `pircodec`.
//! Exports: `dispatch_command`.
//! Role: Keep `main.rs` focused on parse/bootstrap and delegate command execution.
//! Invariants: Stdout carries only command output; diagnostics and notices go to stderr.
//! Invariants: Container files are created only after every row and the header have encoded.

use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::path::Path;

use pircodec::api::{
    ByteMatrix, CONTAINER_HEADER_LEN, MAX_PAYLOAD, Scalar, Schema, Table, decode_database,
    encode_database, encode_record, positional_columns, read_container, write_container,
};
use tracing::{info, warn};

use super::*;
use crate::ingest::{IngestConfig, IngestFailure, ingest_rows};

pub(super) fn dispatch_command(
    command: Command,
    color_mode: ColorMode,
) -> Result<RunOutcome, Error> {
    match command {
        Command::Encode {
            input,
            output,
            schema,
            columns,
            errors,
        } => {
            let mut resolved = schema.as_deref().map(Schema::parse).transpose()?;
            let mut config = IngestConfig::new(errors.into());
            config.columns = columns;
            let reader: Box<dyn Read> = match &input {
                Some(path) => Box::new(open_input(path)?),
                None => Box::new(io::stdin().lock()),
            };

            let mut rows = Vec::new();
            let outcome = ingest_rows(
                reader,
                &config,
                |row| {
                    if resolved.is_none() {
                        resolved = Some(Schema::of(&row)?);
                    }
                    // Reject here so skip mode can drop the row before the batch encode.
                    if let Some(schema) = &resolved {
                        encode_record(&row, schema)?;
                    }
                    rows.push(row);
                    Ok(())
                },
                |failure| emit_ingest_failure(&failure, color_mode),
            )?;

            let schema = resolved.unwrap_or_default();
            let columns = match outcome.columns {
                Some(columns) => columns,
                None => positional_columns(schema.len()),
            };
            let table = Table::new(rows)
                .with_schema(schema.clone())
                .with_columns(columns.clone());
            let matrix = encode_database(&table)?;
            let hints = schema.to_hints()?;

            // Nothing touches the output path until the header has encoded.
            let mut container = Vec::with_capacity(CONTAINER_HEADER_LEN + matrix.as_bytes().len());
            write_container(&mut container, &columns, &schema, &matrix)?;
            write_output(&output, &container)?;
            info!(rows = matrix.row_count(), skipped = outcome.failed, "encoded table");

            emit_json(
                json!({
                    "rows": matrix.row_count(),
                    "skipped": outcome.failed,
                    "schema": schema,
                    "hints": hints,
                    "columns": columns,
                    "output": output.display().to_string(),
                }),
                color_mode,
            );
            Ok(RunOutcome::ok())
        }
        Command::Decode {
            input,
            errors,
            format,
        } => {
            let container = read_container(BufReader::new(open_input(&input)?))?;
            let decoded = decode_database(&container.matrix, &container.schema);
            let decoded_rows = decoded.len();
            let columns = container.columns;
            let mut skipped = 0u64;
            for result in decoded.into_results() {
                match result {
                    Ok(record) => emit_line(&row_json(&record, &columns, format)),
                    Err(err) if errors == ErrorPolicyCli::Skip => {
                        skipped += 1;
                        warn!(row = err.row(), kind = ?err.kind(), "skipping undecodable row");
                        emit_notice(&row_skipped_notice("decode", &err), color_mode);
                    }
                    Err(err) => {
                        return Err(err.with_hint("Use --errors skip to continue past bad rows."));
                    }
                }
            }
            info!(rows = decoded_rows, skipped, "decoded table");
            Ok(RunOutcome::ok())
        }
        Command::Inspect { input } => {
            let container = read_container(BufReader::new(open_input(&input)?))?;
            let value = inspect_json(&container.columns, &container.schema, &container.matrix)?;
            emit_json(value, color_mode);
            Ok(RunOutcome::ok())
        }
        Command::Schema { kinds } => {
            let schema = Schema::parse(&kinds)?;
            emit_json(
                json!({
                    "schema": schema,
                    "hints": schema.to_hints()?,
                    "fixed_width": schema.fixed_width(),
                    "max_text_bytes": text_budget(&schema),
                }),
                color_mode,
            );
            Ok(RunOutcome::ok())
        }
    }
}

fn open_input(path: &Path) -> Result<File, Error> {
    File::open(path).map_err(|err| {
        let kind = if err.kind() == io::ErrorKind::NotFound {
            ErrorKind::Usage
        } else {
            ErrorKind::Io
        };
        Error::new(kind)
            .with_message(format!("failed to open {}", path.display()))
            .with_source(err)
    })
}

fn write_output(path: &Path, bytes: &[u8]) -> Result<(), Error> {
    let create_error = |err: io::Error| {
        Error::new(ErrorKind::Io)
            .with_message(format!("failed to write {}", path.display()))
            .with_source(err)
    };
    let mut file = File::create(path).map_err(create_error)?;
    file.write_all(bytes).map_err(create_error)?;
    file.sync_all().map_err(create_error)
}

fn text_budget(schema: &Schema) -> Option<usize> {
    if !schema.has_text() {
        return None;
    }
    Some(MAX_PAYLOAD.saturating_sub(schema.fixed_width()))
}

fn row_json(record: &[Scalar], columns: &[String], format: RowFormat) -> Value {
    match format {
        RowFormat::Array => Value::Array(record.iter().map(|value| value.to_json()).collect()),
        RowFormat::Object => {
            let mut map = Map::new();
            for (name, value) in columns.iter().zip(record) {
                map.insert(name.clone(), value.to_json());
            }
            Value::Object(map)
        }
    }
}

fn inspect_json(
    columns: &[String],
    schema: &Schema,
    matrix: &ByteMatrix,
) -> Result<Value, Error> {
    let decoded = decode_database(matrix, schema);
    let records = matrix
        .buffers()
        .zip(decoded.results())
        .enumerate()
        .map(|(index, (buffer, result))| {
            let mut entry = Map::new();
            entry.insert("row".to_string(), json!(index));
            entry.insert("payload_len".to_string(), json!(buffer.payload_len()));
            entry.insert("padding_zero".to_string(), json!(buffer.padding_is_zero()));
            entry.insert("ok".to_string(), json!(result.is_ok()));
            if let Err(err) = result {
                entry.insert("error".to_string(), error_json(err)["error"].clone());
            }
            Value::Object(entry)
        })
        .collect::<Vec<_>>();

    Ok(json!({
        "rows": matrix.row_count(),
        "columns": columns,
        "schema": schema,
        "hints": schema.to_hints()?,
        "max_text_bytes": text_budget(schema),
        "records": records,
    }))
}

fn row_skipped_notice(cmd: &str, err: &Error) -> Notice {
    let mut details = Map::new();
    if let Some(row) = err.row() {
        details.insert("row".to_string(), json!(row));
    }
    if let Some(field) = err.field() {
        details.insert("field".to_string(), json!(field));
    }
    details.insert("error_kind".to_string(), json!(format!("{:?}", err.kind())));
    Notice {
        kind: "row_skipped".to_string(),
        cmd: cmd.to_string(),
        message: error_message(err),
        details,
    }
}

fn emit_ingest_failure(failure: &IngestFailure, color_mode: ColorMode) {
    warn!(line = failure.line, kind = %failure.error_kind, "skipping input line");
    let mut details = Map::new();
    details.insert("line".to_string(), json!(failure.line));
    details.insert("error_kind".to_string(), json!(failure.error_kind));
    if let Some(snippet) = &failure.snippet {
        details.insert("snippet".to_string(), json!(snippet));
    }
    let notice = Notice {
        kind: "row_skipped".to_string(),
        cmd: "encode".to_string(),
        message: failure.message.clone(),
        details,
    };
    emit_notice(&notice, color_mode);
}
