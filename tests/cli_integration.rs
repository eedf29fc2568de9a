// CLI integration tests for encode/decode/inspect/schema flows.
use std::io::Write;
use std::process::{Command, Stdio};

use serde_json::Value;

fn cmd() -> Command {
    let exe = env!("CARGO_BIN_EXE_pircodec");
    Command::new(exe)
}

fn parse_json(value: &str) -> Value {
    serde_json::from_str(value).expect("valid json")
}

fn json_lines(output: &[u8]) -> Vec<Value> {
    std::str::from_utf8(output)
        .expect("utf8")
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(parse_json)
        .collect()
}

fn encode_stdin(args: &[&str], input: &str) -> std::process::Output {
    let mut child = cmd()
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn");
    child
        .stdin
        .take()
        .expect("stdin")
        .write_all(input.as_bytes())
        .expect("write stdin");
    child.wait_with_output().expect("output")
}

#[test]
fn encode_decode_round_trip() {
    let temp = tempfile::tempdir().expect("tempdir");
    let out = temp.path().join("table.pir");
    let out_str = out.to_str().unwrap();

    let encode = encode_stdin(
        &["encode", "--output", out_str, "--columns", "id,score,label"],
        "[42, 3.25, \"hello\"]\n[123, 2.5, \"你好\"]\n",
    );
    assert!(encode.status.success(), "{}", String::from_utf8_lossy(&encode.stderr));
    let summary = parse_json(std::str::from_utf8(&encode.stdout).expect("utf8"));
    assert_eq!(summary["rows"], 2);
    assert_eq!(summary["skipped"], 0);
    assert_eq!(summary["schema"], serde_json::json!(["int", "float", "text"]));
    assert_eq!(summary["columns"], serde_json::json!(["id", "score", "label"]));

    let bytes = std::fs::read(&out).expect("read container");
    assert_eq!(bytes.len(), 256 * 3);
    assert_eq!(&bytes[0..4], b"PIR1");

    let decode = cmd().args(["decode", "--input", out_str]).output().expect("decode");
    assert!(decode.status.success());
    let rows = json_lines(&decode.stdout);
    assert_eq!(
        rows,
        vec![
            serde_json::json!([42, 3.25, "hello"]),
            serde_json::json!([123, 2.5, "你好"]),
        ]
    );

    let decode = cmd()
        .args(["decode", "--input", out_str, "--format", "object"])
        .output()
        .expect("decode objects");
    assert!(decode.status.success());
    let rows = json_lines(&decode.stdout);
    assert_eq!(rows[0]["id"], 42);
    assert_eq!(rows[1]["label"], "你好");
}

#[test]
fn oversized_row_fails_with_record_too_large() {
    let temp = tempfile::tempdir().expect("tempdir");
    let out = temp.path().join("big.pir");
    let long = "x".repeat(241);
    let input = format!("[1, \"{long}\"]\n");

    let encode = encode_stdin(&["encode", "-o", out.to_str().unwrap()], &input);
    assert_eq!(encode.status.code(), Some(4));
    let stderr = std::str::from_utf8(&encode.stderr).expect("utf8");
    let err = parse_json(stderr.lines().last().expect("error line"));
    assert_eq!(err["error"]["kind"], "RecordTooLarge");
    assert!(!out.exists());
}

#[test]
fn rejected_header_leaves_no_output_file() {
    let temp = tempfile::tempdir().expect("tempdir");
    let out = temp.path().join("cols.pir");

    let encode = encode_stdin(
        &["encode", "-o", out.to_str().unwrap(), "--columns", "a"],
        "[1, 2]\n",
    );
    assert_eq!(encode.status.code(), Some(2));
    let stderr = std::str::from_utf8(&encode.stderr).expect("utf8");
    let err = parse_json(stderr.lines().last().expect("error line"));
    assert_eq!(err["error"]["kind"], "Usage");
    assert!(!out.exists());

    let long = "n".repeat(200);
    let encode = encode_stdin(
        &["encode", "-o", out.to_str().unwrap(), "--columns", &format!("{long},{long}")],
        "[1, 2]\n",
    );
    assert_eq!(encode.status.code(), Some(4));
    assert!(!out.exists());
}

#[test]
fn object_rows_keep_input_key_order() {
    let temp = tempfile::tempdir().expect("tempdir");
    let out = temp.path().join("objects.pir");
    let out_str = out.to_str().unwrap();

    let encode = encode_stdin(
        &["encode", "-o", out_str],
        "{\"id\": 1, \"score\": 2.5, \"label\": \"x\"}\n{\"label\": \"y\", \"id\": 2, \"score\": 0.5}\n",
    );
    assert!(encode.status.success(), "{}", String::from_utf8_lossy(&encode.stderr));
    let summary = parse_json(std::str::from_utf8(&encode.stdout).expect("utf8"));
    assert_eq!(summary["columns"], serde_json::json!(["id", "score", "label"]));
    assert_eq!(summary["schema"], serde_json::json!(["int", "float", "text"]));

    let decode = cmd()
        .args(["decode", "--input", out_str, "--format", "object"])
        .output()
        .expect("decode");
    assert!(decode.status.success());
    let rows = json_lines(&decode.stdout);
    assert_eq!(rows[1], serde_json::json!({"id": 2, "score": 0.5, "label": "y"}));
}

#[test]
fn skip_policy_drops_bad_rows_and_reports_notices() {
    let temp = tempfile::tempdir().expect("tempdir");
    let out = temp.path().join("skip.pir");
    let input = "[1, \"a\"]\nnot json\n[2.5, \"b\"]\n[3, \"c\"]\n";

    let encode = encode_stdin(
        &["encode", "-o", out.to_str().unwrap(), "--errors", "skip"],
        input,
    );
    assert!(encode.status.success());
    let summary = parse_json(std::str::from_utf8(&encode.stdout).expect("utf8"));
    assert_eq!(summary["rows"], 2);
    assert_eq!(summary["skipped"], 2);

    let notices = std::str::from_utf8(&encode.stderr)
        .expect("utf8")
        .lines()
        .filter(|line| line.starts_with("{\"notice\""))
        .map(parse_json)
        .collect::<Vec<_>>();
    assert_eq!(notices.len(), 2);
    assert_eq!(notices[0]["notice"]["details"]["line"], 2);
    assert_eq!(notices[1]["notice"]["details"]["error_kind"], "SchemaMismatch");
}

#[test]
fn declared_schema_rejects_mismatched_row() {
    let temp = tempfile::tempdir().expect("tempdir");
    let out = temp.path().join("schema.pir");
    let encode = encode_stdin(
        &["encode", "-o", out.to_str().unwrap(), "--schema", "int,float"],
        "[1, 2]\n",
    );
    assert_eq!(encode.status.code(), Some(7));
}

#[test]
fn decode_skip_reports_corrupt_rows() {
    let temp = tempfile::tempdir().expect("tempdir");
    let out = temp.path().join("corrupt.pir");
    let out_str = out.to_str().unwrap();
    let encode = encode_stdin(&["encode", "-o", out_str], "[1, \"a\"]\n[2, \"b\"]\n");
    assert!(encode.status.success());

    let mut bytes = std::fs::read(&out).expect("read");
    // First record starts after the 256-byte container header.
    bytes[256..264].copy_from_slice(&999u64.to_le_bytes());
    std::fs::write(&out, &bytes).expect("write");

    let strict = cmd().args(["decode", "-i", out_str]).output().expect("decode");
    assert_eq!(strict.status.code(), Some(6));

    let lenient = cmd()
        .args(["decode", "-i", out_str, "--errors", "skip"])
        .output()
        .expect("decode skip");
    assert!(lenient.status.success());
    assert_eq!(json_lines(&lenient.stdout), vec![serde_json::json!([2, "b"])]);
    let stderr = std::str::from_utf8(&lenient.stderr).expect("utf8");
    assert!(stderr.contains("\"row_skipped\""));
}

#[test]
fn inspect_describes_layout() {
    let temp = tempfile::tempdir().expect("tempdir");
    let out = temp.path().join("inspect.pir");
    let out_str = out.to_str().unwrap();
    let encode = encode_stdin(&["encode", "-o", out_str], "[7, 1.5, \"abc\"]\n");
    assert!(encode.status.success());

    let inspect = cmd().args(["inspect", "-i", out_str]).output().expect("inspect");
    assert!(inspect.status.success());
    let value = parse_json(std::str::from_utf8(&inspect.stdout).expect("utf8"));
    assert_eq!(value["rows"], 1);
    assert_eq!(value["hints"], serde_json::json!([0x48, 0x88, 0xC0]));
    assert_eq!(value["max_text_bytes"], 232);
    assert_eq!(value["records"][0]["payload_len"], 19);
    assert_eq!(value["records"][0]["padding_zero"], true);
}

#[test]
fn schema_command_reports_hints_and_rejects_bad_order() {
    let ok = cmd().args(["schema", "int,text"]).output().expect("schema");
    assert!(ok.status.success());
    let value = parse_json(std::str::from_utf8(&ok.stdout).expect("utf8"));
    assert_eq!(value["hints"], serde_json::json!([72, 192]));
    assert_eq!(value["max_text_bytes"], 240);

    let bad = cmd().args(["schema", "text,int"]).output().expect("schema");
    assert_eq!(bad.status.code(), Some(7));
    let err = parse_json(std::str::from_utf8(&bad.stderr).expect("utf8").trim());
    assert_eq!(err["error"]["kind"], "SchemaMismatch");
    assert!(err["error"]["hint"].is_string());
}

#[test]
fn missing_input_is_usage_error() {
    let output = cmd()
        .args(["decode", "-i", "/nonexistent/table.pir"])
        .output()
        .expect("decode");
    assert_eq!(output.status.code(), Some(2));
}
