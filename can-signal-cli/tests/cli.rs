use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const CATALOG: &str = r#"{
    "signals": [
        {"signal_id": "EngineSpeed", "frame_id": "0x1A0", "bit_start": 0,
         "bit_length": 16, "byte_order": "LittleEndian", "scale": 0.25, "unit": "rpm"},
        {"signal_id": "CabinTemp", "frame_id": 1000, "bit_start": 56,
         "bit_length": 8, "byte_order": "BigEndian", "scale": 0.5, "offset": -40.0,
         "min_inclusive": -40.0, "max_inclusive": 60.0}
    ]
}"#;

fn write_inputs(dir: &Path) {
    fs::write(dir.join("catalog.json"), CATALOG).unwrap();
    fs::create_dir(dir.join("raw")).unwrap();
    fs::write(
        dir.join("raw").join("can1_sniffer.csv"),
        "timestamp,busChannel,ide,data\n\
         2024-05-02 10:15:01.000,1,1A0,A00F\n\
         2024-05-02 10:15:02.000,1,3E8,8C00000000000000\n",
    )
    .unwrap();
    fs::write(
        dir.join("raw").join("can2_sniffer.csv"),
        "timestamp,busChannel,ide,data\n\
         2024-05-02 10:15:03.000,2,7FF,00\n\
         2024-05-02 10:15:04.000,2,3E8,FF00000000000000\n\
         2024-05-02 10:15:05.000,2,1A0,A0\n",
    )
    .unwrap();
}

fn cli() -> Command {
    Command::cargo_bin("can-signal-cli").unwrap()
}

#[test]
fn help_lists_core_flags() {
    cli()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--catalog"))
        .stdout(predicate::str::contains("--log"))
        .stdout(predicate::str::contains("--fail-fast"));
}

#[test]
fn decodes_glob_input_to_json_lines_file() {
    let dir = TempDir::new().unwrap();
    write_inputs(dir.path());
    let output = dir.path().join("samples.jsonl");

    cli()
        .current_dir(dir.path())
        .args(["--catalog", "catalog.json", "--log", "raw/*.csv", "-o"])
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::contains("Frames read:      5"))
        .stdout(predicate::str::contains("Samples decoded:  3"))
        .stdout(predicate::str::contains("malformed payload:"));

    let text = fs::read_to_string(&output).unwrap();
    let records: Vec<serde_json::Value> = text
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(records.len(), 3);
    assert_eq!(records[0]["identifier"], "EngineSpeed_20240502101501_1");
    assert_eq!(records[0]["physical_value"], 1000.0);
    assert_eq!(records[0]["source"], "can1_sniffer");
    assert_eq!(records[1]["physical_value"], 30.0);
    assert_eq!(records[2]["physical_value"], 87.5);
    assert_eq!(records[2]["source"], "can2_sniffer");
    assert_eq!(records[2]["frame_index"], 4);
}

#[test]
fn writes_delimited_samples_to_stdout() {
    let dir = TempDir::new().unwrap();
    write_inputs(dir.path());

    cli()
        .current_dir(dir.path())
        .args([
            "--catalog",
            "catalog.json",
            "--log",
            "raw/can1_sniffer.csv",
            "--format",
            "csv",
            "--quiet",
        ])
        .assert()
        .success()
        .stdout(predicate::str::starts_with(
            "identifier;signal_id;physical_value;result_time;raw_value;unit;source;frame_index\n",
        ))
        .stdout(predicate::str::contains(
            "EngineSpeed_20240502101501_1;EngineSpeed;1000;2024-05-02T10:15:01.000Z;4000;rpm;can1_sniffer;1\n",
        ))
        .stderr(predicate::str::is_empty());
}

#[test]
fn range_validation_and_fail_fast() {
    let dir = TempDir::new().unwrap();
    write_inputs(dir.path());

    // CabinTemp 87.5 is outside [-40, 60]
    cli()
        .current_dir(dir.path())
        .args(["--catalog", "catalog.json", "--log", "raw/*.csv"])
        .args(["--validate-range", "--fail-fast", "-o", "out.jsonl"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error: Decode run aborted"));

    let text = fs::read_to_string(dir.path().join("out.jsonl")).unwrap();
    assert_eq!(text.lines().count(), 2);
}

#[test]
fn config_file_with_overrides() {
    let dir = TempDir::new().unwrap();
    write_inputs(dir.path());
    fs::write(
        dir.path().join("config.toml"),
        "[input]\n\
         catalog = \"catalog.json\"\n\
         frame_logs = [\"raw/*.csv\"]\n\
         \n\
         [decoding]\n\
         parallel = true\n\
         batch_size = 2\n\
         \n\
         [output]\n\
         path = \"samples.jsonl\"\n",
    )
    .unwrap();

    cli()
        .current_dir(dir.path())
        .args(["--config", "config.toml", "--frame-id", "0x3E8", "--preview", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Frames filtered:  3"))
        .stdout(predicate::str::contains("CabinTemp_20240502101502_1"));

    let text = fs::read_to_string(dir.path().join("samples.jsonl")).unwrap();
    assert_eq!(text.lines().count(), 2);
}

#[test]
fn missing_catalog_is_reported() {
    let dir = TempDir::new().unwrap();
    write_inputs(dir.path());

    cli()
        .current_dir(dir.path())
        .args(["--log", "raw/*.csv"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No signal catalog given"));

    cli()
        .current_dir(dir.path())
        .args(["--catalog", "nope.json", "--log", "raw/*.csv"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load signal catalog"));
}

#[test]
fn unmatched_pattern_is_an_error() {
    let dir = TempDir::new().unwrap();
    write_inputs(dir.path());

    cli()
        .current_dir(dir.path())
        .args(["--catalog", "catalog.json", "--log", "raw/*.blf"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No files match pattern"));
}
