//! End-to-end decoding: catalog file + frame log files -> samples

use can_signal_decoder::{
    load_catalog_file, Decoder, DecoderConfig, DecoderError, SkipReason, SourceError,
};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

const CATALOG: &str = r#"{
    "messages": [
        {"name": "EngineData", "frame_id": "0x1A0"},
        {"name": "Climate", "frame_id": 1000}
    ],
    "encodings": [
        {"signal_id": "EngineSpeed", "message": "EngineData", "bit_start": 0,
         "bit_length": 16, "is_signed": false, "byte_order": "LittleEndian",
         "scale": 0.25, "offset": 0.0, "unit": "rpm"},
        {"signal_id": "EngineTorque", "message": "EngineData", "bit_start": 16,
         "bit_length": 16, "is_signed": true, "byte_order": "LittleEndian"},
        {"signal_id": "CabinTemp", "message": "Climate", "bit_start": 56,
         "bit_length": 8, "byte_order": "BigEndian", "scale": 0.5, "offset": -40.0,
         "min_inclusive": -40.0, "max_inclusive": 60.0}
    ]
}"#;

struct Fixture {
    _dir: TempDir,
    catalog: PathBuf,
    logs: Vec<PathBuf>,
}

fn fixture() -> Fixture {
    let _ = env_logger::builder().is_test(true).try_init();

    let dir = TempDir::new().unwrap();
    let catalog = dir.path().join("catalog.json");
    fs::write(&catalog, CATALOG).unwrap();

    // EngineData little-endian: bytes reversed -> 0x...FFFE_0FA0
    //   EngineSpeed = 0x0FA0 * 0.25 = 1000 rpm, EngineTorque = 0xFFFE = -2
    // Climate big-endian: first byte is the top 8 bits -> raw 0x8C = 140 -> 30 degC
    let first = dir.path().join("can1_sniffer.csv");
    fs::write(
        &first,
        "timestamp,busChannel,ide,data\n\
         2024-05-02 10:15:01.000,1,1A0,A00FFEFF00000000\n\
         2024-05-02 10:15:01.100,1,7FF,0000000000000000\n\
         2024-05-02 10:15:02.000,1,3E8,8C00000000000000\n",
    )
    .unwrap();

    let second = dir.path().join("can2_sniffer.csv");
    fs::write(
        &second,
        "timestamp,busChannel,ide,data\n\
         2024-05-02 10:15:03.000,2,1A0,A00F\n\
         2024-05-02 10:15:04.000,2,3E8,ZZ\n\
         2024-05-02 10:15:05.000,2,3E8,FF00000000000000\n",
    )
    .unwrap();

    Fixture {
        _dir: dir,
        catalog,
        logs: vec![first, second],
    }
}

#[test]
fn decodes_logs_end_to_end() {
    let fx = fixture();
    let decoder = Decoder::from_catalog_file(&fx.catalog).unwrap();
    assert_eq!(decoder.catalog_stats().num_signals, 3);

    let mut run = decoder.decode_files(fx.logs.clone(), ',', DecoderConfig::new());
    let samples: Vec<_> = run.by_ref().map(|s| s.unwrap()).collect();

    let values: Vec<(&str, f64)> = samples
        .iter()
        .map(|s| (s.signal_id.as_str(), s.physical_value))
        .collect();
    assert_eq!(
        values,
        vec![
            ("EngineSpeed", 1000.0),
            ("EngineTorque", -2.0),
            ("CabinTemp", 30.0),
            ("EngineSpeed", 1000.0),
            ("CabinTemp", 87.5),
        ]
    );

    assert_eq!(samples[0].identifier(), "EngineSpeed_20240502101501_1");
    assert_eq!(samples[0].unit.as_deref(), Some("rpm"));
    assert_eq!(samples[0].source.as_deref(), Some("can1_sniffer"));
    assert_eq!(samples[3].source.as_deref(), Some("can2_sniffer"));
    assert_eq!(samples[4].sequence, 5);

    // Tagged with the position of the source frame, across files
    let frame_indices: Vec<u64> = samples.iter().map(|s| s.frame_index).collect();
    assert_eq!(frame_indices, vec![1, 1, 3, 4, 5]);

    let stats = run.stats();
    assert_eq!(stats.frames_read, 5);
    assert_eq!(stats.frames_matched, 4);
    assert_eq!(stats.frames_unmatched, 1);
    assert_eq!(stats.samples_decoded, 5);
    assert_eq!(stats.skipped.get(&SkipReason::MalformedPayload), Some(&1));
    assert_eq!(stats.skipped.get(&SkipReason::InvalidRecord), Some(&1));
}

#[test]
fn range_validation_drops_out_of_range_values() {
    let fx = fixture();
    let decoder = Decoder::from_catalog_file(&fx.catalog).unwrap();
    let config = DecoderConfig::new().with_range_validation(true);

    let mut run = decoder.decode_files(fx.logs.clone(), ',', config);
    let cabin: Vec<f64> = run
        .by_ref()
        .map(|s| s.unwrap())
        .filter(|s| s.signal_id == "CabinTemp")
        .map(|s| s.physical_value)
        .collect();

    assert_eq!(cabin, vec![30.0]);
    assert_eq!(run.stats().skipped.get(&SkipReason::OutOfRange), Some(&1));
}

#[test]
fn fail_fast_surfaces_first_bad_record() {
    let fx = fixture();
    let decoder = Decoder::from_catalog_file(&fx.catalog).unwrap();
    let config = DecoderConfig::new().with_fail_fast(true);

    let results: Vec<_> = decoder.decode_files(fx.logs.clone(), ',', config).collect();
    let last = results.last().unwrap();
    assert!(matches!(last, Err(DecoderError::Decode(_))));
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 4);
}

#[test]
fn parallel_run_preserves_order() {
    let fx = fixture();
    let decoder = Decoder::from_catalog_file(&fx.catalog).unwrap();

    let sequential: Vec<_> = decoder
        .decode_files(fx.logs.clone(), ',', DecoderConfig::new())
        .map(|s| s.unwrap())
        .collect();
    let parallel: Vec<_> = decoder
        .decode_files(
            fx.logs.clone(),
            ',',
            DecoderConfig::new().with_parallel(true).with_batch_size(2),
        )
        .map(|s| s.unwrap())
        .collect();

    assert_eq!(parallel, sequential);
}

#[test]
fn missing_log_file_aborts_run() {
    let fx = fixture();
    let decoder = Decoder::from_catalog_file(&fx.catalog).unwrap();
    let missing = fx.catalog.with_file_name("missing.csv");

    let results: Vec<_> = decoder
        .decode_files(vec![missing], ',', DecoderConfig::new())
        .collect();
    assert_eq!(results.len(), 1);
    assert!(matches!(
        results[0],
        Err(DecoderError::Source(SourceError::Io(_)))
    ));
}

#[test]
fn unresolved_catalog_signal_is_fatal() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("catalog.json");
    fs::write(
        &path,
        r#"{"encodings": [{"signal_id": "Lost", "message": "Ghost", "bit_start": 0,
            "bit_length": 8, "byte_order": "BigEndian"}]}"#,
    )
    .unwrap();

    let err = load_catalog_file(&path).unwrap_err();
    assert!(err.to_string().contains("Lost"));
    assert!(Decoder::from_catalog_file(&path).is_err());
}
