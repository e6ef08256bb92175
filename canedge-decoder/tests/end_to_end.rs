// End-to-end runs over candump and MF4 logs written to a temp directory
use canedge_decoder::{formats, DecoderRegistry, FrameProcessor, RunConfig, RunSummary};
use std::fs;
use std::path::Path;

const LOG: &str = "\
(1735009906.316400) can0 01000001#0135000000000000
(1735009906.316500) can0 01000002#CDCC4C3D
(1735009906.316600) can0 00000123#DEADBEEF
(1735009906.316700) can0 01000003#0AD7A33C
(1735009906.316800) can0 01000004#CDCC4C3D
(1735009906.316900) can0 7E8#0102
(1735009906.317000) can0 00000123#00
(1735009906.317100) can0 01000001#0100
(1735009906.317200) can0 01000002#CDCC4C3D
(1735009906.317300) can1 18FF0001#0011223344556677
";

fn write_log(dir: &Path, text: &str) -> std::path::PathBuf {
    let path = dir.join("trace.log");
    fs::write(&path, text).unwrap();
    path
}

fn run(log: &Path, output: &Path, clear_files: bool) -> RunSummary {
    let config = RunConfig::new()
        .with_clear_files(clear_files)
        .with_output_dir(output);
    let processor = FrameProcessor::new(DecoderRegistry::standard(), config).unwrap();
    processor.process(formats::open_log(log).unwrap()).unwrap()
}

fn table_lines(dir: &Path, table: &str) -> Vec<String> {
    fs::read_to_string(dir.join(format!("{}.csv", table)))
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

#[test]
fn decodes_log_into_tables() {
    let dir = tempfile::tempdir().unwrap();
    let log = write_log(dir.path(), LOG);
    let summary = run(&log, dir.path(), true);

    // 10 frames: 4 unknown (3 distinct IDs), 1 short system flags frame
    assert_eq!(summary.frames, 10);
    assert_eq!(summary.unknown_frames, 4);
    assert_eq!(summary.decode_errors, 1);
    assert_eq!(summary.rows_written, 10 - 4 - 1);

    let unmatched: Vec<&str> = summary.unmatched_ids.iter().map(|k| k.as_str()).collect();
    assert_eq!(unmatched, vec!["0x1000001", "0x123", "0x18ff0001", "0x7e8"]);

    assert_eq!(
        table_lines(dir.path(), "can_0x01000001"),
        vec![
            "timestamp,flagEnableSystem,isOverSpeed,manualOverSpeed,M1_IFB_U_PPB2,tripFaultValue,clutch_status,loading_e,err",
            "1735009906.316400,1,0,0,212,0,0,0,0",
        ]
    );
    assert_eq!(
        table_lines(dir.path(), "can_0x01000002"),
        vec![
            "timestamp,iqRef",
            "1735009906.316500,0.05",
            "1735009906.317200,0.05",
        ]
    );
    assert_eq!(
        table_lines(dir.path(), "can_0x01000003"),
        vec!["timestamp,user_output", "1735009906.316700,0.02"]
    );
    assert_eq!(
        table_lines(dir.path(), "can_0x01000004"),
        vec!["timestamp,piiq_ref", "1735009906.316800,0.05"]
    );
}

#[test]
fn only_unknown_ids_are_listed_when_every_known_frame_decodes() {
    let dir = tempfile::tempdir().unwrap();
    let text = "\
(1.0) can0 01000002#CDCC4C3D
(2.0) can0 00000AAA#00
(3.0) can0 00000BBB#00
(4.0) can0 00000AAA#01
(5.0) can0 01000004#CDCC4C3D
";
    let log = write_log(dir.path(), text);
    let summary = run(&log, dir.path(), true);

    assert_eq!(summary.rows_written, 2);
    let unmatched: Vec<&str> = summary.unmatched_ids.iter().map(|k| k.as_str()).collect();
    assert_eq!(unmatched, vec!["0xaaa", "0xbbb"]);
    assert!(summary.decode_failures.is_empty());
}

#[test]
fn append_mode_doubles_rows_and_keeps_header() {
    let dir = tempfile::tempdir().unwrap();
    let log = write_log(dir.path(), LOG);

    run(&log, dir.path(), true);
    let initial = table_lines(dir.path(), "can_0x01000002");
    assert_eq!(initial.len(), 3);

    run(&log, dir.path(), false);
    let once = table_lines(dir.path(), "can_0x01000002");
    assert_eq!(once.len(), 1 + 2 * 2);

    run(&log, dir.path(), false);
    let twice = table_lines(dir.path(), "can_0x01000002");
    assert_eq!(twice.len(), 1 + 3 * 2);
    assert_eq!(twice[0], "timestamp,iqRef");
    assert_eq!(twice.iter().filter(|l| l.starts_with("timestamp")).count(), 1);
}

#[test]
fn initialize_mode_resets_tables() {
    let dir = tempfile::tempdir().unwrap();
    let log = write_log(dir.path(), LOG);

    run(&log, dir.path(), true);
    run(&log, dir.path(), false);
    let empty = write_log(dir.path(), "");
    let summary = run(&empty, dir.path(), true);

    assert_eq!(summary.frames, 0);
    assert_eq!(summary.summary_line(), "All CAN IDs matched a decoder");
    assert_eq!(table_lines(dir.path(), "can_0x01000002"), vec!["timestamp,iqRef"]);
}

#[test]
fn malformed_log_line_aborts_run() {
    let dir = tempfile::tempdir().unwrap();
    let log = write_log(dir.path(), "(1.0) can0 01000002#CDCC4C3D\nnot a frame\n");

    let config = RunConfig::new().with_output_dir(dir.path());
    let processor = FrameProcessor::new(DecoderRegistry::standard(), config).unwrap();
    let result = processor.process(formats::open_log(&log).unwrap());
    assert!(result.is_err());
}

#[test]
fn decodes_mf4_log_into_tables() {
    let dir = tempfile::tempdir().unwrap();

    let mut logger = mdf4_rs::can::RawCanLogger::new().unwrap();
    logger.log(0x0100_0001, 10_000, &[0x01, 0x35, 0, 0, 0, 0, 0, 0]);
    logger.log(0x0100_0002, 20_000, &[0xCD, 0xCC, 0x4C, 0x3D]);
    logger.log(0x7E8, 30_000, &[0x01, 0x02]);
    let log = dir.path().join("00000001.MF4");
    fs::write(&log, logger.finalize().unwrap()).unwrap();

    let summary = run(&log, dir.path(), true);
    assert_eq!(summary.frames, 3);
    assert_eq!(summary.rows_written, 2);
    assert_eq!(summary.summary_line(), "No matching decoder for CAN IDs: [0x7e8]");

    let flags = table_lines(dir.path(), "can_0x01000001");
    assert_eq!(flags.len(), 2);
    assert!(flags[1].ends_with(",1,0,0,212,0,0,0,0"));

    let iq_ref = table_lines(dir.path(), "can_0x01000002");
    assert_eq!(iq_ref.len(), 2);
    assert!(iq_ref[1].ends_with(",0.05"));
}
