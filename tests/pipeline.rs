use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use flate2::write::GzEncoder;
use flate2::Compression;
use tempfile::TempDir;

use eue_spells::config::PipelineConfig;
use eue_spells::io::{self, CsvPanelSink, PanelSink, OUTPUT_HEADER};
use eue_spells::pipeline::{process_panel, PanelOutput};
use eue_spells::summary::RunReport;

const HEADER: &str = "lgtkey,swave,rhcalyr,rhcalmn,eppintvw,tbyear,eafever,\
                      rmesr,rwkesr2,eeno1,tjbocc1,ajbocc1,wpfinwgt";

fn wave_one() -> String {
    [
        HEADER,
        "101,1,2004,1,1,1970,2,1,1,55,430,0,1000",
        "101,1,2004,2,1,1970,2,8,5,-1,-1,,1000",
        "202,1,2004,1,1,1965,2,1,1,77,120,0,3000",
        "202,1,2004,2,1,1965,2,1,1,77,120,0,3000",
        "303,1,2004,x,1,1980,2,1,1,12,300,0,500",
    ]
    .join("\n")
}

fn wave_two() -> String {
    [
        HEADER,
        "101,2,2004,3,1,1970,2,6,4,-1,-1,,1000",
        "101,2,2004,4,1,1970,2,1,1,55,910,0,1000",
        "202,2,2004,3,1,1965,2,1,1,77,120,0,3000",
        "202,2,2004,4,1,1965,2,1,1,77,120,0,3000",
    ]
    .join("\n")
}

fn write_plain(path: &Path, contents: &str) {
    fs::write(path, contents).unwrap();
}

fn write_gzip(path: &Path, contents: &str) {
    let mut encoder = GzEncoder::new(File::create(path).unwrap(), Compression::default());
    encoder.write_all(contents.as_bytes()).unwrap();
    encoder.finish().unwrap();
}

fn read_output(path: &Path) -> Vec<HashMap<String, String>> {
    let mut reader = csv::Reader::from_path(path).unwrap();
    let headers = reader.headers().unwrap().clone();
    reader
        .records()
        .map(|record| {
            let record = record.unwrap();
            headers.iter().map(String::from).zip(record.iter().map(String::from)).collect()
        })
        .collect()
}

#[test]
fn waves_to_augmented_table() {
    let input = TempDir::new().unwrap();
    let output_dir = TempDir::new().unwrap();
    write_plain(&input.path().join("sipp04w1.csv"), &wave_one());
    write_gzip(&input.path().join("sipp04w2.csv.gz"), &wave_two());

    let pattern = input.path().join("sipp04w*.csv*").to_string_lossy().into_owned();
    let files = io::find_wave_files(&[pattern]).unwrap();
    assert_eq!(files.len(), 2);
    assert!(files[0].ends_with("sipp04w1.csv"));

    let waves = io::read_waves(&files).unwrap();
    assert_eq!(waves.records.len(), 8);
    assert_eq!(waves.skipped_rows, 1);

    let output = process_panel(2004, waves.records, &PipelineConfig::default()).unwrap();
    assert_eq!(output.summary.ubar.spells, 1);
    assert_eq!(output.summary.ustar.spells, 1);
    assert_eq!(output.summary.u.spells, 0);
    assert_eq!(output.summary.ubar.spells_with_occupations, 1);

    let mut sink = CsvPanelSink::new(output_dir.path().to_path_buf(), false).unwrap();
    let path = sink.write_panel(&output).unwrap();
    assert_eq!(sink.report_files_created(), 1);
    assert_eq!(sink.report_rows_written().get(&2004), Some(&8));

    let rows = read_output(&path);
    assert_eq!(rows.len(), 8);
    assert_eq!(rows[0].len(), OUTPUT_HEADER.len());

    let person: Vec<_> = rows.iter().filter(|r| r["lgtkey"] == "101").collect();
    assert_eq!(person.len(), 4);
    assert_eq!(person[0]["individual_key"], "2004101");
    assert_eq!(person[0]["main_job_rule"], "single_job");
    assert_eq!(person[0]["occupation"], "430");
    assert_eq!(person[1]["ubar_id"], person[2]["ubar_id"]);
    assert_eq!(person[1]["ubar_length"], "2");
    assert_eq!(person[1]["ustar_id"], person[1]["ubar_id"]);
    assert_eq!(person[1]["u_id"], "");
    assert_eq!(person[2]["unemployed"], "1");
    for row in &person[1..3] {
        assert_eq!(row["source_occupation"], "430");
        assert_eq!(row["destination_occupation"], "910");
    }
    assert_eq!(person[3]["ubar_id"], "");

    let weight_total: f64 = rows.iter().map(|r| r["normalized_weight"].parse::<f64>().unwrap()).sum();
    assert!((weight_total - 1.0).abs() < 1e-9);
}

#[test]
fn compressed_output_and_summary_file() {
    let input = TempDir::new().unwrap();
    let output_dir = TempDir::new().unwrap();
    let wave = input.path().join("sipp04w1.csv");
    write_plain(&wave, &wave_one());

    let waves = io::read_waves(&[wave]).unwrap();
    let output = process_panel(2004, waves.records, &PipelineConfig::default()).unwrap();
    let mut sink = CsvPanelSink::new(output_dir.path().to_path_buf(), true).unwrap();
    let path = sink.write_panel(&output).unwrap();
    assert!(path.ends_with("panel2004.csv.gz"));

    let reader = flate2::read::GzDecoder::new(File::open(&path).unwrap());
    let mut csv_reader = csv::Reader::from_reader(reader);
    assert_eq!(csv_reader.records().count(), 4);

    let report = RunReport::new(Some("test run".to_string()), vec![output.summary.clone()], vec![]);
    let summary_path = io::write_summary(output_dir.path(), &report).unwrap();
    let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(summary_path).unwrap()).unwrap();
    assert_eq!(json["panels"][0]["panel_year"], 2004);
    assert_eq!(json["panels"][0]["rows"], 4);
    assert_eq!(json["panels"][0]["filter"]["input_rows"], 4);
}

#[test]
fn unwritable_panel_is_reported_and_later_panels_still_written() {
    let input = TempDir::new().unwrap();
    let output_dir = TempDir::new().unwrap();
    let wave = input.path().join("sipp04w1.csv");
    write_plain(&wave, &wave_one());

    let waves = io::read_waves(&[wave]).unwrap();
    let blocked = process_panel(2004, waves.records, &PipelineConfig::default()).unwrap();
    let mut writable: PanelOutput = blocked.clone();
    writable.panel_year = 2005;
    // A directory where the panel file should go makes its creation fail.
    fs::create_dir(output_dir.path().join("panel2004.csv")).unwrap();

    let mut sink = CsvPanelSink::new(output_dir.path().to_path_buf(), false).unwrap();
    let failures = io::drain_panels(&mut sink, vec![blocked, writable]);
    assert_eq!(failures, vec![2004]);
    assert_eq!(sink.report_files_created(), 1);
    assert_eq!(sink.report_rows_written().get(&2005), Some(&4));
    assert!(!sink.report_rows_written().contains_key(&2004));
    assert!(output_dir.path().join("panel2005.csv").is_file());
}
