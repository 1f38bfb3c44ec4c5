//! Wave file discovery and reading, augmented table and summary writing.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use glob::glob;
use log::{debug, error, info, warn};

use crate::pipeline::PanelOutput;
use crate::record::{PersonMonth, RawRecord};
use crate::summary::RunReport;

/// Malformed rows beyond this many per file are only logged at debug level.
const MAX_ROW_WARNINGS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum NameChunk {
    Text(String),
    Number(u64),
}

/// Splits a file name into text and number chunks so that `w2` sorts
/// before `w10`.
fn natural_key(path: &Path) -> Vec<NameChunk> {
    let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut in_digits = false;
    for c in name.chars() {
        if c.is_ascii_digit() != in_digits && !current.is_empty() {
            chunks.push(to_chunk(std::mem::take(&mut current), in_digits));
        }
        in_digits = c.is_ascii_digit();
        current.push(c);
    }
    if !current.is_empty() {
        chunks.push(to_chunk(current, in_digits));
    }
    chunks
}

fn to_chunk(text: String, digits: bool) -> NameChunk {
    if digits {
        if let Ok(number) = text.parse() {
            return NameChunk::Number(number);
        }
    }
    NameChunk::Text(text)
}

/// Expands wave patterns in listed order; matches of one pattern are
/// ordered by the numbers embedded in their file names.
pub fn find_wave_files(patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for pattern in patterns {
        debug!("Searching for wave files matching pattern: {}", pattern);
        let mut matches: Vec<PathBuf> = glob(pattern)
            .with_context(|| format!("Invalid wave file pattern: {}", pattern))?
            .filter_map(|entry| entry.ok())
            .filter(|path| path.is_file())
            .collect();
        if matches.is_empty() {
            warn!("No files found matching the pattern: {}", pattern);
        }
        matches.sort_by_cached_key(|path| natural_key(path));
        files.extend(matches);
    }
    Ok(files)
}

fn is_gzip(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("gz"))
}

fn open_input(path: &Path) -> Result<Box<dyn Read>> {
    let file = File::open(path).with_context(|| format!("Failed to open wave file: {}", path.display()))?;
    if is_gzip(path) {
        Ok(Box::new(GzDecoder::new(BufReader::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Records of one wave file and the number of rows that could not be read.
#[derive(Debug, Default)]
pub struct WaveRead {
    pub records: Vec<RawRecord>,
    pub skipped_rows: usize,
}

pub fn read_wave(path: &Path) -> Result<WaveRead> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(open_input(path)?);
    reader
        .headers()
        .with_context(|| format!("Failed to read header of wave file: {}", path.display()))?;

    let mut wave = WaveRead::default();
    for (index, result) in reader.deserialize::<RawRecord>().enumerate() {
        match result {
            Ok(record) => wave.records.push(record),
            Err(e) => {
                wave.skipped_rows += 1;
                if wave.skipped_rows <= MAX_ROW_WARNINGS {
                    warn!("Skipping row {} of {}: {}", index + 1, path.display(), e);
                } else {
                    debug!("Skipping row {} of {}: {}", index + 1, path.display(), e);
                }
            }
        }
    }
    if wave.skipped_rows > 0 {
        warn!("{}: {} malformed rows skipped", path.display(), wave.skipped_rows);
    }
    debug!("Read {} rows from {}", wave.records.len(), path.display());
    Ok(wave)
}

/// Concatenates the waves of one panel-year in the given order.
pub fn read_waves(paths: &[PathBuf]) -> Result<WaveRead> {
    let mut panel = WaveRead::default();
    for path in paths {
        let wave = read_wave(path)?;
        panel.records.extend(wave.records);
        panel.skipped_rows += wave.skipped_rows;
    }
    Ok(panel)
}

pub const OUTPUT_HEADER: [&str; 42] = [
    "individual_key",
    "panel_year",
    "lgtkey",
    "swave",
    "rhcalyr",
    "rhcalmn",
    "calendar_month",
    "occurrence",
    "age",
    "male",
    "education",
    "race",
    "marital_status",
    "monthly_employed",
    "monthly_unemployed",
    "monthly_olf",
    "employed",
    "unemployed",
    "olf",
    "ilf",
    "retired",
    "government",
    "discontinuity",
    "spell_number",
    "spell_length",
    "start_of_ubar",
    "end_of_ubar",
    "ubar_id",
    "ubar_length",
    "ustar_id",
    "ustar_length",
    "u_id",
    "u_length",
    "main_job",
    "main_job_rule",
    "firm_id",
    "occupation",
    "source_occupation",
    "destination_occupation",
    "weight",
    "normalized_weight",
    "tpearn",
];

fn cell<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn flag(value: bool) -> String {
    u8::from(value).to_string()
}

pub fn output_record(row: &PersonMonth) -> Vec<String> {
    let status = &row.status;
    let spells = &row.spells;
    let flow = &row.occupation;
    vec![
        row.individual_key.to_string(),
        row.panel_year.to_string(),
        row.raw.subject_key.to_string(),
        cell(row.raw.wave),
        row.raw.year.to_string(),
        row.raw.month.to_string(),
        row.calendar_month.format("%Y-%m-%d").to_string(),
        row.occurrence.to_string(),
        cell(row.demographics.age),
        cell(row.demographics.male.map(u8::from)),
        cell(row.demographics.education),
        cell(row.demographics.race),
        cell(row.demographics.marital_status),
        flag(status.monthly_employed),
        flag(status.monthly_unemployed),
        flag(status.monthly_out_of_labor_force),
        flag(status.employed),
        flag(status.unemployed),
        flag(status.out_of_labor_force),
        flag(status.in_labor_force),
        flag(status.retired),
        flag(status.government),
        flag(row.continuity.discontinuity),
        row.continuity.spell_number.to_string(),
        row.continuity.spell_length.to_string(),
        flag(spells.start_of_ubar),
        flag(spells.end_of_ubar),
        cell(spells.ubar.map(|s| s.id)),
        cell(spells.ubar.map(|s| s.length)),
        cell(spells.ustar.map(|s| s.id)),
        cell(spells.ustar.map(|s| s.length)),
        cell(spells.u.map(|s| s.id)),
        cell(spells.u.map(|s| s.length)),
        cell(flow.main_job.map(|m| m.slot.number())),
        cell(flow.main_job.map(|m| m.rule.as_str())),
        cell(flow.main_job.map(|m| m.firm_id)),
        cell(flow.occupation),
        cell(flow.source_occupation),
        cell(flow.destination_occupation),
        cell(row.raw.weight),
        cell(row.normalized_weight),
        cell(row.raw.total_earnings),
    ]
}

pub fn panel_file_name(panel_year: i32, compress: bool) -> String {
    if compress {
        format!("panel{}.csv.gz", panel_year)
    } else {
        format!("panel{}.csv", panel_year)
    }
}

fn write_rows<W: Write>(inner: W, rows: &[PersonMonth]) -> Result<W> {
    let mut writer = csv::Writer::from_writer(inner);
    writer.write_record(OUTPUT_HEADER)?;
    for row in rows {
        writer.write_record(output_record(row))?;
    }
    writer.into_inner().map_err(|e| anyhow::Error::from(e.into_error()))
}

/// Destination for finished panels. Lives on the writer thread.
pub trait PanelSink: Send {
    fn write_panel(&mut self, output: &PanelOutput) -> Result<PathBuf>;
    fn report_files_created(&self) -> usize;
    fn report_rows_written(&self) -> HashMap<i32, usize>;
}

/// Writes every received panel and returns the panel years whose write
/// failed. A failed panel does not stop the ones behind it.
pub fn drain_panels<I>(sink: &mut dyn PanelSink, panels: I) -> Vec<i32>
where
    I: IntoIterator<Item = PanelOutput>,
{
    let mut failures = Vec::new();
    for output in panels {
        if let Err(e) = sink.write_panel(&output) {
            error!("Failed to write panel {}: {:#}", output.panel_year, e);
            failures.push(output.panel_year);
        }
    }
    failures
}

/// One CSV (optionally gzip-compressed) file per panel-year.
pub struct CsvPanelSink {
    output_dir: PathBuf,
    compress: bool,
    files_created: usize,
    rows_written: HashMap<i32, usize>,
}

impl CsvPanelSink {
    pub fn new(output_dir: PathBuf, compress: bool) -> Result<Self> {
        fs::create_dir_all(&output_dir)
            .with_context(|| format!("Failed to create output directory: {}", output_dir.display()))?;
        Ok(Self {
            output_dir,
            compress,
            files_created: 0,
            rows_written: HashMap::new(),
        })
    }
}

impl PanelSink for CsvPanelSink {
    fn write_panel(&mut self, output: &PanelOutput) -> Result<PathBuf> {
        let path = self.output_dir.join(panel_file_name(output.panel_year, self.compress));
        let file = File::create(&path).with_context(|| format!("Failed to create output file: {}", path.display()))?;
        let buffered = BufWriter::new(file);
        if self.compress {
            let encoder = write_rows(GzEncoder::new(buffered, Compression::default()), &output.rows)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            encoder
                .finish()
                .and_then(|mut inner| inner.flush())
                .with_context(|| format!("Failed to finish compressed file {}", path.display()))?;
        } else {
            write_rows(buffered, &output.rows)
                .and_then(|mut inner| inner.flush().map_err(anyhow::Error::from))
                .with_context(|| format!("Failed to write {}", path.display()))?;
        }
        self.files_created += 1;
        self.rows_written.insert(output.panel_year, output.rows.len());
        info!("Wrote {} rows to {}", output.rows.len(), path.display());
        Ok(path)
    }

    fn report_files_created(&self) -> usize {
        self.files_created
    }

    fn report_rows_written(&self) -> HashMap<i32, usize> {
        self.rows_written.clone()
    }
}

pub fn write_summary(output_dir: &Path, report: &RunReport) -> Result<PathBuf> {
    let path = output_dir.join("summary.json");
    let file = File::create(&path).with_context(|| format!("Failed to create summary file: {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, report)
        .with_context(|| format!("Failed to serialize run summary to {}", path.display()))?;
    writer.flush()?;
    Ok(path)
}
