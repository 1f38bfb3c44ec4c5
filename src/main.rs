use anyhow::{Context, Result};
use clap::Parser;
use crossbeam_channel::{bounded, Receiver, Sender};
use dashmap::DashMap;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, error, info, warn, LevelFilter};
use rayon::prelude::*;
use simple_logger::SimpleLogger;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use time::macros::format_description;

use eue_spells::config::{PanelTask, RunConfig};
use eue_spells::io::{self, CsvPanelSink, PanelSink};
use eue_spells::pipeline::{process_panel, PanelOutput};
use eue_spells::summary::{PanelSummary, RunReport};

#[derive(Parser, Clone)]
#[command(name = "EUE Spell Builder")]
#[command(
    about = "Builds employment/non-employment spells and occupation flows from monthly survey panels \
             defined in a run configuration."
)]
#[command(version = "0.1.0")]
struct Cli {
    #[arg(long, help = "Path to the run configuration YAML file", required = true)]
    run_config: PathBuf,
    #[arg(short, long, help = "Output directory for panel CSV files", required = true)]
    output: String,
    #[arg(short, long, default_value = "INFO", help = "Logging level (DEBUG, INFO, WARN, ERROR)")]
    log_level: String,
    #[arg(short, long, default_value = "0", help = "Number of threads to use (0 for auto)")]
    threads: usize,
    #[arg(long, help = "Write gzip-compressed panel files (panelYYYY.csv.gz)")]
    compress: bool,
    #[arg(long, help = "Do not write summary.json to the output directory")]
    no_summary_file: bool,
}

fn format_elapsed(elapsed: Duration) -> String {
    let total_secs = elapsed.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    let millis = elapsed.subsec_millis();
    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}.{:03}s", seconds, millis)
    }
}

fn run_panel(
    task: &PanelTask,
    files: &[PathBuf],
    run_config: &RunConfig,
    skipped_rows: &AtomicUsize,
) -> Result<PanelOutput> {
    let waves =
        io::read_waves(files).with_context(|| format!("Failed to read waves of panel {}", task.panel_year))?;
    skipped_rows.fetch_add(waves.skipped_rows, Ordering::Relaxed);
    info!("Panel {}: {} rows read from {} wave files", task.panel_year, waves.records.len(), files.len());
    let output = process_panel(task.panel_year, waves.records, &run_config.pipeline())?;
    Ok(output)
}

fn main() -> Result<()> {
    let start_time = Instant::now();
    let cli = Cli::parse();

    let log_level = match cli.log_level.to_uppercase().as_str() {
        "DEBUG" => LevelFilter::Debug,
        "INFO" => LevelFilter::Info,
        "WARN" | "WARNING" => LevelFilter::Warn,
        "ERROR" => LevelFilter::Error,
        _ => {
            eprintln!("Invalid log level '{}', defaulting to INFO.", cli.log_level);
            LevelFilter::Info
        }
    };
    SimpleLogger::new()
        .with_level(log_level)
        .with_timestamp_format(format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"))
        .init()?;

    info!("Starting EUE Spell Builder");

    let output_dir = PathBuf::from(&cli.output);
    fs::create_dir_all(&output_dir)
        .with_context(|| format!("Failed to create output directory: {}", output_dir.display()))?;
    info!("Output directory: {}", output_dir.display());

    info!("Loading run configuration from: {}", cli.run_config.display());
    let run_config = RunConfig::load(&cli.run_config)?;
    info!("Run config loaded: {} panels.", run_config.panels.len());
    if let Some(description) = &run_config.description {
        info!("  {}", description);
    }

    info!("Resolving wave files...");
    let mut panels_to_process: Vec<(&PanelTask, Vec<PathBuf>)> = Vec::new();
    for task in &run_config.panels {
        info!("Panel {} ({})", task.panel_year, task.description.as_deref().unwrap_or("No description"));
        let files = io::find_wave_files(&task.waves)
            .with_context(|| format!("Error finding wave files for panel {}", task.panel_year))?;
        if files.is_empty() {
            warn!("  No wave files found for panel {}; skipping.", task.panel_year);
            continue;
        }
        info!("  Found {} wave files.", files.len());
        panels_to_process.push((task, files));
    }

    if panels_to_process.is_empty() {
        warn!("No wave files found for any panel. Exiting.");
        return Ok(());
    }

    let num_threads = if cli.threads == 0 {
        let cores = num_cpus::get();
        info!("Auto-detected {} CPU cores. Using {} threads.", cores, cores);
        cores
    } else {
        info!("Using specified {} threads.", cli.threads);
        cli.threads
    };
    if let Err(e) = rayon::ThreadPoolBuilder::new().num_threads(num_threads).build_global() {
        error!("Failed to build global thread pool: {}. Proceeding with default.", e);
    }

    let progress_bar = ProgressBar::new(panels_to_process.len() as u64);
    progress_bar.set_style(ProgressStyle::default_bar()
        .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
        .context("Failed to create progress bar template")?
        .progress_chars("=> "));
    progress_bar.set_message("Starting processing...");

    // Panels hold every row in memory; keep few of them in flight.
    let channel_capacity = num_threads.clamp(1, 4);
    let (panel_sender, panel_receiver): (Sender<PanelOutput>, Receiver<PanelOutput>) = bounded(channel_capacity);
    debug!("Using writer channel with capacity: {}", channel_capacity);

    let sink_dir = output_dir.clone();
    let compress = cli.compress;
    let writer_thread = thread::spawn(move || -> Result<(Box<dyn PanelSink>, Vec<i32>)> {
        info!("Writer thread started.");
        let mut sink: Box<dyn PanelSink> = Box::new(CsvPanelSink::new(sink_dir, compress)?);
        let write_failures = io::drain_panels(sink.as_mut(), panel_receiver);
        info!("Writer thread finished receiving. Wrote {} files.", sink.report_files_created());
        Ok((sink, write_failures))
    });

    info!("Starting parallel panel processing...");
    let summaries: DashMap<i32, PanelSummary> = DashMap::new();
    let skipped_rows = AtomicUsize::new(0);

    let processing_results: Vec<Result<(), (i32, anyhow::Error)>> = panels_to_process.par_iter()
        .map(|(task, files)| {
            let sender_clone = panel_sender.clone();
            let pb_clone = progress_bar.clone();
            let panel_start_time = Instant::now();

            match run_panel(task, files, &run_config, &skipped_rows) {
                Ok(output) => {
                    output.summary.log();
                    summaries.insert(task.panel_year, output.summary.clone());
                    pb_clone.set_message(format!(
                        "OK: panel {} ({} rows, {})",
                        task.panel_year,
                        output.rows.len(),
                        format_elapsed(panel_start_time.elapsed())
                    ));
                    if let Err(e) = sender_clone.send(output) {
                        error!(
                            "Failed to send panel {} to writer thread: {}. Writer likely panicked.",
                            task.panel_year, e
                        );
                        pb_clone.inc(1);
                        return Err((task.panel_year, anyhow::anyhow!("Writer channel closed unexpectedly")));
                    }
                    pb_clone.inc(1);
                    Ok(())
                },
                Err(e) => {
                    error!("Error processing panel {}: {:#}", task.panel_year, e);
                    pb_clone.set_message(format!("ERR: panel {}", task.panel_year));
                    pb_clone.inc(1);
                    Err((task.panel_year, e))
                }
            }
        }).collect();

    info!("Panel processing complete. Aggregating results...");
    progress_bar.set_message("Aggregating results...");
    drop(panel_sender);

    let mut failed_panels = Vec::new();
    for result in processing_results {
        if let Err((panel_year, _e)) = result {
            failed_panels.push(panel_year);
        }
    }

    info!("Waiting for writer thread to finish...");
    let rows_written = match writer_thread.join() {
        Ok(Ok((sink, write_failures))) => {
            info!("Writer thread finished successfully.");
            failed_panels.extend(write_failures);
            Some(sink.report_rows_written())
        },
        Ok(Err(e)) => {
            error!("Writer thread returned an error: {:#}", e);
            None
        },
        Err(e) => {
            error!("Writer thread panicked: {:?}", e);
            None
        }
    };
    if rows_written.is_none() {
        // Nothing processed can be confirmed as written.
        failed_panels.extend(summaries.iter().map(|entry| *entry.key()));
    }
    failed_panels.sort_unstable();
    failed_panels.dedup();
    summaries.retain(|panel_year, _| !failed_panels.contains(panel_year));

    let successful_panels = panels_to_process.len().saturating_sub(failed_panels.len());
    progress_bar.finish_with_message(format!(
        "Processing finished. {} panels OK, {} errors.",
        successful_panels,
        failed_panels.len()
    ));

    info!("-------------------- FINAL SUMMARY --------------------");
    info!("Total execution time: {}", format_elapsed(start_time.elapsed()));
    info!("Panels with wave files: {}", panels_to_process.len());
    info!("Panels processed successfully: {}", successful_panels);
    let skipped = skipped_rows.load(Ordering::Relaxed);
    if skipped > 0 {
        warn!("Malformed wave rows skipped: {}", skipped);
    }
    if !failed_panels.is_empty() {
        warn!("Panels with processing or write errors: {:?}", failed_panels);
    }

    if let Some(counts) = rows_written {
        info!("Rows written per panel:");
        let mut sorted_counts: Vec<_> = counts.into_iter().collect();
        sorted_counts.sort_unstable();
        for (panel_year, count) in sorted_counts {
            info!("  - {}: {}", io::panel_file_name(panel_year, cli.compress), count);
        }
    } else {
        error!("Could not retrieve final row counts from writer thread.");
    }

    if !cli.no_summary_file {
        let panels: Vec<PanelSummary> = summaries.into_iter().map(|(_, summary)| summary).collect();
        let report = RunReport::new(run_config.description.clone(), panels, failed_panels.clone());
        match io::write_summary(&output_dir, &report) {
            Ok(path) => info!("Run summary written to {}", path.display()),
            Err(e) => error!("Failed to write run summary: {:#}", e),
        }
    }
    info!("Spell building finished.");
    info!("-------------------------------------------------------");

    if !failed_panels.is_empty() {
        std::process::exit(1);
    }

    Ok(())
}
