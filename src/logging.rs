//! Custom logging setup for intron-cutter

use crate::resolver::ResolutionSummary;
use crate::types::IntronCutError;
use colored::*;
use log::{Level, LevelFilter, Metadata, Record};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

/// Logger writing coloured records to the console and plain records to an optional file
pub struct IntronCutLogger {
    console_level: LevelFilter,
    file_writer: Option<Mutex<Box<dyn Write + Send>>>,
}

impl IntronCutLogger {
    pub fn new(verbose: bool, log_file: Option<&Path>) -> Result<Self, std::io::Error> {
        let console_level = if verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info // warnings stay in the log file unless verbose
        };

        let file_writer = if let Some(log_path) = log_file {
            let file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(log_path)?;
            Some(Mutex::new(Box::new(file) as Box<dyn Write + Send>))
        } else {
            None
        };

        Ok(IntronCutLogger {
            console_level,
            file_writer,
        })
    }

    fn console_enabled(&self, level: Level) -> bool {
        match level {
            Level::Error => true,
            Level::Warn => self.console_level >= LevelFilter::Debug,
            other => other <= self.console_level,
        }
    }
}

impl log::Log for IntronCutLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.file_writer.is_some() || metadata.level() <= self.console_level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let timestamp = chrono::Local::now().format("%H:%M:%S");
        let level = record.level();
        let target = record.target();
        let message = record.args();

        if self.console_enabled(level) {
            let colored_level = match level {
                Level::Error => "ERROR".red().bold(),
                Level::Warn => "WARN".yellow().bold(),
                Level::Info => "INFO".green().bold(),
                Level::Debug => "DEBUG".blue().bold(),
                Level::Trace => "TRACE".purple().bold(),
            };

            let colored_message = format!(
                "[{} {} {}] {}",
                timestamp.to_string().dimmed(),
                colored_level,
                target.cyan(),
                message
            );

            // stdout carries table output for some commands
            eprintln!("{}", colored_message);
        }

        if let Some(ref file_writer) = self.file_writer {
            if let Ok(mut writer) = file_writer.lock() {
                let _ = writeln!(writer, "[{} {} {}] {}", timestamp, level, target, message);
                let _ = writer.flush();
            }
        }
    }

    fn flush(&self) {
        if let Some(ref file_writer) = self.file_writer {
            if let Ok(mut writer) = file_writer.lock() {
                let _ = writer.flush();
            }
        }
    }
}

/// Initialize the custom logger
pub fn init_logger(verbose: bool, log_file: Option<&Path>) -> Result<(), anyhow::Error> {
    let logger = IntronCutLogger::new(verbose, log_file)
        .map_err(|e| anyhow::anyhow!("Failed to create logger: {}", e))?;

    log::set_boxed_logger(Box::new(logger))
        .map_err(|e| anyhow::anyhow!("Failed to set logger: {}", e))?;
    log::set_max_level(LevelFilter::Debug);

    Ok(())
}

/// Log a candidate that fell outside its scaffold
pub fn log_out_of_range(error: &IntronCutError) {
    log::warn!(target: "intron_cutter::extract", "SKIPPED: {}", error);
}

/// Log a table or list row that could not be parsed
pub fn log_malformed_row(source: &str, line: usize, reason: &str) {
    log::warn!(
        target: "intron_cutter::input",
        "MALFORMED: Source={}, Line={}, Reason={}",
        source, line, reason
    );
}

/// Log a stage that produced nothing for a scaffold
pub fn log_empty_stage(scaffold_id: &str, stage: &str) {
    log::warn!(
        target: "intron_cutter::input",
        "EMPTY: Scaffold={}, Stage={}",
        scaffold_id, stage
    );
}

/// Log a scaffold whose processing was abandoned
pub fn log_scaffold_failure(scaffold_id: &str, error: &IntronCutError) {
    log::error!(
        target: "intron_cutter::pipeline",
        "FAILED: Scaffold={}, Error={}",
        scaffold_id, error
    );
}

/// Log per-scaffold overlap resolution statistics
pub fn log_overlap_resolution(scaffold_id: &str, summary: &ResolutionSummary) {
    log::debug!(
        target: "intron_cutter::stats",
        "RESOLVED: Scaffold={}, Candidates={}, Duplicates={}, Unsupported={}, Overlapping={}, Selected={}, Score={:.6}",
        scaffold_id,
        summary.candidates,
        summary.duplicates,
        summary.unsupported,
        summary.overlapping,
        summary.selected,
        summary.total_score
    );
}
