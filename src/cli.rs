//! Command-line interface
//!
//! Runs one scan and renders the event stream: log lines, a progress bar and
//! per-file verdicts, colored by severity.

use crate::classifier::ThreatLevel;
use crate::config::Config;
use crate::progress;
use crate::scan_events::ScanEvent;
use crate::scanner::Scanner;
use anyhow::{bail, Result};
use clap::Parser;
use colored::*;
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "blackice",
    version,
    about = "Hash-based file threat scanner with VirusTotal reputation lookups"
)]
pub struct Cli {
    /// File or directory to scan
    pub target: PathBuf,

    /// Settings file (JSON); BLACKICE_* environment variables override it
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// VirusTotal API key (overrides settings and environment)
    #[arg(long)]
    pub api_key: Option<String>,

    /// SQLite signature database path
    #[arg(long)]
    pub db_path: Option<PathBuf>,

    /// Reputation cache directory
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,

    /// Reputation cache TTL in seconds
    #[arg(long)]
    pub cache_ttl: Option<u64>,

    /// Print every log event and clean verdicts too
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        if !self.target.exists() {
            bail!("Target does not exist: {}", self.target.display());
        }

        let mut config = Config::load(self.config.as_deref());
        if let Some(key) = self.api_key {
            config.vt_api_key = key;
        }
        if let Some(db_path) = self.db_path {
            config.db_path = db_path;
        }
        if let Some(cache_dir) = self.cache_dir {
            config.cache_dir = cache_dir;
        }
        if let Some(ttl) = self.cache_ttl {
            config.cache_ttl_secs = Some(ttl);
        }

        let scanner = Scanner::from_config(&config)?;
        let handle = scanner.start(&self.target);

        let bar = progress::create_progress_bar(100, "Scanning...");
        let mut counts: BTreeMap<ThreatLevel, usize> = BTreeMap::new();

        for event in handle.events().iter() {
            match event {
                ScanEvent::Log(msg) => {
                    if self.verbose {
                        bar.println(msg.dimmed().to_string());
                    }
                }
                ScanEvent::Progress(percent) => {
                    bar.set_position(percent as u64);
                }
                ScanEvent::FileClassified { path, verdict } => {
                    *counts.entry(verdict.level).or_default() += 1;
                    if verdict.level != ThreatLevel::Clean || self.verbose {
                        bar.println(format!(
                            "{:>8}  {}  ({})",
                            level_label(verdict.level),
                            path.display(),
                            verdict.detail
                        ));
                    }
                }
                ScanEvent::Finished => break,
            }
        }
        handle.join();
        progress::finish_and_clear(&bar);

        print_summary(&counts);
        Ok(())
    }
}

fn level_label(level: ThreatLevel) -> ColoredString {
    let label = level.to_string();
    match level {
        ThreatLevel::High => label.red().bold(),
        ThreatLevel::Medium => label.yellow(),
        ThreatLevel::Low => label.yellow(),
        ThreatLevel::Unknown => label.cyan(),
        ThreatLevel::Clean => label.green(),
    }
}

fn print_summary(counts: &BTreeMap<ThreatLevel, usize>) {
    let total: usize = counts.values().sum();
    let flagged = total - counts.get(&ThreatLevel::Clean).copied().unwrap_or(0);

    println!("{} {} files scanned", "Done:".green().bold(), total);
    for (level, count) in counts.iter().rev() {
        if *count > 0 {
            println!("  {:>8}: {}", level_label(*level), count);
        }
    }
    if flagged == 0 && total > 0 {
        println!("{}", "No threats found".green());
    }
}
