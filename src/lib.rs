//! BlackICE scanning core
//!
//! Walks a target path, hashes every file, checks digests against a local
//! signature database and the VirusTotal reputation service, and reports a
//! severity verdict per file over an ordered event stream.

pub mod cache;
pub mod classifier;
pub mod cli;
pub mod config;
pub mod hasher;
pub mod progress;
pub mod reputation;
pub mod scan_events;
pub mod scanner;
pub mod signatures;

pub use classifier::{ThreatLevel, Verdict};
pub use config::Config;
pub use scan_events::ScanEvent;
pub use scanner::{ScanHandle, Scanner};
