//! Scan orchestrator
//!
//! Runs one scan on a dedicated worker thread and reports back through an
//! ordered event channel. The caller's only controls are the event receiver
//! and the cooperative stop flag; worker state is never shared.

use crate::classifier::{classify, NoopRuleEngine, RuleEngine, Verdict};
use crate::config::Config;
use crate::hasher::{digest_file, DEFAULT_ALGORITHMS};
use crate::reputation::{ReputationClient, ReputationProvider};
use crate::scan_events::ScanEvent;
use crate::signatures::SignatureStore;
use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use walkdir::WalkDir;

/// Enumerate the files a scan will cover.
///
/// A directory expands to every regular file beneath it, sorted by path so
/// the order is stable for a given filesystem snapshot; a single file is a
/// one-entry list. Unreadable directory entries are skipped.
pub fn list_files(target: &Path) -> Vec<PathBuf> {
    if !target.is_dir() {
        return vec![target.to_path_buf()];
    }

    let mut files: Vec<PathBuf> = WalkDir::new(target)
        .follow_links(false)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .collect();
    files.sort();
    files
}

/// Handle to a running scan: the event stream plus cooperative cancellation
pub struct ScanHandle {
    events: Receiver<ScanEvent>,
    cancel: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl ScanHandle {
    /// Receiver for the ordered event stream
    pub fn events(&self) -> &Receiver<ScanEvent> {
        &self.events
    }

    /// Request cancellation. The flag is checked at file boundaries; the
    /// file currently in flight completes and `Finished` still fires.
    pub fn stop(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    /// Wait for the worker thread to exit
    pub fn join(mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

/// Scan orchestrator holding the per-scan collaborators.
///
/// The signature store is shared read-only across scans; the reputation
/// provider serializes its own cache access, so one `Scanner` can safely
/// drive several scans at once.
pub struct Scanner {
    signatures: Arc<SignatureStore>,
    rules: Arc<dyn RuleEngine>,
    reputation: Arc<dyn ReputationProvider>,
}

impl Scanner {
    pub fn new(
        signatures: Arc<SignatureStore>,
        rules: Arc<dyn RuleEngine>,
        reputation: Arc<dyn ReputationProvider>,
    ) -> Self {
        Self {
            signatures,
            rules,
            reputation,
        }
    }

    /// Wire up a scanner from configuration.
    ///
    /// Fails when the VirusTotal API key is absent; a scan that needs the
    /// remote client must not start without one.
    pub fn from_config(config: &Config) -> Result<Self> {
        let signatures = Arc::new(SignatureStore::open(&config.db_path));
        let client = ReputationClient::new(
            Some(&config.vt_api_key),
            &config.cache_dir,
            config.cache_ttl(),
        )?;
        Ok(Self::new(signatures, Arc::new(NoopRuleEngine), Arc::new(client)))
    }

    /// Start scanning `target` on a dedicated worker thread
    pub fn start(&self, target: &Path) -> ScanHandle {
        let (tx, rx) = mpsc::channel();
        let cancel = Arc::new(AtomicBool::new(false));

        let worker = ScanWorker {
            target: target.to_path_buf(),
            signatures: Arc::clone(&self.signatures),
            rules: Arc::clone(&self.rules),
            reputation: Arc::clone(&self.reputation),
            cancel: Arc::clone(&cancel),
            tx,
        };
        let handle = std::thread::spawn(move || worker.run());

        ScanHandle {
            events: rx,
            cancel,
            worker: Some(handle),
        }
    }
}

struct ScanWorker {
    target: PathBuf,
    signatures: Arc<SignatureStore>,
    rules: Arc<dyn RuleEngine>,
    reputation: Arc<dyn ReputationProvider>,
    cancel: Arc<AtomicBool>,
    tx: Sender<ScanEvent>,
}

impl ScanWorker {
    fn run(self) {
        let files = list_files(&self.target);
        let total = files.len();

        if total == 0 {
            self.emit(ScanEvent::Progress(100));
            self.emit(ScanEvent::Finished);
            return;
        }

        for (index, path) in files.iter().enumerate() {
            if self.cancel.load(Ordering::Relaxed) {
                break;
            }

            self.emit(ScanEvent::Log(format!("Scanning: {}", path.display())));

            let verdict = match self.scan_file(path) {
                Ok(verdict) => verdict,
                Err(e) => Verdict::unknown(e),
            };
            self.emit(ScanEvent::FileClassified {
                path: path.clone(),
                verdict,
            });

            let percent = (((index + 1) as f64 / total as f64) * 100.0).round() as u8;
            self.emit(ScanEvent::Progress(percent));
        }

        self.emit(ScanEvent::Finished);
    }

    /// Per-file pipeline: digest, then classify.
    ///
    /// Digest and lookup failures are absorbed inside the stages; an error
    /// escaping here (a rule engine failure) becomes an `Unknown` verdict
    /// and the scan continues.
    fn scan_file(&self, path: &Path) -> Result<Verdict> {
        let digests = digest_file(path, DEFAULT_ALGORITHMS);
        classify(
            path,
            &digests,
            &self.signatures,
            self.rules.as_ref(),
            self.reputation.as_ref(),
        )
    }

    fn emit(&self, event: ScanEvent) {
        // The receiver going away just means nobody is listening anymore
        let _ = self.tx.send(event);
    }
}
