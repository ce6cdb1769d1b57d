//! File digest computation
//!
//! Streams a file once in fixed-size chunks and feeds every requested
//! algorithm from the same pass, so large files are hashed with bounded
//! memory regardless of how many digests are wanted.

use md5::{Digest, Md5};
use sha1::Sha1;
use sha2::Sha256;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Chunk size for streaming reads (matches the 8 KiB the scanner has always used)
const CHUNK_SIZE: usize = 8192;

/// Supported digest algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HashAlgorithm {
    Md5,
    Sha1,
    Sha256,
}

/// Default algorithm set computed for every scanned file
pub const DEFAULT_ALGORITHMS: &[HashAlgorithm] = &[
    HashAlgorithm::Md5,
    HashAlgorithm::Sha1,
    HashAlgorithm::Sha256,
];

#[derive(Debug, Error)]
pub enum HashError {
    /// Requesting an algorithm we don't implement is a caller defect,
    /// surfaced immediately rather than swallowed
    #[error("Unsupported hash method: {0}")]
    UnsupportedAlgorithm(String),
}

impl HashAlgorithm {
    /// Canonical lowercase name used in digest sets and logs
    pub fn name(&self) -> &'static str {
        match self {
            HashAlgorithm::Md5 => "md5",
            HashAlgorithm::Sha1 => "sha1",
            HashAlgorithm::Sha256 => "sha256",
        }
    }
}

impl FromStr for HashAlgorithm {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "md5" => Ok(HashAlgorithm::Md5),
            "sha1" => Ok(HashAlgorithm::Sha1),
            "sha256" => Ok(HashAlgorithm::Sha256),
            other => Err(HashError::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

impl std::fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Digests computed for a single file, keyed by algorithm
///
/// Absent entries mean the digest could not be computed (unreadable file);
/// callers treat absence as non-matching.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DigestSet {
    digests: BTreeMap<HashAlgorithm, String>,
}

impl DigestSet {
    /// Get the lowercase hex digest for an algorithm, if it was computed
    pub fn get(&self, algo: HashAlgorithm) -> Option<&str> {
        self.digests.get(&algo).map(String::as_str)
    }

    /// Iterate over all computed digests
    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.digests.values().map(String::as_str)
    }

    /// True when no digest could be computed
    pub fn is_empty(&self) -> bool {
        self.digests.is_empty()
    }

    /// Preferred key for reputation lookups: SHA-256, else MD5, else empty
    pub fn lookup_key(&self) -> &str {
        self.get(HashAlgorithm::Sha256)
            .or_else(|| self.get(HashAlgorithm::Md5))
            .unwrap_or("")
    }
}

/// Compute the requested digests of a file in a single streaming pass.
///
/// An I/O error (permission denied, file removed mid-scan) yields an empty
/// `DigestSet` with a logged warning; it never propagates to the caller.
pub fn digest_file(path: &Path, algorithms: &[HashAlgorithm]) -> DigestSet {
    match try_digest_file(path, algorithms) {
        Ok(set) => set,
        Err(e) => {
            log::warn!("Hash compute failed for {}: {}", path.display(), e);
            DigestSet::default()
        }
    }
}

fn try_digest_file(path: &Path, algorithms: &[HashAlgorithm]) -> std::io::Result<DigestSet> {
    let mut md5 = algorithms
        .contains(&HashAlgorithm::Md5)
        .then(Md5::new);
    let mut sha1 = algorithms
        .contains(&HashAlgorithm::Sha1)
        .then(Sha1::new);
    let mut sha256 = algorithms
        .contains(&HashAlgorithm::Sha256)
        .then(Sha256::new);

    let mut file = File::open(path)?;
    let mut buffer = [0u8; CHUNK_SIZE];

    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        let chunk = &buffer[..bytes_read];
        if let Some(h) = md5.as_mut() {
            h.update(chunk);
        }
        if let Some(h) = sha1.as_mut() {
            h.update(chunk);
        }
        if let Some(h) = sha256.as_mut() {
            h.update(chunk);
        }
    }

    let mut digests = BTreeMap::new();
    if let Some(h) = md5 {
        digests.insert(HashAlgorithm::Md5, hex::encode(h.finalize()));
    }
    if let Some(h) = sha1 {
        digests.insert(HashAlgorithm::Sha1, hex::encode(h.finalize()));
    }
    if let Some(h) = sha256 {
        digests.insert(HashAlgorithm::Sha256, hex::encode(h.finalize()));
    }

    Ok(DigestSet { digests })
}
