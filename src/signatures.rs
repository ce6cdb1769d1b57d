//! Known-malicious hash signature store
//!
//! Signatures live in a single-column SQLite table and are loaded into an
//! in-memory set once at construction. Lookups are read-only for the
//! lifetime of a scan; `reload` swaps the whole set atomically.

use rusqlite::Connection;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// In-memory set of known-malicious digests backed by a SQLite database
pub struct SignatureStore {
    db_path: PathBuf,
    known_hashes: RwLock<HashSet<String>>,
}

impl SignatureStore {
    /// Open the store and load all signatures.
    ///
    /// A missing or unreadable database yields an empty set with a logged
    /// warning rather than a failed scan; every digest then reads as unknown.
    pub fn open(db_path: &Path) -> Self {
        let known_hashes = load_signatures(db_path);
        Self {
            db_path: db_path.to_path_buf(),
            known_hashes: RwLock::new(known_hashes),
        }
    }

    /// Check whether a digest is a known-malicious hash.
    ///
    /// Matching is case-insensitive; an empty digest is never known.
    pub fn is_known(&self, digest: &str) -> bool {
        if digest.is_empty() {
            return false;
        }
        self.known_hashes
            .read()
            .expect("signature set lock poisoned")
            .contains(&digest.to_ascii_lowercase())
    }

    /// Number of loaded signatures
    pub fn len(&self) -> usize {
        self.known_hashes
            .read()
            .expect("signature set lock poisoned")
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Re-read the backing database and swap the set in one step.
    ///
    /// Concurrent lookups see either the old set or the new one, never a
    /// partially loaded state.
    pub fn reload(&self) {
        let fresh = load_signatures(&self.db_path);
        let mut guard = self
            .known_hashes
            .write()
            .expect("signature set lock poisoned");
        *guard = fresh;
    }
}

/// Load all signature hashes, normalized to lowercase. Fail-open to empty.
fn load_signatures(db_path: &Path) -> HashSet<String> {
    match try_load_signatures(db_path) {
        Ok(set) => set,
        Err(e) => {
            log::warn!(
                "Cannot load signatures from {}: {}",
                db_path.display(),
                e
            );
            HashSet::new()
        }
    }
}

fn try_load_signatures(db_path: &Path) -> rusqlite::Result<HashSet<String>> {
    let db = Connection::open_with_flags(
        db_path,
        rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY,
    )?;
    let mut stmt = db.prepare("SELECT hash FROM signatures")?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

    let mut set = HashSet::new();
    for row in rows {
        set.insert(row?.to_ascii_lowercase());
    }
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::params;
    use tempfile::TempDir;

    fn create_signature_db(dir: &TempDir, hashes: &[&str]) -> PathBuf {
        let db_path = dir.path().join("blackice.db");
        let db = Connection::open(&db_path).unwrap();
        db.execute("CREATE TABLE signatures (hash TEXT PRIMARY KEY)", [])
            .unwrap();
        for h in hashes {
            db.execute("INSERT INTO signatures (hash) VALUES (?1)", params![h])
                .unwrap();
        }
        db_path
    }

    #[test]
    fn test_known_hash_lookup() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = create_signature_db(
            &temp_dir,
            &["5eb63bbbe01eeed093cb22bb8f5acdc3", "deadbeef"],
        );

        let store = SignatureStore::open(&db_path);
        assert_eq!(store.len(), 2);
        assert!(store.is_known("deadbeef"));
        assert!(!store.is_known("cafebabe"));
    }

    #[test]
    fn test_case_insensitive_matching() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = create_signature_db(&temp_dir, &["DEADBEEF"]);

        let store = SignatureStore::open(&db_path);
        assert!(store.is_known("deadbeef"));
        assert!(store.is_known("DeadBeef"));
    }

    #[test]
    fn test_empty_digest_never_known() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = create_signature_db(&temp_dir, &[""]);

        let store = SignatureStore::open(&db_path);
        assert!(!store.is_known(""));
    }

    #[test]
    fn test_missing_database_fails_open() {
        let store = SignatureStore::open(Path::new("/nonexistent/blackice.db"));
        assert!(store.is_empty());
        assert!(!store.is_known("deadbeef"));
    }

    #[test]
    fn test_reload_picks_up_new_rows() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = create_signature_db(&temp_dir, &["aa11"]);

        let store = SignatureStore::open(&db_path);
        assert!(!store.is_known("bb22"));

        let db = Connection::open(&db_path).unwrap();
        db.execute("INSERT INTO signatures (hash) VALUES ('bb22')", [])
            .unwrap();

        store.reload();
        assert!(store.is_known("aa11"));
        assert!(store.is_known("bb22"));
    }

    #[test]
    fn test_reload_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = create_signature_db(&temp_dir, &["aa11", "bb22"]);

        let store = SignatureStore::open(&db_path);
        store.reload();
        let first = (store.is_known("aa11"), store.is_known("bb22"), store.len());
        store.reload();
        let second = (store.is_known("aa11"), store.is_known("bb22"), store.len());
        assert_eq!(first, second);
    }
}
