use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock};
use std::time::Duration;

use super::record_store::{RecordStore, RecordStoreError, ScanPage};

#[derive(Debug, Clone)]
struct StoredValue {
    value: String,
    ttl: Option<Duration>,
    seq: u64,
}

/// Keys plus their insertion order. Scan cursors are positions in that order,
/// so deleting keys mid-pass never shifts keys that have not been visited yet.
#[derive(Debug, Default)]
struct Keyspace {
    entries: HashMap<String, StoredValue>,
    order: BTreeMap<u64, String>,
    next_seq: u64,
}

impl Keyspace {
    fn put(&mut self, key: &str, value: &str, ttl: Option<Duration>) {
        if let Some(existing) = self.entries.get_mut(key) {
            existing.value = value.to_string();
            existing.ttl = ttl;
            return;
        }

        self.next_seq += 1;
        let seq = self.next_seq;
        self.order.insert(seq, key.to_string());
        self.entries.insert(
            key.to_string(),
            StoredValue {
                value: value.to_string(),
                ttl,
                seq,
            },
        );
    }

    fn remove(&mut self, key: &str) {
        if let Some(removed) = self.entries.remove(key) {
            self.order.remove(&removed.seq);
        }
    }
}

/// In-memory record store with Redis-like scan semantics.
///
/// Intended for tests/dev. Expiry is recorded but never enforced. Includes
/// failure injection hooks so callers can exercise their error paths.
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    keyspace: RwLock<Keyspace>,
    failing_scans: AtomicUsize,
    failing_gets: RwLock<HashSet<String>>,
    vanishing: RwLock<HashSet<String>>,
    fail_sets: AtomicBool,
    fail_deletes: AtomicBool,
    scan_cursors: Mutex<Vec<u64>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value without expiry.
    pub fn insert(&self, key: impl AsRef<str>, value: impl AsRef<str>) {
        if let Ok(mut keyspace) = self.keyspace.write() {
            keyspace.put(key.as_ref(), value.as_ref(), None);
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keyspace
            .read()
            .map(|k| k.entries.contains_key(key))
            .unwrap_or(false)
    }

    pub fn value(&self, key: &str) -> Option<String> {
        self.keyspace
            .read()
            .ok()?
            .entries
            .get(key)
            .map(|v| v.value.clone())
    }

    pub fn ttl(&self, key: &str) -> Option<Duration> {
        self.keyspace.read().ok()?.entries.get(key).and_then(|v| v.ttl)
    }

    /// All keys, in insertion order.
    pub fn keys(&self) -> Vec<String> {
        self.keyspace
            .read()
            .map(|k| k.order.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Make the next `n` scans fail with a connection error.
    pub fn fail_next_scans(&self, n: usize) {
        self.failing_scans.store(n, Ordering::SeqCst);
    }

    /// Make every `get` of `key` fail with a command error.
    pub fn fail_get(&self, key: impl Into<String>) {
        if let Ok(mut keys) = self.failing_gets.write() {
            keys.insert(key.into());
        }
    }

    /// Report `key` from the next scan, then drop it before it can be fetched.
    pub fn vanish_after_scan(&self, key: impl Into<String>) {
        if let Ok(mut keys) = self.vanishing.write() {
            keys.insert(key.into());
        }
    }

    pub fn set_fail_sets(&self, fail: bool) {
        self.fail_sets.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    /// Cursors passed to `scan`, in call order.
    pub fn scan_cursors(&self) -> Vec<u64> {
        self.scan_cursors
            .lock()
            .map(|c| c.clone())
            .unwrap_or_default()
    }

    fn poisoned() -> RecordStoreError {
        RecordStoreError::Command("lock poisoned".to_string())
    }
}

#[async_trait::async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn scan(
        &self,
        cursor: u64,
        pattern: &str,
        page_size: usize,
    ) -> Result<ScanPage, RecordStoreError> {
        if let Ok(mut cursors) = self.scan_cursors.lock() {
            cursors.push(cursor);
        }

        let remaining_failures = self.failing_scans.load(Ordering::SeqCst);
        if remaining_failures > 0 {
            self.failing_scans
                .store(remaining_failures - 1, Ordering::SeqCst);
            return Err(RecordStoreError::Connection(
                "injected scan failure".to_string(),
            ));
        }

        let mut keyspace = self.keyspace.write().map_err(|_| Self::poisoned())?;

        // Examine `page_size` keys from the cursor on; return the matching ones.
        let examined: Vec<(u64, String)> = keyspace
            .order
            .range(cursor.max(1)..)
            .take(page_size.max(1))
            .map(|(seq, key)| (*seq, key.clone()))
            .collect();

        let next_cursor = match examined.last() {
            Some((last, _)) if keyspace.order.range(last + 1..).next().is_some() => last + 1,
            _ => 0,
        };

        let keys: Vec<String> = examined
            .into_iter()
            .map(|(_, key)| key)
            .filter(|key| glob_match(pattern, key))
            .collect();

        let mut vanishing = self.vanishing.write().map_err(|_| Self::poisoned())?;
        for key in &keys {
            if vanishing.remove(key) {
                keyspace.remove(key);
            }
        }

        Ok(ScanPage { keys, next_cursor })
    }

    async fn get(&self, key: &str) -> Result<String, RecordStoreError> {
        let failing = self.failing_gets.read().map_err(|_| Self::poisoned())?;
        if failing.contains(key) {
            return Err(RecordStoreError::Command(format!(
                "injected GET failure for {key}"
            )));
        }

        let keyspace = self.keyspace.read().map_err(|_| Self::poisoned())?;
        keyspace
            .entries
            .get(key)
            .map(|v| v.value.clone())
            .ok_or_else(|| RecordStoreError::NotFound(key.to_string()))
    }

    async fn set_with_expiry(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), RecordStoreError> {
        if self.fail_sets.load(Ordering::SeqCst) {
            return Err(RecordStoreError::Command(format!(
                "injected SET failure for {key}"
            )));
        }

        let mut keyspace = self.keyspace.write().map_err(|_| Self::poisoned())?;
        keyspace.put(key, value, Some(ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), RecordStoreError> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(RecordStoreError::Command(format!(
                "injected DEL failure for {key}"
            )));
        }

        let mut keyspace = self.keyspace.write().map_err(|_| Self::poisoned())?;
        keyspace.remove(key);
        Ok(())
    }
}

/// Glob match supporting `*` and `?`, the subset used by scan patterns here.
fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();

    let (mut pi, mut ti) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '*' {
            backtrack = Some((pi, ti));
            pi += 1;
        } else if let Some((star, matched)) = backtrack {
            pi = star + 1;
            ti = matched + 1;
            backtrack = Some((star, matched + 1));
        } else {
            return false;
        }
    }

    p[pi..].iter().all(|c| *c == '*')
}
