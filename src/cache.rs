//! Content-addressed cache of ingestion results
//!
//! Uploads are keyed by the SHA-256 of their bytes, so re-submitting the same
//! file skips parsing while any change in content is a miss. The cache keeps
//! the `capacity` most recently used entries.

use sha2::{Digest, Sha256};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::DataResult;
use crate::loader::{self, Ingested, MediaType, UploadedFile};

/// Default number of uploads kept in memory
pub const DEFAULT_CACHE_CAPACITY: usize = 8;

/// Hex SHA-256 of the upload bytes
pub fn content_key(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Cache key of an upload: the resolved format plus the content hash
///
/// The same bytes uploaded once as CSV and once as a workbook get separate
/// entries.
pub fn entry_key(media: MediaType, hash: &str) -> String {
    let format = match media {
        MediaType::Csv => "csv",
        MediaType::Spreadsheet => "xlsx",
    };
    format!("{}:{}", format, hash)
}

/// Outcome of [`IngestCache::load`]
#[derive(Clone, Debug)]
pub struct Cached {
    pub key: String,
    pub value: Ingested,
    pub hit: bool,
}

#[derive(Debug, Default)]
struct Entries {
    // Front is the most recently used entry.
    items: VecDeque<(String, Ingested)>,
    hits: u64,
    misses: u64,
}

/// Most-recent-N cache of parsed uploads, safe to share between sessions
#[derive(Debug)]
pub struct IngestCache {
    capacity: usize,
    entries: Mutex<Entries>,
}

impl Default for IngestCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

impl IngestCache {
    /// Creates a cache holding at most `capacity` entries (at least one)
    pub fn new(capacity: usize) -> Self {
        IngestCache {
            capacity: capacity.max(1),
            entries: Mutex::new(Entries::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the ingestion result for `file`, parsing only on a miss
    ///
    /// The media type is resolved first, so an unsupported upload is rejected
    /// even when its bytes are cached. The lock is not held while parsing.
    /// Failed parses are not cached, so a corrected upload with the same name
    /// is always re-read.
    ///
    /// # Arguments
    /// * `file` - The uploaded file
    ///
    /// # Returns
    /// * `DataResult<Cached>` - The shared result and whether it was a hit
    pub fn load(&self, file: &UploadedFile) -> DataResult<Cached> {
        let media = file.media_type()?;
        let hash = content_key(&file.bytes);
        let key = entry_key(media, &hash);

        if let Some(value) = self.get(&key) {
            log::info!("cache hit for upload {}", &hash[..12]);
            return Ok(Cached {
                key,
                value,
                hit: true,
            });
        }

        log::info!("cache miss for upload {}, parsing", &hash[..12]);
        let value = loader::parse(media, &file.bytes)?;
        self.insert(key.clone(), value.clone());

        Ok(Cached {
            key,
            value,
            hit: false,
        })
    }

    /// Looks up an entry and marks it most recently used
    pub fn get(&self, key: &str) -> Option<Ingested> {
        let mut entries = self.lock();
        match entries.items.iter().position(|(k, _)| k == key) {
            Some(index) => {
                entries.hits += 1;
                let entry = entries.items.remove(index)?;
                let value = entry.1.clone();
                entries.items.push_front(entry);
                Some(value)
            }
            None => {
                entries.misses += 1;
                None
            }
        }
    }

    /// Inserts an entry, evicting the least recently used one when full
    pub fn insert(&self, key: String, value: Ingested) {
        let mut entries = self.lock();
        entries.items.retain(|(k, _)| *k != key);
        entries.items.push_front((key, value));
        while entries.items.len() > self.capacity {
            if let Some((evicted, _)) = entries.items.pop_back() {
                log::debug!("evicted upload {} from cache", &evicted[..12]);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lock().items.iter().any(|(k, _)| k == key)
    }

    pub fn hits(&self) -> u64 {
        self.lock().hits
    }

    pub fn misses(&self) -> u64 {
        self.lock().misses
    }
}
