//! Read-through cache for small JSON documents.
//!
//! A [`CachedDocument`] only goes to disk when the watched file's
//! modification time has moved past the one recorded at the last successful
//! load. Failures never reach the caller: they are logged and the last good
//! value is served instead.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::SystemTime;

use serde_json::{Map, Value};

use crate::error::DocumentError;

/// Field selection applied to a freshly parsed document before caching it.
pub type Extract = fn(Value) -> Value;

/// Where the value returned by [`CachedDocument::lookup`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    /// Reloaded from disk by this lookup.
    Fresh,
    /// File unchanged since the last load, no I/O beyond the stat.
    Cached,
    /// Refresh failed, serving the last good value.
    Stale,
    /// Nothing was ever loaded.
    Empty,
}

#[derive(Debug, Clone)]
pub struct Lookup {
    pub value: Value,
    pub provenance: Provenance,
}

struct Entry {
    last_loaded: Option<SystemTime>,
    value: Value,
    loads: u64,
}

impl Entry {
    fn fallback(&self) -> Lookup {
        Lookup {
            value: self.value.clone(),
            provenance: if self.loads == 0 {
                Provenance::Empty
            } else {
                Provenance::Stale
            },
        }
    }
}

pub struct CachedDocument {
    path: PathBuf,
    /// Logical name used in diagnostics.
    role: &'static str,
    extract: Extract,
    entry: Mutex<Entry>,
}

pub(crate) fn empty_object() -> Value {
    Value::Object(Map::new())
}

pub(crate) fn read_json(path: &Path) -> Result<Value, DocumentError> {
    let file = File::open(path).map_err(|source| DocumentError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::from_reader(BufReader::new(file)).map_err(|source| DocumentError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

impl CachedDocument {
    pub fn new(path: impl Into<PathBuf>, role: &'static str, extract: Extract) -> Self {
        Self {
            path: path.into(),
            role,
            extract,
            entry: Mutex::new(Entry {
                last_loaded: None,
                value: empty_object(),
                loads: 0,
            }),
        }
    }

    /// Best known value of the document.
    pub fn get(&self) -> Value {
        self.lookup().value
    }

    pub fn lookup(&self) -> Lookup {
        // Held across stat, compare and reload so the mtime and the value
        // always move together.
        let mut entry = self.entry.lock().unwrap_or_else(PoisonError::into_inner);

        let modified = match std::fs::metadata(&self.path).and_then(|meta| meta.modified()) {
            Ok(modified) => modified,
            Err(err) => {
                log::warn!("Could not read {} file: {}", self.role, err);
                return entry.fallback();
            }
        };

        if let Some(last_loaded) = entry.last_loaded {
            if modified <= last_loaded {
                return Lookup {
                    value: entry.value.clone(),
                    provenance: Provenance::Cached,
                };
            }
        }

        match read_json(&self.path) {
            Ok(document) => {
                entry.value = (self.extract)(document);
                entry.last_loaded = Some(modified);
                entry.loads += 1;

                log::debug!("reloaded {} ({} loads)", self.role, entry.loads);

                Lookup {
                    value: entry.value.clone(),
                    provenance: Provenance::Fresh,
                }
            }
            Err(err) => {
                log::warn!("Could not read {} file: {:?}", self.role, err);
                entry.fallback()
            }
        }
    }

    /// Forget the recorded modification time so the next lookup reloads.
    /// The cached value is kept as fallback.
    pub fn invalidate(&self) {
        let mut entry = self.entry.lock().unwrap_or_else(PoisonError::into_inner);
        entry.last_loaded = None;
    }

    /// Number of successful loads from disk.
    pub fn loads(&self) -> u64 {
        self.entry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .loads
    }
}
