//! JSON files backing [`StateStore`] and the target feeds.
//!
//! Every save rewrites the whole file through a temporary sibling and a
//! rename, so a crash leaves either the old or the new document.
use log::debug;
use outpost_core::{
    Coordinate, Denylist, DiscoveryLog, ErrorRecord, StateStore, TargetFeed, TimerSet, TimerStore,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

const DENYLIST_FILE: &str = "denylist.json";
const ERROR_LOG_FILE: &str = "error_log.json";
const DISCOVERY_FILE: &str = "discovery.json";
const INACTIVE_FEED_FILE: &str = "inactive_villages.json";
const OASIS_FEED_FILE: &str = "oasis.json";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("cannot access {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{path} is not valid state JSON")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// State directory holding one file per record set.
#[derive(Debug, Clone)]
pub struct JsonStateStore {
    dir: PathBuf,
}

impl JsonStateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn timers_path(&self, village: &str, set: TimerSet) -> PathBuf {
        let prefix = match set {
            TimerSet::Travel => "timers",
            TimerSet::Construction => "construction",
        };
        self.dir.join(format!("{prefix}_{}.json", file_slug(village)))
    }

    /// Loads both target feeds; absent files are empty feeds.
    ///
    /// # Errors
    ///
    /// Returns an error if a feed file exists but cannot be read or parsed.
    pub fn load_feed(&self) -> Result<TargetFeed, StoreError> {
        let inactive_path = self.dir.join(INACTIVE_FEED_FILE);
        let inactive = match read_optional(&inactive_path)? {
            Some(text) => TargetFeed::parse_inactive(&text).map_err(|source| StoreError::Json {
                path: inactive_path,
                source,
            })?,
            None => Vec::new(),
        };
        let oasis_path = self.dir.join(OASIS_FEED_FILE);
        let oases = match read_optional(&oasis_path)? {
            Some(text) => TargetFeed::parse_oases(&text).map_err(|source| StoreError::Json {
                path: oasis_path,
                source,
            })?,
            None => Vec::new(),
        };
        Ok(TargetFeed { inactive, oases })
    }

    /// Adds newly discovered oases to the oasis feed, keeping existing ones.
    ///
    /// # Errors
    ///
    /// Returns an error if the feed cannot be read or rewritten.
    pub fn append_oases(&mut self, found: &[Coordinate]) -> Result<usize, StoreError> {
        let mut oases = self.load_feed()?.oases;
        let before = oases.len();
        for tile in found {
            if !oases.contains(tile) {
                oases.push(*tile);
            }
        }
        let added = oases.len() - before;
        if added > 0 {
            let path = self.dir.join(OASIS_FEED_FILE);
            let text = TargetFeed::oases_to_json(&oases).map_err(|source| StoreError::Json {
                path: path.clone(),
                source,
            })?;
            write_atomic(&path, text.as_bytes())?;
        }
        Ok(added)
    }

    /// The durable error log, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the log exists but cannot be read.
    pub fn error_log(&self) -> Result<Vec<ErrorRecord>, StoreError> {
        read_json(&self.dir.join(ERROR_LOG_FILE))
    }
}

impl StateStore for JsonStateStore {
    type Error = StoreError;

    fn load_timers(&self, village: &str, set: TimerSet) -> Result<TimerStore, Self::Error> {
        read_json(&self.timers_path(village, set))
    }

    fn save_timers(&mut self, village: &str, set: TimerSet, timers: &TimerStore) -> Result<(), Self::Error> {
        write_json(&self.timers_path(village, set), timers)
    }

    fn load_denylist(&self) -> Result<Denylist, Self::Error> {
        read_json(&self.dir.join(DENYLIST_FILE))
    }

    fn save_denylist(&mut self, denylist: &Denylist) -> Result<(), Self::Error> {
        write_json(&self.dir.join(DENYLIST_FILE), denylist)
    }

    fn append_error(&mut self, record: ErrorRecord) -> Result<(), Self::Error> {
        let path = self.dir.join(ERROR_LOG_FILE);
        let mut log: Vec<ErrorRecord> = read_json(&path)?;
        log.push(record);
        write_json(&path, &log)
    }

    fn load_discovery(&self) -> Result<DiscoveryLog, Self::Error> {
        read_json(&self.dir.join(DISCOVERY_FILE))
    }

    fn save_discovery(&mut self, log: &DiscoveryLog) -> Result<(), Self::Error> {
        write_json(&self.dir.join(DISCOVERY_FILE), log)
    }
}

/// Village names become file names. ASCII letters, digits and `-` are
/// kept; every other byte is written as `_XX` hex, so distinct names never
/// share a file.
fn file_slug(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for byte in name.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' {
            slug.push(char::from(byte));
        } else {
            slug.push_str(&format!("_{byte:02X}"));
        }
    }
    slug
}

fn read_optional(path: &Path) -> Result<Option<String>, StoreError> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(StoreError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn read_json<T: DeserializeOwned + Default>(path: &Path) -> Result<T, StoreError> {
    let Some(text) = read_optional(path)? else {
        debug!("{} missing, starting empty", path.display());
        return Ok(T::default());
    };
    if text.trim().is_empty() {
        return Ok(T::default());
    }
    serde_json::from_str(&text).map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    })
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StoreError> {
    let payload = serde_json::to_vec_pretty(value).map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    write_atomic(path, &payload)
}

fn write_atomic(path: &Path, payload: &[u8]) -> Result<(), StoreError> {
    let io_err = |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, payload).map_err(io_err)?;
    fs::rename(&tmp, path).map_err(io_err)
}
