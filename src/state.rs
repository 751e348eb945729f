// src/state.rs

//! Durable state store shared by all units.
//!
//! The store is a two-level map `unit name -> (key -> scalar)` persisted as
//! a single YAML file. It is loaded once at startup; every mutation rewrites
//! the whole file before returning, so the on-disk state always matches the
//! in-memory state after a successful `set`.
//!
//! Writes go to a sibling temp file which is then renamed into place, so a
//! crash mid-write cannot leave a truncated state file behind.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use serde_yaml::Value;
use tracing::debug;

type StateData = BTreeMap<String, BTreeMap<String, Value>>;

/// Cloneable handle to the shared state store.
///
/// All units hold a clone of this handle; mutations are serialised by the
/// inner lock and by the fact that unit execution is sequential.
#[derive(Debug, Clone)]
pub struct StateStore {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Debug)]
struct Inner {
    path: PathBuf,
    data: StateData,
}

impl StateStore {
    /// Open the store at `path`, loading the file if it exists.
    ///
    /// A missing file is not an error; the store starts empty and the file
    /// is created on the first `set`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let data = load_file(&path)?;
        Ok(Self {
            inner: Arc::new(Mutex::new(Inner { path, data })),
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> PathBuf {
        self.lock().path.clone()
    }

    /// Re-read the backing file, replacing the in-memory contents.
    pub fn load(&self) -> Result<()> {
        let mut inner = self.lock();
        inner.data = load_file(&inner.path)?;
        Ok(())
    }

    /// Get the value stored under `(unit, key)`, if any.
    pub fn get(&self, unit: &str, key: &str) -> Option<Value> {
        let inner = self.lock();
        inner.data.get(unit).and_then(|m| m.get(key)).cloned()
    }

    /// Store `value` under `(unit, key)` and persist the whole store.
    pub fn set(&self, unit: &str, key: &str, value: Value) -> Result<()> {
        let mut inner = self.lock();
        inner
            .data
            .entry(unit.to_string())
            .or_default()
            .insert(key.to_string(), value);
        inner.save()
    }

    /// Get a string value; non-string values yield `None`.
    pub fn get_string(&self, unit: &str, key: &str) -> Option<String> {
        self.get(unit, key)
            .and_then(|v| v.as_str().map(|s| s.to_string()))
    }

    /// Store a string value.
    pub fn set_string(&self, unit: &str, key: &str, value: &str) -> Result<()> {
        self.set(unit, key, Value::from(value))
    }

    /// Get an integer value; non-integer values yield `None`.
    pub fn get_i64(&self, unit: &str, key: &str) -> Option<i64> {
        self.get(unit, key).and_then(|v| v.as_i64())
    }

    /// Store an integer value.
    pub fn set_i64(&self, unit: &str, key: &str, value: i64) -> Result<()> {
        self.set(unit, key, Value::from(value))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // Poisoning only happens if a holder panicked; nothing to recover.
        self.inner.lock().expect("state store lock poisoned")
    }
}

impl Inner {
    /// Rewrite the full state file: serialize, write a sibling temp file,
    /// rename into place.
    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("creating state directory at {:?}", parent))?;
            }
        }

        let yaml = serde_yaml::to_string(&self.data).context("serializing state")?;

        let tmp = tmp_path(&self.path);
        write_file(&tmp, yaml.as_bytes())
            .with_context(|| format!("writing state file at {:?}", tmp))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("renaming state file into place at {:?}", self.path))?;

        debug!(path = ?self.path, "state persisted");
        Ok(())
    }
}

fn write_file(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    use std::io::Write;

    let mut opts = fs::OpenOptions::new();
    opts.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        opts.mode(0o644);
    }
    opts.open(path)?.write_all(contents)
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

fn load_file(path: &Path) -> Result<StateData> {
    let contents = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = ?path, "no state file yet; starting empty");
            return Ok(StateData::new());
        }
        Err(e) => {
            return Err(e).with_context(|| format!("reading state file at {:?}", path));
        }
    };

    if contents.trim().is_empty() {
        return Ok(StateData::new());
    }

    serde_yaml::from_str(&contents).with_context(|| format!("parsing state file at {:?}", path))
}
