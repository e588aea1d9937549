//! Implementations of [`TunableStore`]

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, info, warn};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use thiserror::Error;

// Internal
use super::TunableStore;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// An in-memory store.
#[derive(Debug, Default, Clone)]
pub struct MemTunableStore {
    values: HashMap<String, f64>,
}

/// A store backed by a TOML file which is re-read whenever it is modified.
///
/// Tables are flattened into `/` separated keys, so
///
/// ```toml
/// [Shooter]
/// TargetRPM = 3000.0
/// ```
///
/// provides the key `Shooter/TargetRPM`. Values written into the store (overrides) stay in place
/// until the same key is changed in the file.
#[derive(Debug)]
pub struct FileTunableStore {
    path: PathBuf,

    /// Current values, including overrides
    values: HashMap<String, f64>,

    /// Values as last loaded from the file
    file_values: HashMap<String, f64>,

    last_modified: Option<SystemTime>,

    /// Set once a missing file has been reported, so it is only reported once
    missing_reported: bool,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Cannot read the tunables file {0:?}: {1}")]
    Io(PathBuf, std::io::Error),

    #[error("Cannot parse the tunables file {0:?}: {1}")]
    Parse(PathBuf, toml::de::Error),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl MemTunableStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TunableStore for MemTunableStore {
    fn read(&self, key: &str) -> Option<f64> {
        self.values.get(key).copied()
    }

    fn write(&mut self, key: &str, value: f64) {
        self.values.insert(key.to_string(), value);
    }
}

impl FileTunableStore {
    /// Create a new store for the given file and load it.
    ///
    /// A missing file is not an error, the store is simply empty until the file appears.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let mut store = Self {
            path: path.as_ref().to_path_buf(),
            values: HashMap::new(),
            file_values: HashMap::new(),
            last_modified: None,
            missing_reported: false,
        };

        match store.refresh() {
            Ok(_) => Ok(store),
            Err(StoreError::Io(path, e)) => {
                warn!("Tunables file {:?} not readable ({}), using defaults", path, e);
                Ok(store)
            }
            Err(e) => Err(e),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the file, applying every value which differs from the previous load.
    ///
    /// Keys removed from the file are removed from the store, so they fall back to their
    /// defaults, unless they have been overridden since the previous load.
    fn load(&mut self) -> Result<(), StoreError> {
        let contents = std::fs::read_to_string(&self.path)
            .map_err(|e| StoreError::Io(self.path.clone(), e))?;

        let table: toml::Value = toml::from_str(&contents)
            .map_err(|e| StoreError::Parse(self.path.clone(), e))?;

        let mut new_values = HashMap::new();
        flatten("", &table, &mut new_values);

        for (key, value) in new_values.iter() {
            if self.file_values.get(key) != Some(value) {
                debug!("Tunable {} = {}", key, value);
                self.values.insert(key.clone(), *value);
            }
        }

        for (key, old) in self.file_values.iter() {
            if new_values.contains_key(key) {
                continue;
            }

            let overridden = match self.values.get(key) {
                Some(v) => v.to_bits() != old.to_bits(),
                None => false,
            };
            if !overridden {
                debug!("Tunable {} removed", key);
                self.values.remove(key);
            }
        }

        self.file_values = new_values;

        Ok(())
    }
}

impl TunableStore for FileTunableStore {
    fn read(&self, key: &str) -> Option<f64> {
        self.values.get(key).copied()
    }

    fn write(&mut self, key: &str, value: f64) {
        self.values.insert(key.to_string(), value);
    }

    fn refresh(&mut self) -> Result<bool, StoreError> {
        let modified = match std::fs::metadata(&self.path).and_then(|m| m.modified()) {
            Ok(m) => m,
            Err(e) => {
                if self.missing_reported {
                    return Ok(false);
                }
                self.missing_reported = true;
                return Err(StoreError::Io(self.path.clone(), e));
            }
        };

        self.missing_reported = false;

        if self.last_modified == Some(modified) {
            return Ok(false);
        }

        // Record the time before loading so a broken file is only reported once per edit
        self.last_modified = Some(modified);
        self.load()?;

        info!("Tunables reloaded from {:?}", self.path);

        Ok(true)
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Flatten a TOML value into numeric `/` separated keys. Non-numeric values are ignored.
fn flatten(prefix: &str, value: &toml::Value, out: &mut HashMap<String, f64>) {
    match value {
        toml::Value::Table(table) => {
            for (k, v) in table.iter() {
                let key = match prefix.is_empty() {
                    true => k.clone(),
                    false => format!("{}/{}", prefix, k),
                };
                flatten(&key, v, out);
            }
        }
        toml::Value::Float(f) => {
            out.insert(prefix.to_string(), *f);
        }
        toml::Value::Integer(i) => {
            out.insert(prefix.to_string(), *i as f64);
        }
        _ => (),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Write;

    fn temp_path(name: &str) -> PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("shooter_tunables_{}_{}.toml", name, std::process::id()));
        path
    }

    fn write_file(path: &Path, contents: &str) {
        let mut f = std::fs::File::create(path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f.sync_all().unwrap();
    }

    #[test]
    fn test_mem_store() {
        let mut store = MemTunableStore::new();
        assert_eq!(store.read("Shooter/kP"), None);

        store.write("Shooter/kP", 0.3);
        assert_eq!(store.read("Shooter/kP"), Some(0.3));
        assert!(!store.refresh().unwrap());
    }

    #[test]
    fn test_file_store() {
        let path = temp_path("load");
        write_file(
            &path,
            "[Shooter]\nTargetRPM = 3000\nkP = 0.25\nName = \"ignored\"\n",
        );

        let mut store = FileTunableStore::new(&path).unwrap();

        assert_eq!(store.read("Shooter/TargetRPM"), Some(3000.0));
        assert_eq!(store.read("Shooter/kP"), Some(0.25));
        assert_eq!(store.read("Shooter/Name"), None);

        // Unchanged file is not reloaded
        assert!(!store.refresh().unwrap());

        // Overrides stick until the file changes that key
        store.write("Shooter/TargetRPM", 4500.0);
        assert_eq!(store.read("Shooter/TargetRPM"), Some(4500.0));

        // Force a different modification time for the rewrite
        store.last_modified = None;
        write_file(&path, "[Shooter]\nTargetRPM = 3000\nkP = 0.5\n");
        assert!(store.refresh().unwrap());

        assert_eq!(store.read("Shooter/TargetRPM"), Some(4500.0));
        assert_eq!(store.read("Shooter/kP"), Some(0.5));

        store.last_modified = None;
        write_file(&path, "[Shooter]\nTargetRPM = 2000\nkP = 0.5\n");
        assert!(store.refresh().unwrap());
        assert_eq!(store.read("Shooter/TargetRPM"), Some(2000.0));

        // Removing a key from the file drops its value, but not an override of it
        store.write("Shooter/kP", 0.7);
        store.last_modified = None;
        write_file(&path, "[Shooter]\nkV = 0.12\n");
        assert!(store.refresh().unwrap());
        assert_eq!(store.read("Shooter/TargetRPM"), None);
        assert_eq!(store.read("Shooter/kP"), Some(0.7));
        assert_eq!(store.read("Shooter/kV"), Some(0.12));

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_file_store_errors() {
        let path = temp_path("errors");
        std::fs::remove_file(&path).ok();

        // Missing file only reported once
        let mut store = FileTunableStore {
            path: path.clone(),
            values: HashMap::new(),
            file_values: HashMap::new(),
            last_modified: None,
            missing_reported: false,
        };
        assert!(matches!(store.refresh(), Err(StoreError::Io(..))));
        assert!(!store.refresh().unwrap());

        // Broken file reported, previous values kept
        store.write("Shooter/kP", 0.1);
        write_file(&path, "[Shooter\nkP = ");
        assert!(matches!(store.refresh(), Err(StoreError::Parse(..))));
        assert!(!store.refresh().unwrap());
        assert_eq!(store.read("Shooter/kP"), Some(0.1));

        std::fs::remove_file(&path).ok();
    }
}
