use std::collections::BTreeMap;
use std::path::PathBuf;

/// Last frequency the transmitter was tuned to.
pub const PREF_LAST_TUNED: &str = "last_tx_frequency";

/// Prefix for preset slot keys; the slot index is appended.
pub const PREF_PRESET_PREFIX: &str = "tx_preset_freq_";

pub fn preset_key(index: usize) -> String {
    format!("{}{}", PREF_PRESET_PREFIX, index)
}

/// Integer key-value preference store backed by a single JSON file.
///
/// Writes are batched: callers `put_int` any number of keys and then
/// `commit()` once, which rewrites the whole file.  A missing or corrupt
/// file loads as empty so first runs and damaged stores fall back to
/// defaults instead of failing.
#[derive(Debug)]
pub struct PrefStore {
    path: PathBuf,
    values: BTreeMap<String, i64>,
}

impl PrefStore {
    pub fn load(path: PathBuf) -> Self {
        let values = Self::read_values(&path);
        Self { path, values }
    }

    pub fn get_int(&self, key: &str, default: i64) -> i64 {
        self.values.get(key).copied().unwrap_or(default)
    }

    pub fn put_int(&mut self, key: &str, value: i64) {
        self.values.insert(key.to_string(), value);
    }

    pub fn commit(&self) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.values)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }

    fn read_values(path: &PathBuf) -> BTreeMap<String, i64> {
        if let Ok(content) = std::fs::read_to_string(path) {
            if let Ok(values) = serde_json::from_str::<BTreeMap<String, i64>>(&content) {
                return values;
            }
        }
        BTreeMap::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = PrefStore::load(dir.path().join("prefs.json"));
        assert_eq!(store.get_int(PREF_LAST_TUNED, 98_100), 98_100);
    }

    #[test]
    fn test_commit_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");

        let mut store = PrefStore::load(path.clone());
        store.put_int(PREF_LAST_TUNED, 99_500);
        store.put_int(&preset_key(0), 88_500);
        store.commit().unwrap();

        let reloaded = PrefStore::load(path);
        assert_eq!(reloaded.get_int(PREF_LAST_TUNED, 0), 99_500);
        assert_eq!(reloaded.get_int(&preset_key(0), 0), 88_500);
        assert_eq!(reloaded.get_int(&preset_key(1), 0), 0);
    }

    #[test]
    fn test_corrupt_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        std::fs::write(&path, "not json {").unwrap();

        let store = PrefStore::load(path);
        assert_eq!(store.get_int(PREF_LAST_TUNED, 98_100), 98_100);
    }
}
