use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::instances::InstanceRecord;

/// One profile's slice of the cache file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Epoch milliseconds at which the instances were fetched.
    pub timestamp: i64,
    pub instances: Vec<InstanceRecord>,
}

impl CacheEntry {
    pub fn new(instances: Vec<InstanceRecord>, fetched_at: DateTime<Utc>) -> Self {
        Self {
            timestamp: fetched_at.timestamp_millis(),
            instances,
        }
    }

    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        let age = now.timestamp_millis() - self.timestamp;
        i128::from(age) < ttl.as_millis() as i128
    }
}

/// Per-profile instance cache.
///
/// Entries are independent: `put` for one profile must leave every other
/// profile's entry as it was.
#[cfg_attr(test, mockall::automock)]
pub trait CacheStore {
    fn get(&self, profile: &str) -> Result<Option<CacheEntry>>;
    fn put(&self, profile: &str, entry: &CacheEntry) -> Result<()>;
}

/// JSON file holding `{ "<profile>": { "timestamp": .., "instances": [..] } }`.
///
/// Writes are read-merge-write without locking, so two invocations racing on
/// the same file end up last-write-wins.
pub struct FileCacheStore {
    path: PathBuf,
}

impl FileCacheStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read_all(&self) -> Result<Map<String, Value>> {
        if !self.path.exists() {
            return Ok(Map::new());
        }

        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read cache file {}", self.path.display()))?;

        match serde_json::from_str::<Value>(&content) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(anyhow!(
                "Cache file {} is not a JSON object",
                self.path.display()
            )),
            Err(e) => Err(anyhow!(
                "Cache file {} is corrupt: {}",
                self.path.display(),
                e
            )),
        }
    }
}

impl CacheStore for FileCacheStore {
    fn get(&self, profile: &str) -> Result<Option<CacheEntry>> {
        let mut all = self.read_all()?;

        match all.remove(profile) {
            Some(value) => {
                let entry = serde_json::from_value(value).map_err(|e| {
                    anyhow!(
                        "Cache entry for profile '{}' in {} is invalid: {}",
                        profile,
                        self.path.display(),
                        e
                    )
                })?;
                Ok(Some(entry))
            }
            None => Ok(None),
        }
    }

    fn put(&self, profile: &str, entry: &CacheEntry) -> Result<()> {
        let mut all = self.read_all()?;
        all.insert(profile.to_string(), serde_json::to_value(entry)?);

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create cache directory {}", parent.display())
            })?;
        }

        let json = serde_json::to_string_pretty(&Value::Object(all))?;
        fs::write(&self.path, json)
            .with_context(|| format!("Failed to write cache file {}", self.path.display()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn record(id: &str, name: &str) -> InstanceRecord {
        InstanceRecord::new(name, id, "running")
    }

    fn fetched_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_get_missing_file_is_none() {
        let dir = TempDir::new().unwrap();
        let store = FileCacheStore::new(dir.path().join("cache.json"));
        assert_eq!(store.get("default").unwrap(), None);
    }

    #[test]
    fn test_put_then_get_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = FileCacheStore::new(dir.path().join("cache.json"));
        let entry = CacheEntry::new(vec![record("i-1", "web1")], Utc::now());

        store.put("dev", &entry).unwrap();
        let loaded = store.get("dev").unwrap().unwrap();

        assert_eq!(loaded, entry);
        assert!(loaded.is_fresh(Utc::now(), Duration::from_secs(24 * 3600)));
        assert_eq!(store.get("prod").unwrap(), None);
    }

    #[test]
    fn test_put_leaves_other_profiles_byte_for_byte() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        let prod = r#""prod": {
    "timestamp": 1700000000000,
    "instances": [
      {
        "name": "db (i-9)",
        "value": "i-9",
        "description": "Instance ID: i-9, State: stopped"
      }
    ]
  }"#;
        fs::write(
            &path,
            format!(
                "{{\n  {},\n  \"dev\": {{\n    \"timestamp\": 1,\n    \"instances\": []\n  }}\n}}",
                prod
            ),
        )
        .unwrap();

        let store = FileCacheStore::new(&path);
        store
            .put("dev", &CacheEntry::new(vec![record("i-1", "web1")], fetched_at()))
            .unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains(prod), "prod entry changed:\n{}", content);
        assert!(content.find("\"prod\"").unwrap() < content.find("\"dev\"").unwrap());

        let written: Value = serde_json::from_str(&content).unwrap();
        assert_eq!(written["dev"]["timestamp"], fetched_at().timestamp_millis());
        assert_eq!(written["dev"]["instances"][0]["value"], "i-1");
    }

    #[test]
    fn test_put_writes_pretty_json_and_creates_parent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("cache.json");
        let store = FileCacheStore::new(&path);

        store
            .put("default", &CacheEntry::new(Vec::new(), fetched_at()))
            .unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("\n  \"default\": {"));
    }

    #[test]
    fn test_corrupt_file_errors_and_is_left_alone() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        fs::write(&path, "{\"dev\": ").unwrap();
        let store = FileCacheStore::new(&path);

        assert!(store.get("dev").is_err());
        assert!(store
            .put("dev", &CacheEntry::new(Vec::new(), fetched_at()))
            .is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), "{\"dev\": ");
    }

    #[test]
    fn test_freshness_boundary() {
        let entry = CacheEntry::new(Vec::new(), fetched_at());
        let ttl = Duration::from_secs(24 * 3600);

        assert!(entry.is_fresh(fetched_at(), ttl));
        assert!(entry.is_fresh(fetched_at() + chrono::Duration::hours(23), ttl));
        assert!(!entry.is_fresh(fetched_at() + chrono::Duration::hours(24), ttl));
        assert!(!entry.is_fresh(fetched_at() + chrono::Duration::hours(60), ttl));
    }

    #[test]
    fn test_reads_entries_without_state() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        fs::write(
            &path,
            r#"{"default": {"timestamp": 5, "instances": [{"name": "web1 (i-123)", "value": "i-123", "description": "Instance ID: i-123, State: running"}]}}"#,
        )
        .unwrap();

        let entry = FileCacheStore::new(&path).get("default").unwrap().unwrap();
        assert_eq!(entry.timestamp, 5);
        assert_eq!(entry.instances[0].instance_id, "i-123");
        assert_eq!(entry.instances[0].state, "");
    }
}
