//! Durable state: every tracked URL with its last fingerprint and check metadata.
//!
//! The whole mapping is read at the start of an operation and written back as a
//! complete replacement afterwards. There is no locking between processes, so
//! two invocations racing on the same file resolve as "last writer wins".

use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{
    fmt, fs,
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};
use tempfile::NamedTempFile;

use crate::error::Error;

/// `checkCount` value written for a freshly created record, whichever command
/// created it.
pub const INITIAL_CHECK_COUNT: u64 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedResource {
    #[serde(alias = "hash")]
    pub fingerprint: String,
    #[serde(alias = "lastChecked")]
    pub last_checked_at: DateTime<Utc>,
    #[serde(alias = "lastChanged")]
    pub last_changed_at: DateTime<Utc>,
    pub check_count: u64,
}

impl TrackedResource {
    #[must_use]
    pub fn new(fingerprint: String, now: DateTime<Utc>) -> Self {
        Self {
            fingerprint,
            last_checked_at: now,
            last_changed_at: now,
            check_count: INITIAL_CHECK_COUNT,
        }
    }
}

/// Insertion-ordered mapping from identifier to its record.
///
/// The order is what ordinal references index into, so it is kept through
/// serialization instead of relying on a hash map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resources {
    entries: Vec<(String, TrackedResource)>,
}

impl Resources {
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn contains(&self, identifier: &str) -> bool {
        self.position(identifier).is_some()
    }

    #[must_use]
    pub fn get(&self, identifier: &str) -> Option<&TrackedResource> {
        self.position(identifier).map(|i| &self.entries[i].1)
    }

    pub fn get_mut(&mut self, identifier: &str) -> Option<&mut TrackedResource> {
        let i = self.position(identifier)?;
        Some(&mut self.entries[i].1)
    }

    /// Inserts at the end, or replaces in place when the identifier is already
    /// present. Returns the replaced record.
    pub fn insert(
        &mut self,
        identifier: impl Into<String>,
        resource: TrackedResource,
    ) -> Option<TrackedResource> {
        let identifier = identifier.into();
        match self.position(&identifier) {
            Some(i) => Some(std::mem::replace(&mut self.entries[i].1, resource)),
            None => {
                self.entries.push((identifier, resource));
                None
            }
        }
    }

    pub fn remove(&mut self, identifier: &str) -> Option<TrackedResource> {
        let i = self.position(identifier)?;
        Some(self.entries.remove(i).1)
    }

    /// Identifier at a 1-based position.
    #[must_use]
    pub fn at(&self, ordinal: usize) -> Option<&str> {
        ordinal
            .checked_sub(1)
            .and_then(|i| self.entries.get(i))
            .map(|(identifier, _)| identifier.as_str())
    }

    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(identifier, _)| identifier.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TrackedResource)> {
        self.entries
            .iter()
            .map(|(identifier, resource)| (identifier.as_str(), resource))
    }

    fn position(&self, identifier: &str) -> Option<usize> {
        self.entries.iter().position(|(key, _)| key == identifier)
    }
}

impl Serialize for Resources {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (identifier, resource) in &self.entries {
            map.serialize_entry(identifier, resource)?;
        }
        map.end()
    }
}

struct ResourcesVisitor;

impl<'de> Visitor<'de> for ResourcesVisitor {
    type Value = Resources;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a map of URL to tracked page")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Resources, A::Error> {
        let mut resources = Resources::default();
        while let Some((identifier, resource)) =
            access.next_entry::<String, TrackedResource>()?
        {
            resources.insert(identifier, resource);
        }
        Ok(resources)
    }
}

impl<'de> Deserialize<'de> for Resources {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(ResourcesVisitor)
    }
}

/// Handle on the JSON data file.
#[derive(Debug, Clone)]
pub struct ResourceStore {
    path: PathBuf,
}

impl ResourceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the data file. A missing, unreadable or corrupt file yields an
    /// empty mapping.
    #[must_use]
    pub fn load(&self) -> Resources {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No data file at {}, starting empty", self.path.display());
                return Resources::default();
            }
            Err(e) => {
                warn!("Could not read {}: {e}", self.path.display());
                return Resources::default();
            }
        };

        serde_json::from_str(&content).unwrap_or_else(|e| {
            warn!("Ignoring unparseable data file {}: {e}", self.path.display());
            Resources::default()
        })
    }

    /// Replaces the data file with `resources`.
    ///
    /// Each save writes its own uniquely named temporary file next to the data
    /// file and renames it into place, so concurrent writers never expose a
    /// torn file. The temporary file is removed if the rename fails.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization, the temporary write or the rename fails.
    pub fn save(&self, resources: &Resources) -> Result<(), Error> {
        let content = serde_json::to_string_pretty(resources)?;
        let dir = self
            .path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.as_file().sync_all()?;
        // Dropping the returned file handle on error deletes the temporary.
        tmp.persist(&self.path).map_err(|e| Error::Io(e.error))?;
        debug!(
            "Saved {} record(s) to {}",
            resources.len(),
            self.path.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn record(fingerprint: &str) -> TrackedResource {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        TrackedResource::new(fingerprint.to_string(), at)
    }

    fn store_in(dir: &TempDir) -> ResourceStore {
        ResourceStore::new(dir.path().join("pages.json"))
    }

    #[test]
    fn test_missing_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        assert!(store_in(&dir).load().is_empty());
    }

    #[test]
    fn test_corrupt_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        fs::write(store.path(), "{ not json").unwrap();
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_insertion_order_survives_save_and_load() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let mut resources = Resources::default();
        for url in ["https://c.example", "https://a.example", "https://b.example"] {
            resources.insert(url, record(url));
        }
        store.save(&resources).unwrap();

        let loaded = store.load();
        assert_eq!(loaded, resources);
        assert_eq!(
            loaded.identifiers().collect::<Vec<_>>(),
            ["https://c.example", "https://a.example", "https://b.example"]
        );
    }

    #[test]
    fn test_save_of_load_leaves_file_unchanged() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let mut resources = Resources::default();
        resources.insert("https://example.com", record("abc"));
        store.save(&resources).unwrap();
        let before = fs::read_to_string(store.path()).unwrap();

        store.save(&store.load()).unwrap();

        assert_eq!(fs::read_to_string(store.path()).unwrap(), before);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_failed_rename_leaves_no_temporary_behind() {
        let dir = TempDir::new().unwrap();
        // A directory in place of the data file makes the final rename fail.
        let store = store_in(&dir);
        fs::create_dir(store.path()).unwrap();
        fs::write(store.path().join("keep"), "x").unwrap();

        let mut resources = Resources::default();
        resources.insert("https://example.com", record("abc"));
        assert!(matches!(store.save(&resources), Err(Error::Io(_))));

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(names, ["pages.json"]);
    }

    #[test]
    fn test_concurrent_saves_never_tear_the_file() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let mut seed = Resources::default();
        seed.insert("https://seed.example", record("seed"));
        store.save(&seed).unwrap();

        let writers: Vec<_> = (0..4)
            .map(|writer| {
                let store = store.clone();
                std::thread::spawn(move || {
                    let mut resources = Resources::default();
                    for i in 0..50 {
                        let url = format!("https://w{writer}.example/{i}");
                        resources.insert(url.as_str(), record(&"f".repeat(64)));
                        store.save(&resources).unwrap();
                    }
                })
            })
            .collect();

        let mut reads = 0;
        while writers.iter().any(|w| !w.is_finished()) || reads == 0 {
            let content = fs::read_to_string(store.path()).unwrap();
            serde_json::from_str::<Resources>(&content).expect("torn data file");
            reads += 1;
        }
        for writer in writers {
            writer.join().unwrap();
        }

        assert_eq!(store.load().len(), 50);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_reads_legacy_field_names() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        fs::write(
            store.path(),
            r#"{
              "https://example.com": {
                "hash": "abc",
                "lastChecked": "2024-05-01T12:00:00.000Z",
                "lastChanged": "2024-04-01T08:30:00.000Z",
                "checkCount": 7
              }
            }"#,
        )
        .unwrap();

        let resources = store.load();
        let page = resources.get("https://example.com").unwrap();
        assert_eq!(page.fingerprint, "abc");
        assert_eq!(page.check_count, 7);
        assert!(page.last_changed_at <= page.last_checked_at);
    }

    #[test]
    fn test_written_field_names() {
        let mut resources = Resources::default();
        resources.insert("https://example.com", record("abc"));
        let json: serde_json::Value = serde_json::to_value(&resources).unwrap();
        let page = &json["https://example.com"];
        assert_eq!(page["fingerprint"], "abc");
        assert_eq!(page["checkCount"], 1);
        assert_eq!(page["lastCheckedAt"], "2024-05-01T12:00:00Z");
        assert_eq!(page["lastChangedAt"], "2024-05-01T12:00:00Z");
    }

    #[test]
    fn test_duplicate_keys_keep_first_position() {
        let json = r#"{
            "https://a.example": {"fingerprint": "old", "lastCheckedAt": "2024-05-01T12:00:00Z", "lastChangedAt": "2024-05-01T12:00:00Z", "checkCount": 1},
            "https://b.example": {"fingerprint": "b", "lastCheckedAt": "2024-05-01T12:00:00Z", "lastChangedAt": "2024-05-01T12:00:00Z", "checkCount": 1},
            "https://a.example": {"fingerprint": "new", "lastCheckedAt": "2024-05-01T12:00:00Z", "lastChangedAt": "2024-05-01T12:00:00Z", "checkCount": 2}
        }"#;
        let resources: Resources = serde_json::from_str(json).unwrap();
        assert_eq!(resources.len(), 2);
        assert_eq!(resources.at(1), Some("https://a.example"));
        assert_eq!(resources.get("https://a.example").unwrap().fingerprint, "new");
    }

    #[test]
    fn test_remove_keeps_remaining_order() {
        let mut resources = Resources::default();
        for url in ["u1", "u2", "u3"] {
            resources.insert(url, record(url));
        }
        assert!(resources.remove("u2").is_some());
        assert!(resources.remove("u2").is_none());
        assert_eq!(resources.identifiers().collect::<Vec<_>>(), ["u1", "u3"]);
        assert_eq!(resources.at(2), Some("u3"));
        assert_eq!(resources.at(0), None);
        assert_eq!(resources.at(3), None);
    }

    // No cross-process locking: a stale snapshot saved later overwrites
    // whatever another writer saved in between.
    #[test]
    fn test_last_writer_wins() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let stale = store.load();

        let mut fresh = store.load();
        fresh.insert("https://added-elsewhere.example", record("x"));
        store.save(&fresh).unwrap();

        store.save(&stale).unwrap();
        assert!(store.load().is_empty());
    }
}
