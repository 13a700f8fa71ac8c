//! JSON document store with additive sibling overlays.
//!
//! The primary file is authoritative; other files in its directory may add
//! new properties or subtrees but never change existing ones.  The overlay is
//! computed as the `add`-only portion of the RFC 6902 diff from the primary
//! to each sibling, applied in lexicographic file-name order; `replace` and
//! `remove` operations in a sibling are silently ignored.

use json_patch::{Patch, PatchOperation};
use log::trace;
use serde_json::Value;
use snafu::{ensure, ResultExt};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::{error, FileStore, Result};

#[derive(Debug, Clone)]
pub struct JsonFileStore {
    file: FileStore,
}

impl JsonFileStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            file: FileStore::new(path),
        }
    }

    pub fn uri(&self) -> String {
        self.file.uri()
    }

    /// Loads the primary document, then overlays sibling files additively.
    /// A parse failure of the primary or of any sibling fails the load.
    pub fn load(&self) -> Result<Value> {
        let bytes = self.file.load()?;
        let mut doc: Value = serde_json::from_slice(&bytes).context(error::JsonParseSnafu {
            path: self.file.path(),
        })?;

        let parent = self.file.path().parent().unwrap_or_else(|| Path::new("."));
        let dir = if parent.as_os_str().is_empty() {
            Path::new(".")
        } else {
            parent
        };

        for entry in WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.context(error::ListDirectorySnafu { path: dir })?;
            if !entry.file_type().is_file() || entry.path() == self.file.path() {
                continue;
            }

            let sibling_bytes =
                std::fs::read(entry.path()).context(error::FileReadSnafu {
                    path: entry.path(),
                })?;
            let sibling: Value =
                serde_json::from_slice(&sibling_bytes).context(error::JsonParseSnafu {
                    path: entry.path(),
                })?;

            let additions: Vec<PatchOperation> = json_patch::diff(&doc, &sibling)
                .0
                .into_iter()
                .filter(|op| matches!(op, PatchOperation::Add(_)))
                .collect();
            trace!(
                "Overlaying {} addition(s) from '{}'",
                additions.len(),
                entry.path().display()
            );
            json_patch::patch(&mut doc, &Patch(additions)).context(error::OverlaySnafu {
                path: entry.path(),
            })?;
        }

        ensure!(
            doc.as_object().map_or(true, |o| !o.is_empty()),
            error::EmptyDocumentSnafu {
                path: self.file.path(),
            }
        );

        Ok(doc)
    }

    /// Pretty-prints the document and saves it through the atomic byte store.
    pub fn save(&self, doc: &Value) -> Result<()> {
        let pretty = serde_json::to_vec_pretty(doc).context(error::JsonSerializeSnafu {
            path: self.file.path(),
        })?;
        self.file.save(&pretty)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, doc: &Value) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, serde_json::to_vec(doc).unwrap()).unwrap();
        path
    }

    #[test]
    fn load_without_siblings() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "config.json", &json!({"router-id": "1.1.1.1"}));

        let store = JsonFileStore::new(path);
        assert_eq!(store.load().unwrap(), json!({"router-id": "1.1.1.1"}));
    }

    #[test]
    fn sibling_adds_new_subtree() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "config.json", &json!({"router-id": "1.1.1.1"}));
        write(&dir, "extra.json", &json!({"router-id": "1.1.1.1", "bgp": {}}));

        let store = JsonFileStore::new(path);
        assert_eq!(
            store.load().unwrap(),
            json!({"router-id": "1.1.1.1", "bgp": {}})
        );
    }

    #[test]
    fn sibling_never_overwrites_existing_values() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "config.json", &json!({"router-id": "1.1.1.1"}));
        write(&dir, "extra.json", &json!({"router-id": "9.9.9.9"}));

        let store = JsonFileStore::new(path);
        assert_eq!(store.load().unwrap(), json!({"router-id": "1.1.1.1"}));
    }

    #[test]
    fn siblings_apply_in_file_name_order() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "config.json", &json!({"a": 1}));
        // "b.json" overlays first, winning the race to add "x"; "c.json"'s
        // differing value for "x" is then a replacement, which is ignored.
        write(&dir, "b.json", &json!({"a": 1, "x": "from-b"}));
        write(&dir, "c.json", &json!({"a": 1, "x": "from-c"}));

        let store = JsonFileStore::new(path);
        assert_eq!(store.load().unwrap(), json!({"a": 1, "x": "from-b"}));
    }

    #[test]
    fn unparseable_sibling_fails_load() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "config.json", &json!({"a": 1}));
        fs::write(dir.path().join("junk.json"), b"not json").unwrap();

        let store = JsonFileStore::new(path);
        store.load().unwrap_err();
    }

    #[test]
    fn save_pretty_prints() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");

        let store = JsonFileStore::new(&path);
        store.save(&json!({"a": {"b": 1}})).unwrap();

        let on_disk = fs::read_to_string(&path).unwrap();
        assert!(on_disk.contains('\n'));
        assert_eq!(
            serde_json::from_str::<Value>(&on_disk).unwrap(),
            json!({"a": {"b": 1}})
        );
    }

    #[test]
    fn property_order_survives_load_and_save() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, br#"{"zebra": 1, "apple": 2, "mango": 3}"#).unwrap();

        let store = JsonFileStore::new(&path);
        let doc = store.load().unwrap();
        let keys: Vec<&String> = doc.as_object().unwrap().keys().collect();
        assert_eq!(keys, ["zebra", "apple", "mango"]);

        store.save(&doc).unwrap();
        let reloaded = store.load().unwrap();
        let keys: Vec<&String> = reloaded.as_object().unwrap().keys().collect();
        assert_eq!(keys, ["zebra", "apple", "mango"]);
    }
}
