//! Units: named study folders and their per-unit files.
//!
//! The data directory holds a `units.json` registry plus one folder per
//! unit (the unit name with spaces replaced by `_`):
//!
//! ```text
//! <data>/
//! ├── units.json
//! └── Cell_Biology/
//!     ├── notes.json        {"notes": "..."}
//!     ├── chat.json         [{"role": "user", "content": "..."}, ...]
//!     ├── analysis.json     last summary + concept map
//!     ├── resources/        uploaded files
//!     └── vector_index/     see index_store
//! ```
//!
//! Per-unit files are rewritten whole on every save. Missing or corrupt
//! per-unit files load as empty values so a damaged unit still opens.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::Utc;
use mindforge_core::models::{ChatMessage, SourceKind};
use mindforge_core::segment::SegmentStrategy;
use mindforge_core::study::ConceptMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::fsutil::{remove_dir_with_retry, write_json_atomic, RetryPolicy};

const REGISTRY_FILE: &str = "units.json";
const NOTES_FILE: &str = "notes.json";
const CHAT_FILE: &str = "chat.json";
const ANALYSIS_FILE: &str = "analysis.json";
const RESOURCES_DIR: &str = "resources";

/// A file copied into a unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub name: String,
    pub sha256: String,
    pub added_at: String,
}

/// Registry entry for one unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitInfo {
    pub created_at: String,
    pub folder: String,
    #[serde(default)]
    pub resources: Vec<Resource>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unit {
    pub name: String,
    pub info: UnitInfo,
}

/// Result of the last analysis, persisted so a reopened unit can show it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub document: String,
    pub source: SourceKind,
    pub strategy: SegmentStrategy,
    pub chunk_count: usize,
    /// Whether a retrieval index was built and saved.
    pub indexed: bool,
    pub summary: String,
    pub concept_map: ConceptMap,
    /// Leading text of the document, kept as quiz material.
    pub excerpt: String,
    pub analyzed_at: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct NotesFile {
    #[serde(default)]
    notes: String,
}

/// Folder name for a unit name.
pub fn folder_name(name: &str) -> String {
    name.replace(' ', "_")
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        bail!("Unit name cannot be empty");
    }
    if name.starts_with('.') || name.contains(['/', '\\']) {
        bail!("Unit name '{}' may not contain path separators or start with '.'", name);
    }
    Ok(())
}

fn read_or_default<T: DeserializeOwned + Default>(path: &Path) -> T {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return T::default(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "unreadable unit file; using empty value");
            return T::default();
        }
    };
    serde_json::from_slice(&bytes).unwrap_or_else(|e| {
        warn!(path = %path.display(), error = %e, "corrupt unit file; using empty value");
        T::default()
    })
}

/// Registry and per-unit file access rooted at the data directory.
#[derive(Debug, Clone)]
pub struct UnitStore {
    root: PathBuf,
}

impl UnitStore {
    /// Open (creating if needed) the data directory.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .with_context(|| format!("Failed to create data directory: {}", root.display()))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn registry_path(&self) -> PathBuf {
        self.root.join(REGISTRY_FILE)
    }

    fn load_registry(&self) -> Result<BTreeMap<String, UnitInfo>> {
        let path = self.registry_path();
        match fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .with_context(|| format!("Unit registry is corrupt: {}", path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
        }
    }

    fn save_registry(&self, registry: &BTreeMap<String, UnitInfo>) -> Result<()> {
        write_json_atomic(&self.registry_path(), registry)
    }

    /// All units, sorted by name.
    pub fn list(&self) -> Result<Vec<Unit>> {
        Ok(self
            .load_registry()?
            .into_iter()
            .map(|(name, info)| Unit { name, info })
            .collect())
    }

    pub fn get(&self, name: &str) -> Result<Unit> {
        let mut registry = self.load_registry()?;
        match registry.remove(name) {
            Some(info) => Ok(Unit {
                name: name.to_string(),
                info,
            }),
            None => bail!("Unit '{}' does not exist", name),
        }
    }

    pub fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.load_registry()?.contains_key(name))
    }

    /// Folder of an existing unit.
    pub fn unit_dir(&self, name: &str) -> Result<PathBuf> {
        Ok(self.root.join(self.get(name)?.info.folder))
    }

    /// Create a unit and its folder. Fails if the name is taken.
    pub fn create(&self, name: &str) -> Result<Unit> {
        let name = name.trim();
        validate_name(name)?;

        let mut registry = self.load_registry()?;
        if registry.contains_key(name) {
            bail!("Unit '{}' already exists", name);
        }
        let folder = folder_name(name);
        if let Some((other, _)) = registry.iter().find(|(_, info)| info.folder == folder) {
            bail!("Unit '{}' would share folder '{}' with '{}'", name, folder, other);
        }

        let dir = self.root.join(&folder);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create unit folder: {}", dir.display()))?;

        let info = UnitInfo {
            created_at: Utc::now().to_rfc3339(),
            folder,
            resources: Vec::new(),
        };
        registry.insert(name.to_string(), info.clone());
        self.save_registry(&registry)?;
        info!(unit = name, "created unit");

        Ok(Unit {
            name: name.to_string(),
            info,
        })
    }

    /// Remove a unit's folder and registry entry.
    ///
    /// Folder removal retries with backoff and ends with a forced pass;
    /// the registry entry is dropped only once the folder is gone.
    pub async fn delete(&self, name: &str) -> Result<()> {
        let unit = self.get(name)?;
        let dir = self.root.join(&unit.info.folder);
        remove_dir_with_retry(&dir, RetryPolicy::default()).await?;

        let mut registry = self.load_registry()?;
        registry.remove(name);
        self.save_registry(&registry)?;
        info!(unit = name, "deleted unit");
        Ok(())
    }

    /// Copy `src` into the unit's `resources/` folder and record it.
    ///
    /// Re-adding a file with the same name replaces the earlier copy.
    pub fn add_resource(&self, name: &str, src: &Path) -> Result<PathBuf> {
        let mut registry = self.load_registry()?;
        let info = registry
            .get_mut(name)
            .with_context(|| format!("Unit '{}' does not exist", name))?;

        let file_name = src
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .with_context(|| format!("Not a file: {}", src.display()))?;
        let bytes = fs::read(src).with_context(|| format!("Failed to read {}", src.display()))?;

        let dest_dir = self.root.join(&info.folder).join(RESOURCES_DIR);
        fs::create_dir_all(&dest_dir)
            .with_context(|| format!("Failed to create {}", dest_dir.display()))?;
        let dest = dest_dir.join(&file_name);
        fs::write(&dest, &bytes).with_context(|| format!("Failed to write {}", dest.display()))?;

        let resource = Resource {
            name: file_name,
            sha256: format!("{:x}", Sha256::digest(&bytes)),
            added_at: Utc::now().to_rfc3339(),
        };
        info.resources.retain(|r| r.name != resource.name);
        info.resources.push(resource);
        self.save_registry(&registry)?;
        Ok(dest)
    }

    /// Path of a stored resource.
    pub fn resource_path(&self, name: &str, resource: &str) -> Result<PathBuf> {
        Ok(self.unit_dir(name)?.join(RESOURCES_DIR).join(resource))
    }

    pub fn load_notes(&self, name: &str) -> Result<String> {
        let file: NotesFile = read_or_default(&self.unit_dir(name)?.join(NOTES_FILE));
        Ok(file.notes)
    }

    pub fn save_notes(&self, name: &str, notes: &str) -> Result<()> {
        let file = NotesFile {
            notes: notes.to_string(),
        };
        write_json_atomic(&self.unit_dir(name)?.join(NOTES_FILE), &file)
    }

    pub fn load_chat(&self, name: &str) -> Result<Vec<ChatMessage>> {
        Ok(read_or_default(&self.unit_dir(name)?.join(CHAT_FILE)))
    }

    pub fn save_chat(&self, name: &str, messages: &[ChatMessage]) -> Result<()> {
        write_json_atomic(&self.unit_dir(name)?.join(CHAT_FILE), &messages)
    }

    pub fn load_analysis(&self, name: &str) -> Result<Option<Analysis>> {
        Ok(read_or_default(&self.unit_dir(name)?.join(ANALYSIS_FILE)))
    }

    pub fn save_analysis(&self, name: &str, analysis: &Analysis) -> Result<()> {
        write_json_atomic(&self.unit_dir(name)?.join(ANALYSIS_FILE), analysis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, UnitStore) {
        let tmp = TempDir::new().unwrap();
        let store = UnitStore::open(tmp.path().join("data")).unwrap();
        (tmp, store)
    }

    #[test]
    fn create_list_get() {
        let (_tmp, store) = store();
        store.create("Cell Biology").unwrap();
        store.create("Algebra").unwrap();

        let names: Vec<String> = store.list().unwrap().into_iter().map(|u| u.name).collect();
        assert_eq!(names, vec!["Algebra", "Cell Biology"]);

        let unit = store.get("Cell Biology").unwrap();
        assert_eq!(unit.info.folder, "Cell_Biology");
        assert!(store.root().join("Cell_Biology").is_dir());
    }

    #[test]
    fn duplicate_and_invalid_names_fail() {
        let (_tmp, store) = store();
        store.create("Physics").unwrap();
        assert!(store.create("Physics").is_err());
        assert!(store.create("   ").is_err());
        assert!(store.create("../escape").is_err());
        store.create("Quantum Physics").unwrap();
        assert!(store.create("Quantum_Physics").is_err());
    }

    #[test]
    fn notes_round_trip_with_wire_shape() {
        let (_tmp, store) = store();
        store.create("History").unwrap();
        assert_eq!(store.load_notes("History").unwrap(), "");
        store.save_notes("History", "Treaty of Westphalia, 1648").unwrap();
        assert_eq!(
            store.load_notes("History").unwrap(),
            "Treaty of Westphalia, 1648"
        );

        let raw = fs::read_to_string(store.unit_dir("History").unwrap().join(NOTES_FILE)).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["notes"], "Treaty of Westphalia, 1648");
    }

    #[test]
    fn corrupt_chat_loads_empty() {
        let (_tmp, store) = store();
        store.create("Chem").unwrap();
        let path = store.unit_dir("Chem").unwrap().join(CHAT_FILE);
        fs::write(&path, b"[{\"role\": \"user\"").unwrap();
        assert!(store.load_chat("Chem").unwrap().is_empty());
    }

    #[test]
    fn chat_round_trip() {
        let (_tmp, store) = store();
        store.create("Chem").unwrap();
        let chat = vec![ChatMessage::user("What is pH?"), ChatMessage::assistant("A scale.")];
        store.save_chat("Chem", &chat).unwrap();
        assert_eq!(store.load_chat("Chem").unwrap(), chat);
    }

    #[test]
    fn resources_are_copied_and_deduplicated() {
        let (tmp, store) = store();
        store.create("Bio").unwrap();
        let src = tmp.path().join("lecture.txt");
        fs::write(&src, "v1").unwrap();
        store.add_resource("Bio", &src).unwrap();
        fs::write(&src, "v2").unwrap();
        let dest = store.add_resource("Bio", &src).unwrap();

        assert_eq!(fs::read_to_string(dest).unwrap(), "v2");
        let resources = store.get("Bio").unwrap().info.resources;
        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].name, "lecture.txt");
    }

    #[tokio::test]
    async fn delete_removes_folder_and_entry() {
        let (_tmp, store) = store();
        store.create("Temp Unit").unwrap();
        store.save_notes("Temp Unit", "x").unwrap();
        let dir = store.unit_dir("Temp Unit").unwrap();

        store.delete("Temp Unit").await.unwrap();
        assert!(!dir.exists());
        assert!(!store.exists("Temp Unit").unwrap());
        assert!(store.delete("Temp Unit").await.is_err());
    }

    #[test]
    fn unknown_unit_errors() {
        let (_tmp, store) = store();
        assert!(store.get("nope").is_err());
        assert!(store.load_notes("nope").is_err());
    }
}
