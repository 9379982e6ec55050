//! Per-document state map and its on-disk form.
//!
//! Scope: one [`Workspace`] owns every open [`Document`] keyed by resource
//! name (usually a file path) plus the settings persisted with them. The file
//! is a single JSON object `{ settings, state: { key: DocumentState } }`,
//! loaded whole and written whole.
//!
//! Design Notes:
//! - Settings in the state file win over the config file; the config only
//!   seeds a workspace that has never been saved.
//! - Writes go to a sibling temp file first and are renamed into place.
//! - Imported documents are validated before they replace anything.

use crate::{Document, ReconcileOutcome};
use core_config::Settings;
use core_text::reconcile::EditPolicy;
use core_tree::{TreeError, TreeResult};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("state file io: {0}")]
    Io(#[from] std::io::Error),
    #[error("state json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("document {key}: {source}")]
    Tree {
        key: String,
        #[source]
        source: TreeError,
    },
    #[error("no document open for {0}")]
    UnknownDocument(String),
    #[error("workspace has no state file path")]
    NoPath,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub state: IndexMap<String, Document>,
}

#[derive(Debug, Default)]
pub struct Workspace {
    path: Option<PathBuf>,
    persisted: PersistedState,
}

impl Workspace {
    /// In-memory workspace with no backing file.
    pub fn new(settings: Settings) -> Self {
        Self {
            path: None,
            persisted: PersistedState {
                settings,
                state: IndexMap::new(),
            },
        }
    }

    /// Read `path`, or start fresh with `fallback` settings when it does not exist.
    pub fn load(path: impl Into<PathBuf>, fallback: Settings) -> Result<Self, PersistError> {
        let path = path.into();
        if !path.exists() {
            info!(target: "io", path = %path.display(), "state_missing_starting_fresh");
            let mut ws = Self::new(fallback);
            ws.path = Some(path);
            return Ok(ws);
        }
        let content = fs::read_to_string(&path)?;
        let persisted: PersistedState = serde_json::from_str(&content)?;
        for (key, doc) in &persisted.state {
            doc.validate().map_err(|source| PersistError::Tree {
                key: key.clone(),
                source,
            })?;
        }
        info!(target: "io", path = %path.display(), documents = persisted.state.len(), "state_loaded");
        Ok(Self {
            path: Some(path),
            persisted,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn save(&self) -> Result<(), PersistError> {
        let path = self.path.as_deref().ok_or(PersistError::NoPath)?;
        self.save_to(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), PersistError> {
        let json = serde_json::to_string_pretty(&self.persisted)?;
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, path)?;
        debug!(target: "io", path = %path.display(), documents = self.persisted.state.len(), "state_saved");
        Ok(())
    }

    pub fn settings(&self) -> &Settings {
        &self.persisted.settings
    }

    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.persisted.settings
    }

    pub fn edit_policy(&self) -> EditPolicy {
        if self.persisted.settings.editing.clone_on_edit {
            EditPolicy::CloneOnEdit
        } else {
            EditPolicy::InPlace
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.persisted.state.keys().map(String::as_str)
    }

    pub fn document(&self, key: &str) -> Option<&Document> {
        self.persisted.state.get(key)
    }

    pub fn document_mut(&mut self, key: &str) -> Option<&mut Document> {
        self.persisted.state.get_mut(key)
    }

    /// Open `key` with the host's current `text`. A known document is
    /// reconciled against the text; an unknown one is created around it.
    pub fn open(&mut self, key: &str, text: &str) -> TreeResult<ReconcileOutcome> {
        let policy = self.edit_policy();
        if let Some(doc) = self.persisted.state.get_mut(key) {
            // A request in flight when the state was saved can never finish.
            doc.set_generating(None);
            let outcome = doc.reconcile(text, policy)?;
            debug!(target: "io", key, ?outcome, "document_reopened");
            return Ok(outcome);
        }
        self.persisted
            .state
            .insert(key.to_string(), Document::new(text));
        debug!(target: "io", key, "document_created");
        Ok(ReconcileOutcome::Unchanged)
    }

    /// Move state to a new key (file rename). Returns false when `from` is unknown.
    pub fn rename(&mut self, from: &str, to: &str) -> bool {
        let Some(doc) = self.persisted.state.shift_remove(from) else {
            return false;
        };
        if self.persisted.state.insert(to.to_string(), doc).is_some() {
            warn!(target: "io", from, to, "rename_replaced_existing_state");
        }
        true
    }

    /// Drop all state for `key` (file deletion).
    pub fn remove(&mut self, key: &str) -> Option<Document> {
        self.persisted.state.shift_remove(key)
    }

    /// Release a document from active use. Its tree stays persisted; any
    /// pending generation is abandoned.
    pub fn close(&mut self, key: &str) -> bool {
        match self.persisted.state.get_mut(key) {
            Some(doc) => {
                doc.set_generating(None);
                true
            }
            None => false,
        }
    }

    /// Replace `key`'s state wholesale with a validated `DocumentState` JSON.
    pub fn import_document(&mut self, key: &str, json: &str) -> Result<(), PersistError> {
        let doc: Document = serde_json::from_str(json)?;
        doc.validate().map_err(|source| PersistError::Tree {
            key: key.to_string(),
            source,
        })?;
        info!(target: "io", key, nodes = doc.nodes().len(), "document_imported");
        self.persisted.state.insert(key.to_string(), doc);
        Ok(())
    }

    pub fn export_document(&self, key: &str) -> Result<String, PersistError> {
        let doc = self
            .persisted
            .state
            .get(key)
            .ok_or_else(|| PersistError::UnknownDocument(key.to_string()))?;
        Ok(serde_json::to_string_pretty(doc)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn export_then_import_is_identity() {
        let mut ws = Workspace::new(Settings::default());
        ws.open("story.txt", "Once ").unwrap();
        let d = ws.document_mut("story.txt").unwrap();
        let root = d.current().clone();
        let child = d.create_child(&root, "upon a time").unwrap();
        d.switch_to(&child).unwrap();
        d.hoist(&root).unwrap();

        let exported = ws.export_document("story.txt").unwrap();
        ws.import_document("copy.txt", &exported).unwrap();
        let a = ws.document("story.txt").unwrap();
        let b = ws.document("copy.txt").unwrap();
        assert_eq!(a.nodes(), b.nodes());
        assert_eq!(a.current(), b.current());
        assert_eq!(a, b);
    }

    #[test]
    fn import_rejects_invalid_tree_without_replacing() {
        let mut ws = Workspace::new(Settings::default());
        ws.open("k", "keep").unwrap();
        let bad = r#"{"current":"x","nodes":{"x":{"text":"a","parentId":"ghost"}}}"#;
        let err = ws.import_document("k", bad).unwrap_err();
        assert!(matches!(err, PersistError::Tree { .. }));
        assert_eq!(ws.document("k").unwrap().active_text().unwrap(), "keep");
    }

    #[test]
    fn reopen_reconciles_changed_text() {
        let mut ws = Workspace::new(Settings::default());
        ws.open("k", "Hello").unwrap();
        let outcome = ws.open("k", "Hello, world").unwrap();
        assert!(matches!(outcome, ReconcileOutcome::Rewritten(_)));
        assert_eq!(ws.document("k").unwrap().active_text().unwrap(), "Hello, world");
    }

    #[test]
    fn save_and_load_round_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("loom-state.json");
        let mut settings = Settings::default();
        settings.model.n = 2;
        let mut ws = Workspace::load(&path, settings).unwrap();
        ws.open("a.txt", "alpha").unwrap();
        ws.save().unwrap();

        // Persisted settings win over a different fallback.
        let loaded = Workspace::load(&path, Settings::default()).unwrap();
        assert_eq!(loaded.settings().model.n, 2);
        assert_eq!(
            loaded.document("a.txt").unwrap(),
            ws.document("a.txt").unwrap()
        );
    }

    #[test]
    fn load_refuses_state_with_corrupt_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("loom-state.json");
        let mut ws = Workspace::load(&path, Settings::default()).unwrap();
        ws.open("k", "Once").unwrap();
        ws.save().unwrap();

        let mut raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        raw["state"]["k"]["current"] = serde_json::Value::from("ghost");
        std::fs::write(&path, raw.to_string()).unwrap();

        let err = Workspace::load(&path, Settings::default()).unwrap_err();
        assert!(
            matches!(&err, PersistError::Tree { key, .. } if key == "k"),
            "unexpected error: {err:?}"
        );
    }

    #[test]
    fn rename_and_remove_follow_file_lifecycle() {
        let mut ws = Workspace::new(Settings::default());
        ws.open("old", "x").unwrap();
        assert!(ws.rename("old", "new"));
        assert!(!ws.rename("old", "other"));
        assert!(ws.document("new").is_some());
        assert!(ws.remove("new").is_some());
        assert_eq!(ws.keys().count(), 0);
    }

    #[test]
    fn close_abandons_pending_generation() {
        let mut ws = Workspace::new(Settings::default());
        ws.open("k", "x").unwrap();
        let root = ws.document("k").unwrap().current().clone();
        ws.document_mut("k").unwrap().set_generating(Some(root));
        assert!(ws.close("k"));
        assert!(ws.document("k").unwrap().generating().is_none());
    }

    #[test]
    fn edit_policy_follows_setting() {
        let mut ws = Workspace::new(Settings::default());
        assert_eq!(ws.edit_policy(), EditPolicy::InPlace);
        ws.settings_mut().set("editing.clone_on_edit", "true").unwrap();
        assert_eq!(ws.edit_policy(), EditPolicy::CloneOnEdit);
    }
}
