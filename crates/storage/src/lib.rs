use directories::ProjectDirs;
use doc_model::Preferences;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const PREFS_SCHEMA_VERSION: u32 = 1;
const PREFS_FILE_NAME: &str = "preferences.json";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("unable to resolve a configuration directory")]
    NoConfigDirectory,
    #[error("preferences schema version {found} is newer than supported version {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Preference store rooted at a configuration directory.
#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PreferencesEnvelope {
    version: u32,
    preferences: Preferences,
}

impl Storage {
    pub fn from_default_project() -> Result<Self, StorageError> {
        let dirs = ProjectDirs::from("dev", "pdf-markup", "pdf-markup")
            .ok_or(StorageError::NoConfigDirectory)?;

        Ok(Self { root: dirs.config_dir().to_path_buf() })
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `root` when given, the platform config directory otherwise.
    pub fn resolve(root: Option<&Path>) -> Result<Self, StorageError> {
        match root {
            Some(root) => Ok(Self::with_root(root)),
            None => Self::from_default_project(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn preferences_path(&self) -> PathBuf {
        self.root.join(PREFS_FILE_NAME)
    }

    pub fn load_preferences(&self) -> Result<Preferences, StorageError> {
        let path = self.preferences_path();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no preferences file, using defaults");
            return Ok(Preferences::default());
        }

        let bytes = fs::read(&path)?;
        let envelope: PreferencesEnvelope = serde_json::from_slice(&bytes)?;
        if envelope.version > PREFS_SCHEMA_VERSION {
            return Err(StorageError::UnsupportedVersion {
                found: envelope.version,
                supported: PREFS_SCHEMA_VERSION,
            });
        }

        tracing::debug!(path = %path.display(), version = envelope.version, "loaded preferences");
        Ok(envelope.preferences)
    }

    pub fn save_preferences(&self, preferences: &Preferences) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root)?;

        let envelope =
            PreferencesEnvelope { version: PREFS_SCHEMA_VERSION, preferences: preferences.clone() };

        let bytes = serde_json::to_vec_pretty(&envelope)?;
        fs::write(self.preferences_path(), bytes)?;
        tracing::debug!(root = %self.root.display(), "saved preferences");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use doc_model::ToolKind;

    #[test]
    fn preferences_round_trip() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let store = Storage::with_root(temp.path().join("nested"));

        let prefs = Preferences {
            default_tool: ToolKind::Text,
            export_file_name: "redacted.pdf".to_owned(),
            export_scale: 3.0,
            log_filter: "debug".to_owned(),
        };

        store.save_preferences(&prefs).expect("save should succeed");
        let loaded = store.load_preferences().expect("load should succeed");

        assert_eq!(loaded, prefs);
    }

    #[test]
    fn load_defaults_when_file_absent() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let store = Storage::with_root(temp.path());

        let loaded = store.load_preferences().expect("load should succeed");
        assert_eq!(loaded, Preferences::default());
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let store = Storage::with_root(temp.path());
        fs::write(
            store.preferences_path(),
            r#"{"version":1,"preferences":{"default_tool":"erase"}}"#,
        )
        .expect("write should succeed");

        let loaded = store.load_preferences().expect("load should succeed");
        assert_eq!(loaded.default_tool, ToolKind::Erase);
        assert_eq!(loaded.export_file_name, doc_model::DEFAULT_EXPORT_FILE_NAME);
    }

    #[test]
    fn newer_schema_is_rejected() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let store = Storage::with_root(temp.path());
        fs::write(store.preferences_path(), r#"{"version":9,"preferences":{}}"#)
            .expect("write should succeed");

        let err = store.load_preferences().expect_err("version 9 is unknown");
        assert!(matches!(err, StorageError::UnsupportedVersion { found: 9, supported: 1 }));
    }

    #[test]
    fn corrupt_file_is_a_serde_error() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let store = Storage::with_root(temp.path());
        fs::write(store.preferences_path(), b"{not json").expect("write should succeed");

        assert!(matches!(store.load_preferences(), Err(StorageError::Serde(_))));
    }

    #[test]
    fn resolve_prefers_explicit_root() {
        let store = Storage::resolve(Some(Path::new("/tmp/pdf-markup-prefs"))).expect("resolve");
        assert_eq!(store.root(), Path::new("/tmp/pdf-markup-prefs"));
    }
}
