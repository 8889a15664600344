//! User preferences persisted between runs.

use std::path::{Path, PathBuf};

use crate::foundation::error::{FramepassError, FramepassResult};
use crate::naming::{DEFAULT_MULTI_CHANNEL_PATTERN, DEFAULT_PATTERN, FilenamePattern};

/// File name of the preferences document inside the config directory.
pub const PREFS_FILE: &str = "framepass_prefs.json";

/// Environment variable overriding the config directory.
pub const CONFIG_DIR_ENV: &str = "FRAMEPASS_CONFIG_DIR";

/// Resolve the config directory: `explicit`, then [`CONFIG_DIR_ENV`], then the platform config
/// directory (`~/.config/framepass`, `%APPDATA%\framepass`).
pub fn config_dir(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(dir) = explicit {
        return Some(dir.to_path_buf());
    }
    if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV).filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(dir));
    }
    dirs::config_dir().map(|d| d.join("framepass"))
}

/// Saved output folder and filename pattern.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Preferences {
    /// Folder outputs go to when no folder is given for a run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_output_folder: Option<PathBuf>,
    /// Pattern used when no pattern is given for a run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename_pattern: Option<String>,
}

impl Preferences {
    /// Location of the preferences file in `dir`.
    pub fn path(dir: &Path) -> PathBuf {
        dir.join(PREFS_FILE)
    }

    /// Read preferences from `dir`. Never fails: a missing or corrupt file gives defaults, and a
    /// saved folder that no longer exists is dropped.
    pub fn load(dir: &Path) -> Self {
        let path = Self::path(dir);
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Self::default(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "could not read preferences");
                return Self::default();
            }
        };
        let mut prefs: Self = match serde_json::from_str(&text) {
            Ok(prefs) => prefs,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring corrupt preferences");
                return Self::default();
            }
        };
        if let Some(folder) = &prefs.default_output_folder
            && !folder.is_dir()
        {
            tracing::debug!(folder = %folder.display(), "saved output folder no longer exists");
            prefs.default_output_folder = None;
        }
        prefs
    }

    /// Write to `dir`, keeping keys this version does not know about.
    pub fn save(&self, dir: &Path) -> FramepassResult<()> {
        std::fs::create_dir_all(dir).map_err(|e| {
            FramepassError::io(format!("create config directory '{}'", dir.display()), e)
        })?;
        let path = Self::path(dir);

        let mut doc = std::fs::read_to_string(&path)
            .ok()
            .and_then(|text| serde_json::from_str::<serde_json::Value>(&text).ok())
            .and_then(|v| match v {
                serde_json::Value::Object(map) => Some(map),
                _ => None,
            })
            .unwrap_or_default();

        let ours = serde_json::to_value(self).map_err(|e| FramepassError::serde(e.to_string()))?;
        for key in ["default_output_folder", "filename_pattern"] {
            match ours.get(key) {
                Some(v) => {
                    doc.insert(key.to_string(), v.clone());
                }
                None => {
                    doc.remove(key);
                }
            }
        }

        let text = serde_json::to_string_pretty(&serde_json::Value::Object(doc))
            .map_err(|e| FramepassError::serde(e.to_string()))?;
        std::fs::write(&path, text)
            .map_err(|e| FramepassError::io(format!("write '{}'", path.display()), e))?;
        tracing::debug!(path = %path.display(), "saved preferences");
        Ok(())
    }

    /// Pattern for a run over `channel_count` channels: the saved one, else the built-in default
    /// for that count.
    pub fn pattern_for(&self, channel_count: usize) -> FramepassResult<FilenamePattern> {
        match &self.filename_pattern {
            Some(p) => FilenamePattern::new(p.as_str()),
            None if channel_count > 1 => FilenamePattern::new(DEFAULT_MULTI_CHANNEL_PATTERN),
            None => FilenamePattern::new(DEFAULT_PATTERN),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(Preferences::load(dir.path()), Preferences::default());
    }

    #[test]
    fn corrupt_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(Preferences::path(dir.path()), "{not json").unwrap();
        assert_eq!(Preferences::load(dir.path()), Preferences::default());
    }

    #[test]
    fn save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let prefs = Preferences {
            default_output_folder: Some(out.path().to_path_buf()),
            filename_pattern: Some("(FileName)_(Frame)".to_string()),
        };
        prefs.save(dir.path()).unwrap();
        assert_eq!(Preferences::load(dir.path()), prefs);
    }

    #[test]
    fn vanished_folder_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let prefs = Preferences {
            default_output_folder: Some(dir.path().join("gone")),
            filename_pattern: None,
        };
        prefs.save(dir.path()).unwrap();
        assert_eq!(Preferences::load(dir.path()).default_output_folder, None);
    }

    #[test]
    fn save_keeps_unknown_keys_and_clears_removed_ones() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            Preferences::path(dir.path()),
            r#"{"theme": "dark", "default_output_folder": "/old"}"#,
        )
        .unwrap();
        Preferences::default().save(dir.path()).unwrap();

        let text = std::fs::read_to_string(Preferences::path(dir.path())).unwrap();
        let v: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(v["theme"], "dark");
        assert!(v.get("default_output_folder").is_none());
    }

    #[test]
    fn pattern_defaults_follow_channel_count() {
        let prefs = Preferences::default();
        assert!(!prefs.pattern_for(1).unwrap().has_channel_token());
        assert!(prefs.pattern_for(3).unwrap().has_channel_token());
        let custom = Preferences {
            filename_pattern: Some("bad|name".to_string()),
            ..Default::default()
        };
        assert!(custom.pattern_for(1).is_err());
    }

    #[test]
    fn explicit_config_dir_wins() {
        let dir = config_dir(Some(Path::new("/tmp/fp"))).unwrap();
        assert_eq!(dir, PathBuf::from("/tmp/fp"));
    }
}
