//! Layered settings loader.
//!
//! Merges built-in defaults, a local settings file, and a server-distributed
//! secrets file into one effective [`Settings`]. The secrets layer may only
//! override credential fields; everything else in it is ignored.

use crate::model::CREDENTIAL_FIELDS;
use crate::{ConfigError, Settings};
use log::{debug, info, warn};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// Effective settings plus metadata about which layers were loaded.
#[derive(Debug, Clone)]
pub struct LayeredSettings {
    /// The merged, validated settings.
    pub settings: Settings,
    /// Metadata for each layer considered during load.
    pub layers: Vec<SettingsLayer>,
}

/// Origin for a single settings layer in the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsLayerSource {
    /// Built-in defaults (lowest precedence).
    Defaults,
    /// Locally persisted overrides.
    Local,
    /// Server-distributed secrets; credential fields only, always win.
    Secrets,
}

/// Metadata about a settings layer.
#[derive(Debug, Clone)]
pub struct SettingsLayer {
    /// Layer origin.
    pub source: SettingsLayerSource,
    /// Location on disk if present.
    pub path: Option<PathBuf>,
}

/// Options controlling settings layer locations.
#[derive(Debug, Clone, Default)]
pub struct SettingsOptions {
    /// Local settings file (JSON5), optional.
    pub settings_path: Option<PathBuf>,
    /// Secrets file (JSON5), optional.
    pub secrets_path: Option<PathBuf>,
}

impl SettingsOptions {
    /// Point the loader at a local settings file.
    pub fn with_settings_path(mut self, path: impl AsRef<Path>) -> Self {
        self.settings_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Point the loader at a secrets file.
    pub fn with_secrets_path(mut self, path: impl AsRef<Path>) -> Self {
        self.secrets_path = Some(path.as_ref().to_path_buf());
        self
    }
}

impl Settings {
    /// Load settings from one JSON5 file layered over defaults (no secrets).
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        info!("loading settings from path: {}", path.as_ref().display());
        let layered = Self::load_layered(
            SettingsOptions::default().with_settings_path(path),
        )?;
        Ok(layered.settings)
    }

    /// Load the full layer stack: defaults < local settings < secrets.
    ///
    /// Missing files are skipped; a present-but-broken file is an error.
    pub fn load_layered(options: SettingsOptions) -> Result<LayeredSettings, ConfigError> {
        let mut merged = serde_json::to_value(Settings::default())?;
        let mut layers = vec![SettingsLayer {
            source: SettingsLayerSource::Defaults,
            path: None,
        }];

        if let Some(path) = options.settings_path.as_deref()
            && let Some(value) = read_layer(path)?
        {
            debug!("loaded local settings layer (path={})", path.display());
            merge_json_values(&mut merged, &value);
            layers.push(SettingsLayer {
                source: SettingsLayerSource::Local,
                path: Some(path.to_path_buf()),
            });
        }

        if let Some(path) = options.secrets_path.as_deref()
            && let Some(value) = read_layer(path)?
        {
            debug!("loaded secrets layer (path={})", path.display());
            overlay_credentials(&mut merged, &value);
            layers.push(SettingsLayer {
                source: SettingsLayerSource::Secrets,
                path: Some(path.to_path_buf()),
            });
        }

        let settings: Settings = serde_json::from_value(merged)?;
        settings.validate()?;
        info!("layered settings loaded (layers={})", layers.len());
        Ok(LayeredSettings { settings, layers })
    }

    /// Persist the non-secret fields to the settings path as pretty JSON.
    ///
    /// Credential fields are stripped so secrets stay in the secrets file.
    pub fn persist(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let mut value = serde_json::to_value(self)?;
        if let Value::Object(map) = &mut value {
            for field in CREDENTIAL_FIELDS {
                map.remove(*field);
            }
        }
        let contents = serde_json::to_string_pretty(&value)?;
        fs::write(path.as_ref(), contents)?;
        info!("persisted settings (path={})", path.as_ref().display());
        Ok(())
    }

    /// Persist only the credential fields to the secrets path.
    pub fn persist_secrets(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let mut map = serde_json::Map::new();
        let value = serde_json::to_value(self)?;
        for field in CREDENTIAL_FIELDS {
            if let Some(entry) = value.get(*field) {
                map.insert((*field).to_string(), entry.clone());
            }
        }
        let contents = serde_json::to_string_pretty(&Value::Object(map))?;
        fs::write(path.as_ref(), contents)?;
        info!("persisted secrets (path={})", path.as_ref().display());
        Ok(())
    }
}

/// Read one optional layer file as a JSON value.
fn read_layer(path: &Path) -> Result<Option<Value>, ConfigError> {
    if !path.exists() {
        debug!("skipping missing settings layer (path={})", path.display());
        return Ok(None);
    }
    let contents = fs::read_to_string(path)?;
    let value: Value = json5::from_str(&contents)?;
    Ok(Some(value))
}

/// Merge overlay values into the base, recursively overriding objects.
fn merge_json_values(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(key) {
                    Some(existing) => merge_json_values(existing, value),
                    None => {
                        base_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base_slot, overlay_value) => {
            *base_slot = overlay_value.clone();
        }
    }
}

/// Overlay credential fields from a secrets layer; non-credential keys and
/// empty credential values are ignored.
fn overlay_credentials(base: &mut Value, secrets: &Value) {
    let (Value::Object(base_map), Value::Object(secrets_map)) = (base, secrets) else {
        warn!("secrets layer is not an object; ignoring");
        return;
    };
    for field in CREDENTIAL_FIELDS {
        match secrets_map.get(*field) {
            Some(Value::String(secret)) if !secret.is_empty() => {
                base_map.insert((*field).to_string(), Value::String(secret.clone()));
            }
            Some(_) | None => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Settings, SettingsOptions};
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn defaults_apply_when_no_layers_exist() {
        let layered = Settings::load_layered(SettingsOptions::default()).expect("load");
        assert_eq!(layered.settings, Settings::default());
        assert_eq!(layered.layers.len(), 1);
    }

    #[test]
    fn local_layer_overrides_defaults() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("settings.json5");
        fs::write(
            &path,
            r#"{ provider: "gemini", temperature: 0.2, gemini_model: "gemini-flash-latest" }"#,
        )
        .expect("write");

        let layered = Settings::load_layered(
            SettingsOptions::default().with_settings_path(&path),
        )
        .expect("load");
        assert_eq!(layered.settings.provider, "gemini");
        assert_eq!(layered.settings.temperature, 0.2);
        assert_eq!(layered.settings.gemini_model, "gemini-flash-latest");
        // Untouched fields keep their defaults.
        assert_eq!(layered.settings.model_name, "llama3.2:3b");
    }

    #[test]
    fn secrets_win_for_credential_fields_only() {
        let dir = tempdir().expect("tempdir");
        let settings_path = dir.path().join("settings.json5");
        let secrets_path = dir.path().join("secrets.json5");
        fs::write(
            &settings_path,
            r#"{ gemini_api_key: "local-key", model_name: "local-model" }"#,
        )
        .expect("write settings");
        fs::write(
            &secrets_path,
            r#"{ gemini_api_key: "server-key", model_name: "sneaky-model" }"#,
        )
        .expect("write secrets");

        let layered = Settings::load_layered(
            SettingsOptions::default()
                .with_settings_path(&settings_path)
                .with_secrets_path(&secrets_path),
        )
        .expect("load");
        assert_eq!(layered.settings.gemini_api_key, "server-key");
        // Non-credential keys in the secrets layer are ignored.
        assert_eq!(layered.settings.model_name, "local-model");
    }

    #[test]
    fn empty_secret_does_not_clobber_local_key() {
        let dir = tempdir().expect("tempdir");
        let settings_path = dir.path().join("settings.json5");
        let secrets_path = dir.path().join("secrets.json5");
        fs::write(&settings_path, r#"{ openrouter_api_key: "local-key" }"#).expect("write");
        fs::write(&secrets_path, r#"{ openrouter_api_key: "" }"#).expect("write");

        let layered = Settings::load_layered(
            SettingsOptions::default()
                .with_settings_path(&settings_path)
                .with_secrets_path(&secrets_path),
        )
        .expect("load");
        assert_eq!(layered.settings.openrouter_api_key, "local-key");
    }

    #[test]
    fn persist_strips_credentials_and_round_trips() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("settings.json");
        let settings = Settings {
            provider: "openrouter".to_string(),
            openrouter_api_key: "secret".to_string(),
            ..Settings::default()
        };
        settings.persist(&path).expect("persist");

        let written = fs::read_to_string(&path).expect("read");
        assert!(!written.contains("secret"));

        let reloaded = Settings::load_from_path(&path).expect("reload");
        assert_eq!(reloaded.provider, "openrouter");
        assert_eq!(reloaded.openrouter_api_key, "");
    }

    #[test]
    fn broken_layer_is_an_error() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("settings.json5");
        fs::write(&path, "{ not json5").expect("write");
        let result = Settings::load_layered(
            SettingsOptions::default().with_settings_path(&path),
        );
        assert!(result.is_err());
    }
}
