//! State file structures for persisting managed resources

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use carina_core::resource::{ResourceData, Value};
use serde::{Deserialize, Serialize};

/// Errors reading or writing the state file
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("Failed to read state file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write state file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse state file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Unsupported state file version {found} (expected at most {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },
}

/// The state file persisted next to the user's configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateFile {
    /// State file format version
    pub version: u32,
    /// Monotonically increasing number for each state modification
    pub serial: u64,
    /// Unique identifier for this state lineage
    pub lineage: String,
    /// Version of carina-msgraph that last modified this state
    pub carina_version: String,
    /// All managed resources and their last known state
    pub resources: Vec<ResourceState>,
}

impl StateFile {
    /// Current state file format version
    pub const CURRENT_VERSION: u32 = 1;

    /// Default state file name
    pub const DEFAULT_PATH: &'static str = "carina-msgraph.state.json";

    pub fn new() -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            serial: 0,
            lineage: uuid::Uuid::new_v4().to_string(),
            carina_version: env!("CARGO_PKG_VERSION").to_string(),
            resources: Vec::new(),
        }
    }

    /// Load state from `path`; a missing file yields an empty state
    pub fn load(path: &Path) -> Result<Self, StateError> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let content = std::fs::read_to_string(path).map_err(|source| StateError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let state: StateFile =
            serde_json::from_str(&content).map_err(|source| StateError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        if state.version > Self::CURRENT_VERSION {
            return Err(StateError::UnsupportedVersion {
                found: state.version,
                supported: Self::CURRENT_VERSION,
            });
        }
        Ok(state)
    }

    /// Bump the serial and write to `path`
    pub fn save(&mut self, path: &Path) -> Result<(), StateError> {
        self.increment_serial();

        let write_err = |source| StateError::Write {
            path: path.to_path_buf(),
            source,
        };
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| write_err(std::io::Error::other(e)))?;

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }

        // Write to a sibling file first so a crash never leaves a truncated state
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, content).map_err(write_err)?;
        std::fs::rename(&tmp, path).map_err(write_err)?;
        Ok(())
    }

    /// Increment serial and update version for a new state write
    pub fn increment_serial(&mut self) {
        self.serial += 1;
        self.carina_version = env!("CARGO_PKG_VERSION").to_string();
    }

    /// Find a resource by type and name
    pub fn find_resource(&self, resource_type: &str, name: &str) -> Option<&ResourceState> {
        self.resources
            .iter()
            .find(|r| r.resource_type == resource_type && r.name == name)
    }

    /// Add or update a resource in the state
    pub fn upsert_resource(&mut self, resource: ResourceState) {
        if let Some(existing) = self
            .resources
            .iter_mut()
            .find(|r| r.resource_type == resource.resource_type && r.name == resource.name)
        {
            *existing = resource;
        } else {
            self.resources.push(resource);
        }
    }

    /// Remove a resource from the state
    pub fn remove_resource(&mut self, resource_type: &str, name: &str) -> Option<ResourceState> {
        let pos = self
            .resources
            .iter()
            .position(|r| r.resource_type == resource_type && r.name == name)?;
        Some(self.resources.remove(pos))
    }

    /// Store `data`, or drop its entry when the resource no longer exists
    pub fn record(&mut self, data: &ResourceData) {
        if data.exists() {
            self.upsert_resource(ResourceState::from_data(data));
        } else {
            self.remove_resource(&data.id.resource_type, &data.id.name);
        }
    }
}

impl Default for StateFile {
    fn default() -> Self {
        Self::new()
    }
}

/// State of a single managed resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceState {
    /// Resource type (e.g., "msgraph.authentication_strength_policy")
    pub resource_type: String,
    /// Local name chosen by the user
    pub name: String,
    /// Identifier assigned by the remote system
    pub identifier: String,
    /// All attributes of the resource as JSON values
    pub attributes: HashMap<String, serde_json::Value>,
}

impl ResourceState {
    pub fn from_data(data: &ResourceData) -> Self {
        Self {
            resource_type: data.id.resource_type.clone(),
            name: data.id.name.clone(),
            identifier: data.identifier().unwrap_or_default().to_string(),
            attributes: data
                .attributes()
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        }
    }

    pub fn to_data(&self) -> ResourceData {
        let mut data = ResourceData::new(self.resource_type.clone(), self.name.clone());
        for (key, value) in &self.attributes {
            data.set_opt(key.clone(), Value::from_json(value));
        }
        data.set_identifier(self.identifier.clone());
        data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const POLICY: &str = "msgraph.authentication_strength_policy";

    fn policy_data(name: &str, id: &str) -> ResourceData {
        ResourceData::new(POLICY, name)
            .with_attribute("display_name", Value::from("Phishing-resistant MFA"))
            .with_attribute("allowed_combinations", Value::string_list(["fido2"]))
            .with_identifier(id)
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let state = StateFile::load(&dir.path().join("absent.json")).unwrap();
        assert_eq!(state.version, StateFile::CURRENT_VERSION);
        assert_eq!(state.serial, 0);
        assert!(state.resources.is_empty());
    }

    #[test]
    fn test_save_then_load_increments_serial() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");

        let mut state = StateFile::new();
        state.record(&policy_data("mfa", "11111111-2222-3333-4444-555555555555"));
        state.save(&path).unwrap();
        state.save(&path).unwrap();

        let loaded = StateFile::load(&path).unwrap();
        assert_eq!(loaded.serial, 2);
        assert_eq!(loaded.lineage, state.lineage);
        let resource = loaded.find_resource(POLICY, "mfa").unwrap();
        assert_eq!(resource.identifier, "11111111-2222-3333-4444-555555555555");
        assert_eq!(
            resource.attributes.get("allowed_combinations"),
            Some(&serde_json::json!(["fido2"]))
        );
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_record_removes_vanished_resource() {
        let mut state = StateFile::new();
        let mut data = policy_data("mfa", "11111111-2222-3333-4444-555555555555");
        state.record(&data);
        assert_eq!(state.resources.len(), 1);

        data.clear_identifier();
        state.record(&data);
        assert!(state.resources.is_empty());
    }

    #[test]
    fn test_resource_state_round_trips_data() {
        let data = policy_data("mfa", "11111111-2222-3333-4444-555555555555");
        let restored = ResourceState::from_data(&data).to_data();
        assert_eq!(restored, data);
    }

    #[test]
    fn test_rejects_newer_version_and_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        std::fs::write(
            &path,
            r#"{"version":99,"serial":1,"lineage":"x","carina_version":"9","resources":[]}"#,
        )
        .unwrap();
        assert!(matches!(
            StateFile::load(&path),
            Err(StateError::UnsupportedVersion { found: 99, .. })
        ));

        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(
            StateFile::load(&path),
            Err(StateError::Parse { .. })
        ));
    }
}
