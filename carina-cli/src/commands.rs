//! Command implementations
//!
//! Each command loads the state file, drives one provider operation and
//! writes the outcome back. Commands take the provider by reference so they
//! can run against any [`Provider`].

use std::path::Path;

use colored::Colorize;

use carina_core::provider::Provider;
use carina_core::resource::{ResourceData, ResourceId, Value};
use carina_core::schema::ResourceSchema;

use crate::state::StateFile;

/// Read desired attributes from a JSON object file
pub fn load_desired(id: &ResourceId, file: &Path) -> Result<ResourceData, String> {
    let content = std::fs::read_to_string(file)
        .map_err(|e| format!("Failed to read {}: {}", file.display(), e))?;
    let json: serde_json::Value = serde_json::from_str(&content)
        .map_err(|e| format!("Failed to parse {}: {}", file.display(), e))?;
    let serde_json::Value::Object(map) = json else {
        return Err(format!("{}: expected a JSON object", file.display()));
    };

    let mut data = ResourceData::new(id.resource_type.clone(), id.name.clone());
    for (key, value) in &map {
        data.set_opt(key.clone(), Value::from_json(value));
    }
    Ok(data)
}

fn schema_for(provider: &dyn Provider, resource_type: &str) -> Result<ResourceSchema, String> {
    provider
        .resource_types()
        .into_iter()
        .find(|rt| rt.name() == resource_type)
        .map(|rt| rt.schema())
        .ok_or_else(|| {
            format!(
                "Provider {} does not handle resource type {}",
                provider.name(),
                resource_type
            )
        })
}

fn load_state(state_path: &Path) -> Result<StateFile, String> {
    StateFile::load(state_path).map_err(|e| e.to_string())
}

fn save_state(state: &mut StateFile, state_path: &Path) -> Result<(), String> {
    state.save(state_path).map_err(|e| e.to_string())
}

fn tracked(state: &StateFile, id: &ResourceId) -> Result<ResourceData, String> {
    state
        .find_resource(&id.resource_type, &id.name)
        .map(|r| r.to_data())
        .ok_or_else(|| format!("{} is not in the state file", id))
}

pub async fn run_create(
    provider: &dyn Provider,
    state_path: &Path,
    id: &ResourceId,
    file: &Path,
) -> Result<(), String> {
    let mut state = load_state(state_path)?;
    if state.find_resource(&id.resource_type, &id.name).is_some() {
        return Err(format!(
            "{} already exists in the state file; use update or import",
            id
        ));
    }

    let mut data = load_desired(id, file)?;
    provider
        .create(&mut data)
        .await
        .map_err(|e| format!("Failed to create {}: {}", id, e))?;

    state.record(&data);
    save_state(&mut state, state_path)?;
    println!(
        "{} {} ({})",
        "Created".green().bold(),
        id,
        data.identifier().unwrap_or_default()
    );
    Ok(())
}

pub async fn run_refresh(
    provider: &dyn Provider,
    state_path: &Path,
    id: &ResourceId,
) -> Result<(), String> {
    let mut state = load_state(state_path)?;
    let mut data = tracked(&state, id)?;

    provider
        .read(&mut data)
        .await
        .map_err(|e| format!("Failed to refresh {}: {}", id, e))?;

    state.record(&data);
    save_state(&mut state, state_path)?;
    if data.exists() {
        println!("{} {}", "Refreshed".cyan().bold(), id);
    } else {
        println!(
            "{} {} no longer exists; removed from state",
            "Gone".yellow().bold(),
            id
        );
    }
    Ok(())
}

/// Apply the desired attributes, replacing the resource when a force-new
/// attribute changed
pub async fn run_update(
    provider: &dyn Provider,
    state_path: &Path,
    id: &ResourceId,
    file: &Path,
) -> Result<(), String> {
    let mut state = load_state(state_path)?;
    let mut prior = tracked(&state, id)?;
    let mut desired = load_desired(id, file)?;
    let schema = schema_for(provider, &id.resource_type)?;
    // Check before touching the remote object; a replacement deletes first
    schema.validate(desired.attributes()).map_err(|errors| {
        let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        format!("Invalid attributes for {}: {}", id, messages.join("; "))
    })?;

    let replace = schema.replacement_attributes(prior.attributes(), desired.attributes());
    if replace.is_empty() {
        if let Some(identifier) = prior.identifier() {
            desired.set_identifier(identifier);
        }
        provider
            .update(&mut desired)
            .await
            .map_err(|e| format!("Failed to update {}: {}", id, e))?;
        provider
            .read(&mut desired)
            .await
            .map_err(|e| format!("Failed to refresh {} after update: {}", id, e))?;
        state.record(&desired);
        save_state(&mut state, state_path)?;
        println!("{} {}", "Updated".yellow().bold(), id);
        return Ok(());
    }

    println!(
        "{} {} must be replaced ({} changed)",
        "-/+".magenta().bold(),
        id,
        replace.join(", ")
    );

    provider
        .delete(&mut prior)
        .await
        .map_err(|e| format!("Failed to delete {} for replacement: {}", id, e))?;
    state.record(&prior);
    save_state(&mut state, state_path)?;

    provider
        .create(&mut desired)
        .await
        .map_err(|e| format!("Failed to create replacement for {}: {}", id, e))?;
    state.record(&desired);
    save_state(&mut state, state_path)?;
    println!(
        "{} {} ({})",
        "Replaced".magenta().bold(),
        id,
        desired.identifier().unwrap_or_default()
    );
    Ok(())
}

pub async fn run_delete(
    provider: &dyn Provider,
    state_path: &Path,
    id: &ResourceId,
) -> Result<(), String> {
    let mut state = load_state(state_path)?;
    let mut data = tracked(&state, id)?;

    let result = provider.delete(&mut data).await;
    // Persist whatever the provider confirmed, even on failure
    state.record(&data);
    save_state(&mut state, state_path)?;
    result.map_err(|e| format!("Failed to delete {}: {}", id, e))?;

    println!("{} {}", "Deleted".red().bold(), id);
    Ok(())
}

pub async fn run_import(
    provider: &dyn Provider,
    state_path: &Path,
    id: &ResourceId,
    identifier: &str,
) -> Result<(), String> {
    let mut state = load_state(state_path)?;
    if state.find_resource(&id.resource_type, &id.name).is_some() {
        return Err(format!("{} is already managed", id));
    }

    let mut data = provider
        .import(id, identifier)
        .map_err(|e| format!("Failed to import {}: {}", id, e))?;
    provider
        .read(&mut data)
        .await
        .map_err(|e| format!("Failed to read {}: {}", id, e))?;
    if !data.exists() {
        return Err(format!(
            "Cannot import {}: no remote object with ID {:?}",
            id, identifier
        ));
    }

    state.record(&data);
    save_state(&mut state, state_path)?;
    println!("{} {} ({})", "Imported".green().bold(), id, identifier);
    Ok(())
}

pub fn run_show(state_path: &Path) -> Result<(), String> {
    let state = load_state(state_path)?;
    if state.resources.is_empty() {
        println!("{}", "No resources in state.".dimmed());
        return Ok(());
    }

    println!(
        "{}",
        format!("State serial {} ({})", state.serial, state.lineage).bold()
    );
    for resource in &state.resources {
        println!();
        println!(
            "{}.{} {}",
            resource.resource_type,
            resource.name.bold(),
            resource.identifier.dimmed()
        );
        let mut keys: Vec<_> = resource.attributes.keys().collect();
        keys.sort();
        for key in keys {
            println!("    {}: {}", key, resource.attributes[key]);
        }
    }
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;
    use carina_core::provider::{BoxFuture, ProviderError, ProviderResult, ResourceType};
    use carina_core::schema::{AttributeSchema, AttributeType, types};
    use std::collections::HashMap;
    use std::sync::Mutex;

    const POLICY: &str = "msgraph.authentication_strength_policy";

    struct PolicyType;

    impl ResourceType for PolicyType {
        fn name(&self) -> &'static str {
            POLICY
        }

        fn schema(&self) -> ResourceSchema {
            ResourceSchema::new(POLICY)
                .attribute(
                    AttributeSchema::new("display_name", types::non_empty_string()).required(),
                )
                .attribute(
                    AttributeSchema::new(
                        "allowed_combinations",
                        AttributeType::List(Box::new(AttributeType::String)),
                    )
                    .force_new(),
                )
        }
    }

    /// Provider keeping remote objects in memory
    #[derive(Default)]
    struct MemoryProvider {
        remote: Mutex<HashMap<String, HashMap<String, Value>>>,
        calls: Mutex<Vec<String>>,
        next_id: Mutex<u32>,
    }

    impl MemoryProvider {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn log(&self, call: &str) {
            self.calls.lock().unwrap().push(call.to_string());
        }
    }

    impl Provider for MemoryProvider {
        fn name(&self) -> &'static str {
            "memory"
        }

        fn resource_types(&self) -> Vec<Box<dyn ResourceType>> {
            vec![Box::new(PolicyType)]
        }

        fn create<'a>(&'a self, data: &'a mut ResourceData) -> BoxFuture<'a, ProviderResult<()>> {
            Box::pin(async move {
                self.log("create");
                let mut next = self.next_id.lock().unwrap();
                *next += 1;
                let id = format!("00000000-0000-0000-0000-{:012}", *next);
                self.remote
                    .lock()
                    .unwrap()
                    .insert(id.clone(), data.attributes().clone());
                data.set_identifier(id);
                Ok(())
            })
        }

        fn read<'a>(&'a self, data: &'a mut ResourceData) -> BoxFuture<'a, ProviderResult<()>> {
            Box::pin(async move {
                self.log("read");
                let identifier = data.identifier().unwrap_or_default().to_string();
                match self.remote.lock().unwrap().get(&identifier) {
                    Some(attrs) => {
                        for (k, v) in attrs {
                            data.set(k.clone(), v.clone());
                        }
                    }
                    None => data.clear_identifier(),
                }
                Ok(())
            })
        }

        fn update<'a>(&'a self, data: &'a mut ResourceData) -> BoxFuture<'a, ProviderResult<()>> {
            Box::pin(async move {
                self.log("update");
                let identifier = data.identifier().unwrap_or_default().to_string();
                let mut remote = self.remote.lock().unwrap();
                let attrs = remote
                    .get_mut(&identifier)
                    .ok_or_else(|| ProviderError::not_found("gone"))?;
                if let Some(v) = data.get("display_name") {
                    attrs.insert("display_name".to_string(), v.clone());
                }
                Ok(())
            })
        }

        fn delete<'a>(&'a self, data: &'a mut ResourceData) -> BoxFuture<'a, ProviderResult<()>> {
            Box::pin(async move {
                self.log("delete");
                if let Some(identifier) = data.identifier() {
                    self.remote.lock().unwrap().remove(identifier);
                }
                data.clear_identifier();
                Ok(())
            })
        }

        fn import(&self, id: &ResourceId, identifier: &str) -> ProviderResult<ResourceData> {
            Ok(ResourceData::new(id.resource_type.clone(), id.name.clone())
                .with_identifier(identifier))
        }
    }

    struct Workspace {
        dir: tempfile::TempDir,
    }

    impl Workspace {
        fn new() -> Self {
            Self {
                dir: tempfile::tempdir().unwrap(),
            }
        }

        fn state_path(&self) -> std::path::PathBuf {
            self.dir.path().join("state.json")
        }

        fn desired(&self, json: serde_json::Value) -> std::path::PathBuf {
            let path = self.dir.path().join("desired.json");
            std::fs::write(&path, json.to_string()).unwrap();
            path
        }

        fn state(&self) -> StateFile {
            StateFile::load(&self.state_path()).unwrap()
        }
    }

    fn id() -> ResourceId {
        ResourceId::new(POLICY, "mfa")
    }

    #[tokio::test]
    async fn test_create_records_identifier() {
        let ws = Workspace::new();
        let provider = MemoryProvider::default();
        let file = ws.desired(serde_json::json!({
            "display_name": "Phishing-resistant MFA",
            "allowed_combinations": ["fido2"]
        }));

        run_create(&provider, &ws.state_path(), &id(), &file)
            .await
            .unwrap();

        let state = ws.state();
        let resource = state.find_resource(POLICY, "mfa").unwrap();
        assert_eq!(resource.identifier, "00000000-0000-0000-0000-000000000001");
        assert_eq!(state.serial, 1);

        // A second create of the same name is refused
        let err = run_create(&provider, &ws.state_path(), &id(), &file)
            .await
            .unwrap_err();
        assert!(err.contains("already exists"));
    }

    #[tokio::test]
    async fn test_update_in_place_when_only_mutable_fields_change() {
        let ws = Workspace::new();
        let provider = MemoryProvider::default();
        let file = ws.desired(serde_json::json!({
            "display_name": "MFA",
            "allowed_combinations": ["fido2"]
        }));
        run_create(&provider, &ws.state_path(), &id(), &file)
            .await
            .unwrap();

        let file = ws.desired(serde_json::json!({
            "display_name": "Strong MFA",
            "allowed_combinations": ["fido2"]
        }));
        run_update(&provider, &ws.state_path(), &id(), &file)
            .await
            .unwrap();

        assert_eq!(provider.calls(), vec!["create", "update", "read"]);
        let state = ws.state();
        let resource = state.find_resource(POLICY, "mfa").unwrap();
        assert_eq!(resource.identifier, "00000000-0000-0000-0000-000000000001");
        assert_eq!(
            resource.attributes.get("display_name"),
            Some(&serde_json::json!("Strong MFA"))
        );
    }

    #[tokio::test]
    async fn test_update_replaces_on_force_new_change() {
        let ws = Workspace::new();
        let provider = MemoryProvider::default();
        let file = ws.desired(serde_json::json!({
            "display_name": "MFA",
            "allowed_combinations": ["fido2"]
        }));
        run_create(&provider, &ws.state_path(), &id(), &file)
            .await
            .unwrap();

        let file = ws.desired(serde_json::json!({
            "display_name": "MFA",
            "allowed_combinations": ["fido2", "x509CertificateMultiFactor"]
        }));
        run_update(&provider, &ws.state_path(), &id(), &file)
            .await
            .unwrap();

        assert_eq!(provider.calls(), vec!["create", "delete", "create"]);
        let state = ws.state();
        let resource = state.find_resource(POLICY, "mfa").unwrap();
        assert_eq!(resource.identifier, "00000000-0000-0000-0000-000000000002");
    }

    #[tokio::test]
    async fn test_invalid_replacement_keeps_live_resource() {
        let ws = Workspace::new();
        let provider = MemoryProvider::default();
        let file = ws.desired(serde_json::json!({
            "display_name": "MFA",
            "allowed_combinations": ["fido2"]
        }));
        run_create(&provider, &ws.state_path(), &id(), &file)
            .await
            .unwrap();

        let file = ws.desired(serde_json::json!({
            "display_name": "",
            "allowed_combinations": ["fido2", "x509CertificateMultiFactor"]
        }));
        let err = run_update(&provider, &ws.state_path(), &id(), &file)
            .await
            .unwrap_err();

        assert!(err.contains("display_name"), "{}", err);
        assert_eq!(provider.calls(), vec!["create"]);
        assert_eq!(provider.remote.lock().unwrap().len(), 1);
        let state = ws.state();
        let resource = state.find_resource(POLICY, "mfa").unwrap();
        assert_eq!(resource.identifier, "00000000-0000-0000-0000-000000000001");
    }

    #[tokio::test]
    async fn test_refresh_drops_vanished_resource() {
        let ws = Workspace::new();
        let provider = MemoryProvider::default();
        let file = ws.desired(serde_json::json!({"display_name": "MFA"}));
        run_create(&provider, &ws.state_path(), &id(), &file)
            .await
            .unwrap();

        provider.remote.lock().unwrap().clear();
        run_refresh(&provider, &ws.state_path(), &id()).await.unwrap();

        assert!(ws.state().resources.is_empty());
    }

    #[tokio::test]
    async fn test_delete_then_import() {
        let ws = Workspace::new();
        let provider = MemoryProvider::default();
        let file = ws.desired(serde_json::json!({"display_name": "MFA"}));
        run_create(&provider, &ws.state_path(), &id(), &file)
            .await
            .unwrap();

        run_delete(&provider, &ws.state_path(), &id()).await.unwrap();
        assert!(ws.state().resources.is_empty());

        let err = run_delete(&provider, &ws.state_path(), &id())
            .await
            .unwrap_err();
        assert!(err.contains("not in the state file"));

        // Importing an id the remote does not know is refused
        let err = run_import(
            &provider,
            &ws.state_path(),
            &id(),
            "00000000-0000-0000-0000-000000000001",
        )
        .await
        .unwrap_err();
        assert!(err.contains("no remote object"));
    }

    #[test]
    fn test_show_prints_nested_attributes() {
        let ws = Workspace::new();
        run_show(&ws.state_path()).unwrap();

        let mut state = StateFile::new();
        let data = ResourceData::new(POLICY, "mfa")
            .with_attribute("allowed_combinations", Value::string_list(["fido2"]))
            .with_attribute(
                "labels",
                Value::Map(HashMap::from([(
                    "tier".to_string(),
                    Value::string_list(["gold"]),
                )])),
            )
            .with_identifier("00000000-0000-0000-0000-000000000001");
        state.record(&data);
        state.save(&ws.state_path()).unwrap();

        run_show(&ws.state_path()).unwrap();
    }

    #[test]
    fn test_load_desired_rejects_non_object() {
        let ws = Workspace::new();
        let file = ws.desired(serde_json::json!(["fido2"]));
        let err = load_desired(&id(), &file).unwrap_err();
        assert!(err.contains("expected a JSON object"));
    }
}
