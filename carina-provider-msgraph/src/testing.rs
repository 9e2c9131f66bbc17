//! In-memory stand-in for the Graph policies API, shared by unit tests

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use carina_core::provider::BoxFuture;

use crate::client::ClientError;
use crate::policies::{AuthenticationStrengthPolicy, PolicyApi};

#[derive(Default)]
pub(crate) struct FakeState {
    pub policies: HashMap<String, AuthenticationStrengthPolicy>,
    /// Deleted policies still visible to GET, with remaining sightings
    pub lingering: HashMap<String, (AuthenticationStrengthPolicy, u32)>,
    pub linger_after_delete: u32,
    pub ids: Vec<String>,
    pub assign_empty_id: bool,
    /// Created policies are not visible to GET yet
    pub hide_created: bool,
    /// DELETE finds the policy already removed by someone else
    pub removed_before_delete: bool,
    pub fail_gets_with: Option<u16>,
    /// Bodies passed to update, as JSON
    pub updates: Vec<serde_json::Value>,
    pub gets: u32,
    /// GETs issued through a `without_retries` copy
    pub retry_free_gets: u32,
    pub deletes: u32,
}

#[derive(Clone, Default)]
pub(crate) struct FakePolicyApi {
    state: Arc<Mutex<FakeState>>,
    retries_disabled: bool,
}

fn not_found() -> ClientError {
    ClientError::UnexpectedStatus {
        status: 404,
        body: r#"{"error":{"code":"NotFound"}}"#.to_string(),
    }
}

impl FakePolicyApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    /// Ids handed out by create, in order
    pub fn with_ids(self, ids: &[&str]) -> Self {
        self.state().ids = ids.iter().rev().map(|s| s.to_string()).collect();
        self
    }

    pub fn returning_empty_id(self) -> Self {
        self.state().assign_empty_id = true;
        self
    }

    pub fn hiding_created(self) -> Self {
        self.state().hide_created = true;
        self
    }

    pub fn removed_before_delete(self) -> Self {
        self.state().removed_before_delete = true;
        self
    }

    pub fn lingering_after_delete(self, sightings: u32) -> Self {
        self.state().linger_after_delete = sightings;
        self
    }

    pub fn failing_gets_with(self, status: u16) -> Self {
        self.state().fail_gets_with = Some(status);
        self
    }

    /// Remove a policy behind the controller's back
    pub fn remove_out_of_band(&self, id: &str) {
        self.state().policies.remove(id);
    }

    pub fn contains(&self, id: &str) -> bool {
        self.state().policies.contains_key(id)
    }
}

impl PolicyApi for FakePolicyApi {
    fn create<'a>(
        &'a self,
        policy: &'a AuthenticationStrengthPolicy,
    ) -> BoxFuture<'a, Result<AuthenticationStrengthPolicy, ClientError>> {
        Box::pin(async move {
            let mut state = self.state();
            let id = if state.assign_empty_id {
                String::new()
            } else {
                let n = state.policies.len() + state.deletes as usize + 1;
                state
                    .ids
                    .pop()
                    .unwrap_or_else(|| format!("00000000-0000-0000-0000-{:012}", n))
            };
            let created = AuthenticationStrengthPolicy {
                id: Some(id.clone()),
                policy_type: Some("custom".to_string()),
                requirements_satisfied: Some("mfa".to_string()),
                created_date_time: Some("2026-10-19T10:00:00Z".to_string()),
                ..policy.clone()
            };
            if !id.is_empty() && !state.hide_created {
                state.policies.insert(id, created.clone());
            }
            Ok(created)
        })
    }

    fn get<'a>(
        &'a self,
        id: &'a str,
    ) -> BoxFuture<'a, Result<Option<AuthenticationStrengthPolicy>, ClientError>> {
        Box::pin(async move {
            let mut state = self.state();
            state.gets += 1;
            if self.retries_disabled {
                state.retry_free_gets += 1;
            }
            if let Some(status) = state.fail_gets_with {
                return Err(ClientError::UnexpectedStatus {
                    status,
                    body: "injected failure".to_string(),
                });
            }
            if let Some(policy) = state.policies.get(id) {
                return Ok(Some(policy.clone()));
            }
            if let Some((policy, remaining)) = state.lingering.get_mut(id) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Ok(Some(policy.clone()));
                }
                state.lingering.remove(id);
            }
            Ok(None)
        })
    }

    fn update<'a>(
        &'a self,
        id: &'a str,
        policy: &'a AuthenticationStrengthPolicy,
    ) -> BoxFuture<'a, Result<(), ClientError>> {
        Box::pin(async move {
            let mut state = self.state();
            state
                .updates
                .push(serde_json::to_value(policy).expect("policy serializes"));
            let existing = state.policies.get_mut(id).ok_or_else(not_found)?;
            if policy.display_name.is_some() {
                existing.display_name = policy.display_name.clone();
            }
            if policy.description.is_some() {
                existing.description = policy.description.clone();
            }
            existing.modified_date_time = Some("2026-10-19T11:00:00Z".to_string());
            Ok(())
        })
    }

    fn delete<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<(), ClientError>> {
        Box::pin(async move {
            let mut state = self.state();
            if state.removed_before_delete {
                state.policies.remove(id);
                return Err(not_found());
            }
            let policy = state.policies.remove(id).ok_or_else(not_found)?;
            state.deletes += 1;
            let sightings = state.linger_after_delete;
            state.lingering.insert(id.to_string(), (policy, sightings));
            Ok(())
        })
    }

    fn without_retries(&self) -> Self {
        Self {
            state: self.state.clone(),
            retries_disabled: true,
        }
    }
}
