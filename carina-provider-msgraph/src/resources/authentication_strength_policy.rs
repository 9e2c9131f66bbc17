//! Authentication strength policy resource
//!
//! Lifecycle controller for `msgraph.authentication_strength_policy`. The
//! controller owns no remote state of its own: it reads desired attributes
//! from the [`ResourceData`] record, calls the policies API, and writes back
//! what the server reports.

use std::future::Future;
use std::time::Duration;

use carina_core::provider::{ErrorKind, ProviderError, ProviderResult, ResourceType};
use carina_core::resource::{ResourceData, ResourceId, Value};
use carina_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types, validate_uuid};
use log::{debug, info};
use tokio::time::Instant;

use crate::client::ClientError;
use crate::policies::{AuthenticationStrengthPolicy, PolicyApi};
use crate::waiter::{self, NotFound};

pub const RESOURCE_TYPE: &str = "msgraph.authentication_strength_policy";

/// Resource type definition
pub struct AuthenticationStrengthPolicyType;

impl ResourceType for AuthenticationStrengthPolicyType {
    fn name(&self) -> &'static str {
        RESOURCE_TYPE
    }

    fn schema(&self) -> ResourceSchema {
        schema()
    }
}

/// Attribute schema
///
/// `allowed_combinations` is force-new: the update call never sends it, so
/// changing it means replacing the policy.
pub fn schema() -> ResourceSchema {
    ResourceSchema::new(RESOURCE_TYPE)
        .attribute(AttributeSchema::new("display_name", types::non_empty_string()).required())
        .attribute(AttributeSchema::new("description", types::non_empty_string()).required())
        .attribute(
            AttributeSchema::new(
                "allowed_combinations",
                AttributeType::List(Box::new(AttributeType::String)),
            )
            .required()
            .force_new(),
        )
        .attribute(AttributeSchema::new("policy_type", AttributeType::String).computed())
        .attribute(
            AttributeSchema::new("requirements_satisfied", AttributeType::String).computed(),
        )
}

/// Per-operation deadlines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub create: Duration,
    pub read: Duration,
    pub update: Duration,
    pub delete: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            create: Duration::from_secs(5 * 60),
            read: Duration::from_secs(5 * 60),
            update: Duration::from_secs(15 * 60),
            delete: Duration::from_secs(5 * 60),
        }
    }
}

/// Lifecycle controller for authentication strength policies
pub struct AuthenticationStrengthPolicyResource<C> {
    client: C,
    timeouts: Timeouts,
    poll_interval: Duration,
}

impl<C: PolicyApi> AuthenticationStrengthPolicyResource<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            timeouts: Timeouts::default(),
            poll_interval: Duration::from_secs(1),
        }
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Create the policy from the desired attributes, then refresh from the server
    pub async fn create(&self, data: &mut ResourceData) -> ProviderResult<()> {
        let deadline = Instant::now() + self.timeouts.create;
        let id = data.id.clone();
        within(deadline, "create", self.create_inner(data))
            .await
            .map_err(|e| e.for_resource(id))
    }

    /// Refresh the record; clears the identifier if the policy is gone
    pub async fn read(&self, data: &mut ResourceData) -> ProviderResult<()> {
        let deadline = Instant::now() + self.timeouts.read;
        let id = data.id.clone();
        within(deadline, "read", self.read_inner(data))
            .await
            .map_err(|e| e.for_resource(id))
    }

    /// Send display_name and description to the server
    ///
    /// The record is not refreshed afterwards.
    pub async fn update(&self, data: &mut ResourceData) -> ProviderResult<()> {
        let deadline = Instant::now() + self.timeouts.update;
        let id = data.id.clone();
        within(deadline, "update", self.update_inner(data))
            .await
            .map_err(|e| e.for_resource(id))
    }

    /// Delete the policy and wait until Graph no longer returns it
    pub async fn delete(&self, data: &mut ResourceData) -> ProviderResult<()> {
        let deadline = Instant::now() + self.timeouts.delete;
        let id = data.id.clone();
        within(deadline, "delete", self.delete_inner(data, deadline))
            .await
            .map_err(|e| e.for_resource(id))
    }

    /// Accept an existing policy id; it must be a UUID
    pub fn import(&self, id: &ResourceId, identifier: &str) -> ProviderResult<ResourceData> {
        validate_uuid(identifier).map_err(|e| {
            ProviderError::validation(format!("specified ID ({:?}) is not valid: {}", identifier, e))
                .for_resource(id.clone())
                .at_path("id")
        })?;
        Ok(ResourceData::new(id.resource_type.clone(), id.name.clone()).with_identifier(identifier))
    }

    async fn create_inner(&self, data: &mut ResourceData) -> ProviderResult<()> {
        validate_desired(data)?;

        let properties = AuthenticationStrengthPolicy {
            display_name: data.get_str("display_name").map(str::to_string),
            description: data.get_str("description").map(str::to_string),
            allowed_combinations: data.get_string_list("allowed_combinations"),
            ..Default::default()
        };

        let policy = self.client.create(&properties).await.map_err(|e| {
            client_error(e, "Could not create authentication strength policy")
        })?;

        let identifier = match policy.id.as_deref() {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => {
                return Err(ProviderError::bad_response(
                    "Object ID returned for authentication strength policy is nil/empty",
                ));
            }
        };

        info!("Created authentication strength policy {:?}", identifier);
        data.set_identifier(identifier.clone());

        self.read_inner(data).await?;
        if !data.exists() {
            return Err(ProviderError::not_found(format!(
                "Authentication strength policy with ID {:?} was not found after creation",
                identifier
            ))
            .at_path("id"));
        }
        Ok(())
    }

    async fn read_inner(&self, data: &mut ResourceData) -> ProviderResult<()> {
        let Some(identifier) = data.identifier().map(str::to_string) else {
            return Ok(());
        };

        match self.client.get(&identifier).await {
            Ok(Some(policy)) => {
                apply_policy(data, policy);
                Ok(())
            }
            Ok(None) => {
                debug!(
                    "Authentication Strength Policy with Object ID {:?} was not found - removing from state",
                    identifier
                );
                data.clear_identifier();
                Ok(())
            }
            Err(e) => Err(client_error(
                e,
                format!(
                    "Retrieving Authentication Strength Policy with object ID {:?}",
                    identifier
                ),
            )
            .at_path("id")),
        }
    }

    async fn update_inner(&self, data: &mut ResourceData) -> ProviderResult<()> {
        let identifier = data.identifier().map(str::to_string).ok_or_else(|| {
            ProviderError::not_found("Cannot update authentication strength policy without an ID")
                .at_path("id")
        })?;
        validate_desired(data)?;

        let properties = AuthenticationStrengthPolicy {
            display_name: data.get_str("display_name").map(str::to_string),
            description: data.get_str("description").map(str::to_string),
            ..Default::default()
        };

        self.client
            .update(&identifier, &properties)
            .await
            .map_err(|e| {
                client_error(
                    e,
                    format!(
                        "Could not update authentication strength policy with ID: {:?}",
                        identifier
                    ),
                )
            })?;

        info!("Updated authentication strength policy {:?}", identifier);
        Ok(())
    }

    async fn delete_inner(&self, data: &mut ResourceData, deadline: Instant) -> ProviderResult<()> {
        let Some(identifier) = data.identifier().map(str::to_string) else {
            return Ok(());
        };

        match self.client.get(&identifier).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                debug!(
                    "Authentication Strength Policy with ID {:?} already deleted",
                    identifier
                );
                data.clear_identifier();
                return Ok(());
            }
            Err(e) => {
                return Err(client_error(
                    e,
                    format!(
                        "Retrieving authentication strength policy with ID {:?}",
                        identifier
                    ),
                )
                .at_path("id"));
            }
        }

        match self.client.delete(&identifier).await {
            Ok(()) => {}
            // Removed by someone else between the probe and the delete
            Err(e) if e.is_not_found() => {
                debug!(
                    "Authentication Strength Policy with ID {:?} disappeared before deletion",
                    identifier
                );
            }
            Err(e) => {
                return Err(client_error(
                    e,
                    format!(
                        "Deleting authentication strength policy with ID {:?}",
                        identifier
                    ),
                )
                .at_path("id"));
            }
        }

        let probe_client = self.client.without_retries();
        let probe_client = &probe_client;
        let probe_id = identifier.as_str();
        let polls = waiter::wait_for_deletion(deadline, self.poll_interval, move || async move {
            probe_client.get(probe_id).await.map(|p| p.is_some())
        })
        .await
        .map_err(|e| {
            let kind = if e.is_timeout() {
                ErrorKind::Timeout
            } else {
                ErrorKind::Transport
            };
            ProviderError::new(format!(
                "Waiting for deletion of authentication strength policy with ID {:?}",
                identifier
            ))
            .with_kind(kind)
            .with_cause(e)
        })?;

        info!(
            "Deleted authentication strength policy {:?} (confirmed after {} polls)",
            identifier, polls
        );
        data.clear_identifier();
        Ok(())
    }
}

/// Run `fut` under `deadline`, reporting expiry as a timeout error
async fn within<T>(
    deadline: Instant,
    operation: &str,
    fut: impl Future<Output = ProviderResult<T>>,
) -> ProviderResult<T> {
    match tokio::time::timeout_at(deadline, fut).await {
        Ok(result) => result,
        Err(_) => Err(ProviderError::timeout(format!(
            "{} of authentication strength policy did not finish before its deadline",
            operation
        ))),
    }
}

fn validate_desired(data: &ResourceData) -> ProviderResult<()> {
    schema().validate(data.attributes()).map_err(|errors| {
        let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        ProviderError::validation(messages.join("; "))
    })
}

/// Write server-confirmed fields into the record
fn apply_policy(data: &mut ResourceData, policy: AuthenticationStrengthPolicy) {
    data.set_opt("display_name", policy.display_name.map(Value::String));
    data.set_opt("description", policy.description.map(Value::String));
    data.set_opt(
        "allowed_combinations",
        policy.allowed_combinations.map(Value::string_list),
    );
    data.set_opt("policy_type", policy.policy_type.map(Value::String));
    data.set_opt(
        "requirements_satisfied",
        policy.requirements_satisfied.map(Value::String),
    );
}

fn client_error(e: ClientError, message: impl Into<String>) -> ProviderError {
    let kind = match &e {
        ClientError::Decode(_) => ErrorKind::BadResponse,
        e if e.is_not_found() => ErrorKind::NotFound,
        _ => ErrorKind::Transport,
    };
    ProviderError::new(message).with_kind(kind).with_cause(e)
}
