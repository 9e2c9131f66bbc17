//! Authentication strength policies API
//!
//! `AuthenticationStrengthPoliciesClient` maps the four lifecycle calls onto
//! `/policies/authenticationStrengthPolicies`. Each call is one logical round
//! trip; retries are left to [`GraphClient`].

use carina_core::provider::BoxFuture;
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};

use crate::client::{ClientError, GraphClient, GraphRequest};
use crate::config::MsGraphConfig;
use crate::waiter::NotFound;

/// Collection path of the entity
pub const POLICIES_ENTITY: &str = "/policies/authenticationStrengthPolicies";

/// Authentication strength policy as exchanged with Graph
///
/// Read-only server fields are decoded but never serialized, and unset
/// fields are omitted so a PATCH body carries only what was set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationStrengthPolicy {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Creation-only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_combinations: Option<Vec<String>>,
    /// "builtIn" or "custom"
    #[serde(skip_serializing)]
    pub policy_type: Option<String>,
    #[serde(skip_serializing)]
    pub requirements_satisfied: Option<String>,
    #[serde(skip_serializing)]
    pub created_date_time: Option<String>,
    #[serde(skip_serializing)]
    pub modified_date_time: Option<String>,
}

impl AuthenticationStrengthPolicy {
    /// The mutable subset of this policy, suitable for a PATCH body
    pub fn update_payload(&self) -> Self {
        Self {
            display_name: self.display_name.clone(),
            description: self.description.clone(),
            ..Self::default()
        }
    }
}

/// Remote operations on authentication strength policies
///
/// The lifecycle controller is generic over this trait so it can be driven
/// against an in-memory double in tests.
pub trait PolicyApi: Send + Sync {
    /// POST, expecting `201 Created`
    fn create<'a>(
        &'a self,
        policy: &'a AuthenticationStrengthPolicy,
    ) -> BoxFuture<'a, Result<AuthenticationStrengthPolicy, ClientError>>;

    /// GET, expecting `200 OK`. `404` yields `Ok(None)`.
    fn get<'a>(
        &'a self,
        id: &'a str,
    ) -> BoxFuture<'a, Result<Option<AuthenticationStrengthPolicy>, ClientError>>;

    /// PATCH, expecting `204 No Content`. Only mutable fields are sent.
    fn update<'a>(
        &'a self,
        id: &'a str,
        policy: &'a AuthenticationStrengthPolicy,
    ) -> BoxFuture<'a, Result<(), ClientError>>;

    /// DELETE, expecting `204 No Content`
    fn delete<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<(), ClientError>>;

    /// A copy of this client with transport retries suppressed
    fn without_retries(&self) -> Self
    where
        Self: Sized;
}

/// Graph client for authentication strength policies
#[derive(Debug, Clone)]
pub struct AuthenticationStrengthPoliciesClient {
    base: GraphClient,
}

impl AuthenticationStrengthPoliciesClient {
    pub fn new(config: &MsGraphConfig) -> Result<Self, ClientError> {
        Ok(Self::from_base(GraphClient::new(config)?))
    }

    pub fn from_base(base: GraphClient) -> Self {
        Self { base }
    }

    pub fn base(&self) -> &GraphClient {
        &self.base
    }

    fn item_entity(id: &str) -> String {
        format!("{}/{}", POLICIES_ENTITY, id)
    }

    fn encode(policy: &AuthenticationStrengthPolicy) -> Result<serde_json::Value, ClientError> {
        serde_json::to_value(policy).map_err(|e| ClientError::Encode(e.to_string()))
    }

    pub async fn create_policy(
        &self,
        policy: &AuthenticationStrengthPolicy,
    ) -> Result<AuthenticationStrengthPolicy, ClientError> {
        let request = GraphRequest::new(Method::POST, POLICIES_ENTITY, &[StatusCode::CREATED])
            .with_body(Self::encode(policy)?)
            .tenant_scoped();
        self.base.send(request).await?.json()
    }

    pub async fn get_policy(
        &self,
        id: &str,
    ) -> Result<Option<AuthenticationStrengthPolicy>, ClientError> {
        let request = GraphRequest::new(Method::GET, Self::item_entity(id), &[StatusCode::OK])
            .retry_not_found();
        match self.base.send(request).await {
            Ok(resp) => resp.json().map(Some),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn update_policy(
        &self,
        id: &str,
        policy: &AuthenticationStrengthPolicy,
    ) -> Result<(), ClientError> {
        let request = GraphRequest::new(
            Method::PATCH,
            Self::item_entity(id),
            &[StatusCode::NO_CONTENT],
        )
        .with_body(Self::encode(&policy.update_payload())?)
        .retry_not_found();
        self.base.send(request).await.map(|_| ())
    }

    pub async fn delete_policy(&self, id: &str) -> Result<(), ClientError> {
        let request = GraphRequest::new(
            Method::DELETE,
            Self::item_entity(id),
            &[StatusCode::NO_CONTENT],
        )
        .retry_not_found();
        self.base.send(request).await.map(|_| ())
    }
}

impl PolicyApi for AuthenticationStrengthPoliciesClient {
    fn create<'a>(
        &'a self,
        policy: &'a AuthenticationStrengthPolicy,
    ) -> BoxFuture<'a, Result<AuthenticationStrengthPolicy, ClientError>> {
        Box::pin(self.create_policy(policy))
    }

    fn get<'a>(
        &'a self,
        id: &'a str,
    ) -> BoxFuture<'a, Result<Option<AuthenticationStrengthPolicy>, ClientError>> {
        Box::pin(self.get_policy(id))
    }

    fn update<'a>(
        &'a self,
        id: &'a str,
        policy: &'a AuthenticationStrengthPolicy,
    ) -> BoxFuture<'a, Result<(), ClientError>> {
        Box::pin(self.update_policy(id, policy))
    }

    fn delete<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<(), ClientError>> {
        Box::pin(self.delete_policy(id))
    }

    fn without_retries(&self) -> Self {
        Self::from_base(self.base.without_retries())
    }
}
