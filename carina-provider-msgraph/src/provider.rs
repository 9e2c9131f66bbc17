//! MsGraphProvider - routes resource records to their lifecycle controllers

use carina_core::provider::{ProviderError, ProviderResult};
use carina_core::resource::ResourceId;

use crate::config::MsGraphConfig;
use crate::policies::{AuthenticationStrengthPoliciesClient, PolicyApi};
use crate::resources::authentication_strength_policy::{self, AuthenticationStrengthPolicyResource};
use crate::resources::Timeouts;

/// Microsoft Graph Provider
pub struct MsGraphProvider<C = AuthenticationStrengthPoliciesClient> {
    authentication_strength_policies: AuthenticationStrengthPolicyResource<C>,
}

impl MsGraphProvider {
    /// Create a provider talking to the Graph endpoint in `config`
    pub fn new(config: &MsGraphConfig) -> ProviderResult<Self> {
        config.validate().map_err(|e| {
            ProviderError::validation("Invalid Microsoft Graph configuration").with_cause(e)
        })?;
        let client = AuthenticationStrengthPoliciesClient::new(config).map_err(|e| {
            ProviderError::transport("Failed to build Microsoft Graph client").with_cause(e)
        })?;
        Ok(Self::with_client(client).with_poll_interval(config.poll_interval))
    }
}

impl<C: PolicyApi> MsGraphProvider<C> {
    pub fn with_client(client: C) -> Self {
        Self {
            authentication_strength_policies: AuthenticationStrengthPolicyResource::new(client),
        }
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.authentication_strength_policies =
            self.authentication_strength_policies.with_timeouts(timeouts);
        self
    }

    pub fn with_poll_interval(mut self, interval: std::time::Duration) -> Self {
        self.authentication_strength_policies = self
            .authentication_strength_policies
            .with_poll_interval(interval);
        self
    }

    /// Controller responsible for `id`'s resource type
    pub(crate) fn resource_for(
        &self,
        id: &ResourceId,
    ) -> ProviderResult<&AuthenticationStrengthPolicyResource<C>> {
        match id.resource_type.as_str() {
            authentication_strength_policy::RESOURCE_TYPE => {
                Ok(&self.authentication_strength_policies)
            }
            other => Err(ProviderError::new(format!("Unknown resource type: {}", other))
                .for_resource(id.clone())),
        }
    }
}
