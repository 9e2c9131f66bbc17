//! Carina Microsoft Graph Provider
//!
//! Manages Entra ID (Azure AD) directory objects through the Microsoft Graph
//! REST API.
//!
//! ## Module Structure
//!
//! - `config` - Endpoint, credentials and retry settings
//! - `client` - Shared HTTP plumbing with transport retries
//! - `policies` - Authentication strength policies client
//! - `waiter` - Polling until an eventually consistent delete converges
//! - `resources` - Resource type definitions and lifecycle controllers
//! - `provider` - MsGraphProvider implementation

pub mod client;
pub mod config;
pub mod policies;
pub mod provider;
pub mod resources;
pub mod waiter;

#[cfg(test)]
mod testing;

// Re-export main types
pub use config::MsGraphConfig;
pub use policies::{AuthenticationStrengthPoliciesClient, AuthenticationStrengthPolicy, PolicyApi};
pub use provider::MsGraphProvider;

use carina_core::provider::{BoxFuture, Provider, ProviderResult, ResourceType};
use carina_core::resource::{ResourceData, ResourceId};

use resources::resource_types;

// =============================================================================
// Provider Trait Implementation
// =============================================================================

impl<C: PolicyApi> Provider for MsGraphProvider<C> {
    fn name(&self) -> &'static str {
        "msgraph"
    }

    fn resource_types(&self) -> Vec<Box<dyn ResourceType>> {
        resource_types()
    }

    fn create<'a>(&'a self, data: &'a mut ResourceData) -> BoxFuture<'a, ProviderResult<()>> {
        Box::pin(async move { self.resource_for(&data.id)?.create(data).await })
    }

    fn read<'a>(&'a self, data: &'a mut ResourceData) -> BoxFuture<'a, ProviderResult<()>> {
        Box::pin(async move { self.resource_for(&data.id)?.read(data).await })
    }

    fn update<'a>(&'a self, data: &'a mut ResourceData) -> BoxFuture<'a, ProviderResult<()>> {
        Box::pin(async move { self.resource_for(&data.id)?.update(data).await })
    }

    fn delete<'a>(&'a self, data: &'a mut ResourceData) -> BoxFuture<'a, ProviderResult<()>> {
        Box::pin(async move { self.resource_for(&data.id)?.delete(data).await })
    }

    fn import(&self, id: &ResourceId, identifier: &str) -> ProviderResult<ResourceData> {
        self.resource_for(id)?.import(id, identifier)
    }
}
