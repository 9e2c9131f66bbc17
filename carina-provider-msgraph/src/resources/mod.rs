//! Resource types handled by the Microsoft Graph provider
//!
//! Each resource module exposes its `ResourceType` definition and a lifecycle
//! controller that drives the matching Graph client.

pub mod authentication_strength_policy;

use carina_core::provider::ResourceType;

pub use authentication_strength_policy::{
    AuthenticationStrengthPolicyResource, AuthenticationStrengthPolicyType, Timeouts,
};

/// Returns all resource types supported by this provider
pub fn resource_types() -> Vec<Box<dyn ResourceType>> {
    vec![Box::new(AuthenticationStrengthPolicyType)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_type_names_are_namespaced() {
        for rt in resource_types() {
            assert!(rt.name().starts_with("msgraph."), "{}", rt.name());
            assert_eq!(rt.schema().resource_type, rt.name());
        }
    }
}
