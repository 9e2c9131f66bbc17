//! Carina Core
//!
//! Provider contract and resource state model shared by Carina providers.
//! A provider translates the declarative state record ([`resource::ResourceData`])
//! into calls against a remote API.

pub mod provider;
pub mod resource;
pub mod schema;
