//! Provider - Trait abstracting resource operations
//!
//! A Provider defines the lifecycle operations for a remote system (Microsoft
//! Graph, etc.). It is responsible for converting the declarative state record
//! into actual API calls and writing the observed state back.

use std::future::Future;
use std::pin::Pin;

use crate::resource::{ResourceData, ResourceId};
use crate::schema::ResourceSchema;

/// Category of a provider failure
///
/// Lets the orchestrating tool tell "we could not talk to the server" apart
/// from "the server answered with something unusable" or "the resource may
/// still exist".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Network failure or an unexpected HTTP status
    Transport,
    /// The resource does not exist where it was required to
    NotFound,
    /// The remote system answered successfully but broke its contract
    BadResponse,
    /// A deadline elapsed before the operation converged
    Timeout,
    /// Desired attributes or an imported identifier were rejected locally
    Validation,
    Other,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::Transport => "transport error",
            ErrorKind::NotFound => "not found",
            ErrorKind::BadResponse => "bad API response",
            ErrorKind::Timeout => "timed out",
            ErrorKind::Validation => "validation error",
            ErrorKind::Other => "error",
        };
        f.write_str(s)
    }
}

/// Error type for Provider operations
#[derive(Debug)]
pub struct ProviderError {
    pub kind: ErrorKind,
    pub message: String,
    pub resource_id: Option<ResourceId>,
    /// Attribute the failure relates to (e.g., "id" while refreshing)
    pub attribute_path: Option<String>,
    pub cause: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(ref id) = self.resource_id {
            write!(f, "[{}.{}] ", id.resource_type, id.name)?;
        }
        write!(f, "{}", self.message)?;
        if let Some(ref path) = self.attribute_path {
            write!(f, " (attribute: {})", path)?;
        }
        if let Some(ref cause) = self.cause {
            write!(f, ": {}", cause)?;
        }
        Ok(())
    }
}

impl std::error::Error for ProviderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_ref()
            .map(|e| e.as_ref() as &dyn std::error::Error)
    }
}

impl ProviderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Other,
            message: message.into(),
            resource_id: None,
            attribute_path: None,
            cause: None,
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(message).with_kind(ErrorKind::Transport)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(message).with_kind(ErrorKind::NotFound)
    }

    pub fn bad_response(message: impl Into<String>) -> Self {
        Self::new(message).with_kind(ErrorKind::BadResponse)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(message).with_kind(ErrorKind::Timeout)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(message).with_kind(ErrorKind::Validation)
    }

    pub fn with_kind(mut self, kind: ErrorKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn for_resource(mut self, id: ResourceId) -> Self {
        self.resource_id = Some(id);
        self
    }

    pub fn at_path(mut self, path: impl Into<String>) -> Self {
        self.attribute_path = Some(path.into());
        self
    }

    pub fn with_cause(mut self, cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    pub fn is_timeout(&self) -> bool {
        self.kind == ErrorKind::Timeout
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Return type for async operations
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Definition of resource types that a Provider can handle
pub trait ResourceType: Send + Sync {
    /// Resource type name (e.g., "msgraph.authentication_strength_policy")
    fn name(&self) -> &'static str;

    /// Attribute schema for this resource type
    fn schema(&self) -> ResourceSchema {
        ResourceSchema::new(self.name())
    }
}

/// Main Provider trait
///
/// Each remote system implements this trait. Operations receive the
/// per-instance state record and mutate it only between entry and exit;
/// on error the record may have been partially refreshed but never holds an
/// identifier the remote system did not report.
pub trait Provider: Send + Sync {
    /// Name of this Provider (e.g., "msgraph")
    fn name(&self) -> &'static str;

    /// List of resource types this Provider can handle
    fn resource_types(&self) -> Vec<Box<dyn ResourceType>>;

    /// Create the resource from the desired attributes in `data`
    ///
    /// On success `data` carries the remote identifier and the attributes
    /// the server reported.
    fn create<'a>(&'a self, data: &'a mut ResourceData) -> BoxFuture<'a, ProviderResult<()>>;

    /// Refresh `data` from the remote system
    ///
    /// Clears the identifier if the resource no longer exists.
    fn read<'a>(&'a self, data: &'a mut ResourceData) -> BoxFuture<'a, ProviderResult<()>>;

    /// Apply the in-place updatable attributes of `data`
    fn update<'a>(&'a self, data: &'a mut ResourceData) -> BoxFuture<'a, ProviderResult<()>>;

    /// Delete the resource and clear the identifier
    ///
    /// Deleting an already absent resource succeeds.
    fn delete<'a>(&'a self, data: &'a mut ResourceData) -> BoxFuture<'a, ProviderResult<()>>;

    /// Accept an externally supplied identifier for an existing resource
    ///
    /// Returns a record holding only the identifier; callers follow up with
    /// [`Provider::read`].
    fn import(&self, id: &ResourceId, identifier: &str) -> ProviderResult<ResourceData>;
}

/// Provider implementation for Box<dyn Provider>
/// This enables dynamic dispatch for Providers
impl Provider for Box<dyn Provider> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn resource_types(&self) -> Vec<Box<dyn ResourceType>> {
        (**self).resource_types()
    }

    fn create<'a>(&'a self, data: &'a mut ResourceData) -> BoxFuture<'a, ProviderResult<()>> {
        (**self).create(data)
    }

    fn read<'a>(&'a self, data: &'a mut ResourceData) -> BoxFuture<'a, ProviderResult<()>> {
        (**self).read(data)
    }

    fn update<'a>(&'a self, data: &'a mut ResourceData) -> BoxFuture<'a, ProviderResult<()>> {
        (**self).update(data)
    }

    fn delete<'a>(&'a self, data: &'a mut ResourceData) -> BoxFuture<'a, ProviderResult<()>> {
        (**self).delete(data)
    }

    fn import(&self, id: &ResourceId, identifier: &str) -> ProviderResult<ResourceData> {
        (**self).import(id, identifier)
    }
}
