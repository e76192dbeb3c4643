//! App catalog port (excluded collaborator, consumed read-only).

use async_trait::async_trait;

use crate::domain::app::AppDescriptor;
use crate::domain::errors::CatalogError;

/// Read-only listing of deployable applications for an owner.
///
/// Catalog failures never affect deploy/stop: a deploy takes a repository
/// reference directly, not a catalog lookup.
#[async_trait]
pub trait AppCatalog: Send + Sync {
    async fn list_apps(&self, owner: &str) -> Result<Vec<AppDescriptor>, CatalogError>;
}
