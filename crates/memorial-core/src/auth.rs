//! Decides whether a delete or an owner-only edit may go ahead.
use crate::{
    credential::AdminCredential, store::ResourceStore, MemorialError, MemorialResult,
    ResourceType,
};

/// Credentials that came with a delete request. Either may be absent.
#[derive(Debug, Default, Clone)]
pub struct DeleteCredentials {
    pub owner: Option<String>,
    pub admin: Option<String>,
}

impl DeleteCredentials {
    pub fn owner(credential: impl Into<String>) -> Self {
        Self {
            owner: Some(credential.into()),
            admin: None,
        }
    }

    pub fn admin(secret: impl Into<String>) -> Self {
        Self {
            owner: None,
            admin: Some(secret.into()),
        }
    }
}

/// Succeeds when the post exists and either the admin secret or the post's
/// owner credential was presented. Does not touch the store.
///
/// # Errors
///
/// `NotFound` if the post does not exist, whatever the credentials.
/// `Forbidden` if it exists and no credential matches.
pub fn authorize_delete<S: ResourceStore + ?Sized>(
    store: &S,
    kind: ResourceType,
    id: &str,
    presented: &DeleteCredentials,
    configured_admin: Option<&AdminCredential>,
) -> MemorialResult<()> {
    if let (Some(admin), Some(presented_admin)) = (configured_admin, presented.admin.as_deref()) {
        if admin.matches(presented_admin) {
            store.find_by_id(kind, id)?;
            tracing::info!("admin override used to delete {kind} {id}");
            return Ok(());
        }
    }

    authorize_owner(store, kind, id, presented.owner.as_deref())
}

/// Succeeds only for the post's own credential; the admin secret does not
/// apply.
///
/// # Errors
///
/// `NotFound` if the post does not exist, `Forbidden` otherwise.
pub fn authorize_owner<S: ResourceStore + ?Sized>(
    store: &S,
    kind: ResourceType,
    id: &str,
    presented: Option<&str>,
) -> MemorialResult<()> {
    let post = store.find_by_id(kind, id)?;
    match presented {
        Some(owner) if post.owner_credential.matches(owner) => Ok(()),
        _ => Err(MemorialError::Forbidden),
    }
}
