use crate::error::{DomainError, DomainResult};
use crate::id::TenantId;

/// Marks records that belong to exactly one tenant.
///
/// Returns `None` for aggregates that have not been created yet.
pub trait TenantScoped {
    fn tenant_id(&self) -> Option<TenantId>;
}

/// Fail with `PermissionDenied` when `record` is owned by another tenant.
pub fn ensure_same_tenant<T: TenantScoped>(
    expected: TenantId,
    record: &T,
    what: &str,
) -> DomainResult<()> {
    match record.tenant_id() {
        Some(owner) if owner == expected => Ok(()),
        Some(_) => Err(DomainError::permission_denied(format!(
            "{what} belongs to another tenant"
        ))),
        None => Err(DomainError::not_found()),
    }
}
