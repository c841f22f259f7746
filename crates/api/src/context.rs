use stockledger_core::{TenantId, UserId};
use stockledger_infra::RequestContext;

/// Tenant context for a request.
///
/// This is immutable and must be present for all domain routes.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TenantContext {
    tenant_id: TenantId,
    actor: UserId,
}

impl TenantContext {
    pub fn new(tenant_id: TenantId, actor: UserId) -> Self {
        Self { tenant_id, actor }
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn actor(&self) -> UserId {
        self.actor
    }

    /// The ledger's view of this request.
    pub fn ledger(&self) -> RequestContext {
        RequestContext::new(self.tenant_id, self.actor)
    }
}
