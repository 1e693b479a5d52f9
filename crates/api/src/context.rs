use realty_core::{TenantId, UserId};

/// Identity of the caller for a request.
///
/// Identification only: every route is tenant-scoped, but no access
/// control is applied on top of it.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RequestContext {
    tenant_id: TenantId,
    user_id: UserId,
}

impl RequestContext {
    pub fn new(tenant_id: TenantId, user_id: UserId) -> Self {
        Self { tenant_id, user_id }
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }
}
