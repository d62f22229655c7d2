//! Tenant-id sources supplied by the host

use std::sync::RwLock;

use crate::model::TenantId;

/// Hands out the tenant the current unit of work acts for
pub trait TenantIdSource: Send + Sync {
    fn current_tenant_id(&self) -> TenantId;
}

impl<F> TenantIdSource for F
where
    F: Fn() -> TenantId + Send + Sync,
{
    fn current_tenant_id(&self) -> TenantId {
        self()
    }
}

/// Always the same tenant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedTenant(TenantId);

impl FixedTenant {
    pub fn new(tenant: impl Into<TenantId>) -> Self {
        Self(tenant.into())
    }
}

impl TenantIdSource for FixedTenant {
    fn current_tenant_id(&self) -> TenantId {
        self.0.clone()
    }
}

/// A tenant the host can switch at runtime, e.g. per request
#[derive(Debug)]
pub struct SwitchableTenant {
    current: RwLock<TenantId>,
}

impl SwitchableTenant {
    pub fn new(tenant: impl Into<TenantId>) -> Self {
        Self {
            current: RwLock::new(tenant.into()),
        }
    }

    pub fn switch_to(&self, tenant: impl Into<TenantId>) {
        let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
        *current = tenant.into();
    }
}

impl TenantIdSource for SwitchableTenant {
    fn current_tenant_id(&self) -> TenantId {
        self.current.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}
