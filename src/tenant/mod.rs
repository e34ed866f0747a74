//! Maps an inbound `Host` to a tenant and rewrites the request path onto
//! that tenant's profile routes.

pub mod middleware;
pub mod resolver;

pub use middleware::tenant_rewrite;
pub use resolver::{is_domain_servable, resolve_tenant, Tenant, TenantError};
