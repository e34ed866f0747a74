//! Bearer-token verification for tokens issued by the external identity provider.

pub mod claims;
pub(crate) mod extractors;

pub use extractors::AuthUser;
