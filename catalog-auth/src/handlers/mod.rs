//! HTTP handlers for catalog-auth.

pub mod auth;
pub mod authz;

pub use auth::*;
pub use authz::*;
