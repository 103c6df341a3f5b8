//! Authentication, authorization and sessions

pub mod guard;
pub mod middleware;
pub mod rbac;
pub mod service;

pub use guard::Guard;
pub use middleware::AuthenticatedIdentity;
pub use rbac::PolicyEngine;
pub use service::{AuthService, AuthSession};
