//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     RequiredScopes → policy.rs (ScopePolicyBuilder) → AuthorizationPolicy
//!     environment.rs (is in fabric?) ─┐
//!     AuthorizationPolicy ────────────┴→ gate.rs (EnvironmentGate) → Filter
//!
//! Incoming request:
//!     → authentication.rs (bearer token → CallerIdentity)
//!     → gate.rs (Filter::evaluate → allow / 401 / 403)
//!     → Pass to routing
//! ```
//!
//! # Design Decisions
//! - The filter variant is chosen once per process, never per request
//! - Fail closed under Enforce: no identity means no access
//! - Scope strings are enforced literally

pub mod authentication;
pub mod environment;
pub mod gate;
pub mod policy;

pub use authentication::{AuthenticationOptions, CallerIdentity, TokenValidator};
pub use environment::RuntimeEnvironmentContext;
pub use gate::{Decision, EnvironmentGate, Filter};
pub use policy::{AuthorizationPolicy, ScopePolicyBuilder};
