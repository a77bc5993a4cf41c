//! Authentication and authorization.
//!
//! - `context`: the per-request principal value plumbed through call sites
//! - `password`: salted iterated digests, digest-only storage
//! - `token`: HMAC-signed bearer credentials
//! - `roles`: project-scoped authorization predicates

mod context;
mod password;
mod roles;
mod token;


pub use context::RequestContext;
pub use password::{hash_password, verify_password};
pub use roles::{can_manage_claim_weight, is_team_lead_of, is_team_member};
pub use token::{TokenClaims, issue_token, verify_token};
