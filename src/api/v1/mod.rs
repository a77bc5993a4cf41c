//! V1 API handlers.

mod auth;
mod messages;
mod projects;
mod skills;
mod tasks;
mod volunteers;

#[cfg(test)]
mod auth_test;
#[cfg(test)]
mod messages_test;
#[cfg(test)]
mod tasks_test;

pub use auth::*;
pub use messages::*;
pub use projects::*;
pub use skills::*;
pub use tasks::*;
pub use volunteers::*;

pub use super::error::ErrorResponse;
