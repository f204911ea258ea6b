//! Shared newtypes.

mod id;

pub use id::{RoleId, UserId};
