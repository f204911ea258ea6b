pub mod auth;
pub mod request_id;

pub use auth::{require_admin, AdminSession};
pub use request_id::{request_id, RequestId};
