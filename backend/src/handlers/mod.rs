pub mod audit_logs;
pub mod common;
pub mod console;
