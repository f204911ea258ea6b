pub mod csrf;
pub mod csv;
pub mod jwt;
pub mod time;
