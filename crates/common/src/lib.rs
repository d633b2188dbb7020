pub mod types;
pub mod utils;
pub mod env;
pub mod admin_http;
