pub mod auth;
pub mod body;

pub use body::{JsonBody, QueryParams};
