//! Identity: password hashing, bearer tokens and the signup/login endpoints.

pub mod handlers;
pub mod password;
pub mod tokens;

pub use tokens::{Identity, TokenKeys};
