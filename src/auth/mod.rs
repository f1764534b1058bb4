//! Credential handling: password hashes and opaque token envelopes.

pub mod password;
pub mod token;

pub use password::{
    hash_password, hash_password_with_cost, is_password_matching, UNUSABLE_PASSWORD,
};
pub use token::{generate_token, is_token_matching, split_token};
