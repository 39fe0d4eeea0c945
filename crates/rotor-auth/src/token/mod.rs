//! Token generation, validation and rotation.
//!
//! - [`codec`] - HS512 JWT signing and verification
//! - [`hasher`] - Argon2id hashing of refresh tokens
//! - [`service`] - Issue and rotate orchestration

pub mod codec;
pub mod hasher;
pub mod service;

pub use codec::{Claims, CodecError, TokenCodec};
pub use hasher::SecretHasher;
pub use service::{TokenConfig, TokenService};
