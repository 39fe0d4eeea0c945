//! Session storage.
//!
//! # Implementations
//!
//! - [`InMemorySessionStore`] - process-local store for tests and single-node use
//! - `rotor-auth-postgres` - PostgreSQL storage backend

pub mod memory;
pub mod session;

pub use memory::InMemorySessionStore;
pub use session::SessionStore;
