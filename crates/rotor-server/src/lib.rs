pub mod config;
pub mod observability;
pub mod server;

pub use server::{RotorServer, ServerBuilder, build_app, build_state};
