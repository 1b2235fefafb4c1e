pub mod archive;
pub mod auth;
pub mod cache;
pub mod cli;
pub mod collection;
pub mod error;
pub mod fetch;
pub mod manifest;
pub mod model;
pub mod skill;
pub mod sources;
pub mod util;

pub use error::{BhError, Result};

/// Package version from Cargo.toml.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
