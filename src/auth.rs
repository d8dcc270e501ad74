//! Credential wrappers and the bearer session record.

pub mod secret;
pub mod session;

pub use secret::*;
pub use session::*;
