//! Core types shared by every packsync module.
//!
//! Currently this is the error taxonomy; see [`error`].

pub mod error;

pub use error::{BridgeError, PacksyncError, Result};
