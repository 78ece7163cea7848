//! Hardware Module
//!
//! Provides the drive inventory and the OS probe adapters used by the
//! node controller.

pub mod discovery;
pub mod probe;

pub use discovery::*;
pub use probe::*;
