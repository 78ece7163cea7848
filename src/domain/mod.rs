//! Domain layer - port definitions shared by the controller and its adapters
//!
//! The reconciler only talks to hosts, drive managers and provisioners
//! through the traits in [`ports`].

pub mod ports;

pub use ports::*;
