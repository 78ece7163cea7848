//! Drive Inventory Module
//!
//! Reports the node's physical drives from sysfs, with health from SMART.

pub mod scanner;
pub mod smart;

pub use scanner::*;
pub use smart::*;
