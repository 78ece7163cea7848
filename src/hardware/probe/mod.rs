//! Probe Layer
//!
//! Host-facing adapters for block device listing, data detection and LVM,
//! all running commands through an [`Executor`](crate::domain::ports::Executor).

pub mod data;
pub mod executor;
pub mod lsblk;
pub mod lvm;

pub use data::DataDiscover;
pub use executor::{run_checked, CommandExecutor};
pub use lsblk::{parse_lsblk, Lsblk};
pub use lvm::LvmCli;
