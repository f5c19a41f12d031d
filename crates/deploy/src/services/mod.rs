//! External toolchain services.
//!
//! Each service is in its own submodule with:
//! - `cmd.rs` - Command builder for the service's CLI
//! - `mod.rs` - Handler and start/run logic

pub mod anvil;
pub mod forge;

pub use anvil::{AnvilCmdBuilder, AnvilHandler};
pub use forge::{Artifact, ForgeCreateCmdBuilder, ForgeDeployer};
