//! `contextmesh-cli` library.

#[macro_use]
mod macros;

pub mod commands;
pub mod constants;
pub mod error;
pub mod format;
pub mod handlers;
pub mod manifest;
pub mod pack;
pub mod publish;
pub mod registry;
pub mod retry;
pub mod scaffold;
pub mod styles;
pub mod suggest;
pub mod validate;

//--------------------------------------------------------------------------------------------------
// Re-Exports
//--------------------------------------------------------------------------------------------------

pub use commands::*;
pub use constants::*;
pub use error::*;
pub use handlers::*;
pub use manifest::*;
pub use pack::*;
pub use publish::*;
pub use registry::*;
pub use retry::*;
pub use scaffold::*;
pub use validate::*;
