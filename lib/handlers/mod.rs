//! Command handlers.

mod common;
mod init_cmd;
mod publish_cmd;
mod validate_cmd;

//--------------------------------------------------------------------------------------------------
// Re-Exports
//--------------------------------------------------------------------------------------------------

pub use common::resolve_dir;
pub use init_cmd::init_connector;
pub use publish_cmd::publish_connector;
pub use validate_cmd::validate_connector;
