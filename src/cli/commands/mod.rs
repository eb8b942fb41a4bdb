//! Command implementations.

mod init;
mod serve;
mod status;

pub use init::cmd_init;
pub use serve::cmd_serve;
pub use status::cmd_status;
