mod init;
mod sync;

pub use init::cmd_init;
pub use sync::cmd_sync;
