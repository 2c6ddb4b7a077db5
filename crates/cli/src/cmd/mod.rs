mod depfile;
mod hash;
mod push;

pub use depfile::cmd_depfile;
pub use hash::cmd_hash;
pub use push::cmd_push;
