pub mod init;
pub mod outline;
pub mod simulate;
pub mod validate;
