pub mod create;
pub mod deploy;
pub mod init;
pub mod modify;
pub mod status;
pub mod test_local;
pub mod test_remote;
