//! Command implementations

pub mod connect;
pub mod deploy;
pub mod forward;
pub mod init;
pub mod logs;
pub mod run;
pub mod status;
pub mod stop;
pub mod undeploy;
pub mod version;
