//! Ambient logging support: the `tracing-subscriber` initializer
//! `ando-server` calls at startup, and the per-request log line the
//! data-plane router emits after every response.

pub mod access_log;
pub mod init;

pub use access_log::log_request;
pub use init::init_tracing;
