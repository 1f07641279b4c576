//! The REST control plane (spec §4.H): authenticated CRUD over the live
//! routing table, logically and physically separate from the data-plane
//! listener that `ando-server` also binds.

pub mod handlers;
pub mod middleware;
pub mod persist;
pub mod server;

pub use server::AdminState;
