pub mod config;
pub mod error;
pub mod path;
pub mod route;
pub mod store;
pub mod trie;

pub use config::GatewayConfig;
pub use error::AndoError;
pub use route::{RouteData, TargetMatch};
pub use store::RouteStore;
pub use trie::UrlTrie;
