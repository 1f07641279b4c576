//! Data-plane transports: plain HTTP/1.1 forwarding and the WebSocket relay.

pub mod http;
pub mod ws;

pub use http::HttpForwarder;
