//! Infrastructure layer for the client: the configuration file and the TCP
//! connection to the proxy.

pub mod config;
pub mod network;
