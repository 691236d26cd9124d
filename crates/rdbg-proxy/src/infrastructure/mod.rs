//! Infrastructure layer for the proxy.
//!
//! Contains the OS-facing adapters: the TOML configuration file, the TCP
//! listener, and the simulated program that commands are executed against.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `rdbg_core`, but MUST NOT be imported by the `application` layer.

pub mod config;
pub mod network;
pub mod program;
