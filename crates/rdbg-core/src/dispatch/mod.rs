//! Runs commands on either side of a connection.
//!
//! - [`client`] – parses prompt input, intercepts help, sends commands and
//!   waits for replies or for the program to stop again.
//! - [`server`] – runs one received command against the paused program and
//!   reports the outcome as a value.
//! - [`interrupt_loop`] – keeps serving commands while the program is paused.

pub mod client;
pub mod interrupt_loop;
pub mod server;
