//! Application layer of the proxy.
//!
//! # Sub-modules
//!
//! - **`session`** – Drives one client connection from the first
//!   `Interrupt` push to detach or disconnect: it alternates between the
//!   interrupt loop (program paused) and advancing the program (program
//!   running), polling the client for signals in between.
//!
//! Nothing here opens sockets or reads files; the session only sees a
//! [`rdbg_core::Channel`] and a [`session::ProgramControl`] implementation.

pub mod session;
