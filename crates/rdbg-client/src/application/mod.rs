//! Application layer of the client.
//!
//! - **`console`** – The prompt loop: turns typed lines into commands, runs
//!   them through the core client dispatcher, and renders what they print.

pub mod console;
