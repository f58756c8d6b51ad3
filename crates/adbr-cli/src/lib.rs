//! adb-remote: Command-line interface
//!
//! Provides the `adb-remote` binary: `serve` on the machine the devices are
//! plugged into, `connect` on the machine that wants to use them.

pub mod commands;
pub mod output;
pub mod select;
