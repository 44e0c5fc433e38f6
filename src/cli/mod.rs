//! Command Line Interface (CLI) layer for HLS-VI.
//!
//! This module defines argument parsing (`args`), error types (`errors`),
//! and the orchestration logic (`runner`) for the `indices` (single granule
//! and batch) and `metadata` subcommands. It wires user-provided options to
//! the library functionality exposed via `hlsvi::api`.
//!
//! If you are embedding HLS-VI into another application, prefer using
//! the high-level `hlsvi::api` module instead of calling the CLI code.
pub mod args;
pub mod errors;
pub mod runner;

pub use args::CliArgs;
pub use runner::run;
