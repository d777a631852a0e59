#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::redundant_pub_crate)]

//! Diagnostic CLI for inspecting Autostack feature flags.
//!
//! Layout:
//! - `cli.rs`: argument parsing and command dispatch
//! - `commands/`: command handlers
//! - `client.rs`: shared HTTP client and command errors
//! - `output.rs`: renderers and formatting helpers
//! - `main.rs`: thin entrypoint delegating to `run()`

pub(crate) mod cli;
pub(crate) mod client;
pub(crate) mod commands;
pub(crate) mod output;

pub use cli::run;
