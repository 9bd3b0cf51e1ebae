//! modcc CLI crate.
//!
//! Purpose:
//! - Provide the command-line entry point described in spec §6: a
//!   positional `.mod` source filename, `-o` output path, `-t`
//!   backend target selection, `-V` verbose tracing, and `-O` to enable
//!   the optional optimisation pass.
//!
//! Public responsibilities (library view):
//! - Re-export [`Args`] and [`run`] so integration tests can drive a
//!   compilation without spawning the `modcc` binary.
//! - Own the ambient concerns spec.md leaves unspecified: `modcc.toml`
//!   configuration discovery and the CLI error type.
//!
//! Pipeline: parse a `.mod` file (`modcc_ast::parse`) → semantic analysis
//! (`modcc_compiler::semantic::analyze`) → module lowering
//! (`modcc_compiler::lowering::lower`) → optional optimisation
//! (`modcc_compiler::optimize::run`) → hand the resolved `Module` to a
//! [`modcc_compiler::printer::Printer`].

pub mod cli;
pub mod config;
pub mod error;

pub use cli::{run, Args};
pub use error::{CliError, CliResult};
