//! Error handling for the modcc CLI.

use thiserror::Error;

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

/// CLI-specific errors.
#[derive(Error, Debug)]
pub enum CliError {
    /// Lowering failed (spec §7 "Lowering" error kinds).
    #[error("{0}")]
    Lowering(#[from] modcc_compiler::LoweringError),

    /// Lexing, parsing, or semantic analysis reported at least one error;
    /// the diagnostics themselves have already been rendered to stderr by
    /// the time this is raised, so all this carries is the count needed
    /// for the "N error(s) reported" summary line (SPEC_FULL §[AMBIENT]
    /// Error aggregation detail).
    #[error("{0} error(s) reported")]
    CompileFailed(usize),

    /// `-t` named a backend other than `cpu`/`simd`/`gpu`.
    #[error("unknown backend target '{0}' (expected cpu, simd, or gpu)")]
    InvalidTarget(String),

    /// Malformed `modcc.toml`.
    #[error("invalid configuration file: {0}")]
    Config(#[from] toml::de::Error),

    /// IO error.
    #[error("{0}")]
    Io(#[from] std::io::Error),

    /// Generic error.
    #[error("{0}")]
    Generic(#[from] anyhow::Error),
}
