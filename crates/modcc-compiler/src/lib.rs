#![doc = "Semantic analysis, utility visitor passes, and module lowering for the modcc membrane-mechanism compiler.\n\nPublic responsibilities:\n- Semantic analysis (`semantic::analyze`): per-procedure lvalue/arity checks, accumulated without stopping at the first error\n- Utility visitor passes (`visitors`): constant folding, symbolic linearity classification, function expansion, function inlining, variable renaming, flop accounting\n- Module lowering (`lowering::lower`): synthesizes `nrn_init`/`nrn_state`/`nrn_current` API methods, integrating linear `DERIVATIVE` blocks in closed form\n- An optional optimisation pass (`optimize::run`)\n- The printer contract (`printer::Printer`) that backend crates implement to emit target source\n\nSee also:\n- crates/modcc-compiler/src/passes.rs for the `Pass`/`PassManager` pipeline shape\n- crates/modcc-ast for the data these passes consume and produce\n"]
#![warn(missing_docs)]

pub mod lowering;
pub mod optimize;
pub mod passes;
pub mod printer;
pub mod semantic;
pub mod visitors;

use modcc_ast::diagnostics::Location;

/// Errors raised during semantic analysis of a single procedure or block.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SemanticError {
    /// An assignment or derivative statement targeted a symbol that is not
    /// a valid lvalue (spec §3.7 invariant 2).
    #[error("{location}: '{name}' is not assignable")]
    NotAnLvalue { name: String, location: Location },
    /// A call supplied a different number of arguments than the callee's
    /// prototype declares.
    #[error("{location}: '{name}' expects {expected} argument(s), found {found}")]
    ArityMismatch {
        name: String,
        expected: usize,
        found: usize,
        location: Location,
    },
    /// A `SOLVE` statement named a procedure that is not a `DERIVATIVE`
    /// block.
    #[error("{location}: SOLVE target '{name}' is not a DERIVATIVE block")]
    NotASolveTarget { name: String, location: Location },
}

/// Errors raised while lowering an analyzed module to its API methods.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum LoweringError {
    /// Semantic analysis reported at least one error; lowering refuses to
    /// run on an unsound module. Carries the rendered diagnostics rather
    /// than a single [`SemanticError`], since a procedure body can raise
    /// more than one.
    #[error("semantic analysis failed:\n{0}")]
    Semantic(String),
    /// A `DERIVATIVE` block integrated a state whose right-hand side is
    /// not linear in that state — this compiler only synthesizes a
    /// closed-form (`cnexp`) update, so nonlinear ODEs are a hard error
    /// (spec §4.8).
    #[error("{location}: unable to integrate nonlinear state ODEs ('{state}')")]
    NonlinearDerivative { state: String, location: Location },
    /// A `BREAKPOINT` current update was not linear in the membrane
    /// potential `v` (spec §4.8 point 2).
    #[error("{location}: current update functions must be a linear function of v ('{name}')")]
    NonlinearCurrent { name: String, location: Location },
    /// A `SOLVE` statement named a procedure that is not a `DERIVATIVE`
    /// block.
    #[error("{location}: SOLVE target '{target}' is not a DERIVATIVE block")]
    NotASolveTarget { target: String, location: Location },
    /// The module had no `INITIAL` block, which `nrn_init` clones
    /// verbatim (spec §4.8).
    #[error("module has no INITIAL block")]
    MissingInitial,
    /// The module had no `BREAKPOINT` block, which `nrn_current` walks to
    /// synthesize current and conductance accumulation.
    #[error("module has no BREAKPOINT block")]
    MissingBreakpoint,
    /// A user-declared procedure/function already uses one of the three
    /// reserved synthesized names (spec §3.7 invariant 3).
    #[error("'{name}' is a reserved API method name and cannot be user-defined")]
    ReservedNameCollision { name: String },
}

/// Crate-level result alias.
pub type Result<T> = std::result::Result<T, LoweringError>;
