//! Source locations and the diagnostic record every compiler stage reports into.

use std::fmt;

/// A 1-based `(line, column)` position in a source buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Location {
    /// 1-based line number.
    pub line: u32,
    /// 1-based column number.
    pub column: u32,
}

impl Location {
    /// The location at the start of a buffer.
    pub fn start() -> Self {
        Self { line: 1, column: 1 }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Severity of a reported diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Recoverable; compilation may still succeed.
    Warning,
    /// Unrecoverable for the enclosing pass.
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// A single diagnostic record: where it happened and a human message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Warning or error.
    pub severity: Severity,
    /// Source location the diagnostic pertains to.
    pub location: Location,
    /// Human-readable message.
    pub message: String,
}

impl Diagnostic {
    /// Build an error diagnostic.
    pub fn error(location: Location, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            location,
            message: message.into(),
        }
    }

    /// Build a warning diagnostic.
    pub fn warning(location: Location, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            location,
            message: message.into(),
        }
    }
}

/// Accumulates diagnostics across a single module's compilation.
///
/// Lexer, parser, and semantic passes all append to one sink rather than
/// aborting on the first problem (per the "do not stop on first error"
/// discipline for per-procedure semantic analysis); lowering is the one
/// stage that is fatal on its first error, which callers express simply by
/// checking `has_errors()` immediately after the lowering call returns.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    records: Vec<Diagnostic>,
}

impl Diagnostics {
    /// An empty diagnostic sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an error at `location`.
    pub fn error(&mut self, location: Location, message: impl Into<String>) {
        self.records.push(Diagnostic::error(location, message));
    }

    /// Record a warning at `location`.
    pub fn warning(&mut self, location: Location, message: impl Into<String>) {
        self.records.push(Diagnostic::warning(location, message));
    }

    /// True if any diagnostic recorded so far is an error.
    pub fn has_errors(&self) -> bool {
        self.records.iter().any(|d| d.severity == Severity::Error)
    }

    /// Number of error-severity diagnostics recorded.
    pub fn num_errors(&self) -> usize {
        self.records
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .count()
    }

    /// All diagnostics recorded, in report order.
    pub fn records(&self) -> &[Diagnostic] {
        &self.records
    }

    /// Merge another sink's records into this one, preserving order.
    pub fn extend(&mut self, other: Diagnostics) {
        self.records.extend(other.records);
    }

    /// Render every diagnostic as `module_name:line:col: severity: message`.
    pub fn render(&self, module_name: &str) -> String {
        let mut out = String::new();
        for d in &self.records {
            out.push_str(&format!(
                "{}:{}: {}: {}\n",
                module_name, d.location, d.severity, d.message
            ));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_error_count_independent_of_warnings() {
        let mut diags = Diagnostics::new();
        diags.warning(Location::start(), "shadowed indexed variable");
        diags.error(Location { line: 3, column: 5 }, "undefined identifier 'foo'");
        assert_eq!(diags.num_errors(), 1);
        assert!(diags.has_errors());
    }

    #[test]
    fn render_includes_module_name_and_location() {
        let mut diags = Diagnostics::new();
        diags.error(Location { line: 2, column: 4 }, "bad thing");
        let text = diags.render("hh.mod");
        assert!(text.contains("hh.mod:2:4: error: bad thing"));
    }
}
