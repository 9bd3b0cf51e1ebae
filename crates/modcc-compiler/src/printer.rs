//! The printer contract (spec §6): backend code generators are external
//! collaborators, out of scope for this crate. What *is* in scope is the
//! data contract a printer consumes — a fully-resolved [`Module`] with
//! synthesised API methods, each carrying its ordered input/output
//! descriptor lists — and a trait any backend crate implements against
//! that contract.
//!
//! This crate ships one [`Printer`]: [`DebugPrinter`], which renders the
//! contract itself (symbol table, ion dependencies, API method I/O
//! descriptors) as structured text. It does not emit C, CUDA, or SIMD
//! intrinsics — concrete target emission is explicitly out of scope
//! (spec §1) and belongs to a downstream crate implementing [`Printer`].

use std::fmt::Write as _;
use std::io::{self, Write};

use modcc_ast::symbol::{ApiMethod, IoDescriptor, IoOp, Symbol};
use modcc_ast::{IonDep, Module, ModuleKind};

/// Which downstream backend a compilation was requested for (spec §6 CLI
/// contract: `-t {cpu|gpu|simd}`). The core never branches on this itself
/// — it is carried through so a [`Printer`] implementation can, and so
/// [`DebugPrinter`] can label its output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Cpu,
    Simd,
    Gpu,
}

impl Target {
    /// Parse a `-t` flag value. Case-insensitive, matching the lowercase
    /// spelling spec §6 specifies.
    pub fn parse(spelling: &str) -> Option<Self> {
        match spelling.to_ascii_lowercase().as_str() {
            "cpu" => Some(Target::Cpu),
            "simd" => Some(Target::Simd),
            "gpu" => Some(Target::Gpu),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Target::Cpu => "cpu",
            Target::Simd => "simd",
            Target::Gpu => "gpu",
        }
    }
}

/// A backend code generator: consumes the resolved [`Module`] data
/// contract and writes its emitted form to `out`. Implementations for
/// concrete targets (scalar CPU, SIMD CPU, GPU) live outside this crate;
/// this trait is the seam they implement against.
pub trait Printer {
    /// The target this printer emits for (used only for diagnostics —
    /// the trait itself is target-agnostic).
    fn target(&self) -> Target;

    /// Emit `module` to `out`. Errors are I/O errors from the writer;
    /// a printer that can itself fail to emit a well-formed module
    /// (e.g. because it does not support some construct) should report
    /// that during an earlier validation pass, not from here.
    fn print(&mut self, module: &Module, out: &mut dyn Write) -> io::Result<()>;
}

/// Renders the printer contract itself: module kind, ion dependencies,
/// and each synthesised API method with its input/output descriptors.
/// Useful as a default `-t` target when no concrete backend crate is
/// wired in, and as the fixture a concrete backend's own tests can diff
/// against to confirm it receives the contract it expects.
pub struct DebugPrinter {
    target: Target,
}

impl DebugPrinter {
    pub fn new(target: Target) -> Self {
        Self { target }
    }
}

impl Printer for DebugPrinter {
    fn target(&self) -> Target {
        self.target
    }

    fn print(&mut self, module: &Module, out: &mut dyn Write) -> io::Result<()> {
        let rendered = render(module, self.target);
        out.write_all(rendered.as_bytes())
    }
}

fn render(module: &Module, target: Target) -> String {
    let mut buf = String::new();
    let kind = match module.kind {
        ModuleKind::Density => "density",
        ModuleKind::PointProcess => "point_process",
    };
    let _ = writeln!(buf, "; target = {}", target.name());
    let _ = writeln!(buf, "; suffix = {}", module.suffix);
    let _ = writeln!(buf, "; kind = {kind}");
    let _ = writeln!(buf, "; threadsafe = {}", module.threadsafe);

    for ion in &module.ions {
        render_ion_dep(&mut buf, module, ion);
    }
    for method in &module.api_methods {
        render_api_method(&mut buf, module, method);
    }
    buf
}

fn render_ion_dep(buf: &mut String, module: &Module, ion: &IonDep) {
    let _ = writeln!(buf, "ion {} {{", ion.name);
    for &id in &ion.read_list {
        let _ = writeln!(buf, "    read {}", module.symbols.get(id).name());
    }
    for &id in &ion.write_list {
        let _ = writeln!(buf, "    write {}", module.symbols.get(id).name());
    }
    let _ = writeln!(buf, "}}");
}

fn render_api_method(buf: &mut String, module: &Module, method: &ApiMethod) {
    let _ = writeln!(buf, "api {} {{", method.name);
    for descriptor in &method.inputs {
        render_descriptor(buf, module, "in", descriptor);
    }
    let _ = writeln!(buf, "    ; {} statement(s)", method.body.len());
    for descriptor in &method.outputs {
        render_descriptor(buf, module, "out", descriptor);
    }
    let _ = writeln!(buf, "}}");
}

fn render_descriptor(buf: &mut String, module: &Module, direction: &str, descriptor: &IoDescriptor) {
    let op = match descriptor.op {
        IoOp::Assign => "=",
        IoOp::AddAssign => "+=",
        IoOp::SubAssign => "-=",
    };
    let local = symbol_label(module, descriptor.local);
    let external = symbol_label(module, descriptor.external);
    let _ = writeln!(buf, "    {direction} {local} {op} {external}");
}

fn symbol_label(module: &Module, id: modcc_ast::SymbolId) -> String {
    match module.symbols.get(id) {
        Symbol::IndexedVariable(v) => v.external_name.clone(),
        other => other.name().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HH_GATE: &str = "\
NEURON {\n\
    SUFFIX test\n\
    USEION na READ ena WRITE ina\n\
    RANGE gnabar\n\
}\n\
STATE { m }\n\
PARAMETER { gnabar = 0.12 }\n\
ASSIGNED { ina ena }\n\
INITIAL {\n\
    m = 0\n\
}\n\
BREAKPOINT {\n\
    SOLVE states METHOD cnexp\n\
    ina = gnabar * m * (v - ena)\n\
}\n\
DERIVATIVE states {\n\
    m' = (1 - m) / 10\n\
}\n";

    fn compiled() -> Module {
        let (mut module, diags) = modcc_ast::parse(HH_GATE);
        assert!(!diags.has_errors(), "{}", diags.render("t.mod"));
        let sem = crate::semantic::analyze(&module);
        assert!(!sem.has_errors(), "{}", sem.render("t.mod"));
        crate::lowering::lower(&mut module).expect("lowering should succeed");
        module
    }

    #[test]
    fn target_parses_the_three_spelled_out_backends() {
        assert_eq!(Target::parse("cpu"), Some(Target::Cpu));
        assert_eq!(Target::parse("SIMD"), Some(Target::Simd));
        assert_eq!(Target::parse("gpu"), Some(Target::Gpu));
        assert_eq!(Target::parse("wasm"), None);
    }

    #[test]
    fn debug_printer_renders_every_api_method_and_ion_dependency() {
        let module = compiled();
        let mut printer = DebugPrinter::new(Target::Cpu);
        let mut out = Vec::new();
        printer.print(&module, &mut out).expect("print should not fail");
        let text = String::from_utf8(out).expect("utf8");
        assert!(text.contains("target = cpu"));
        assert!(text.contains("ion na"));
        assert!(text.contains("api nrn_init"));
        assert!(text.contains("api nrn_state"));
        assert!(text.contains("api nrn_current"));
    }
}
