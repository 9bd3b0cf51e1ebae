//! The top-level `Module` data structure: everything parsed out of one
//! `.mod` source file, plus the symbol arena every [`SymbolId`] in it
//! indexes into.

use std::collections::BTreeMap;

use crate::diagnostics::{Diagnostics, Location};
use crate::symbol::{ApiMethod, Ion, SymbolArena, SymbolId};

/// Whether a module describes a density mechanism (range variables,
/// applied uniformly per compartment) or a point process (a single
/// instance with its own coordinates), per spec §3.1/glossary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleKind {
    Density,
    PointProcess,
}

/// One `USEION` dependency declared in the `NEURON` block.
#[derive(Debug, Clone)]
pub struct IonDep {
    pub name: String,
    pub kind: Ion,
    /// Ids of the ordinary `Variable`s (pre-declared in `ASSIGNED`/
    /// `PARAMETER`/`STATE`) the `READ` clause upgraded. Each has a
    /// corresponding entry in `Module::ion_shadows`.
    pub read_list: Vec<SymbolId>,
    /// Same, for the `WRITE` clause.
    pub write_list: Vec<SymbolId>,
}

/// The parsed, (eventually) lowered representation of one module source
/// file.
#[derive(Debug, Clone)]
pub struct Module {
    /// Verbatim source text, retained for error rendering and for any
    /// pass that needs to re-slice spellings.
    pub source: String,
    pub title: Option<String>,
    pub kind: ModuleKind,
    pub suffix: String,
    pub threadsafe: bool,
    pub ions: Vec<IonDep>,
    /// Shadow indexed variable for each ion-coupled `Variable` (keyed by
    /// the `Variable`'s own id), introduced by `USEION READ`/`WRITE`
    /// wiring (spec §4.5). Not reachable from `globals` under the
    /// variable's plain name — that name keeps resolving to the ordinary
    /// `Variable` the body reads and writes — only lowering's I/O
    /// descriptors reference the shadow, via this map.
    pub ion_shadows: BTreeMap<SymbolId, SymbolId>,
    /// Module-global symbol table: every `STATE`/`PARAMETER`/`ASSIGNED`
    /// variable, indexed variable, procedure, and function declared at
    /// top level, keyed by spelling.
    pub globals: BTreeMap<String, SymbolId>,
    pub symbols: SymbolArena,
    /// Names of `PROCEDURE`/`FUNCTION`/`INITIAL`/`DERIVATIVE`/`BREAKPOINT`
    /// blocks, in declaration order, as ids into `symbols`.
    pub procedures: Vec<SymbolId>,
    /// `NET_RECEIVE` block, if this is a point process with one.
    pub net_receive: Option<SymbolId>,
    /// Populated by the lowering stage: `nrn_init`, `nrn_state`,
    /// `nrn_current`, in that order once present.
    pub api_methods: Vec<ApiMethod>,
    pub location: Location,
}

impl Module {
    /// Start an empty module for the given source text; filled in by the
    /// parser as it consumes top-level blocks.
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            title: None,
            kind: ModuleKind::Density,
            suffix: String::new(),
            threadsafe: false,
            ions: Vec::new(),
            ion_shadows: BTreeMap::new(),
            globals: BTreeMap::new(),
            symbols: SymbolArena::new(),
            procedures: Vec::new(),
            net_receive: None,
            api_methods: Vec::new(),
            location: Location::start(),
        }
    }

    /// Find a procedure/function by name among the declared top-level
    /// blocks.
    pub fn find_procedure(&self, name: &str) -> Option<SymbolId> {
        self.globals.get(name).copied().filter(|id| self.symbols.get(*id).is_callable())
    }

    /// Sweep every node carrying an embedded error (set during semantic
    /// analysis) into one ordered [`Diagnostics`] sink for CLI rendering.
    /// This module does not itself embed per-node errors — analysis
    /// passes append directly to a `Diagnostics` they thread through — so
    /// today this simply returns an empty sink; it exists as the single
    /// place a future embedded-error representation would be collected
    /// from, matching the original's `ErrorVisitor` sweep contract.
    pub fn collect_diagnostics(&self) -> Diagnostics {
        Diagnostics::new()
    }
}
