//! Symbol-table entries: variables, indexed host arrays, procedures, and
//! the synthesised API methods, plus the five orthogonal attributes every
//! module-scope [`Variable`] carries (spec §3.3).

use std::collections::BTreeMap;

use crate::ast::Block;
use crate::diagnostics::Location;

/// Opaque handle into a [`SymbolArena`]. Expressions and scopes carry this
/// small index rather than a live back-pointer into the arena (spec §9
/// design note on avoiding a cyclic scope/expression/symbol reference
/// graph).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(u32);

impl SymbolId {
    fn new(index: usize) -> Self {
        Self(index.try_into().expect("symbol arena overflow"))
    }

    fn index(self) -> usize {
        self.0 as usize
    }
}

/// Whether a variable is read, written, or both by the lowered code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
    ReadWrite,
}

impl Access {
    /// Widen `self` to account for an additional read.
    pub fn with_read(self) -> Self {
        match self {
            Access::Write | Access::ReadWrite => Access::ReadWrite,
            Access::Read => Access::Read,
        }
    }

    /// Widen `self` to account for an additional write.
    pub fn with_write(self) -> Self {
        match self {
            Access::Read | Access::ReadWrite => Access::ReadWrite,
            Access::Write => Access::Write,
        }
    }
}

/// Whether the host simulator may see/set a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Local,
    Global,
}

/// Whether a variable's storage lives in the module or is host-supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Linkage {
    Local,
    Extern,
}

/// Whether a variable has one value per mechanism instance or one value
/// shared by the whole mechanism.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeKind {
    Scalar,
    Range,
}

/// Which ion-channel table, if any, a variable is coupled to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ion {
    None,
    Nonspecific,
    Ca,
    Na,
    K,
}

impl Ion {
    /// Map a `USEION` name to its ion kind (spec §4.2: `k`/`na`/`ca` are
    /// recognised; anything else is treated as nonspecific unless the
    /// NEURON block says otherwise).
    pub fn from_useion_name(name: &str) -> Self {
        match name {
            "k" => Ion::K,
            "na" => Ion::Na,
            "ca" => Ion::Ca,
            _ => Ion::Nonspecific,
        }
    }
}

/// A module-scope scalar or range variable, with the five orthogonal
/// attributes from spec §3.3.
#[derive(Debug, Clone)]
pub struct Variable {
    pub name: String,
    pub access: Access,
    pub visibility: Visibility,
    pub linkage: Linkage,
    pub range: RangeKind,
    pub ion: Ion,
    /// Set if this variable appeared in a `STATE` block.
    pub is_state: bool,
    /// Default value, if the declaration supplied one (e.g. `PARAMETER`).
    pub default: Option<f64>,
    pub location: Location,
}

impl Variable {
    /// A range, read-write, local-linkage variable with no default —
    /// the common case for `STATE` and `ASSIGNED` entries.
    pub fn range_read_write(name: impl Into<String>, location: Location) -> Self {
        Self {
            name: name.into(),
            access: Access::ReadWrite,
            visibility: Visibility::Local,
            linkage: Linkage::Local,
            range: RangeKind::Range,
            ion: Ion::None,
            is_state: false,
            default: None,
            location,
        }
    }
}

/// A symbol bound to a flat host-owned array, accessed through a
/// mechanism-specific permutation (`vec_v`, `vec_rhs`, `vec_d`, `ion_<x>`).
#[derive(Debug, Clone)]
pub struct IndexedVariable {
    pub name: String,
    /// The name the host array is known by (e.g. `"vec_v"`).
    pub external_name: String,
    pub access: Access,
    pub ion: Ion,
    pub location: Location,
}

/// Kind of a local variable's origin, distinguishing ordinary `LOCAL`
/// declarations from procedure arguments, indexed-variable aliases
/// created on first reference (spec §4.4 point 4), and ghost variables
/// retagged by the optional optimisation pass (spec §4.9, glossary).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalKind {
    Plain,
    Argument,
    /// Alias created the first time an indexed variable is referenced
    /// inside a procedure body.
    IndexedAlias,
    /// Retagged by the optimisation pass so a printer emits a per-thread
    /// scratch slot instead of a shared write target.
    Ghost,
}

/// A procedure-local variable, possibly aliasing a module-scope
/// [`IndexedVariable`].
#[derive(Debug, Clone)]
pub struct LocalVariable {
    pub name: String,
    pub kind: LocalKind,
    /// For `IndexedAlias` locals: the indexed variable this alias reads
    /// from / writes to.
    pub external_variable: Option<SymbolId>,
    pub location: Location,
}

/// Distinguishes which source construct a [`Procedure`] was built from;
/// this also controls what semantic checks apply (spec §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcedureKind {
    UserProcedure,
    UserFunction,
    Initial,
    Derivative,
    Breakpoint,
    NetReceive,
}

/// A user-written (or NET_RECEIVE) procedure/function.
#[derive(Debug, Clone)]
pub struct Procedure {
    pub name: String,
    pub kind: ProcedureKind,
    pub args: Vec<SymbolId>,
    pub body: Block,
    /// This procedure's own local symbol map, populated during `semantic()`.
    pub locals: BTreeMap<String, SymbolId>,
    pub location: Location,
}

/// One `(op, local_symbol, external_symbol)` triple in an [`ApiMethod`]'s
/// input or output descriptor list (spec §3.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoOp {
    Assign,
    AddAssign,
    SubAssign,
}

/// One entry in an [`ApiMethod`]'s input or output list.
#[derive(Debug, Clone)]
pub struct IoDescriptor {
    pub op: IoOp,
    pub local: SymbolId,
    pub external: SymbolId,
}

/// A synthesised API procedure (`nrn_init`, `nrn_state`, or `nrn_current`):
/// a lowered body plus the explicit I/O contract a printer consumes.
#[derive(Debug, Clone)]
pub struct ApiMethod {
    pub name: String,
    pub body: Block,
    pub locals: BTreeMap<String, SymbolId>,
    pub inputs: Vec<IoDescriptor>,
    pub outputs: Vec<IoDescriptor>,
    pub location: Location,
}

/// The `NET_RECEIVE` block, stored distinctly from ordinary procedures
/// since it may carry its own nested `INITIAL` block (spec §4.4 point 6).
#[derive(Debug, Clone)]
pub struct NetReceive {
    pub args: Vec<SymbolId>,
    pub body: Block,
    pub locals: BTreeMap<String, SymbolId>,
    pub location: Location,
}

/// One entry of the module symbol table.
#[derive(Debug, Clone)]
pub enum Symbol {
    Variable(Variable),
    IndexedVariable(IndexedVariable),
    LocalVariable(LocalVariable),
    Procedure(Procedure),
    ApiMethod(ApiMethod),
    NetReceive(NetReceive),
}

impl Symbol {
    /// The symbol's name, regardless of kind.
    pub fn name(&self) -> &str {
        match self {
            Symbol::Variable(v) => &v.name,
            Symbol::IndexedVariable(v) => &v.name,
            Symbol::LocalVariable(v) => &v.name,
            Symbol::Procedure(p) => &p.name,
            Symbol::ApiMethod(a) => &a.name,
            Symbol::NetReceive(_) => "net_receive",
        }
    }

    /// True if this symbol can be called (a `Procedure` or `Function`
    /// `Procedure`, i.e. anything with a `ProcedureKind`).
    pub fn is_callable(&self) -> bool {
        matches!(self, Symbol::Procedure(_))
    }

    /// True if this symbol is a valid lvalue target (spec §3.7 invariant 2):
    /// a readable-and-writeable [`Variable`], a write-capable
    /// [`IndexedVariable`], or a [`LocalVariable`].
    pub fn is_lvalue(&self) -> bool {
        match self {
            Symbol::Variable(v) => matches!(v.access, Access::Write | Access::ReadWrite),
            Symbol::IndexedVariable(v) => matches!(v.access, Access::Write | Access::ReadWrite),
            Symbol::LocalVariable(_) => true,
            _ => false,
        }
    }

    pub fn as_variable(&self) -> Option<&Variable> {
        match self {
            Symbol::Variable(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_variable_mut(&mut self) -> Option<&mut Variable> {
        match self {
            Symbol::Variable(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_procedure(&self) -> Option<&Procedure> {
        match self {
            Symbol::Procedure(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_procedure_mut(&mut self) -> Option<&mut Procedure> {
        match self {
            Symbol::Procedure(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_indexed_variable(&self) -> Option<&IndexedVariable> {
        match self {
            Symbol::IndexedVariable(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_local_variable(&self) -> Option<&LocalVariable> {
        match self {
            Symbol::LocalVariable(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_api_method(&self) -> Option<&ApiMethod> {
        match self {
            Symbol::ApiMethod(a) => Some(a),
            _ => None,
        }
    }
}

/// Owns every [`Symbol`] ever allocated while compiling one module. Scopes
/// and expressions reference entries by [`SymbolId`]; nothing outside this
/// arena owns a `Symbol` directly, so mutation during lowering (e.g.
/// retagging a local as a ghost variable) is a single `get_mut` away
/// without aliasing concerns.
#[derive(Debug, Clone, Default)]
pub struct SymbolArena {
    symbols: Vec<Symbol>,
}

impl SymbolArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a new symbol, returning its handle.
    pub fn alloc(&mut self, symbol: Symbol) -> SymbolId {
        let id = SymbolId::new(self.symbols.len());
        self.symbols.push(symbol);
        id
    }

    pub fn get(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.index()]
    }

    pub fn get_mut(&mut self, id: SymbolId) -> &mut Symbol {
        &mut self.symbols[id.index()]
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SymbolId, &Symbol)> {
        self.symbols
            .iter()
            .enumerate()
            .map(|(i, s)| (SymbolId::new(i), s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_widens_monotonically() {
        assert_eq!(Access::Read.with_write(), Access::ReadWrite);
        assert_eq!(Access::Write.with_read(), Access::ReadWrite);
        assert_eq!(Access::ReadWrite.with_read(), Access::ReadWrite);
    }

    #[test]
    fn ion_name_mapping_matches_spec_table() {
        assert_eq!(Ion::from_useion_name("na"), Ion::Na);
        assert_eq!(Ion::from_useion_name("k"), Ion::K);
        assert_eq!(Ion::from_useion_name("ca"), Ion::Ca);
        assert_eq!(Ion::from_useion_name("cl"), Ion::Nonspecific);
    }

    #[test]
    fn arena_round_trips_symbols_by_id() {
        let mut arena = SymbolArena::new();
        let id = arena.alloc(Symbol::Variable(Variable::range_read_write("m", Location::start())));
        assert_eq!(arena.get(id).name(), "m");
    }
}
