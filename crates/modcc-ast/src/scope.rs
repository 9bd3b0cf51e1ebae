//! Two-level name resolution: a borrowed module-global map plus an owned
//! per-procedure local map (spec §3.4/§4.3). A local may shadow a global
//! (with a warning if the shadowed global is an indexed variable, since
//! that usually signals a typo rather than intentional shadowing); a local
//! may never shadow another local in the same procedure.

use std::collections::BTreeMap;

use crate::diagnostics::{Diagnostics, Location};
use crate::symbol::SymbolId;

/// Name resolution for a single procedure body, borrowing the enclosing
/// module's global table and owning its own local table.
pub struct Scope<'a> {
    globals: &'a BTreeMap<String, SymbolId>,
    locals: BTreeMap<String, SymbolId>,
}

impl<'a> Scope<'a> {
    /// Start a fresh local scope over the given global table.
    pub fn new(globals: &'a BTreeMap<String, SymbolId>) -> Self {
        Self {
            globals,
            locals: BTreeMap::new(),
        }
    }

    /// Resolve `name`, preferring a local binding over a global one.
    pub fn find(&self, name: &str) -> Option<SymbolId> {
        self.locals.get(name).copied().or_else(|| self.find_global(name))
    }

    /// Resolve `name` in the global table only, ignoring any local shadow.
    pub fn find_global(&self, name: &str) -> Option<SymbolId> {
        self.globals.get(name).copied()
    }

    /// True if `name` is bound locally (regardless of any global of the
    /// same name).
    pub fn is_local(&self, name: &str) -> bool {
        self.locals.contains_key(name)
    }

    /// Bind `name` to `symbol` in the local table.
    ///
    /// Returns `Err` if `name` already names a local in this scope (an
    /// error per spec §4.3: a procedure cannot declare the same local
    /// twice). If `name` shadows a global that is an indexed variable, a
    /// warning is appended to `diags` but the binding still succeeds —
    /// shadowing an ordinary global is unremarkable, but shadowing an
    /// indexed variable (`vec_v`, `ion_*`) usually means the local was
    /// meant to alias it, not replace it.
    pub fn add_local(
        &mut self,
        name: impl Into<String>,
        symbol: SymbolId,
        location: Location,
        diags: &mut Diagnostics,
        shadows_indexed_global: impl FnOnce(&str) -> bool,
    ) -> Result<(), ScopeError> {
        let name = name.into();
        if self.locals.contains_key(&name) {
            return Err(ScopeError::DuplicateLocal {
                name: name.clone(),
                location,
            });
        }
        if self.globals.contains_key(&name) && shadows_indexed_global(&name) {
            diags.warning(
                location,
                format!("local variable '{name}' shadows an indexed global variable"),
            );
        }
        self.locals.insert(name, symbol);
        Ok(())
    }

    /// Consume the scope, returning its local table (for attachment to the
    /// owning [`crate::symbol::Procedure`]/[`crate::symbol::ApiMethod`]).
    pub fn into_locals(self) -> BTreeMap<String, SymbolId> {
        self.locals
    }
}

/// Errors raised while building a [`Scope`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ScopeError {
    #[error("{location}: local variable '{name}' is already declared in this procedure")]
    DuplicateLocal { name: String, location: Location },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_shadows_global_by_default() {
        let mut globals = BTreeMap::new();
        let mut arena = crate::symbol::SymbolArena::new();
        let g = arena.alloc(crate::symbol::Symbol::Variable(
            crate::symbol::Variable::range_read_write("v", Location::start()),
        ));
        globals.insert("v".to_string(), g);

        let mut scope = Scope::new(&globals);
        let mut diags = Diagnostics::new();
        let l = arena.alloc(crate::symbol::Symbol::LocalVariable(crate::symbol::LocalVariable {
            name: "v".to_string(),
            kind: crate::symbol::LocalKind::Plain,
            external_variable: None,
            location: Location::start(),
        }));
        scope
            .add_local("v", l, Location::start(), &mut diags, |_| false)
            .unwrap();
        assert_eq!(scope.find("v"), Some(l));
        assert!(!diags.has_errors());
    }

    #[test]
    fn duplicate_local_is_an_error() {
        let globals = BTreeMap::new();
        let mut scope = Scope::new(&globals);
        let mut diags = Diagnostics::new();
        let mut arena = crate::symbol::SymbolArena::new();
        let l1 = arena.alloc(crate::symbol::Symbol::LocalVariable(crate::symbol::LocalVariable {
            name: "x".to_string(),
            kind: crate::symbol::LocalKind::Plain,
            external_variable: None,
            location: Location::start(),
        }));
        let l2 = arena.alloc(crate::symbol::Symbol::LocalVariable(crate::symbol::LocalVariable {
            name: "x".to_string(),
            kind: crate::symbol::LocalKind::Plain,
            external_variable: None,
            location: Location::start(),
        }));
        scope.add_local("x", l1, Location::start(), &mut diags, |_| false).unwrap();
        let err = scope
            .add_local("x", l2, Location::start(), &mut diags, |_| false)
            .unwrap_err();
        assert!(matches!(err, ScopeError::DuplicateLocal { .. }));
    }

    #[test]
    fn shadowing_indexed_global_warns_but_succeeds() {
        let mut globals = BTreeMap::new();
        let mut arena = crate::symbol::SymbolArena::new();
        let g = arena.alloc(crate::symbol::Symbol::IndexedVariable(crate::symbol::IndexedVariable {
            name: "v".to_string(),
            external_name: "vec_v".to_string(),
            access: crate::symbol::Access::Read,
            ion: crate::symbol::Ion::None,
            location: Location::start(),
        }));
        globals.insert("v".to_string(), g);

        let mut scope = Scope::new(&globals);
        let mut diags = Diagnostics::new();
        let l = arena.alloc(crate::symbol::Symbol::LocalVariable(crate::symbol::LocalVariable {
            name: "v".to_string(),
            kind: crate::symbol::LocalKind::Plain,
            external_variable: None,
            location: Location::start(),
        }));
        scope
            .add_local("v", l, Location::start(), &mut diags, |_| true)
            .unwrap();
        assert_eq!(diags.num_errors(), 0);
        assert_eq!(diags.records().len(), 1);
    }
}
