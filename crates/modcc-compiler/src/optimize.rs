//! Optional optimisation pass (spec §4.9). Not run by default — the CLI
//! gates it behind `-O` — and deliberately does nothing beyond the two
//! steps below: no dead-code elimination, no loop transforms, no register
//! allocation (spec §1 Non-goals).
//!
//! 1. Constant-fold every `PROCEDURE`/`FUNCTION` body and every
//!    synthesised [`ApiMethod`] body.
//! 2. If the module is a point process, retag every local variable named
//!    by an API method's output descriptor as a [`LocalKind::Ghost`]
//!    local, so a printer knows to emit a per-thread scratch slot instead
//!    of a shared accumulation target.

use modcc_ast::symbol::{LocalKind, Symbol};
use modcc_ast::{Module, ModuleKind};

use crate::visitors::constant_fold;

/// Run the optimisation pass over `module` in place.
pub fn run(module: &mut Module) {
    fold_procedures(module);
    fold_net_receive(module);
    fold_api_methods(module);
    if module.kind == ModuleKind::PointProcess {
        tag_ghost_locals(module);
    }
}

fn fold_procedures(module: &mut Module) {
    for &id in &module.procedures {
        if let Symbol::Procedure(proc) = module.symbols.get_mut(id) {
            proc.body = proc.body.iter().map(constant_fold::fold).collect();
        }
    }
}

fn fold_net_receive(module: &mut Module) {
    let Some(id) = module.net_receive else { return };
    if let Symbol::NetReceive(nr) = module.symbols.get_mut(id) {
        nr.body = nr.body.iter().map(constant_fold::fold).collect();
    }
}

/// `ApiMethod`s are stored twice — once in the symbol arena (so they can
/// be looked up by name like any other symbol) and once in
/// `module.api_methods` (so a printer can walk the fixed three in order)
/// — so folding has to keep both copies in sync.
fn fold_api_methods(module: &mut Module) {
    for method in &mut module.api_methods {
        method.body = method.body.iter().map(constant_fold::fold).collect();
        if let Some(&id) = module.globals.get(&method.name) {
            if let Symbol::ApiMethod(arena_copy) = module.symbols.get_mut(id) {
                arena_copy.body = method.body.clone();
            }
        }
    }
}

fn tag_ghost_locals(module: &mut Module) {
    let ghost_ids: Vec<_> = module
        .api_methods
        .iter()
        .flat_map(|m| m.outputs.iter().map(|d| d.local))
        .collect();
    for id in ghost_ids {
        if let Symbol::LocalVariable(local) = module.symbols.get_mut(id) {
            local.kind = LocalKind::Ghost;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modcc_ast::ast::Expression;

    const POINT_PROCESS_SRC: &str = "\
NEURON {\n\
    POINT_PROCESS test\n\
    USEION na READ ena WRITE ina\n\
}\n\
STATE { m }\n\
ASSIGNED { ina ena }\n\
INITIAL {\n\
    m = 2 * 3\n\
}\n\
BREAKPOINT {\n\
    SOLVE states METHOD cnexp\n\
    ina = 0.12 * m * (v - ena)\n\
}\n\
DERIVATIVE states {\n\
    m' = (1 - m) / 10\n\
}\n";

    fn compile(src: &str) -> Module {
        let (mut module, diags) = modcc_ast::parse(src);
        assert!(!diags.has_errors(), "{}", diags.render("t.mod"));
        let sem = crate::semantic::analyze(&module);
        assert!(!sem.has_errors(), "{}", sem.render("t.mod"));
        crate::lowering::lower(&mut module).expect("lowering should succeed");
        module
    }

    #[test]
    fn constant_subexpressions_in_initial_are_folded() {
        let mut module = compile(POINT_PROCESS_SRC);
        run(&mut module);
        let init = &module.api_methods[0];
        let folded = init.body.iter().any(|stmt| {
            matches!(stmt, Expression::Assignment { rhs, .. } if matches!(rhs.as_ref(), Expression::Number { value, .. } if *value == 6.0))
        });
        assert!(folded, "expected `m = 2 * 3` to fold to `m = 6`, body: {:#?}", init.body);
    }

    #[test]
    fn point_process_output_locals_are_retagged_as_ghosts() {
        let mut module = compile(POINT_PROCESS_SRC);
        run(&mut module);
        let current = &module.api_methods[2];
        assert!(!current.outputs.is_empty());
        for descriptor in &current.outputs {
            let local = module.symbols.get(descriptor.local).as_local_variable();
            if let Some(local) = local {
                assert_eq!(local.kind, LocalKind::Ghost);
            }
        }
    }

    #[test]
    fn density_mechanism_locals_are_left_untagged() {
        let src = "\
NEURON {\n\
    SUFFIX test\n\
    USEION na READ ena WRITE ina\n\
}\n\
STATE { m }\n\
ASSIGNED { ina ena }\n\
INITIAL { m = 0 }\n\
BREAKPOINT {\n\
    SOLVE states METHOD cnexp\n\
    ina = 0.12 * m * (v - ena)\n\
}\n\
DERIVATIVE states {\n\
    m' = (1 - m) / 10\n\
}\n";
        let mut module = compile(src);
        run(&mut module);
        let current = &module.api_methods[2];
        for descriptor in &current.outputs {
            if let Some(local) = module.symbols.get(descriptor.local).as_local_variable() {
                assert_ne!(local.kind, LocalKind::Ghost);
            }
        }
    }
}
