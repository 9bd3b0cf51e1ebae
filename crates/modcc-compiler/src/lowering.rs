//! Module lowering (spec §4.8): synthesizes the three mandatory API
//! procedures from the user-written `INITIAL`, `DERIVATIVE`, and
//! `BREAKPOINT` blocks.
//!
//! - `nrn_init` is a straight clone of `INITIAL`.
//! - `nrn_state` walks the `BREAKPOINT`'s `SOLVE` target (a `DERIVATIVE`
//!   block) and integrates every linear state ODE in closed form (the
//!   `cnexp` rule); a nonlinear ODE is a hard error, not a fallback (spec
//!   §1 Non-goals).
//! - `nrn_current` walks `BREAKPOINT` itself, accumulating membrane
//!   current and conductance from every ion-variable assignment, which
//!   must also be linear — this time in the membrane potential `v`.
//!
//! Each synthesized method's I/O descriptors reference host-owned indexed
//! variables (`vec_v`, `vec_rhs`, `vec_d`, `ion_<name>`) via the module's
//! own symbol arena; a plain indexed variable's "local" and "external"
//! descriptor members are the same [`SymbolId`], since an
//! [`IndexedVariable`] already carries both its in-body name and its
//! host-facing `external_name`. Only the ion-write case needs two
//! distinct symbols: the ordinary (`ASSIGNED`) variable the body computes
//! into, and the separate shadow indexed variable lowering writes back
//! through.

use std::collections::BTreeMap;

use modcc_ast::ast::{BinaryOp, Expression};
use modcc_ast::diagnostics::Location;
use modcc_ast::symbol::{
    Access, ApiMethod, Ion, IndexedVariable, IoDescriptor, IoOp, LocalKind, LocalVariable,
    ProcedureKind, Symbol, SymbolId,
};
use modcc_ast::Module;

use crate::visitors::linearity::{self, Linearity};
use crate::visitors::{constant_fold, inliner};
use crate::{LoweringError, Result};

const RESERVED_NAMES: [&str; 3] = ["nrn_init", "nrn_state", "nrn_current"];

/// Lower `module` in place, appending `nrn_init`, `nrn_state`, and
/// `nrn_current` to its `api_methods` (and registering each under its
/// reserved name in the global symbol table, per spec §3.7 invariant 3).
/// Fatal on the first error (spec §4.10): unlike semantic analysis,
/// lowering does not continue collecting errors, since every later step
/// assumes the previous one succeeded.
pub fn lower(module: &mut Module) -> Result<()> {
    check_no_reserved_name_collision(module)?;

    let init = lower_nrn_init(module)?;
    register_api_method(module, init);

    let state = lower_nrn_state(module)?;
    register_api_method(module, state);

    let current = lower_nrn_current(module)?;
    register_api_method(module, current);

    Ok(())
}

fn check_no_reserved_name_collision(module: &Module) -> Result<()> {
    for name in RESERVED_NAMES {
        if let Some(id) = module.globals.get(name) {
            if !matches!(module.symbols.get(*id), Symbol::ApiMethod(_)) {
                return Err(LoweringError::ReservedNameCollision { name: name.to_string() });
            }
        }
    }
    Ok(())
}

fn register_api_method(module: &mut Module, method: ApiMethod) {
    let name = method.name.clone();
    let id = module.symbols.alloc(Symbol::ApiMethod(method.clone()));
    module.globals.insert(name, id);
    module.api_methods.push(method);
}

fn find_by_kind(module: &Module, kind: ProcedureKind) -> Option<SymbolId> {
    module.procedures.iter().copied().find(|&id| {
        module.symbols.get(id).as_procedure().map(|p| p.kind == kind).unwrap_or(false)
    })
}

fn v_symbol(module: &Module) -> SymbolId {
    *module.globals.get("v").expect("the parser always seeds a global 'v'")
}

/// Strip `LOCAL` declaration statements from a cloned body (the
/// synthesized method's `locals` map already carries every local, so the
/// declaring statement itself is redundant ceremony once the method is
/// not the original's own callable body).
fn strip_local_declarations(body: &[Expression]) -> Vec<Expression> {
    body.iter()
        .filter(|stmt| !matches!(stmt, Expression::LocalDeclaration { .. }))
        .cloned()
        .collect()
}

/// An input/output descriptor where the local and external members are
/// the same indexed-variable symbol (spec §4.8's final paragraph: both
/// members "are re-run through scope resolution", which for a plain
/// indexed variable resolves to itself).
fn self_descriptor(op: IoOp, id: SymbolId) -> IoDescriptor {
    IoDescriptor { op, local: id, external: id }
}

// ---- nrn_init -------------------------------------------------------

fn lower_nrn_init(module: &Module) -> Result<ApiMethod> {
    let initial_id = find_by_kind(module, ProcedureKind::Initial).ok_or(LoweringError::MissingInitial)?;
    let initial = module.symbols.get(initial_id).as_procedure().expect("find_by_kind returned a Procedure");

    let body = strip_local_declarations(&initial.body);
    let locals = initial.locals.clone();
    let v = v_symbol(module);

    Ok(ApiMethod {
        name: "nrn_init".to_string(),
        body,
        locals,
        inputs: vec![self_descriptor(IoOp::Assign, v)],
        outputs: Vec::new(),
        location: initial.location,
    })
}

// ---- nrn_state --------------------------------------------------------

fn lower_nrn_state(module: &mut Module) -> Result<ApiMethod> {
    let breakpoint_id = find_by_kind(module, ProcedureKind::Breakpoint).ok_or(LoweringError::MissingBreakpoint)?;
    let breakpoint = module.symbols.get(breakpoint_id).as_procedure().expect("Procedure").clone();

    let solve = breakpoint.body.iter().find_map(|stmt| match stmt {
        Expression::SolveStatement { target, location, .. } => Some((*target, *location)),
        _ => None,
    });

    let Some((target, solve_location)) = solve else {
        // Spec §4.8 point 1: no SOLVE statement yields an empty nrn_state
        // with a warning. The warning itself is surfaced by the caller
        // via semantic analysis (which already validates SOLVE targets);
        // lowering just produces the empty method.
        let v = v_symbol(module);
        return Ok(ApiMethod {
            name: "nrn_state".to_string(),
            body: Vec::new(),
            locals: BTreeMap::new(),
            inputs: vec![self_descriptor(IoOp::Assign, v)],
            outputs: Vec::new(),
            location: breakpoint.location,
        });
    };

    let derivative = module
        .symbols
        .get(target)
        .as_procedure()
        .filter(|p| p.kind == ProcedureKind::Derivative)
        .cloned()
        .ok_or_else(|| LoweringError::NotASolveTarget {
            target: module.symbols.get(target).name().to_string(),
            location: solve_location,
        })?;

    let mut locals = derivative.locals.clone();
    let a = module.symbols.alloc(Symbol::LocalVariable(LocalVariable {
        name: "a_".to_string(),
        kind: LocalKind::Plain,
        external_variable: None,
        location: derivative.location,
    }));
    let ba = module.symbols.alloc(Symbol::LocalVariable(LocalVariable {
        name: "ba_".to_string(),
        kind: LocalKind::Plain,
        external_variable: None,
        location: derivative.location,
    }));
    locals.insert("a_".to_string(), a);
    locals.insert("ba_".to_string(), ba);

    let dt = module.globals.get("dt").copied().expect("the parser always seeds a global 'dt'");

    let mut body = Vec::with_capacity(derivative.body.len() + 2);
    let mut declared_temps = false;

    for stmt in strip_local_declarations(&derivative.body) {
        let Expression::Derivative { state, rhs, location } = &stmt else {
            body.push(stmt);
            continue;
        };
        let state = *state;
        let location = *location;

        // Inline any single-statement `FUNCTION` calls nested in the
        // right-hand side first, so e.g. `(minf(v) - m) / mtau` exposes
        // its state-independence to the classifier instead of the
        // classifier having to reason through an opaque `Call` node
        // (spec §4.7).
        let inlined = inliner::inline_calls(&vec![(**rhs).clone()], &module.symbols);
        let rhs_expr = inlined.into_iter().next().expect("single statement in, single statement out");

        let Linearity::Linear { coefficient, constant } = linearity::classify(&rhs_expr, state) else {
            return Err(LoweringError::NonlinearDerivative {
                state: module.symbols.get(state).name().to_string(),
                location,
            });
        };
        let a_expr = constant_fold::fold(&coefficient);
        let b_expr = constant_fold::fold(&constant);

        if !declared_temps {
            body.push(Expression::LocalDeclaration { locals: vec![a, ba], location });
            declared_temps = true;
        }

        // a_ = a
        body.push(assign(a, a_expr, location));
        // ba_ = b / a_
        body.push(assign(ba, binary(BinaryOp::Div, b_expr, ident_sym(a, location), location), location));
        // x = -ba_ + (x + ba_) * exp(a_ * dt)
        let state_plus_ba = binary(BinaryOp::Add, ident_sym(state, location), ident_sym(ba, location), location);
        let exp_term = Expression::Unary {
            op: modcc_ast::ast::UnaryOp::Exp,
            operand: Box::new(binary(BinaryOp::Mul, ident_sym(a, location), ident_sym(dt, location), location)),
            location,
        };
        let update = binary(
            BinaryOp::Add,
            Expression::Unary { op: modcc_ast::ast::UnaryOp::Negate, operand: Box::new(ident_sym(ba, location)), location },
            binary(BinaryOp::Mul, state_plus_ba, exp_term, location),
            location,
        );
        body.push(assign(state, update, location));
    }

    let v = v_symbol(module);
    Ok(ApiMethod {
        name: "nrn_state".to_string(),
        body,
        locals,
        inputs: vec![self_descriptor(IoOp::Assign, v)],
        outputs: Vec::new(),
        location: derivative.location,
    })
}

// ---- nrn_current --------------------------------------------------------

fn lower_nrn_current(module: &mut Module) -> Result<ApiMethod> {
    let breakpoint_id = find_by_kind(module, ProcedureKind::Breakpoint).ok_or(LoweringError::MissingBreakpoint)?;
    let breakpoint = module.symbols.get(breakpoint_id).as_procedure().expect("Procedure").clone();
    let v = v_symbol(module);

    let mut locals = breakpoint.locals.clone();
    let current = module.symbols.alloc(Symbol::LocalVariable(LocalVariable {
        name: "current_".to_string(),
        kind: LocalKind::Plain,
        external_variable: None,
        location: breakpoint.location,
    }));
    let conductance = module.symbols.alloc(Symbol::LocalVariable(LocalVariable {
        name: "conductance_".to_string(),
        kind: LocalKind::Plain,
        external_variable: None,
        location: breakpoint.location,
    }));
    locals.insert("current_".to_string(), current);
    locals.insert("conductance_".to_string(), conductance);

    let mut body = vec![
        Expression::LocalDeclaration { locals: vec![current, conductance], location: breakpoint.location },
        assign(current, num(0.0, breakpoint.location), breakpoint.location),
        assign(conductance, num(0.0, breakpoint.location), breakpoint.location),
    ];

    let mut ion_outputs: Vec<(SymbolId, SymbolId)> = Vec::new();
    let mut saw_ion_update = false;

    for stmt in strip_local_declarations(&breakpoint.body) {
        if matches!(stmt, Expression::SolveStatement { .. }) {
            continue;
        }
        let is_ion_assignment = match &stmt {
            Expression::Assignment { lhs, .. } => match lhs.as_ref() {
                Expression::Identifier { symbol, .. } => ion_kind_of(module, *symbol) != Ion::None,
                _ => false,
            },
            _ => false,
        };

        if !is_ion_assignment {
            body.push(stmt);
            continue;
        }

        let Expression::Assignment { lhs, rhs, location } = &stmt else { unreachable!() };
        let Expression::Identifier { symbol: ion_var, .. } = lhs.as_ref() else { unreachable!() };
        let ion_var = *ion_var;
        let location = *location;

        let inlined = inliner::inline_calls(&vec![(**rhs).clone()], &module.symbols);
        let rhs_expr = inlined.into_iter().next().unwrap_or_else(|| (**rhs).clone());

        let Linearity::Linear { coefficient, .. } = linearity::classify(&rhs_expr, v) else {
            return Err(LoweringError::NonlinearCurrent {
                name: module.symbols.get(ion_var).name().to_string(),
                location,
            });
        };
        let coefficient = constant_fold::fold(&coefficient);

        body.push(stmt.clone());
        body.push(assign(
            current,
            binary(BinaryOp::Add, ident_sym(current, location), ident_sym(ion_var, location), location),
            location,
        ));
        body.push(assign(
            conductance,
            binary(BinaryOp::Add, ident_sym(conductance, location), coefficient, location),
            location,
        ));

        saw_ion_update = true;
        let ion_kind = ion_kind_of(module, ion_var);
        if ion_kind != Ion::Nonspecific {
            if let Some(shadow) = ion_shadow_of(module, ion_var) {
                ion_outputs.push((ion_var, shadow));
            }
        }
    }

    let mut outputs = Vec::new();
    if saw_ion_update {
        for (local, external) in ion_outputs {
            outputs.push(IoDescriptor { op: IoOp::AddAssign, local, external });
        }
        let vec_rhs = vec_rhs_symbol(module);
        let vec_d = vec_d_symbol(module);
        outputs.push(IoDescriptor { op: IoOp::SubAssign, local: current, external: vec_rhs });
        outputs.push(IoDescriptor { op: IoOp::AddAssign, local: conductance, external: vec_d });
    }

    // Each `READ`-coupled variable's "local" member is the ordinary
    // `Variable` the body reads (e.g. `ena`); its "external" member is the
    // separate `ion_ena` shadow lowering wires it to (spec §4.5, §4.8's
    // worked scenario 6).
    let mut inputs: Vec<IoDescriptor> = module
        .ions
        .iter()
        .flat_map(|dep| dep.read_list.iter().copied())
        .filter_map(|id| ion_shadow_of(module, id).map(|shadow| IoDescriptor { op: IoOp::Assign, local: id, external: shadow }))
        .collect();
    inputs.push(self_descriptor(IoOp::Assign, v));

    Ok(ApiMethod {
        name: "nrn_current".to_string(),
        body,
        locals,
        inputs,
        outputs,
        location: breakpoint.location,
    })
}

/// The ion kind of a symbol that can appear as a current-update target:
/// either an ordinary `ASSIGNED`/`STATE` [`Symbol::Variable`] coupled to
/// an ion via `USEION`, or a [`Symbol::IndexedVariable`] introduced
/// directly by `NONSPECIFIC_CURRENT` (spec §4.5).
fn ion_kind_of(module: &Module, id: SymbolId) -> Ion {
    match module.symbols.get(id) {
        Symbol::Variable(v) => v.ion,
        Symbol::IndexedVariable(v) => v.ion,
        _ => Ion::None,
    }
}

/// The `ion_<name>` shadow indexed variable `finalize_ions` recorded for
/// an ion-coupled `Variable`, if any (spec §4.5).
fn ion_shadow_of(module: &Module, var_id: SymbolId) -> Option<SymbolId> {
    module.ion_shadows.get(&var_id).copied()
}

/// `vec_rhs`/`vec_d` have no user-facing spelling (spec §4.5 lists them
/// as reserved indexed externals alongside `vec_v`); lowering allocates
/// them the first time `nrn_current` needs them rather than preloading
/// them for every module regardless of whether it declares a current at
/// all.
fn vec_rhs_symbol(module: &mut Module) -> SymbolId {
    indexed_builtin(module, "vec_rhs", Access::Write)
}

fn vec_d_symbol(module: &mut Module) -> SymbolId {
    indexed_builtin(module, "vec_d", Access::Write)
}

fn indexed_builtin(module: &mut Module, external_name: &str, access: Access) -> SymbolId {
    if let Some(&id) = module.globals.get(external_name) {
        return id;
    }
    let id = module.symbols.alloc(Symbol::IndexedVariable(IndexedVariable {
        name: external_name.to_string(),
        external_name: external_name.to_string(),
        access,
        ion: Ion::None,
        location: Location::start(),
    }));
    module.globals.insert(external_name.to_string(), id);
    id
}

// ---- small expression builders -----------------------------------------

fn num(value: f64, location: Location) -> Expression {
    Expression::Number { value, location }
}

fn ident_sym(symbol: SymbolId, location: Location) -> Expression {
    Expression::Identifier { symbol, location }
}

fn binary(op: BinaryOp, lhs: Expression, rhs: Expression, location: Location) -> Expression {
    Expression::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs), location }
}

fn assign(target: SymbolId, value: Expression, location: Location) -> Expression {
    Expression::Assignment {
        lhs: Box::new(Expression::Identifier { symbol: target, location }),
        rhs: Box::new(value),
        location,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(src: &str) -> Module {
        let (mut module, diags) = modcc_ast::parse(src);
        assert!(!diags.has_errors(), "{}", diags.render("t.mod"));
        let sem = crate::semantic::analyze(&module);
        assert!(!sem.has_errors(), "{}", sem.render("t.mod"));
        lower(&mut module).expect("lowering should succeed");
        module
    }

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

    #[test]
    fn lowering_produces_all_three_reserved_api_methods() {
        let module = compile(HH_GATE);
        let names: Vec<&str> = module.api_methods.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["nrn_init", "nrn_state", "nrn_current"]);
        for name in RESERVED_NAMES {
            assert!(module.globals.contains_key(name));
        }
    }

    #[test]
    fn nrn_init_declares_v_as_an_input() {
        let module = compile(HH_GATE);
        let init = &module.api_methods[0];
        assert_eq!(init.inputs.len(), 1);
        assert_eq!(init.inputs[0].op, IoOp::Assign);
    }

    #[test]
    fn nrn_state_emits_the_cnexp_temporaries() {
        let module = compile(HH_GATE);
        let state = &module.api_methods[1];
        assert!(state.locals.contains_key("a_"));
        assert!(state.locals.contains_key("ba_"));
        // LocalDeclaration, a_ =, ba_ =, m = ...
        assert_eq!(state.body.len(), 4);
    }

    #[test]
    fn nrn_current_records_ion_write_back_and_matrix_outputs() {
        let module = compile(HH_GATE);
        let current = &module.api_methods[2];
        let ion_out = current.outputs.iter().find(|d| d.op == IoOp::AddAssign && module.symbols.get(d.local).name() == "ina");
        assert!(ion_out.is_some(), "expected an ina += ion_ina output, got {:?}", current.outputs);
        assert_eq!(
            module.symbols.get(ion_out.unwrap().external).as_indexed_variable().unwrap().external_name,
            "ion_ina",
            "the write-back shadow must be named after the variable (ina), not the ion (na)"
        );
        assert!(current.outputs.iter().any(|d| d.op == IoOp::SubAssign));
        assert!(current.outputs.iter().any(|d| d.op == IoOp::AddAssign && module.symbols.get(d.local).name() == "conductance_"));
    }

    #[test]
    fn nrn_current_pairs_each_read_ion_variable_with_its_own_shadow_input() {
        // Spec §8 scenario 6: input (=, ena, ion_ena).
        let module = compile(HH_GATE);
        let current = &module.api_methods[2];
        let ena_input = current
            .inputs
            .iter()
            .find(|d| d.op == IoOp::Assign && module.symbols.get(d.local).name() == "ena")
            .expect("an ena input descriptor");
        assert_ne!(ena_input.local, ena_input.external, "ena's local and external members must be distinct symbols");
        assert_eq!(module.symbols.get(ena_input.external).as_indexed_variable().unwrap().external_name, "ion_ena");
    }

    #[test]
    fn missing_initial_block_is_a_fatal_error() {
        let src = "ASSIGNED { x }\nBREAKPOINT { x = 1 }\n";
        let (mut module, diags) = modcc_ast::parse(src);
        assert!(!diags.has_errors(), "{}", diags.render("t.mod"));
        let err = lower(&mut module).unwrap_err();
        assert!(matches!(err, LoweringError::MissingInitial));
    }

    #[test]
    fn nonlinear_derivative_is_rejected() {
        let src = "\
STATE { m }\n\
INITIAL { m = 0 }\n\
BREAKPOINT {\n\
    SOLVE states METHOD cnexp\n\
}\n\
DERIVATIVE states {\n\
    m' = m * m + 1\n\
}\n";
        let (mut module, diags) = modcc_ast::parse(src);
        assert!(!diags.has_errors(), "{}", diags.render("t.mod"));
        let err = lower(&mut module).unwrap_err();
        assert!(matches!(err, LoweringError::NonlinearDerivative { .. }));
    }

    #[test]
    fn nonlinear_current_is_rejected() {
        let src = "\
ASSIGNED { ina ena }\n\
NEURON { SUFFIX test USEION na READ ena WRITE ina }\n\
INITIAL { ina = 0 }\n\
BREAKPOINT {\n\
    ina = v * v\n\
}\n";
        let (mut module, diags) = modcc_ast::parse(src);
        assert!(!diags.has_errors(), "{}", diags.render("t.mod"));
        let err = lower(&mut module).unwrap_err();
        assert!(matches!(err, LoweringError::NonlinearCurrent { .. }));
    }
}
