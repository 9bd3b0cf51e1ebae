//! Per-procedure semantic analysis: lvalue checks, call arity, and
//! `SOLVE` target validation. Errors are accumulated into a
//! [`Diagnostics`] sink rather than aborting on the first one — a single
//! pass over a procedure reports every problem it finds, matching the
//! "do not stop on first error" discipline for this stage.

use modcc_ast::ast::Expression;
use modcc_ast::diagnostics::Diagnostics;
use modcc_ast::symbol::{ProcedureKind, SymbolArena};
use modcc_ast::Module;

use crate::SemanticError;

/// Analyze every procedure-like block in `module`, returning the
/// diagnostics raised. An empty (no-errors) result means lowering may
/// proceed.
pub fn analyze(module: &Module) -> Diagnostics {
    let mut diags = Diagnostics::new();
    for &id in &module.procedures {
        if let Some(proc) = module.symbols.get(id).as_procedure() {
            for stmt in &proc.body {
                check_expression(stmt, &module.symbols, &mut diags);
            }
            if proc.kind == ProcedureKind::UserFunction {
                check_function_returns(proc, &mut diags);
            }
        }
    }
    if let Some(nr) = module.net_receive.and_then(|id| match module.symbols.get(id) {
        modcc_ast::symbol::Symbol::NetReceive(nr) => Some(nr),
        _ => None,
    }) {
        for stmt in &nr.body {
            check_expression(stmt, &module.symbols, &mut diags);
        }
    }
    diags
}

/// Spec §4.4 point 5: a `FUNCTION` body's last statement must assign to
/// the function's own name (its return-value local); failing to do so is
/// a warning, not an error — the function simply returns whatever that
/// local last held, which is the original's own behavior.
fn check_function_returns(proc: &modcc_ast::symbol::Procedure, diags: &mut Diagnostics) {
    let Some(&return_local) = proc.locals.get(&proc.name) else {
        return;
    };
    let assigns_return_local = |stmt: &Expression| {
        matches!(
            stmt,
            Expression::Assignment { lhs, .. } if matches!(lhs.as_ref(), Expression::Identifier { symbol, .. } if *symbol == return_local)
        )
    };
    let last_assigns = proc.body.last().map(assigns_return_local).unwrap_or(false);
    if !last_assigns {
        diags.warning(
            proc.location,
            format!("FUNCTION '{}' does not assign to its own name as its last statement", proc.name),
        );
    }
}

fn check_expression(expr: &Expression, symbols: &SymbolArena, diags: &mut Diagnostics) {
    match expr {
        Expression::Number { .. } | Expression::Identifier { .. } | Expression::Argument { .. } => {}
        Expression::LocalDeclaration { .. } => {}
        Expression::Derivative { state, rhs, location } => {
            let is_state_var = symbols.get(*state).as_variable().map(|v| v.is_state).unwrap_or(false);
            if !is_state_var {
                diags.error(
                    *location,
                    format!("'{}' is not a STATE variable and cannot be integrated", symbols.get(*state).name()),
                );
            }
            check_expression(rhs, symbols, diags);
        }
        Expression::Assignment { lhs, rhs, location } => {
            if let Expression::Identifier { symbol, .. } = lhs.as_ref() {
                if !symbols.get(*symbol).is_lvalue() {
                    let err = SemanticError::NotAnLvalue {
                        name: symbols.get(*symbol).name().to_string(),
                        location: *location,
                    };
                    diags.error(*location, err.to_string());
                }
            }
            check_expression(rhs, symbols, diags);
        }
        Expression::Unary { operand, .. } => check_expression(operand, symbols, diags),
        Expression::Binary { lhs, rhs, .. } => {
            check_expression(lhs, symbols, diags);
            check_expression(rhs, symbols, diags);
        }
        Expression::Call { callee, args, location } => {
            if let Some(proc) = symbols.get(*callee).as_procedure() {
                if proc.args.len() != args.len() {
                    let err = SemanticError::ArityMismatch {
                        name: proc.name.clone(),
                        expected: proc.args.len(),
                        found: args.len(),
                        location: *location,
                    };
                    diags.error(*location, err.to_string());
                }
            }
            for arg in args {
                check_expression(arg, symbols, diags);
            }
        }
        Expression::If {
            condition,
            then_block,
            else_ifs,
            otherwise,
            ..
        } => {
            check_expression(condition, symbols, diags);
            for stmt in then_block {
                check_expression(stmt, symbols, diags);
            }
            for (cond, block) in else_ifs {
                check_expression(cond, symbols, diags);
                for stmt in block {
                    check_expression(stmt, symbols, diags);
                }
            }
            if let Some(block) = otherwise {
                for stmt in block {
                    check_expression(stmt, symbols, diags);
                }
            }
        }
        Expression::SolveStatement { target, location, .. } => {
            let is_derivative = symbols
                .get(*target)
                .as_procedure()
                .map(|p| p.kind == ProcedureKind::Derivative)
                .unwrap_or(false);
            if !is_derivative {
                let err = SemanticError::NotASolveTarget {
                    name: symbols.get(*target).name().to_string(),
                    location: *location,
                };
                diags.error(*location, err.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solve_target_must_be_a_derivative_block() {
        let src = "\
PROCEDURE helper() {\n\
}\n\
BREAKPOINT {\n\
    SOLVE helper METHOD cnexp\n\
}\n";
        let (module, parse_diags) = modcc_ast::parse(src);
        assert!(!parse_diags.has_errors(), "{}", parse_diags.render("t.mod"));
        let diags = analyze(&module);
        assert!(diags.has_errors());
    }

    #[test]
    fn call_arity_mismatch_is_reported() {
        let src = "\
FUNCTION rate(x) {\n\
    rate = x\n\
}\n\
ASSIGNED { y }\n\
BREAKPOINT {\n\
    y = rate(1, 2)\n\
}\n";
        let (module, parse_diags) = modcc_ast::parse(src);
        assert!(!parse_diags.has_errors(), "{}", parse_diags.render("t.mod"));
        let diags = analyze(&module);
        assert!(diags.has_errors());
    }

    #[test]
    fn well_formed_module_has_no_semantic_errors() {
        let src = "\
STATE { m }\n\
ASSIGNED { ina }\n\
PARAMETER { g = 1 }\n\
BREAKPOINT {\n\
    SOLVE states METHOD cnexp\n\
    ina = g * m\n\
}\n\
DERIVATIVE states {\n\
    m' = (1 - m) / 10\n\
}\n";
        let (module, parse_diags) = modcc_ast::parse(src);
        assert!(!parse_diags.has_errors(), "{}", parse_diags.render("t.mod"));
        let diags = analyze(&module);
        assert!(!diags.has_errors(), "{}", diags.render("t.mod"));
    }
}
