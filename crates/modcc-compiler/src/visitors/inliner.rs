//! Function inlining.
//!
//! Only single-statement `FUNCTION`s of the form `name = expr` (the
//! overwhelming majority of rate-function helpers in real mechanisms) are
//! inlined; anything with more than one statement, control flow, or a
//! `LOCAL` declaration of its own is left as an ordinary call for the
//! backend to emit as a real function, since substituting a whole
//! statement sequence in place of an expression would require introducing
//! new block-scoped temporaries the rest of this pipeline does not model.

use std::collections::HashMap;

use modcc_ast::ast::{Block, Expression};
use modcc_ast::symbol::{ProcedureKind, SymbolArena, SymbolId};

/// Attempt to inline one call, given the symbol table it resolves
/// against. Returns `None` when the callee is not a single-statement
/// `FUNCTION`, leaving the call for the backend to emit directly.
pub fn try_inline(callee: SymbolId, args: &[Expression], symbols: &SymbolArena) -> Option<Expression> {
    let proc = symbols.get(callee).as_procedure()?;
    if proc.kind != ProcedureKind::UserFunction {
        return None;
    }
    if proc.args.len() != args.len() {
        return None;
    }
    let return_local = *proc.locals.get(&proc.name)?;
    let [Expression::Assignment { lhs, rhs, .. }] = proc.body.as_slice() else {
        return None;
    };
    match lhs.as_ref() {
        Expression::Identifier { symbol, .. } if *symbol == return_local => {}
        _ => return None,
    }
    let bindings: HashMap<SymbolId, Expression> = proc.args.iter().copied().zip(args.iter().cloned()).collect();
    Some(substitute(rhs, &bindings))
}

/// Walk `body`, replacing every call this pass can inline with its
/// substituted body expression. Must run after [`super::expander::expand`]
/// so every call site is either a bare statement or the entire
/// right-hand side of an assignment.
pub fn inline_calls(body: &Block, symbols: &SymbolArena) -> Block {
    body.iter().map(|stmt| inline_statement(stmt, symbols)).collect()
}

fn inline_statement(stmt: &Expression, symbols: &SymbolArena) -> Expression {
    match stmt {
        Expression::Assignment { lhs, rhs, location } => {
            let rhs = inline_expr(rhs, symbols);
            Expression::Assignment { lhs: lhs.clone(), rhs: Box::new(rhs), location: *location }
        }
        Expression::Derivative { state, rhs, location } => {
            let rhs = inline_expr(rhs, symbols);
            Expression::Derivative { state: *state, rhs: Box::new(rhs), location: *location }
        }
        Expression::Call { callee, args, location } => {
            let args: Vec<Expression> = args.iter().map(|a| inline_expr(a, symbols)).collect();
            match try_inline(*callee, &args, symbols) {
                Some(inlined) => inlined,
                None => Expression::Call { callee: *callee, args, location: *location },
            }
        }
        Expression::If {
            condition,
            then_block,
            else_ifs,
            otherwise,
            location,
        } => Expression::If {
            condition: Box::new(inline_expr(condition, symbols)),
            then_block: inline_calls(then_block, symbols),
            else_ifs: else_ifs.iter().map(|(c, b)| (inline_expr(c, symbols), inline_calls(b, symbols))).collect(),
            otherwise: otherwise.as_ref().map(|b| inline_calls(b, symbols)),
            location: *location,
        },
        other => other.clone(),
    }
}

fn inline_expr(expr: &Expression, symbols: &SymbolArena) -> Expression {
    match expr {
        Expression::Unary { op, operand, location } => {
            Expression::Unary { op: *op, operand: Box::new(inline_expr(operand, symbols)), location: *location }
        }
        Expression::Binary { op, lhs, rhs, location } => Expression::Binary {
            op: *op,
            lhs: Box::new(inline_expr(lhs, symbols)),
            rhs: Box::new(inline_expr(rhs, symbols)),
            location: *location,
        },
        Expression::Call { callee, args, location } => {
            let args: Vec<Expression> = args.iter().map(|a| inline_expr(a, symbols)).collect();
            match try_inline(*callee, &args, symbols) {
                Some(inlined) => inlined,
                None => Expression::Call { callee: *callee, args, location: *location },
            }
        }
        other => other.clone(),
    }
}

/// Replace every reference to a bound symbol with a clone of its bound
/// expression; unlike [`super::renamer::rename`] (symbol-to-symbol), this
/// substitutes a symbol for an arbitrary expression, which is what
/// beta-reducing a call site requires.
fn substitute(expr: &Expression, bindings: &HashMap<SymbolId, Expression>) -> Expression {
    match expr {
        Expression::Number { .. } => expr.clone(),
        Expression::Identifier { symbol, .. } | Expression::Argument { symbol, .. } => {
            bindings.get(symbol).cloned().unwrap_or_else(|| expr.clone())
        }
        Expression::Unary { op, operand, location } => {
            Expression::Unary { op: *op, operand: Box::new(substitute(operand, bindings)), location: *location }
        }
        Expression::Binary { op, lhs, rhs, location } => Expression::Binary {
            op: *op,
            lhs: Box::new(substitute(lhs, bindings)),
            rhs: Box::new(substitute(rhs, bindings)),
            location: *location,
        },
        Expression::Call { callee, args, location } => Expression::Call {
            callee: *callee,
            args: args.iter().map(|a| substitute(a, bindings)).collect(),
            location: *location,
        },
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modcc_ast::diagnostics::Location;
    use modcc_ast::symbol::{LocalKind, LocalVariable, Procedure, Symbol};
    use std::collections::BTreeMap;

    #[test]
    fn single_statement_function_is_inlined_with_arguments_substituted() {
        let mut symbols = SymbolArena::new();
        let arg = symbols.alloc(Symbol::LocalVariable(LocalVariable {
            name: "x".into(),
            kind: LocalKind::Argument,
            external_variable: None,
            location: Location::start(),
        }));
        let ret = symbols.alloc(Symbol::LocalVariable(LocalVariable {
            name: "double".into(),
            kind: LocalKind::Plain,
            external_variable: None,
            location: Location::start(),
        }));
        let mut locals = BTreeMap::new();
        locals.insert("double".to_string(), ret);
        let body = vec![Expression::Assignment {
            lhs: Box::new(Expression::Identifier { symbol: ret, location: Location::start() }),
            rhs: Box::new(Expression::Binary {
                op: modcc_ast::ast::BinaryOp::Mul,
                lhs: Box::new(Expression::Number { value: 2.0, location: Location::start() }),
                rhs: Box::new(Expression::Identifier { symbol: arg, location: Location::start() }),
                location: Location::start(),
            }),
            location: Location::start(),
        }];
        let func = symbols.alloc(Symbol::Procedure(Procedure {
            name: "double".into(),
            kind: ProcedureKind::UserFunction,
            args: vec![arg],
            body,
            locals,
            location: Location::start(),
        }));

        let call_arg = Expression::Number { value: 21.0, location: Location::start() };
        let inlined = try_inline(func, std::slice::from_ref(&call_arg), &symbols).expect("should inline");
        match inlined {
            Expression::Binary { rhs, .. } => {
                assert!(matches!(*rhs, Expression::Number { value, .. } if value == 21.0));
            }
            other => panic!("expected Binary, got {other:?}"),
        }
    }

    #[test]
    fn multi_statement_functions_are_not_inlined() {
        let mut symbols = SymbolArena::new();
        let ret = symbols.alloc(Symbol::LocalVariable(LocalVariable {
            name: "f".into(),
            kind: LocalKind::Plain,
            external_variable: None,
            location: Location::start(),
        }));
        let mut locals = BTreeMap::new();
        locals.insert("f".to_string(), ret);
        let body = vec![
            Expression::Assignment {
                lhs: Box::new(Expression::Identifier { symbol: ret, location: Location::start() }),
                rhs: Box::new(Expression::Number { value: 1.0, location: Location::start() }),
                location: Location::start(),
            },
            Expression::Assignment {
                lhs: Box::new(Expression::Identifier { symbol: ret, location: Location::start() }),
                rhs: Box::new(Expression::Number { value: 2.0, location: Location::start() }),
                location: Location::start(),
            },
        ];
        let func = symbols.alloc(Symbol::Procedure(Procedure {
            name: "f".into(),
            kind: ProcedureKind::UserFunction,
            args: Vec::new(),
            body,
            locals,
            location: Location::start(),
        }));
        assert!(try_inline(func, &[], &symbols).is_none());
    }
}
