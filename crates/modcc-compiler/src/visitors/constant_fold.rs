//! Constant folding over [`Expression`] trees.
//!
//! Folding is bottom-up: children are folded first, so by the time a
//! `Binary`/`Unary` node is visited its operands are already as reduced as
//! they can get, and a single traversal reaches the same fixed point a
//! naive repeat-until-unchanged loop would.

use modcc_ast::ast::{BinaryOp, Expression, UnaryOp};

/// Fold every constant-foldable subexpression of `expr`, returning a new
/// tree. Non-numeric subtrees (anything touching an `Identifier`, `Call`,
/// etc.) are cloned through unchanged.
pub fn fold(expr: &Expression) -> Expression {
    match expr {
        Expression::Number { .. } | Expression::Identifier { .. } | Expression::Argument { .. } => expr.clone(),
        Expression::LocalDeclaration { .. } => expr.clone(),
        Expression::Derivative { state, rhs, location } => Expression::Derivative {
            state: *state,
            rhs: Box::new(fold(rhs)),
            location: *location,
        },
        Expression::Assignment { lhs, rhs, location } => Expression::Assignment {
            lhs: Box::new(fold(lhs)),
            rhs: Box::new(fold(rhs)),
            location: *location,
        },
        Expression::Unary { op, operand, location } => {
            let operand = fold(operand);
            if let Expression::Number { value, .. } = operand {
                let folded = match op {
                    UnaryOp::Negate => -value,
                    UnaryOp::Exp => value.exp(),
                    UnaryOp::Log => value.ln(),
                    UnaryOp::Sin => value.sin(),
                    UnaryOp::Cos => value.cos(),
                };
                Expression::Number { value: folded, location: *location }
            } else {
                Expression::Unary { op: *op, operand: Box::new(operand), location: *location }
            }
        }
        Expression::Binary { op, lhs, rhs, location } => {
            let lhs = fold(lhs);
            let rhs = fold(rhs);
            if let (Expression::Number { value: a, .. }, Expression::Number { value: b, .. }) = (&lhs, &rhs) {
                if let Some(value) = fold_binary(*op, *a, *b) {
                    return Expression::Number { value, location: *location };
                }
            }
            Expression::Binary {
                op: *op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                location: *location,
            }
        }
        Expression::Call { callee, args, location } => Expression::Call {
            callee: *callee,
            args: args.iter().map(fold).collect(),
            location: *location,
        },
        Expression::If {
            condition,
            then_block,
            else_ifs,
            otherwise,
            location,
        } => Expression::If {
            condition: Box::new(fold(condition)),
            then_block: then_block.iter().map(fold).collect(),
            else_ifs: else_ifs
                .iter()
                .map(|(cond, block)| (fold(cond), block.iter().map(fold).collect()))
                .collect(),
            otherwise: otherwise.as_ref().map(|block| block.iter().map(fold).collect()),
            location: *location,
        },
        Expression::SolveStatement { .. } => expr.clone(),
    }
}

/// Relational/equality operators are never folded (spec §4.6: "comparisons
/// are never folded"), even when both operands are numeric literals — a
/// printer may still need to emit the comparison against a run-time `v`
/// in the general case, and the original keeps `ConditionalExpression`
/// nodes out of its constant folder entirely.
fn fold_binary(op: BinaryOp, a: f64, b: f64) -> Option<f64> {
    Some(match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => {
            if b == 0.0 {
                return None;
            }
            a / b
        }
        BinaryOp::Pow => a.powf(b),
        BinaryOp::Eq
        | BinaryOp::NotEq
        | BinaryOp::Lt
        | BinaryOp::Le
        | BinaryOp::Gt
        | BinaryOp::Ge => return None,
    })
}
