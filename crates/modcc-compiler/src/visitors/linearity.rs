//! Symbolic linearity classification of an expression with respect to one
//! state variable (spec §4.8): is the right-hand side of `state' = rhs` (or
//! a `BREAKPOINT` current accumulation) an expression of the form
//! `coefficient * state + constant`, where neither `coefficient` nor
//! `constant` themselves depend on `state`? If so, [`crate::lowering`] can
//! synthesize the closed-form `cnexp` update instead of refusing the
//! module.
//!
//! "Constant" here does not mean a numeric literal — a `PARAMETER` like
//! `gnabar` is constant with respect to a state variable even though it is
//! itself a named, run-time-supplied quantity. Both `coefficient` and
//! `constant` are therefore kept as cloned [`Expression`] subtrees, not
//! `f64`s.

use std::collections::HashMap;

use modcc_ast::ast::{BinaryOp, Expression, UnaryOp};
use modcc_ast::diagnostics::Location;
use modcc_ast::symbol::SymbolId;

/// The result of classifying one expression against one state variable.
#[derive(Debug, Clone)]
pub enum Linearity {
    /// The expression does not mention `state` at all.
    Constant(Expression),
    /// `coefficient * state + constant`, neither side mentioning `state`.
    Linear { coefficient: Expression, constant: Expression },
    /// No closed form; lowering must reject the equation.
    Nonlinear,
}

/// Intermediate representation built bottom-up. `coefficient: None` means
/// the subtree classified so far is entirely state-independent (the
/// `Constant` case); `Some(c)` carries the (possibly compound) coefficient
/// of `state`.
#[derive(Debug, Clone)]
struct LinearForm {
    coefficient: Option<Expression>,
    constant: Expression,
}

/// Classify `expr` with respect to `state`, memoizing by node address so a
/// diamond-shaped or deeply reused subtree (sharing is rare in this AST
/// since every node owns its children, but cheap to guard against) is
/// classified at most once per call.
pub fn classify(expr: &Expression, state: SymbolId) -> Linearity {
    let mut cache = HashMap::new();
    match classify_form(expr, state, &mut cache) {
        Some(LinearForm { coefficient: None, constant }) => Linearity::Constant(constant),
        Some(LinearForm { coefficient: Some(coefficient), constant }) => Linearity::Linear { coefficient, constant },
        None => Linearity::Nonlinear,
    }
}

/// True if `expr` mentions `state` anywhere in its subtree.
pub fn depends_on(expr: &Expression, state: SymbolId) -> bool {
    match expr {
        Expression::Number { .. } => false,
        Expression::Identifier { symbol, .. } | Expression::Argument { symbol, .. } => *symbol == state,
        Expression::Unary { operand, .. } => depends_on(operand, state),
        Expression::Binary { lhs, rhs, .. } => depends_on(lhs, state) || depends_on(rhs, state),
        Expression::Call { args, .. } => args.iter().any(|a| depends_on(a, state)),
        Expression::Derivative { rhs, .. } => depends_on(rhs, state),
        Expression::Assignment { lhs, rhs, .. } => depends_on(lhs, state) || depends_on(rhs, state),
        Expression::LocalDeclaration { .. } | Expression::SolveStatement { .. } => false,
        Expression::If {
            condition,
            then_block,
            else_ifs,
            otherwise,
            ..
        } => {
            depends_on(condition, state)
                || then_block.iter().any(|e| depends_on(e, state))
                || else_ifs.iter().any(|(c, b)| depends_on(c, state) || b.iter().any(|e| depends_on(e, state)))
                || otherwise.as_ref().map(|b| b.iter().any(|e| depends_on(e, state))).unwrap_or(false)
        }
    }
}

fn classify_form(
    expr: &Expression,
    state: SymbolId,
    cache: &mut HashMap<*const Expression, Linearity>,
) -> Option<LinearForm> {
    let key = expr as *const Expression;
    if let Some(cached) = cache.get(&key) {
        return match cached {
            Linearity::Constant(c) => Some(LinearForm { coefficient: None, constant: c.clone() }),
            Linearity::Linear { coefficient, constant } => {
                Some(LinearForm { coefficient: Some(coefficient.clone()), constant: constant.clone() })
            }
            Linearity::Nonlinear => None,
        };
    }
    let form = classify_form_uncached(expr, state, cache);
    let result = match &form {
        Some(LinearForm { coefficient: None, constant }) => Linearity::Constant(constant.clone()),
        Some(LinearForm { coefficient: Some(c), constant }) => {
            Linearity::Linear { coefficient: c.clone(), constant: constant.clone() }
        }
        None => Linearity::Nonlinear,
    };
    cache.insert(key, result);
    form
}

fn classify_form_uncached(
    expr: &Expression,
    state: SymbolId,
    cache: &mut HashMap<*const Expression, Linearity>,
) -> Option<LinearForm> {
    match expr {
        Expression::Number { .. } => Some(LinearForm { coefficient: None, constant: expr.clone() }),
        Expression::Identifier { symbol, location } => {
            if *symbol == state {
                Some(LinearForm {
                    coefficient: Some(one(*location)),
                    constant: zero(*location),
                })
            } else {
                Some(LinearForm { coefficient: None, constant: expr.clone() })
            }
        }
        Expression::Unary { op: UnaryOp::Negate, operand, location } => {
            let inner = classify_form(operand, state, cache)?;
            Some(LinearForm {
                coefficient: inner.coefficient.map(|c| negate(c, *location)),
                constant: negate(inner.constant, *location),
            })
        }
        Expression::Unary { .. } => {
            if depends_on(expr, state) {
                None
            } else {
                Some(LinearForm { coefficient: None, constant: expr.clone() })
            }
        }
        Expression::Binary { op: BinaryOp::Add, lhs, rhs, location } => {
            let l = classify_form(lhs, state, cache)?;
            let r = classify_form(rhs, state, cache)?;
            Some(LinearForm {
                coefficient: add_coefficients(l.coefficient, r.coefficient, *location),
                constant: add(l.constant, r.constant, *location),
            })
        }
        Expression::Binary { op: BinaryOp::Sub, lhs, rhs, location } => {
            let l = classify_form(lhs, state, cache)?;
            let r = classify_form(rhs, state, cache)?;
            let negated_r_coeff = r.coefficient.map(|c| negate(c, *location));
            Some(LinearForm {
                coefficient: add_coefficients(l.coefficient, negated_r_coeff, *location),
                constant: sub(l.constant, r.constant, *location),
            })
        }
        Expression::Binary { op: BinaryOp::Mul, lhs, rhs, location } => {
            let l = classify_form(lhs, state, cache)?;
            let r = classify_form(rhs, state, cache)?;
            match (l.coefficient, r.coefficient) {
                (None, None) => Some(LinearForm {
                    coefficient: None,
                    constant: mul(l.constant, r.constant, *location),
                }),
                (Some(c), None) => Some(LinearForm {
                    coefficient: Some(mul(c, r.constant.clone(), *location)),
                    constant: mul(l.constant, r.constant, *location),
                }),
                (None, Some(c)) => Some(LinearForm {
                    coefficient: Some(mul(l.constant.clone(), c, *location)),
                    constant: mul(l.constant, r.constant, *location),
                }),
                (Some(_), Some(_)) => None,
            }
        }
        Expression::Binary { op: BinaryOp::Div, lhs, rhs, location } => {
            let l = classify_form(lhs, state, cache)?;
            if depends_on(rhs, state) {
                return None;
            }
            let divisor = (**rhs).clone();
            Some(LinearForm {
                coefficient: l.coefficient.map(|c| div(c, divisor.clone(), *location)),
                constant: div(l.constant, divisor, *location),
            })
        }
        Expression::Binary { .. } => {
            if depends_on(expr, state) {
                None
            } else {
                Some(LinearForm { coefficient: None, constant: expr.clone() })
            }
        }
        Expression::Call { .. } => {
            if depends_on(expr, state) {
                None
            } else {
                Some(LinearForm { coefficient: None, constant: expr.clone() })
            }
        }
        Expression::Argument { .. }
        | Expression::Derivative { .. }
        | Expression::Assignment { .. }
        | Expression::LocalDeclaration { .. }
        | Expression::If { .. }
        | Expression::SolveStatement { .. } => None,
    }
}

fn add_coefficients(a: Option<Expression>, b: Option<Expression>, location: Location) -> Option<Expression> {
    match (a, b) {
        (None, None) => None,
        (Some(a), None) => Some(a),
        (None, Some(b)) => Some(b),
        (Some(a), Some(b)) => Some(add(a, b, location)),
    }
}

fn one(location: Location) -> Expression {
    Expression::Number { value: 1.0, location }
}

fn zero(location: Location) -> Expression {
    Expression::Number { value: 0.0, location }
}

fn negate(expr: Expression, location: Location) -> Expression {
    Expression::Unary { op: UnaryOp::Negate, operand: Box::new(expr), location }
}

fn add(lhs: Expression, rhs: Expression, location: Location) -> Expression {
    Expression::Binary { op: BinaryOp::Add, lhs: Box::new(lhs), rhs: Box::new(rhs), location }
}

fn sub(lhs: Expression, rhs: Expression, location: Location) -> Expression {
    Expression::Binary { op: BinaryOp::Sub, lhs: Box::new(lhs), rhs: Box::new(rhs), location }
}

fn mul(lhs: Expression, rhs: Expression, location: Location) -> Expression {
    Expression::Binary { op: BinaryOp::Mul, lhs: Box::new(lhs), rhs: Box::new(rhs), location }
}

fn div(lhs: Expression, rhs: Expression, location: Location) -> Expression {
    Expression::Binary { op: BinaryOp::Div, lhs: Box::new(lhs), rhs: Box::new(rhs), location }
}
