//! Floating-point operation accounting over a lowered procedure body.
//!
//! Mirrors the original's `FlopVisitor`/`FlopAccumulator` split: each
//! operator kind gets its own tally, `raw_flops()` sums only the four
//! arithmetic counters, and negation is counted as a `sub` — a
//! simplification the original calls out explicitly: `x - -x` is not
//! counted (the two negations cancel syntactically) but this pass does
//! not attempt that cancellation analysis, so back-to-back unary
//! negations are tallied individually, same as upstream.

use modcc_ast::ast::{BinaryOp, Block, Expression, UnaryOp};

/// Per-operator-kind tallies for one procedure (or a whole module, if the
/// caller accumulates across procedures itself).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlopAccumulator {
    pub add: usize,
    pub sub: usize,
    pub mul: usize,
    pub div: usize,
    pub pow: usize,
    pub exp: usize,
    pub sin: usize,
    pub cos: usize,
    pub log: usize,
}

impl FlopAccumulator {
    /// Sum of the four arithmetic counters, excluding `pow` and the
    /// transcendental function counters — matches the original's
    /// `raw_flops()`, which never folded `pow` into the total either.
    pub fn raw_flops(&self) -> usize {
        self.add + self.sub + self.mul + self.div
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    fn merge(&mut self, other: FlopAccumulator) {
        self.add += other.add;
        self.sub += other.sub;
        self.mul += other.mul;
        self.div += other.div;
        self.pow += other.pow;
        self.exp += other.exp;
        self.sin += other.sin;
        self.cos += other.cos;
        self.log += other.log;
    }
}

/// Count operations across an entire procedure body.
pub fn count_block(body: &Block) -> FlopAccumulator {
    let mut acc = FlopAccumulator::default();
    for stmt in body {
        acc.merge(count_expr(stmt));
    }
    acc
}

fn count_expr(expr: &Expression) -> FlopAccumulator {
    let mut acc = FlopAccumulator::default();
    match expr {
        Expression::Number { .. } | Expression::Identifier { .. } | Expression::Argument { .. } => {}
        Expression::LocalDeclaration { .. } | Expression::SolveStatement { .. } => {}
        Expression::Derivative { rhs, .. } => acc.merge(count_expr(rhs)),
        // Assignment itself is free; only its right-hand side contributes.
        Expression::Assignment { rhs, .. } => acc.merge(count_expr(rhs)),
        Expression::Unary { op, operand, .. } => {
            match op {
                UnaryOp::Negate => acc.sub += 1,
                UnaryOp::Exp => acc.exp += 1,
                UnaryOp::Log => acc.log += 1,
                UnaryOp::Sin => acc.sin += 1,
                UnaryOp::Cos => acc.cos += 1,
            }
            acc.merge(count_expr(operand));
        }
        Expression::Binary { op, lhs, rhs, .. } => {
            match op {
                BinaryOp::Add => acc.add += 1,
                BinaryOp::Sub => acc.sub += 1,
                BinaryOp::Mul => acc.mul += 1,
                BinaryOp::Div => acc.div += 1,
                BinaryOp::Pow => acc.pow += 1,
                BinaryOp::Eq | BinaryOp::NotEq | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {}
            }
            acc.merge(count_expr(lhs));
            acc.merge(count_expr(rhs));
        }
        Expression::Call { args, .. } => {
            for arg in args {
                acc.merge(count_expr(arg));
            }
        }
        Expression::If {
            condition,
            then_block,
            else_ifs,
            otherwise,
            ..
        } => {
            acc.merge(count_expr(condition));
            acc.merge(count_block(then_block));
            for (cond, block) in else_ifs {
                acc.merge(count_expr(cond));
                acc.merge(count_block(block));
            }
            if let Some(block) = otherwise {
                acc.merge(count_block(block));
            }
        }
    }
    acc
}

#[cfg(test)]
mod tests {
    use super::*;
    use modcc_ast::diagnostics::Location;

    fn num(value: f64) -> Expression {
        Expression::Number { value, location: Location::start() }
    }

    #[test]
    fn raw_flops_excludes_pow_and_transcendentals() {
        let expr = Expression::Binary {
            op: BinaryOp::Add,
            lhs: Box::new(Expression::Binary {
                op: BinaryOp::Pow,
                lhs: Box::new(num(2.0)),
                rhs: Box::new(num(3.0)),
                location: Location::start(),
            }),
            rhs: Box::new(Expression::Unary { op: UnaryOp::Exp, operand: Box::new(num(1.0)), location: Location::start() }),
            location: Location::start(),
        };
        let acc = count_expr(&expr);
        assert_eq!(acc.add, 1);
        assert_eq!(acc.pow, 1);
        assert_eq!(acc.exp, 1);
        assert_eq!(acc.raw_flops(), 1);
    }

    #[test]
    fn back_to_back_negation_is_counted_twice_not_cancelled() {
        let expr = Expression::Unary {
            op: UnaryOp::Negate,
            operand: Box::new(Expression::Unary { op: UnaryOp::Negate, operand: Box::new(num(1.0)), location: Location::start() }),
            location: Location::start(),
        };
        assert_eq!(count_expr(&expr).sub, 2);
    }

    #[test]
    fn assignment_itself_is_free() {
        let expr = Expression::Assignment {
            lhs: Box::new(num(0.0)),
            rhs: Box::new(Expression::Binary {
                op: BinaryOp::Mul,
                lhs: Box::new(num(2.0)),
                rhs: Box::new(num(3.0)),
                location: Location::start(),
            }),
            location: Location::start(),
        };
        let acc = count_expr(&expr);
        assert_eq!(acc.mul, 1);
        assert_eq!(acc.raw_flops(), 1);
    }
}
