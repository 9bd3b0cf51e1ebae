//! Substitutes [`SymbolId`] references throughout a cloned expression
//! tree. [`super::inliner`] uses this to rewrite a callee's body with the
//! caller's actual arguments bound in place of the callee's formal
//! parameters.

use std::collections::HashMap;

use modcc_ast::ast::{Block, Expression};
use modcc_ast::symbol::SymbolId;

/// Replace every `Identifier`/`Argument`/`Derivative` reference to a key of
/// `map` with its mapped value, leaving everything else untouched.
pub fn rename(expr: &Expression, map: &HashMap<SymbolId, SymbolId>) -> Expression {
    match expr {
        Expression::Number { .. } => expr.clone(),
        Expression::Identifier { symbol, location } => {
            Expression::Identifier { symbol: map.get(symbol).copied().unwrap_or(*symbol), location: *location }
        }
        Expression::Argument { symbol, location } => {
            Expression::Argument { symbol: map.get(symbol).copied().unwrap_or(*symbol), location: *location }
        }
        Expression::Derivative { state, rhs, location } => Expression::Derivative {
            state: map.get(state).copied().unwrap_or(*state),
            rhs: Box::new(rename(rhs, map)),
            location: *location,
        },
        Expression::Assignment { lhs, rhs, location } => Expression::Assignment {
            lhs: Box::new(rename(lhs, map)),
            rhs: Box::new(rename(rhs, map)),
            location: *location,
        },
        Expression::Unary { op, operand, location } => {
            Expression::Unary { op: *op, operand: Box::new(rename(operand, map)), location: *location }
        }
        Expression::Binary { op, lhs, rhs, location } => Expression::Binary {
            op: *op,
            lhs: Box::new(rename(lhs, map)),
            rhs: Box::new(rename(rhs, map)),
            location: *location,
        },
        Expression::Call { callee, args, location } => Expression::Call {
            callee: map.get(callee).copied().unwrap_or(*callee),
            args: args.iter().map(|a| rename(a, map)).collect(),
            location: *location,
        },
        Expression::LocalDeclaration { locals, location } => Expression::LocalDeclaration {
            locals: locals.iter().map(|s| map.get(s).copied().unwrap_or(*s)).collect(),
            location: *location,
        },
        Expression::If {
            condition,
            then_block,
            else_ifs,
            otherwise,
            location,
        } => Expression::If {
            condition: Box::new(rename(condition, map)),
            then_block: rename_block(then_block, map),
            else_ifs: else_ifs.iter().map(|(c, b)| (rename(c, map), rename_block(b, map))).collect(),
            otherwise: otherwise.as_ref().map(|b| rename_block(b, map)),
            location: *location,
        },
        Expression::SolveStatement { target, method, location } => Expression::SolveStatement {
            target: map.get(target).copied().unwrap_or(*target),
            method: *method,
            location: *location,
        },
    }
}

/// Apply [`rename`] to every statement of a block.
pub fn rename_block(block: &Block, map: &HashMap<SymbolId, SymbolId>) -> Block {
    block.iter().map(|stmt| rename(stmt, map)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use modcc_ast::diagnostics::Location;
    use modcc_ast::symbol::{Symbol, SymbolArena, Variable};

    #[test]
    fn identifier_is_replaced_when_mapped() {
        let mut arena = SymbolArena::new();
        let from = arena.alloc(Symbol::Variable(Variable::range_read_write("x", Location::start())));
        let to = arena.alloc(Symbol::Variable(Variable::range_read_write("y", Location::start())));
        let mut map = HashMap::new();
        map.insert(from, to);
        let expr = Expression::Identifier { symbol: from, location: Location::start() };
        let renamed = rename(&expr, &map);
        assert!(matches!(renamed, Expression::Identifier { symbol, .. } if symbol == to));
    }

    #[test]
    fn unmapped_symbols_are_left_alone() {
        let mut arena = SymbolArena::new();
        let untouched = arena.alloc(Symbol::Variable(Variable::range_read_write("z", Location::start())));
        let map = HashMap::new();
        let expr = Expression::Identifier { symbol: untouched, location: Location::start() };
        let renamed = rename(&expr, &map);
        assert!(matches!(renamed, Expression::Identifier { symbol, .. } if symbol == untouched));
    }
}
