//! The expression/statement node taxonomy.
//!
//! Nodes are tagged enum variants rather than a class hierarchy (§9 design
//! note): a `match` over `Expression` replaces the original's visitor
//! double-dispatch, and there is no separate `ConditionalExpression` node —
//! a relational operator is just another [`BinaryOp`] carried by `Binary`,
//! mirroring the original's `ConditionalExpression : BinaryExpression`.

use crate::diagnostics::Location;
use crate::symbol::SymbolId;

/// Unary prefix operators. Plain `+x` is folded away by the parser (spec
/// §4.5: unary plus is a no-op, never represented as a node).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Negate,
    Exp,
    Log,
    Sin,
    Cos,
}

/// Binary operators, arithmetic and relational alike.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinaryOp {
    /// True for the comparison operators (the original's conditional-
    /// expression marker).
    pub fn is_relational(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::NotEq | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        )
    }
}

/// An expression node.
#[derive(Debug, Clone)]
pub enum Expression {
    /// A numeric literal.
    Number { value: f64, location: Location },
    /// A reference to a resolved symbol (variable, indexed variable, or
    /// local). Resolution happens during parsing against the active
    /// [`crate::scope::Scope`]; the node carries the resolved id rather
    /// than the spelling so later passes never re-resolve names.
    Identifier { symbol: SymbolId, location: Location },
    /// `x' = rhs` inside a `DERIVATIVE` block.
    Derivative {
        state: SymbolId,
        rhs: Box<Expression>,
        location: Location,
    },
    /// `lhs = rhs` (also used for compound accumulation once lowered: the
    /// lowering stage rewrites `+=`/`-=` into an explicit `Assignment` over
    /// a re-read of the target, matching the original's de-sugared IR).
    Assignment {
        lhs: Box<Expression>,
        rhs: Box<Expression>,
        location: Location,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expression>,
        location: Location,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expression>,
        rhs: Box<Expression>,
        location: Location,
    },
    /// A call to a user `PROCEDURE`/`FUNCTION`.
    Call {
        callee: SymbolId,
        args: Vec<Expression>,
        location: Location,
    },
    /// `LOCAL x, y, z` — declares locals without initialising them.
    LocalDeclaration { locals: Vec<SymbolId>, location: Location },
    /// A formal argument inside a procedure/function prototype.
    Argument { symbol: SymbolId, location: Location },
    /// `IF (cond) { then } ELSE IF (cond) { .. } ELSE { otherwise }`.
    If {
        condition: Box<Expression>,
        then_block: Block,
        else_ifs: Vec<(Expression, Block)>,
        otherwise: Option<Block>,
        location: Location,
    },
    /// `SOLVE target METHOD method`.
    SolveStatement {
        target: SymbolId,
        method: SolveMethod,
        location: Location,
    },
}

impl Expression {
    pub fn location(&self) -> Location {
        match self {
            Expression::Number { location, .. }
            | Expression::Identifier { location, .. }
            | Expression::Derivative { location, .. }
            | Expression::Assignment { location, .. }
            | Expression::Unary { location, .. }
            | Expression::Binary { location, .. }
            | Expression::Call { location, .. }
            | Expression::LocalDeclaration { location, .. }
            | Expression::Argument { location, .. }
            | Expression::If { location, .. }
            | Expression::SolveStatement { location, .. } => *location,
        }
    }
}

/// Integration method named in a `SOLVE ... METHOD` statement. `cnexp` is
/// the only method this compiler can lower (spec §4.8); anything else is
/// accepted syntactically and rejected during lowering so the diagnostic
/// can point at the `SOLVE` statement rather than failing to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveMethod {
    Cnexp,
    Other,
}

/// An ordered sequence of statements, e.g. a procedure body or an `IF` arm.
/// A `Block` is just `Expression`s sequenced for effect — there is no
/// separate `Statement` type, since every construct in this DSL (including
/// assignment and `IF`) already produces an `Expression` node.
pub type Block = Vec<Expression>;
