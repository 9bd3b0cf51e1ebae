//! Recursive-descent parser with precedence-climbing expression parsing.
//!
//! Top-level blocks are dispatched by keyword; procedure-like blocks
//! (`INITIAL`, `DERIVATIVE`, `BREAKPOINT`, `PROCEDURE`, `FUNCTION`,
//! `NET_RECEIVE`) share one body parser that threads a [`Scope`] through
//! statement and expression parsing so every `Identifier` node is resolved
//! to a [`SymbolId`] as it is built — later passes never look up a name by
//! spelling again.

use std::collections::{BTreeMap, BTreeSet};

use crate::ast::{BinaryOp, Block, Expression, SolveMethod, UnaryOp};
use crate::diagnostics::{Diagnostics, Location};
use crate::lexer::{LexError, Lexer};
use crate::module::{IonDep, Module, ModuleKind};
use crate::scope::{Scope, ScopeError};
use crate::symbol::{
    Access, Ion, IndexedVariable, LocalKind, LocalVariable, Procedure, ProcedureKind, RangeKind,
    Symbol, SymbolArena, SymbolId, Variable, Visibility,
};
use crate::token::{is_right_associative, precedence_of, Token, TokenKind};

/// Syntactic (and name-resolution) errors raised while parsing.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("{location}: unexpected token {found}")]
    UnexpectedToken { found: String, location: Location },
    #[error("{location}: expected {expected}, found {found}")]
    Expected {
        expected: String,
        found: String,
        location: Location,
    },
    #[error("{location}: undefined identifier '{name}'")]
    UndefinedIdentifier { name: String, location: Location },
    #[error("{location}: '{name}' is not callable")]
    NotCallable { name: String, location: Location },
    #[error("{location}: NONSPECIFIC_CURRENT '{name}' must begin with 'i'")]
    InvalidNonspecificCurrent { name: String, location: Location },
    #[error("{location}: ion variable '{name}' must be declared in ASSIGNED or PARAMETER before it is named in a USEION READ/WRITE list")]
    UndeclaredIonVariable { name: String, location: Location },
    #[error("{location}: LOCAL declaration is only permitted at the top level of a block")]
    LocalInNestedScope { location: Location },
    #[error("{0}")]
    Lex(#[from] LexError),
    #[error("{0}")]
    Scope(#[from] ScopeError),
}

impl ParseError {
    fn location(&self) -> Location {
        match self {
            ParseError::UnexpectedToken { location, .. }
            | ParseError::Expected { location, .. }
            | ParseError::UndefinedIdentifier { location, .. }
            | ParseError::NotCallable { location, .. }
            | ParseError::InvalidNonspecificCurrent { location, .. }
            | ParseError::UndeclaredIonVariable { location, .. }
            | ParseError::LocalInNestedScope { location } => *location,
            ParseError::Lex(e) => lex_location(e),
            ParseError::Scope(ScopeError::DuplicateLocal { location, .. }) => *location,
        }
    }
}

fn lex_location(e: &LexError) -> Location {
    match e {
        LexError::UnexpectedChar { location, .. }
        | LexError::BadLineEnding { location }
        | LexError::MalformedNumber { location, .. } => *location,
    }
}

/// Parse a complete module from `source`, returning the partially- or
/// fully-built [`Module`] together with every diagnostic raised along the
/// way. Parsing never panics: a fatal syntax error is appended to the
/// diagnostic sink and parsing stops, returning whatever was built so far.
pub fn parse(source: &str) -> (Module, Diagnostics) {
    let mut module = Module::new(source);
    seed_builtin_variables(&mut module);
    let mut diags = Diagnostics::new();
    let mut parser = Parser::new(source);
    if let Err(err) = parser.parse_module(&mut module, &mut diags) {
        diags.error(err.location(), err.to_string());
    }
    (module, diags)
}

/// Every module implicitly has access to the membrane potential, bound to
/// the host's `vec_v` array, without a declaring block — it is the one
/// indexed variable every mechanism, density or point process, can read
/// regardless of its `USEION` list.
fn seed_builtin_variables(module: &mut Module) {
    let v = module.symbols.alloc(Symbol::IndexedVariable(IndexedVariable {
        name: "v".to_string(),
        external_name: "vec_v".to_string(),
        access: Access::Read,
        ion: Ion::None,
        location: Location::start(),
    }));
    module.globals.insert("v".to_string(), v);

    let dt = module.symbols.alloc(Symbol::IndexedVariable(IndexedVariable {
        name: "dt".to_string(),
        external_name: "dt".to_string(),
        access: Access::Read,
        ion: Ion::None,
        location: Location::start(),
    }));
    module.globals.insert("dt".to_string(), dt);
}

/// A `USEION` clause recorded while parsing `NEURON`, with its symbol
/// wiring deferred until the whole module has been parsed (spec §4.5's
/// `add_variables_to_symbols`): only then is every `STATE`/`PARAMETER`/
/// `ASSIGNED` variable guaranteed to already be in `module.globals`,
/// regardless of whether `NEURON` appears before or after the blocks that
/// declare the variables it couples to.
struct PendingIon {
    name: String,
    kind: Ion,
    read_names: Vec<String>,
    write_names: Vec<String>,
    location: Location,
}

struct Parser<'src> {
    lexer: Lexer<'src>,
    range_names: BTreeSet<String>,
    global_names: BTreeSet<String>,
    pending_ions: Vec<PendingIon>,
}

impl<'src> Parser<'src> {
    fn new(source: &'src str) -> Self {
        Self {
            lexer: Lexer::new(source),
            range_names: BTreeSet::new(),
            global_names: BTreeSet::new(),
            pending_ions: Vec::new(),
        }
    }

    fn peek(&mut self) -> Token {
        self.lexer.peek()
    }

    fn bump(&mut self) -> Token {
        self.lexer.parse()
    }

    fn expect(&mut self, kind: TokenKind, expected: &str) -> Result<Token, ParseError> {
        let tok = self.bump();
        if tok.kind == kind {
            Ok(tok)
        } else {
            Err(ParseError::Expected {
                expected: expected.to_string(),
                found: format!("{tok}"),
                location: tok.location,
            })
        }
    }

    fn at(&mut self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.at(kind) {
            self.bump();
            true
        } else {
            false
        }
    }

    // ---- top level --------------------------------------------------

    fn parse_module(&mut self, module: &mut Module, diags: &mut Diagnostics) -> Result<(), ParseError> {
        loop {
            let tok = self.peek();
            match tok.kind {
                TokenKind::Eof => break,
                TokenKind::Title => {
                    self.bump();
                    let title_tok = self.bump();
                    module.title = Some(title_tok.spelling.trim().to_string());
                }
                TokenKind::Neuron => self.parse_neuron(module)?,
                TokenKind::State => self.parse_variable_block(module, TokenKind::State)?,
                TokenKind::Parameter => self.parse_variable_block(module, TokenKind::Parameter)?,
                TokenKind::Assigned => self.parse_variable_block(module, TokenKind::Assigned)?,
                TokenKind::Units => self.skip_braced_block()?,
                k if k.is_procedure_like_block() => self.parse_procedure_like(module, diags, k)?,
                _ => {
                    return Err(ParseError::UnexpectedToken {
                        found: format!("{tok}"),
                        location: tok.location,
                    })
                }
            }
        }
        self.finalize_ions(module)?;
        Ok(())
    }

    /// Spec §4.5: wire every recorded `USEION READ`/`WRITE` clause now
    /// that every top-level variable-declaring block has been parsed,
    /// upgrading the existing `Variable` in place (access, visibility,
    /// ion) rather than shadowing it with a fresh symbol, and recording a
    /// separate `ion_<name>` shadow indexed variable lowering writes
    /// through.
    fn finalize_ions(&mut self, module: &mut Module) -> Result<(), ParseError> {
        for pending in std::mem::take(&mut self.pending_ions) {
            let mut read_list = Vec::with_capacity(pending.read_names.len());
            for name in &pending.read_names {
                read_list.push(self.upgrade_ion_variable(module, name, pending.kind, Access::Read, pending.location)?);
            }
            let mut write_list = Vec::with_capacity(pending.write_names.len());
            for name in &pending.write_names {
                write_list.push(self.upgrade_ion_variable(module, name, pending.kind, Access::Write, pending.location)?);
            }
            module.ions.push(IonDep { name: pending.name, kind: pending.kind, read_list, write_list });
        }
        Ok(())
    }

    /// Upgrade the pre-declared `Variable` named `name` for ion coupling
    /// and allocate its `ion_<name>` shadow indexed variable, recording
    /// the shadow in `module.ion_shadows` keyed by the variable's own id.
    /// Returns the (unchanged) `SymbolId` of the variable itself, which
    /// `module.globals` keeps mapping `name` to.
    fn upgrade_ion_variable(
        &mut self,
        module: &mut Module,
        name: &str,
        ion: Ion,
        access: Access,
        location: Location,
    ) -> Result<SymbolId, ParseError> {
        let var_id = *module
            .globals
            .get(name)
            .ok_or_else(|| ParseError::UndeclaredIonVariable { name: name.to_string(), location })?;
        let variable = module
            .symbols
            .get_mut(var_id)
            .as_variable_mut()
            .ok_or_else(|| ParseError::UndeclaredIonVariable { name: name.to_string(), location })?;
        variable.access = match access {
            Access::Read => variable.access.with_read(),
            Access::Write => variable.access.with_write(),
            Access::ReadWrite => Access::ReadWrite,
        };
        variable.visibility = Visibility::Global;
        variable.ion = ion;

        let shadow = module.symbols.alloc(Symbol::IndexedVariable(IndexedVariable {
            name: name.to_string(),
            external_name: format!("ion_{name}"),
            access,
            ion,
            location,
        }));
        module.ion_shadows.insert(var_id, shadow);
        Ok(var_id)
    }

    /// Consume a `{ ... }` block without interpreting its contents, used
    /// for `UNITS` (unit-conversion tables are outside this compiler's
    /// scope; spec Non-goals).
    fn skip_braced_block(&mut self) -> Result<(), ParseError> {
        self.expect(TokenKind::Units, "UNITS")?;
        self.expect(TokenKind::LBrace, "{")?;
        let mut depth = 1u32;
        loop {
            let tok = self.bump();
            match tok.kind {
                TokenKind::LBrace => depth += 1,
                TokenKind::RBrace => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                TokenKind::Eof => {
                    return Err(ParseError::Expected {
                        expected: "}".to_string(),
                        found: "end of file".to_string(),
                        location: tok.location,
                    })
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Skip an optional parenthesised unit annotation, e.g. `(mV)` after a
    /// numeric default. Units are not modelled; the annotation is
    /// discarded.
    fn skip_optional_unit_annotation(&mut self) -> Result<(), ParseError> {
        if self.at(TokenKind::LParen) {
            self.bump();
            let mut depth = 1u32;
            loop {
                let tok = self.bump();
                match tok.kind {
                    TokenKind::LParen => depth += 1,
                    TokenKind::RParen => {
                        depth -= 1;
                        if depth == 0 {
                            break;
                        }
                    }
                    TokenKind::Eof => {
                        return Err(ParseError::Expected {
                            expected: ")".to_string(),
                            found: "end of file".to_string(),
                            location: tok.location,
                        })
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }

    fn parse_neuron(&mut self, module: &mut Module) -> Result<(), ParseError> {
        self.expect(TokenKind::Neuron, "NEURON")?;
        self.expect(TokenKind::LBrace, "{")?;
        loop {
            let tok = self.peek();
            match tok.kind {
                TokenKind::RBrace => {
                    self.bump();
                    break;
                }
                TokenKind::Threadsafe => {
                    self.bump();
                    module.threadsafe = true;
                }
                TokenKind::Suffix | TokenKind::PointProcess => {
                    self.bump();
                    module.kind = if tok.kind == TokenKind::PointProcess {
                        ModuleKind::PointProcess
                    } else {
                        ModuleKind::Density
                    };
                    let name = self.expect(TokenKind::Identifier, "mechanism name")?;
                    module.suffix = name.spelling;
                }
                TokenKind::Range => {
                    self.bump();
                    for name in self.parse_identifier_list()? {
                        self.range_names.insert(name);
                    }
                }
                TokenKind::Global => {
                    self.bump();
                    for name in self.parse_identifier_list()? {
                        self.global_names.insert(name);
                    }
                }
                TokenKind::Useion => {
                    self.bump();
                    self.parse_useion()?;
                }
                TokenKind::NonspecificCurrent => {
                    self.bump();
                    for name in self.parse_identifier_list()? {
                        if !name.starts_with('i') {
                            return Err(ParseError::InvalidNonspecificCurrent { name, location: tok.location });
                        }
                        let id = module.symbols.alloc(Symbol::IndexedVariable(IndexedVariable {
                            name: name.clone(),
                            external_name: "vec_rhs".to_string(),
                            access: Access::Write,
                            ion: Ion::Nonspecific,
                            location: tok.location,
                        }));
                        module.globals.insert(name, id);
                    }
                }
                _ => {
                    return Err(ParseError::UnexpectedToken {
                        found: format!("{tok}"),
                        location: tok.location,
                    });
                }
            }
        }
        Ok(())
    }

    /// Parses one `USEION name READ ... WRITE ...` clause and records it
    /// in `self.pending_ions`. Symbol wiring — upgrading the pre-declared
    /// `ena`/`ina`-style variables and allocating their `ion_<name>`
    /// shadows — happens later, in `finalize_ions`, once every
    /// `STATE`/`PARAMETER`/`ASSIGNED` block in the module has been seen
    /// regardless of whether this `NEURON` block appears before or after
    /// them in source order (spec §4.5).
    fn parse_useion(&mut self) -> Result<(), ParseError> {
        let name_tok = self.expect(TokenKind::Identifier, "ion name")?;
        let ion_kind = Ion::from_useion_name(&name_tok.spelling);
        let mut read_names = Vec::new();
        let mut write_names = Vec::new();
        loop {
            match self.peek().kind {
                TokenKind::Read => {
                    self.bump();
                    read_names.extend(self.parse_identifier_list()?);
                }
                TokenKind::Write => {
                    self.bump();
                    write_names.extend(self.parse_identifier_list()?);
                }
                _ => break,
            }
        }
        self.pending_ions.push(PendingIon {
            name: name_tok.spelling,
            kind: ion_kind,
            read_names,
            write_names,
            location: name_tok.location,
        });
        Ok(())
    }

    /// A comma-separated list of identifiers, stopping at the first token
    /// that isn't an identifier or comma (used for `RANGE`/`GLOBAL`/ion
    /// read-write lists, none of which are brace- or paren-delimited).
    fn parse_identifier_list(&mut self) -> Result<Vec<String>, ParseError> {
        let mut names = vec![self.expect(TokenKind::Identifier, "identifier")?.spelling];
        while self.at(TokenKind::Comma) {
            self.bump();
            names.push(self.expect(TokenKind::Identifier, "identifier")?.spelling);
        }
        Ok(names)
    }

    fn parse_variable_block(&mut self, module: &mut Module, kind: TokenKind) -> Result<(), ParseError> {
        self.bump();
        self.expect(TokenKind::LBrace, "{")?;
        loop {
            if self.eat(TokenKind::RBrace) {
                break;
            }
            let name_tok = self.expect(TokenKind::Identifier, "variable name")?;
            let mut default = None;
            if self.eat(TokenKind::Eq) {
                let num_tok = self.expect(TokenKind::Number, "number")?;
                default = num_tok.spelling.parse::<f64>().ok();
            }
            self.skip_optional_unit_annotation()?;

            let range = if kind == TokenKind::State || self.range_names.contains(&name_tok.spelling) {
                RangeKind::Range
            } else {
                RangeKind::Scalar
            };
            let visibility = if self.global_names.contains(&name_tok.spelling) {
                Visibility::Global
            } else {
                Visibility::Local
            };
            let variable = Variable {
                name: name_tok.spelling.clone(),
                access: Access::ReadWrite,
                visibility,
                linkage: crate::symbol::Linkage::Local,
                range,
                ion: Ion::None,
                is_state: kind == TokenKind::State,
                default,
                location: name_tok.location,
            };
            let id = module.symbols.alloc(Symbol::Variable(variable));
            module.globals.insert(name_tok.spelling, id);
        }
        Ok(())
    }

    // ---- procedure-like blocks ---------------------------------------

    fn parse_procedure_like(
        &mut self,
        module: &mut Module,
        diags: &mut Diagnostics,
        kind: TokenKind,
    ) -> Result<(), ParseError> {
        let block_tok = self.bump();
        let proc_kind = match kind {
            TokenKind::Initial => ProcedureKind::Initial,
            TokenKind::Derivative => ProcedureKind::Derivative,
            TokenKind::Breakpoint => ProcedureKind::Breakpoint,
            TokenKind::Procedure => ProcedureKind::UserProcedure,
            TokenKind::Function => ProcedureKind::UserFunction,
            TokenKind::NetReceive => ProcedureKind::NetReceive,
            _ => unreachable!("caller filtered to procedure-like kinds"),
        };

        let name = if matches!(proc_kind, ProcedureKind::UserProcedure | ProcedureKind::UserFunction | ProcedureKind::Derivative) {
            self.expect(TokenKind::Identifier, "name")?.spelling
        } else {
            match proc_kind {
                ProcedureKind::Initial => "initial".to_string(),
                ProcedureKind::Breakpoint => "breakpoint".to_string(),
                ProcedureKind::NetReceive => "net_receive".to_string(),
                _ => unreachable!(),
            }
        };

        let local_globals: BTreeMap<String, SymbolId> = module.globals.clone();
        let mut scope = Scope::new(&local_globals);

        // A FUNCTION returns its value by assigning to a local of its own
        // name (`rate = x` inside `FUNCTION rate(...)`); that name is not
        // yet in `module.globals` (the Procedure symbol is only inserted
        // once the whole block has parsed), so it is bound here as an
        // ordinary local shadowing nothing.
        if proc_kind == ProcedureKind::UserFunction {
            let return_local = module.symbols.alloc(Symbol::LocalVariable(LocalVariable {
                name: name.clone(),
                kind: LocalKind::Plain,
                external_variable: None,
                location: block_tok.location,
            }));
            scope
                .add_local(name.clone(), return_local, block_tok.location, diags, |_| false)
                .map_err(ParseError::from)?;
        }

        let mut args = Vec::new();
        if self.eat(TokenKind::LParen) {
            if !self.at(TokenKind::RParen) {
                loop {
                    let arg_tok = self.expect(TokenKind::Identifier, "argument name")?;
                    self.skip_optional_unit_annotation()?;
                    let id = module.symbols.alloc(Symbol::LocalVariable(LocalVariable {
                        name: arg_tok.spelling.clone(),
                        kind: LocalKind::Argument,
                        external_variable: None,
                        location: arg_tok.location,
                    }));
                    let shadows_indexed = module
                        .globals
                        .get(&arg_tok.spelling)
                        .map(|global_id| module.symbols.get(*global_id).as_indexed_variable().is_some())
                        .unwrap_or(false);
                    scope
                        .add_local(arg_tok.spelling, id, arg_tok.location, diags, |_| shadows_indexed)
                        .map_err(ParseError::from)?;
                    args.push(id);
                    if !self.eat(TokenKind::Comma) {
                        break;
                    }
                }
            }
            self.expect(TokenKind::RParen, ")")?;
        }

        let body = self.parse_block(&mut scope, &mut module.symbols, diags, true)?;
        let locals = scope.into_locals();

        if proc_kind == ProcedureKind::NetReceive {
            let id = module.symbols.alloc(Symbol::NetReceive(crate::symbol::NetReceive {
                args,
                body,
                locals,
                location: block_tok.location,
            }));
            module.net_receive = Some(id);
        } else {
            let id = module.symbols.alloc(Symbol::Procedure(Procedure {
                name: name.clone(),
                kind: proc_kind,
                args,
                body,
                locals,
                location: block_tok.location,
            }));
            module.globals.insert(name, id);
            module.procedures.push(id);
        }
        Ok(())
    }

    /// Parses a `{ ... }` statement sequence. `top_level` is true only for
    /// a procedure-like block's own body (and a `NET_RECEIVE`-nested
    /// `INITIAL` block's body, which is itself a top-level-shaped
    /// construct) — `LOCAL` is rejected everywhere else (spec §4.2:
    /// "LOCAL declaration (only at block top level — not in nested
    /// scopes)"; spec §7 lists "LOCAL in nested scope" as a syntax error).
    fn parse_block(
        &mut self,
        scope: &mut Scope,
        symbols: &mut SymbolArena,
        diags: &mut Diagnostics,
        top_level: bool,
    ) -> Result<Block, ParseError> {
        self.expect(TokenKind::LBrace, "{")?;
        let mut statements = Vec::new();
        loop {
            if self.eat(TokenKind::RBrace) {
                break;
            }
            statements.push(self.parse_statement(scope, symbols, diags, top_level)?);
        }
        Ok(statements)
    }

    fn parse_statement(
        &mut self,
        scope: &mut Scope,
        symbols: &mut SymbolArena,
        diags: &mut Diagnostics,
        top_level: bool,
    ) -> Result<Expression, ParseError> {
        let tok = self.peek();
        match tok.kind {
            TokenKind::Local => {
                if !top_level {
                    return Err(ParseError::LocalInNestedScope { location: tok.location });
                }
                self.parse_local_declaration(scope, symbols, diags)
            }
            TokenKind::Solve => self.parse_solve_statement(scope),
            TokenKind::If => self.parse_if(scope, symbols, diags),
            TokenKind::Initial => {
                // A nested `INITIAL` block inside `NET_RECEIVE` (spec §4.4
                // point 6). Parsed as an ordinary block and spliced in as
                // a sequence via a synthetic `If (1)` wrapper would be
                // misleading, so we just inline its statements directly.
                self.bump();
                let inner = self.parse_block(scope, symbols, diags, true)?;
                Ok(Expression::If {
                    condition: Box::new(Expression::Number { value: 1.0, location: Location::start() }),
                    then_block: inner,
                    else_ifs: Vec::new(),
                    otherwise: None,
                    location: Location::start(),
                })
            }
            _ => self.parse_assignment_or_call(scope, symbols, diags),
        }
    }

    fn parse_local_declaration(
        &mut self,
        scope: &mut Scope,
        symbols: &mut SymbolArena,
        diags: &mut Diagnostics,
    ) -> Result<Expression, ParseError> {
        let tok = self.bump();
        let mut locals = Vec::new();
        loop {
            let name_tok = self.expect(TokenKind::Identifier, "local variable name")?;
            let id = symbols.alloc(Symbol::LocalVariable(LocalVariable {
                name: name_tok.spelling.clone(),
                kind: LocalKind::Plain,
                external_variable: None,
                location: name_tok.location,
            }));
            let shadows_indexed = scope
                .find_global(&name_tok.spelling)
                .map(|global_id| symbols.get(global_id).as_indexed_variable().is_some())
                .unwrap_or(false);
            scope
                .add_local(name_tok.spelling, id, name_tok.location, diags, |_| shadows_indexed)
                .map_err(ParseError::from)?;
            locals.push(id);
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        Ok(Expression::LocalDeclaration {
            locals,
            location: tok.location,
        })
    }

    fn parse_solve_statement(&mut self, scope: &mut Scope) -> Result<Expression, ParseError> {
        let tok = self.bump();
        let target_tok = self.expect(TokenKind::Identifier, "procedure name")?;
        let target = scope.find_global(&target_tok.spelling).ok_or_else(|| ParseError::UndefinedIdentifier {
            name: target_tok.spelling.clone(),
            location: target_tok.location,
        })?;
        let mut method = SolveMethod::Other;
        if self.eat(TokenKind::Method) {
            let method_tok = self.bump();
            method = if method_tok.kind == TokenKind::Cnexp {
                SolveMethod::Cnexp
            } else {
                SolveMethod::Other
            };
        }
        Ok(Expression::SolveStatement {
            target,
            method,
            location: tok.location,
        })
    }

    fn parse_if(
        &mut self,
        scope: &mut Scope,
        symbols: &mut SymbolArena,
        diags: &mut Diagnostics,
    ) -> Result<Expression, ParseError> {
        let tok = self.bump();
        self.expect(TokenKind::LParen, "(")?;
        let condition = Box::new(self.parse_expression(scope, symbols, diags)?);
        self.expect(TokenKind::RParen, ")")?;
        let then_block = self.parse_block(scope, symbols, diags, false)?;

        let mut else_ifs = Vec::new();
        let mut otherwise = None;
        loop {
            if self.at(TokenKind::Else) {
                self.bump();
                if self.eat(TokenKind::If) {
                    self.expect(TokenKind::LParen, "(")?;
                    let cond = self.parse_expression(scope, symbols, diags)?;
                    self.expect(TokenKind::RParen, ")")?;
                    let block = self.parse_block(scope, symbols, diags, false)?;
                    else_ifs.push((cond, block));
                } else {
                    otherwise = Some(self.parse_block(scope, symbols, diags, false)?);
                    break;
                }
            } else {
                break;
            }
        }

        Ok(Expression::If {
            condition,
            then_block,
            else_ifs,
            otherwise,
            location: tok.location,
        })
    }

    fn parse_assignment_or_call(
        &mut self,
        scope: &mut Scope,
        symbols: &mut SymbolArena,
        diags: &mut Diagnostics,
    ) -> Result<Expression, ParseError> {
        let name_tok = self.expect(TokenKind::Identifier, "statement")?;

        if self.eat(TokenKind::Prime) {
            let state = self.resolve(scope, &name_tok)?;
            self.expect(TokenKind::Eq, "=")?;
            let rhs = Box::new(self.parse_expression(scope, symbols, diags)?);
            return Ok(Expression::Derivative {
                state,
                rhs,
                location: name_tok.location,
            });
        }

        if self.at(TokenKind::LParen) {
            let call = self.parse_call(scope, symbols, diags, &name_tok)?;
            return Ok(call);
        }

        let target = self.resolve(scope, &name_tok)?;
        self.expect(TokenKind::Eq, "=")?;
        let rhs = Box::new(self.parse_expression(scope, symbols, diags)?);
        Ok(Expression::Assignment {
            lhs: Box::new(Expression::Identifier {
                symbol: target,
                location: name_tok.location,
            }),
            rhs,
            location: name_tok.location,
        })
    }

    fn parse_call(
        &mut self,
        scope: &mut Scope,
        symbols: &mut SymbolArena,
        diags: &mut Diagnostics,
        name_tok: &Token,
    ) -> Result<Expression, ParseError> {
        let callee = scope.find_global(&name_tok.spelling).ok_or_else(|| ParseError::UndefinedIdentifier {
            name: name_tok.spelling.clone(),
            location: name_tok.location,
        })?;
        if !symbols.get(callee).is_callable() {
            return Err(ParseError::NotCallable {
                name: name_tok.spelling.clone(),
                location: name_tok.location,
            });
        }
        self.expect(TokenKind::LParen, "(")?;
        let mut args = Vec::new();
        if !self.at(TokenKind::RParen) {
            loop {
                args.push(self.parse_expression(scope, symbols, diags)?);
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen, ")")?;
        Ok(Expression::Call {
            callee,
            args,
            location: name_tok.location,
        })
    }

    // ---- expressions --------------------------------------------------

    fn parse_expression(
        &mut self,
        scope: &mut Scope,
        symbols: &mut SymbolArena,
        diags: &mut Diagnostics,
    ) -> Result<Expression, ParseError> {
        // min_prec 3 sits above `=` (precedence 2) so a stray assignment
        // inside a nested expression is never consumed as an operator; it
        // surfaces as an ordinary "unexpected token" at the enclosing
        // delimiter instead.
        self.parse_binop(3, scope, symbols, diags)
    }

    fn parse_binop(
        &mut self,
        min_prec: u8,
        scope: &mut Scope,
        symbols: &mut SymbolArena,
        diags: &mut Diagnostics,
    ) -> Result<Expression, ParseError> {
        let mut lhs = self.parse_unary(scope, symbols, diags)?;
        loop {
            let op_tok = self.peek();
            let Some(prec) = precedence_of(op_tok.kind) else {
                break;
            };
            if prec < min_prec {
                break;
            }
            self.bump();
            let op = to_binary_op(op_tok.kind).ok_or_else(|| ParseError::UnexpectedToken {
                found: format!("{op_tok}"),
                location: op_tok.location,
            })?;
            let next_min = if is_right_associative(op_tok.kind) { prec } else { prec + 1 };
            let rhs = self.parse_binop(next_min, scope, symbols, diags)?;
            lhs = Expression::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                location: op_tok.location,
            };
        }
        Ok(lhs)
    }

    fn parse_unary(
        &mut self,
        scope: &mut Scope,
        symbols: &mut SymbolArena,
        diags: &mut Diagnostics,
    ) -> Result<Expression, ParseError> {
        let tok = self.peek();
        match tok.kind {
            TokenKind::Plus => {
                self.bump();
                self.parse_unary(scope, symbols, diags)
            }
            TokenKind::Minus => {
                self.bump();
                let operand = Box::new(self.parse_unary(scope, symbols, diags)?);
                Ok(Expression::Unary {
                    op: UnaryOp::Negate,
                    operand,
                    location: tok.location,
                })
            }
            TokenKind::Exp | TokenKind::Log | TokenKind::Sin | TokenKind::Cos => {
                self.bump();
                self.expect(TokenKind::LParen, "(")?;
                let operand = Box::new(self.parse_expression(scope, symbols, diags)?);
                self.expect(TokenKind::RParen, ")")?;
                let op = match tok.kind {
                    TokenKind::Exp => UnaryOp::Exp,
                    TokenKind::Log => UnaryOp::Log,
                    TokenKind::Sin => UnaryOp::Sin,
                    TokenKind::Cos => UnaryOp::Cos,
                    _ => unreachable!(),
                };
                Ok(Expression::Unary {
                    op,
                    operand,
                    location: tok.location,
                })
            }
            _ => self.parse_primary(scope, symbols, diags),
        }
    }

    fn parse_primary(
        &mut self,
        scope: &mut Scope,
        symbols: &mut SymbolArena,
        diags: &mut Diagnostics,
    ) -> Result<Expression, ParseError> {
        let tok = self.bump();
        match tok.kind {
            TokenKind::Number => {
                let value = tok.spelling.parse::<f64>().map_err(|_| ParseError::Expected {
                    expected: "number".to_string(),
                    found: tok.spelling.clone(),
                    location: tok.location,
                })?;
                Ok(Expression::Number {
                    value,
                    location: tok.location,
                })
            }
            TokenKind::LParen => {
                let inner = self.parse_expression(scope, symbols, diags)?;
                self.expect(TokenKind::RParen, ")")?;
                Ok(inner)
            }
            TokenKind::Identifier => {
                if self.at(TokenKind::LParen) {
                    self.parse_call(scope, symbols, diags, &tok)
                } else {
                    let symbol = self.resolve(scope, &tok)?;
                    Ok(Expression::Identifier {
                        symbol,
                        location: tok.location,
                    })
                }
            }
            _ => Err(ParseError::UnexpectedToken {
                found: format!("{tok}"),
                location: tok.location,
            }),
        }
    }

    /// Resolve `name_tok` against `scope`. Indexed variables are resolved
    /// directly to their module-global [`crate::symbol::IndexedVariable`]
    /// entry; the function-expander and lowering passes are responsible
    /// for introducing a `LocalVariable` alias where the contract in spec
    /// §4.4 point 4 requires one.
    fn resolve(&mut self, scope: &Scope, name_tok: &Token) -> Result<SymbolId, ParseError> {
        scope.find(&name_tok.spelling).ok_or_else(|| ParseError::UndefinedIdentifier {
            name: name_tok.spelling.clone(),
            location: name_tok.location,
        })
    }
}

fn to_binary_op(kind: TokenKind) -> Option<BinaryOp> {
    Some(match kind {
        TokenKind::Plus => BinaryOp::Add,
        TokenKind::Minus => BinaryOp::Sub,
        TokenKind::Star => BinaryOp::Mul,
        TokenKind::Slash => BinaryOp::Div,
        TokenKind::Caret => BinaryOp::Pow,
        TokenKind::EqEq => BinaryOp::Eq,
        TokenKind::NotEq => BinaryOp::NotEq,
        TokenKind::Lt => BinaryOp::Lt,
        TokenKind::Le => BinaryOp::Le,
        TokenKind::Gt => BinaryOp::Gt,
        TokenKind::Ge => BinaryOp::Ge,
        _ => return None,
    })
}
