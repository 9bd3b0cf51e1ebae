#![doc = "Lexer, parser, symbol table, and Module data model for the modcc membrane-mechanism compiler.\n\nThis crate owns the data: source text in, a fully-resolved `module::Module` out, every `Identifier` node already carrying a resolved `SymbolId`. Semantic analysis, the utility visitor passes, and lowering to synthesized API methods live one layer up, in `modcc-compiler`.\n"]
#![warn(missing_docs)]

pub mod ast;
pub mod diagnostics;
pub mod lexer;
pub mod module;
pub mod parser;
pub mod scope;
pub mod symbol;
pub mod token;

pub use diagnostics::{Diagnostic, Diagnostics, Location, Severity};
pub use lexer::{LexError, Lexer};
pub use module::{IonDep, Module, ModuleKind};
pub use parser::{parse, ParseError};
pub use scope::{Scope, ScopeError};
pub use symbol::{Symbol, SymbolArena, SymbolId};
pub use token::{Token, TokenKind};
