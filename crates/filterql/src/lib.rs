/// Filter expression language support
///
/// This module provides parsing of the search-bar filter language used
/// across telemetry queries: `service.name = 'redis' AND duration_nano > 100`.
///
/// # Architecture
///
/// 1. **Lexer** (`lexer.rs`) - Tokenizes filter expression strings
/// 2. **Parser** (`parser.rs`) - Builds an Abstract Syntax Tree (AST) from tokens
/// 3. **AST** (`ast.rs`) - Defines the filter expression AST structures
///
/// Compilation of the AST to SQL lives in the `chquery` crate; this crate
/// knows nothing about storage.
///
/// # Usage
///
/// ```rust,ignore
/// use filterql::parser;
///
/// let query = parser::parse("service.name = 'redis' AND duration_nano > 100")?;
/// ```
pub mod ast;
pub mod lexer;
pub mod parser;

pub use ast::*;
pub use parser::{parse, ParserError};
