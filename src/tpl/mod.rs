pub mod ast;
pub mod engine;
mod expr;
pub mod functions;
pub mod lexer;
mod parser;
mod render;
pub mod render_context;

pub use parser::MAX_NESTING;

/// Prefix under which caller variables are visible to templates.
pub const VAR_PREFIX: &str = "var:";
