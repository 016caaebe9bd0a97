pub mod eval;
pub mod lex;
pub mod parse;

pub use eval::Interpreter;
pub use lex::Lexer;
pub use parse::Parser;
