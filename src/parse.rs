use std::fmt::Display;

use miette::{Diagnostic, Error, NamedSource, SourceSpan};
use thiserror::Error;

use crate::{
    Lexer,
    lex::{Token, TokenKind, TypeKeyword, line_of},
};

/// What the grammar wanted at the point a [`SyntaxError`] was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expected {
    Kind(TokenKind),
    VariableType,
    Expression,
    Value,
}

impl Display for Expected {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expected::Kind(kind) => write!(f, "'{kind}'"),
            Expected::VariableType => write!(f, "a variable type"),
            Expected::Expression => write!(f, "an expression"),
            Expected::Value => write!(f, "a variable or literal value"),
        }
    }
}

#[derive(Error, Debug, Diagnostic)]
#[error("Unexpected token '{literal}', expected {expected}")]
#[diagnostic(help("current token type is `{found}`"))]
pub struct SyntaxError {
    #[source_code]
    src: NamedSource<String>,

    #[label("here")]
    bad_bit: SourceSpan,

    pub found: TokenKind,
    pub literal: String,
    pub expected: Expected,
}

impl SyntaxError {
    pub fn line(&self) -> usize {
        line_of(&self.src, self.bad_bit)
    }
}

/// Grammar recognition over a single token of lookahead. The lexer is pulled
/// one token at a time and nothing is ever put back.
pub struct Parser<'de> {
    lexer: Lexer<'de>,
    current: Token<'de>,
}

impl<'de> Parser<'de> {
    /// Reads the first token eagerly, so a lexical error at the very start of
    /// the input surfaces here.
    pub fn new(filename: Option<&'de str>, whole: &'de str) -> Result<Self, Error> {
        let mut lexer = Lexer::new(filename, whole);
        let current = lexer.next_token()?;
        Ok(Parser { lexer, current })
    }

    pub fn current(&self) -> &Token<'de> {
        &self.current
    }

    pub fn check(&self, kind: TokenKind) -> bool {
        self.current.kind == kind
    }

    /// Consumes the current token unconditionally and returns it.
    pub fn advance(&mut self) -> Result<Token<'de>, Error> {
        let next = self.lexer.next_token()?;
        Ok(std::mem::replace(&mut self.current, next))
    }

    pub fn expect(&mut self, expected: TokenKind) -> Result<Token<'de>, Error> {
        if self.check(expected) {
            self.advance()
        } else {
            Err(self.unexpected(Expected::Kind(expected)))
        }
    }

    /// Accepts any of the declared-type keywords.
    pub fn expect_type(&mut self) -> Result<TypeKeyword, Error> {
        match self.current.kind {
            TokenKind::Type(ty) => {
                self.advance()?;
                Ok(ty)
            }
            _ => Err(self.unexpected(Expected::VariableType)),
        }
    }

    pub fn unexpected(&self, expected: Expected) -> Error {
        let literal = match self.current.kind {
            TokenKind::End => "end of input".to_string(),
            _ => self.current.literal.to_string(),
        };
        SyntaxError {
            src: self.source(),
            bad_bit: self.current.span,
            found: self.current.kind,
            literal,
            expected,
        }
        .into()
    }

    pub(crate) fn source(&self) -> NamedSource<String> {
        self.lexer.source()
    }
}
