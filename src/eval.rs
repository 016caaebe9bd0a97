use std::{collections::HashMap, io::Write};

use miette::{Diagnostic, Error, IntoDiagnostic, NamedSource, SourceSpan};
use thiserror::Error;

use crate::{
    Parser,
    lex::{TokenKind, TypeKeyword, line_of},
    parse::Expected,
};

#[derive(Error, Debug, Diagnostic)]
#[error(
    "Cannot assign non-{noun} value to {article} {noun} variable",
    noun = .expected.noun(),
    article = .expected.article()
)]
#[diagnostic(help("`{value}` does not have the shape of a `{expected}` value"))]
pub struct TypeMismatchError {
    #[source_code]
    src: NamedSource<String>,

    #[label("this value")]
    bad_bit: SourceSpan,

    pub expected: TypeKeyword,
    pub value: String,
}

impl TypeMismatchError {
    pub fn line(&self) -> usize {
        line_of(&self.src, self.bad_bit)
    }
}

#[derive(Error, Debug, Diagnostic)]
#[error("Variable '{name}' is not defined")]
#[diagnostic(help("declare `{name}` with an initial value before using it"))]
pub struct UndefinedVariableError {
    #[source_code]
    src: NamedSource<String>,

    #[label("not defined")]
    bad_bit: SourceSpan,

    pub name: String,
}

impl UndefinedVariableError {
    pub fn line(&self) -> usize {
        line_of(&self.src, self.bad_bit)
    }
}

#[derive(Error, Debug, Diagnostic)]
#[error("Variable '{name}' is already declared as `{previous}`")]
#[diagnostic(help("pick another name, or declare `{name}` as `{previous}` again"))]
pub struct RedeclarationError {
    #[source_code]
    src: NamedSource<String>,

    #[label("redeclared as `{declared}` here")]
    bad_bit: SourceSpan,

    pub name: String,
    pub previous: TypeKeyword,
    pub declared: TypeKeyword,
}

impl RedeclarationError {
    pub fn line(&self) -> usize {
        line_of(&self.src, self.bad_bit)
    }
}

impl TypeKeyword {
    fn noun(self) -> &'static str {
        match self {
            TypeKeyword::Int => "integer",
            TypeKeyword::Float => "float",
            TypeKeyword::Bool => "boolean",
            TypeKeyword::String => "string",
        }
    }

    fn article(self) -> &'static str {
        match self {
            TypeKeyword::Int => "an",
            _ => "a",
        }
    }
}

/// Structural check of a value against a declared type. The empty string
/// passes for `int` and `float`.
pub fn conforms_to(ty: TypeKeyword, value: &str) -> bool {
    match ty {
        TypeKeyword::Int => value.chars().all(|c| c.is_ascii_digit()),
        TypeKeyword::Float => {
            value.chars().all(|c| c.is_ascii_digit() || c == '.')
                && value.matches('.').count() <= 1
        }
        TypeKeyword::Bool => matches!(value, "true" | "false"),
        TypeKeyword::String => true,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub ty: TypeKeyword,
    pub value: Option<String>,
}

/// Flat variable store. Every value is held as text, tagged with the type it
/// was declared under.
#[derive(Debug, Default)]
pub struct Environment {
    variables: HashMap<String, Binding>,
}

impl Environment {
    pub fn get(&self, name: &str) -> Option<&Binding> {
        self.variables.get(name)
    }

    pub fn value(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(|binding| binding.value.as_deref())
    }

    /// Records a declaration. Without a value, an earlier value under the
    /// same name is kept.
    pub fn define(&mut self, name: &str, ty: TypeKeyword, value: Option<String>) {
        let binding = self
            .variables
            .entry(name.to_string())
            .or_insert(Binding { ty, value: None });
        binding.ty = ty;
        if value.is_some() {
            binding.value = value;
        }
    }
}

/// Recognizes the program and executes each statement the moment it has been
/// recognized. There is no tree and no second pass.
pub struct Interpreter<'de, W> {
    parser: Parser<'de>,
    environment: Environment,
    out: W,
}

impl<'de, W: Write> Interpreter<'de, W> {
    pub fn new(filename: Option<&'de str>, whole: &'de str, out: W) -> Result<Self, Error> {
        Ok(Self {
            parser: Parser::new(filename, whole)?,
            environment: Environment::default(),
            out,
        })
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn into_output(self) -> W {
        self.out
    }

    /// `int NAME ( )` followed by either a block or `;`, then end of input.
    pub fn run(&mut self) -> Result<(), Error> {
        self.parser.expect(TokenKind::Type(TypeKeyword::Int))?;
        self.parser.expect(TokenKind::Ident)?;
        self.parser.expect(TokenKind::LeftParen)?;
        self.parser.expect(TokenKind::RightParen)?;

        if self.parser.check(TokenKind::LeftBrace) {
            self.parser.advance()?;
            while !self.parser.check(TokenKind::RightBrace) {
                self.statement()?;
            }
            self.parser.expect(TokenKind::RightBrace)?;
        } else {
            self.parser.expect(TokenKind::Semicolon)?;
        }

        self.parser.expect(TokenKind::End)?;
        Ok(())
    }

    fn statement(&mut self) -> Result<(), Error> {
        if self.parser.check(TokenKind::Println) {
            self.println()
        } else {
            self.declaration()
        }
    }

    fn println(&mut self) -> Result<(), Error> {
        self.parser.expect(TokenKind::Println)?;
        self.parser.expect(TokenKind::LeftParen)?;

        let text = if self.parser.check(TokenKind::StringLiteral) {
            self.parser.advance()?.literal.into_owned()
        } else {
            self.evaluate_expression()?
        };
        writeln!(self.out, "{text}").into_diagnostic()?;

        self.parser.expect(TokenKind::RightParen)?;
        self.parser.expect(TokenKind::Semicolon)?;
        Ok(())
    }

    fn declaration(&mut self) -> Result<(), Error> {
        let ty = self.parser.expect_type()?;
        let name = self.parser.expect(TokenKind::Ident)?;

        let previous = self.environment.get(&name.literal).map(|binding| binding.ty);
        if let Some(previous) = previous.filter(|&previous| previous != ty) {
            return Err(RedeclarationError {
                src: self.parser.source(),
                bad_bit: name.span,
                name: name.literal.into_owned(),
                previous,
                declared: ty,
            }
            .into());
        }

        let value = if self.parser.check(TokenKind::Equal) {
            self.parser.advance()?;
            let start = self.parser.current().span;
            let value = self.evaluate_expression()?;
            if !conforms_to(ty, &value) {
                return Err(TypeMismatchError {
                    src: self.parser.source(),
                    bad_bit: start,
                    expected: ty,
                    value,
                }
                .into());
            }
            Some(value)
        } else {
            None
        };
        self.environment.define(&name.literal, ty, value);

        self.parser.expect(TokenKind::Semicolon)?;
        Ok(())
    }

    pub fn evaluate_expression(&mut self) -> Result<String, Error> {
        match self.parser.current().kind {
            TokenKind::StringLiteral => Ok(self.parser.advance()?.literal.into_owned()),
            TokenKind::Ident
            | TokenKind::IntLiteral
            | TokenKind::FloatLiteral
            | TokenKind::BoolLiteral => self.evaluate_variable(),
            _ => Err(self.parser.unexpected(Expected::Expression)),
        }
    }

    pub fn evaluate_variable(&mut self) -> Result<String, Error> {
        match self.parser.current().kind {
            TokenKind::Ident => {
                let token = self.parser.current();
                let Some(value) = self.environment.value(&token.literal) else {
                    return Err(UndefinedVariableError {
                        src: self.parser.source(),
                        bad_bit: token.span,
                        name: token.literal.to_string(),
                    }
                    .into());
                };
                let value = value.to_string();
                self.parser.advance()?;
                Ok(value)
            }
            TokenKind::IntLiteral | TokenKind::FloatLiteral | TokenKind::BoolLiteral => {
                Ok(self.parser.advance()?.literal.into_owned())
            }
            _ => Err(self.parser.unexpected(Expected::Value)),
        }
    }
}
