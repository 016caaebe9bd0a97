use std::{borrow::Cow, fmt::Display};

use miette::{Diagnostic, Error, NamedSource, SourceSpan};
use thiserror::Error;

pub(crate) fn line_of(src: &NamedSource<String>, span: SourceSpan) -> usize {
    src.inner()[..span.offset()].matches('\n').count() + 1
}

#[derive(Error, Debug, Diagnostic)]
#[error("Invalid character '{token}'")]
#[diagnostic(help("remove or correct the character: `{token}`"))]
pub struct SingleTokenError {
    #[source_code]
    src: NamedSource<String>,

    #[label("this character")]
    bad_bit: SourceSpan,

    pub token: char,
}

impl SingleTokenError {
    pub fn line(&self) -> usize {
        line_of(&self.src, self.bad_bit)
    }
}

#[derive(Error, Debug, Diagnostic)]
#[error("Incomplete escape sequence")]
#[diagnostic(help("a `\\` inside a string must be followed by the character it escapes"))]
pub struct EscapeError {
    #[source_code]
    src: NamedSource<String>,

    #[label("this escape never completes")]
    bad_bit: SourceSpan,
}

impl EscapeError {
    pub fn line(&self) -> usize {
        line_of(&self.src, self.bad_bit)
    }
}

#[derive(Error, Debug, Diagnostic)]
#[error("unterminated double quote string")]
#[diagnostic(help("add a closing `\"` to the string literal"))]
pub struct StringTerminationError {
    #[source_code]
    src: NamedSource<String>,

    #[label("Syntax Error: Missing trailing `\"` symbol to terminate the string literal")]
    bad_line: SourceSpan,
}

impl StringTerminationError {
    pub fn line(&self) -> usize {
        line_of(&self.src, self.bad_line)
    }
}

/// The declared type of a variable. Kept apart from [`TokenKind`] so that a
/// literal's shape and a type keyword never share a tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKeyword {
    Int,
    Float,
    Bool,
    String,
}

impl TypeKeyword {
    pub fn from_keyword(word: &str) -> Option<Self> {
        match word {
            "int" => Some(TypeKeyword::Int),
            "float" => Some(TypeKeyword::Float),
            "bool" => Some(TypeKeyword::Bool),
            "string" => Some(TypeKeyword::String),
            _ => None,
        }
    }

    pub fn keyword(self) -> &'static str {
        match self {
            TypeKeyword::Int => "int",
            TypeKeyword::Float => "float",
            TypeKeyword::Bool => "bool",
            TypeKeyword::String => "string",
        }
    }
}

impl Display for TypeKeyword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.keyword())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    IntLiteral,
    FloatLiteral,
    BoolLiteral,
    StringLiteral,
    Ident,
    Equal,
    Semicolon,
    Println,
    LeftBrace,
    RightBrace,
    LeftParen,
    RightParen,
    Type(TypeKeyword),
    End,
}

impl Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenKind::IntLiteral => write!(f, "INT_LITERAL"),
            TokenKind::FloatLiteral => write!(f, "FLOAT_LITERAL"),
            TokenKind::BoolLiteral => write!(f, "BOOL_LITERAL"),
            TokenKind::StringLiteral => write!(f, "STRING_LITERAL"),
            TokenKind::Ident => write!(f, "IDENTIFIER"),
            TokenKind::Equal => write!(f, "EQUAL"),
            TokenKind::Semicolon => write!(f, "SEMICOLON"),
            TokenKind::Println => write!(f, "PRINTLN"),
            TokenKind::LeftBrace => write!(f, "LEFT_BRACE"),
            TokenKind::RightBrace => write!(f, "RIGHT_BRACE"),
            TokenKind::LeftParen => write!(f, "LEFT_PAREN"),
            TokenKind::RightParen => write!(f, "RIGHT_PAREN"),
            TokenKind::Type(ty) => write!(f, "{}", ty.keyword().to_ascii_uppercase()),
            TokenKind::End => write!(f, "END"),
        }
    }
}

/// A classified lexeme. String literals hold their text with escapes already
/// resolved, which is the only case where `literal` is owned.
#[derive(Debug, Clone, PartialEq)]
pub struct Token<'de> {
    pub kind: TokenKind,
    pub literal: Cow<'de, str>,
    pub span: SourceSpan,
}

impl Display for Token<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let lit = &self.literal;
        match self.kind {
            TokenKind::StringLiteral => write!(f, "{} {lit:?}", self.kind),
            TokenKind::End => write!(f, "{}", self.kind),
            kind => write!(f, "{kind} {lit}"),
        }
    }
}

pub struct Lexer<'de> {
    filename: Option<&'de str>,
    whole: &'de str,
    rest: &'de str,
    byte: usize,
    finished: bool,
}

impl<'de> Lexer<'de> {
    pub fn new(filename: Option<&'de str>, input: &'de str) -> Self {
        Lexer {
            filename,
            whole: input,
            rest: input,
            byte: 0,
            finished: false,
        }
    }

    pub(crate) fn source(&self) -> NamedSource<String> {
        NamedSource::new(self.filename.unwrap_or("<input>"), self.whole.to_string())
    }

    fn bump(&mut self, bytes: usize) {
        self.rest = &self.rest[bytes..];
        self.byte += bytes;
    }

    /// Produces the token at the cursor and moves past it. Once the input is
    /// exhausted every call yields [`TokenKind::End`].
    pub fn next_token(&mut self) -> Result<Token<'de>, Error> {
        let trimmed = self.rest.trim_start_matches([' ', '\t', '\n', '\r']);
        self.bump(self.rest.len() - trimmed.len());

        let start = self.byte;
        let rest = self.rest;
        let Some(c) = rest.chars().next() else {
            return Ok(Token {
                kind: TokenKind::End,
                literal: Cow::Borrowed(""),
                span: SourceSpan::from(start..start),
            });
        };

        enum Start {
            Number,
            String,
            Ident,
        }

        let started = match c {
            '0'..='9' | '.' => Start::Number,
            '=' => return Ok(self.single(TokenKind::Equal)),
            ';' => return Ok(self.single(TokenKind::Semicolon)),
            '{' => return Ok(self.single(TokenKind::LeftBrace)),
            '}' => return Ok(self.single(TokenKind::RightBrace)),
            '(' => return Ok(self.single(TokenKind::LeftParen)),
            ')' => return Ok(self.single(TokenKind::RightParen)),
            '"' => Start::String,
            c if c.is_ascii_alphabetic() => Start::Ident,
            c => {
                return Err(SingleTokenError {
                    src: self.source(),
                    bad_bit: SourceSpan::from(start..start + c.len_utf8()),
                    token: c,
                }
                .into());
            }
        };

        match started {
            Start::Number => {
                // a second '.' ends the literal and is left for the next call
                let mut dotted = false;
                let end = rest
                    .find(|c: char| match c {
                        '0'..='9' => false,
                        '.' if !dotted => {
                            dotted = true;
                            false
                        }
                        _ => true,
                    })
                    .unwrap_or(rest.len());

                let literal = &rest[..end];
                self.bump(end);

                let kind = if dotted {
                    TokenKind::FloatLiteral
                } else {
                    TokenKind::IntLiteral
                };
                Ok(Token {
                    kind,
                    literal: Cow::Borrowed(literal),
                    span: SourceSpan::from(start..self.byte),
                })
            }
            Start::Ident => {
                let end = rest
                    .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                    .unwrap_or(rest.len());

                let literal = &rest[..end];
                self.bump(end);

                let kind = match literal {
                    "println" => TokenKind::Println,
                    "true" | "false" => TokenKind::BoolLiteral,
                    word => TypeKeyword::from_keyword(word)
                        .map_or(TokenKind::Ident, TokenKind::Type),
                };
                Ok(Token {
                    kind,
                    literal: Cow::Borrowed(literal),
                    span: SourceSpan::from(start..self.byte),
                })
            }
            Start::String => self.string(),
        }
    }

    fn single(&mut self, kind: TokenKind) -> Token<'de> {
        let literal = &self.rest[..1];
        self.bump(1);
        Token {
            kind,
            literal: Cow::Borrowed(literal),
            span: SourceSpan::from(self.byte - 1..self.byte),
        }
    }

    fn string(&mut self) -> Result<Token<'de>, Error> {
        let start = self.byte;
        let rest = self.rest;
        let body = &rest[1..];

        // stays `None` until the first escape, so plain strings borrow the source
        let mut resolved: Option<String> = None;
        let mut chars = body.char_indices();
        while let Some((i, c)) = chars.next() {
            match c {
                '"' => {
                    let literal = match resolved {
                        Some(text) => Cow::Owned(text),
                        None => Cow::Borrowed(&body[..i]),
                    };
                    self.bump(i + 2);
                    return Ok(Token {
                        kind: TokenKind::StringLiteral,
                        literal,
                        span: SourceSpan::from(start..self.byte),
                    });
                }
                '\\' => {
                    let text = resolved.get_or_insert_with(|| body[..i].to_string());
                    match chars.next() {
                        Some((_, 'n')) => text.push('\n'),
                        Some((_, 't')) => text.push('\t'),
                        Some((_, other)) => text.push(other),
                        None => {
                            return Err(EscapeError {
                                src: self.source(),
                                bad_bit: SourceSpan::from(start + 1 + i..self.whole.len()),
                            }
                            .into());
                        }
                    }
                }
                c => {
                    if let Some(text) = resolved.as_mut() {
                        text.push(c);
                    }
                }
            }
        }

        Err(StringTerminationError {
            src: self.source(),
            bad_line: SourceSpan::from(start..self.whole.len()),
        }
        .into())
    }
}

impl<'de> Iterator for Lexer<'de> {
    type Item = Result<Token<'de>, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let token = self.next_token();
        self.finished = match &token {
            Ok(token) => token.kind == TokenKind::End,
            Err(_) => true,
        };
        Some(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Result<Vec<TokenKind>, Error> {
        Lexer::new(None, input)
            .map(|token| token.map(|token| token.kind))
            .collect()
    }

    #[test]
    fn program_header_and_body() -> Result<(), Error> {
        let kinds = kinds("int main() {\n\tprintln(\"x\");\r\n}")?;
        assert_eq!(
            kinds,
            vec![
                TokenKind::Type(TypeKeyword::Int),
                TokenKind::Ident,
                TokenKind::LeftParen,
                TokenKind::RightParen,
                TokenKind::LeftBrace,
                TokenKind::Println,
                TokenKind::LeftParen,
                TokenKind::StringLiteral,
                TokenKind::RightParen,
                TokenKind::Semicolon,
                TokenKind::RightBrace,
                TokenKind::End,
            ]
        );
        Ok(())
    }

    #[test]
    fn keywords_and_identifiers() -> Result<(), Error> {
        let kinds = kinds("true false bool string float int println foo_1 Int")?;
        assert_eq!(
            kinds,
            vec![
                TokenKind::BoolLiteral,
                TokenKind::BoolLiteral,
                TokenKind::Type(TypeKeyword::Bool),
                TokenKind::Type(TypeKeyword::String),
                TokenKind::Type(TypeKeyword::Float),
                TokenKind::Type(TypeKeyword::Int),
                TokenKind::Println,
                TokenKind::Ident,
                TokenKind::Ident,
                TokenKind::End,
            ]
        );
        Ok(())
    }

    #[test]
    fn second_dot_starts_a_new_number() -> Result<(), Error> {
        let mut lexer = Lexer::new(None, "1.2.3 42 .");
        let tokens = [
            lexer.next_token()?,
            lexer.next_token()?,
            lexer.next_token()?,
            lexer.next_token()?,
        ];
        let seen: Vec<_> = tokens
            .iter()
            .map(|token| (token.kind, token.literal.as_ref()))
            .collect();
        assert_eq!(
            seen,
            vec![
                (TokenKind::FloatLiteral, "1.2"),
                (TokenKind::FloatLiteral, ".3"),
                (TokenKind::IntLiteral, "42"),
                (TokenKind::FloatLiteral, "."),
            ]
        );
        Ok(())
    }

    #[test]
    fn string_escapes_are_resolved() -> Result<(), Error> {
        let mut lexer = Lexer::new(None, r#""a\nb\tc\"d\\e\q" "plain""#);
        let escaped = lexer.next_token()?;
        assert_eq!(escaped.literal, "a\nb\tc\"d\\eq");
        let plain = lexer.next_token()?;
        assert!(matches!(plain.literal, Cow::Borrowed("plain")));
        assert_eq!(plain.span, SourceSpan::from(18..25));
        Ok(())
    }

    #[test]
    fn end_repeats_but_iteration_stops() -> Result<(), Error> {
        let mut lexer = Lexer::new(None, "  ");
        assert_eq!(lexer.next_token()?.kind, TokenKind::End);
        assert_eq!(lexer.next_token()?.kind, TokenKind::End);

        let mut lexer = Lexer::new(None, "x");
        assert_eq!(lexer.next().transpose()?.map(|t| t.kind), Some(TokenKind::Ident));
        assert_eq!(lexer.next().transpose()?.map(|t| t.kind), Some(TokenKind::End));
        assert!(lexer.next().is_none());
        Ok(())
    }

    #[test]
    fn invalid_character() {
        let err = kinds("int main()\n{ # }").unwrap_err();
        let err = err.downcast_ref::<SingleTokenError>().unwrap();
        assert_eq!(err.token, '#');
        assert_eq!(err.line(), 2);

        let err = kinds("_x").unwrap_err();
        assert_eq!(err.downcast_ref::<SingleTokenError>().unwrap().token, '_');
    }

    #[test]
    fn incomplete_escape() {
        let err = kinds("\"abc\\").unwrap_err();
        assert!(err.downcast_ref::<EscapeError>().is_some());
    }

    #[test]
    fn unterminated_string() {
        let err = kinds("println(\"abc);").unwrap_err();
        assert!(err.downcast_ref::<StringTerminationError>().is_some());
    }

    #[test]
    fn tokens_display_kind_and_text() -> Result<(), Error> {
        let rendered: Vec<String> = Lexer::new(None, "float f = \"a\tb\";")
            .map(|token| token.map(|token| token.to_string()))
            .collect::<Result<_, _>>()?;
        assert_eq!(
            rendered,
            vec![
                "FLOAT float",
                "IDENTIFIER f",
                "EQUAL =",
                "STRING_LITERAL \"a\\tb\"",
                "SEMICOLON ;",
                "END",
            ]
        );
        Ok(())
    }
}
