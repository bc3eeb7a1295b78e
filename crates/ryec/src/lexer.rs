//! Tokenizer for Rye source code.
//!
//! A hand-written scanner over the raw bytes of the source. Tokens carry
//! their byte span so later phases can report precise locations.

use crate::ast::LiteralValue;
use crate::diagnostics::{Diagnostic, DiagnosticResult, ErrorKind};
use std::ops::Range;

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Range<usize>,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Keywords
    Var,
    Set,
    Function,
    If,
    Else,
    Return,
    For,
    While,
    From,
    To,
    Break,
    Continue,
    Thread,
    Make,

    Ident(String),
    Literal(LiteralValue),

    // Operators
    Plus,         // +
    Minus,        // -
    Star,         // *
    Slash,        // /
    Percent,      // %
    Amp,          // &
    Pipe,         // |
    Caret,        // ^
    AmpAmp,       // &&
    PipePipe,     // ||
    Bang,         // !
    EqEq,         // ==
    NotEq,        // !=
    Lt,           // <
    LtEq,         // <=
    Gt,           // >
    GtEq,         // >=
    Assign,       // <-
    PlusPlus,     // ++
    MinusMinus,   // --
    PlusAssign,   // +=
    MinusAssign,  // -=
    StarAssign,   // *=
    SlashAssign,  // /=
    Question,     // ?
    Colon,        // :
    Arrow,        // ->

    // Punctuation
    OpenParen,
    CloseParen,
    OpenBrace,
    CloseBrace,
    OpenBracket,
    CloseBracket,
    Comma,
    Semicolon,

    Eof,
}

fn keyword_kind(ident: &str) -> Option<TokenKind> {
    match ident {
        "var" => Some(TokenKind::Var),
        "set" => Some(TokenKind::Set),
        "function" => Some(TokenKind::Function),
        "if" => Some(TokenKind::If),
        "else" => Some(TokenKind::Else),
        "return" => Some(TokenKind::Return),
        "for" => Some(TokenKind::For),
        "while" => Some(TokenKind::While),
        "from" => Some(TokenKind::From),
        "to" => Some(TokenKind::To),
        "break" => Some(TokenKind::Break),
        "continue" => Some(TokenKind::Continue),
        "thread" => Some(TokenKind::Thread),
        "make" => Some(TokenKind::Make),
        "true" => Some(TokenKind::Literal(LiteralValue::Bool(true))),
        "false" => Some(TokenKind::Literal(LiteralValue::Bool(false))),
        _ => None,
    }
}

pub struct Lexer<'a> {
    source: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Lexer {
            source,
            bytes: source.as_bytes(),
            pos: 0,
        }
    }

    /// Scans the whole source into a token stream ending with `Eof`.
    pub fn tokenize(mut self) -> DiagnosticResult<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                break;
            }
        }
        Ok(tokens)
    }

    fn peek(&self) -> u8 {
        if self.pos < self.bytes.len() {
            self.bytes[self.pos]
        } else {
            0
        }
    }

    fn peek_at(&self, offset: usize) -> u8 {
        if self.pos + offset < self.bytes.len() {
            self.bytes[self.pos + offset]
        } else {
            0
        }
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                b' ' | b'\t' | b'\r' | b'\n' => self.pos += 1,
                b'/' if self.peek_at(1) == b'/' => {
                    while self.pos < self.bytes.len() && self.peek() != b'\n' {
                        self.pos += 1;
                    }
                }
                _ => return,
            }
        }
    }

    fn token(&self, kind: TokenKind, span: Range<usize>) -> Token {
        Token {
            kind,
            text: self.source[span.clone()].to_string(),
            span,
        }
    }

    fn next_token(&mut self) -> DiagnosticResult<Token> {
        self.skip_trivia();
        let start = self.pos;
        if self.pos >= self.bytes.len() {
            return Ok(Token {
                kind: TokenKind::Eof,
                span: start..start,
                text: String::new(),
            });
        }

        let c = self.peek();

        if c.is_ascii_alphabetic() || c == b'_' {
            while self.peek().is_ascii_alphanumeric() || self.peek() == b'_' {
                self.pos += 1;
            }
            let text = &self.source[start..self.pos];
            let kind = keyword_kind(text).unwrap_or_else(|| TokenKind::Ident(text.to_string()));
            return Ok(self.token(kind, start..self.pos));
        }

        if c.is_ascii_digit() {
            return self.scan_number(start);
        }

        if c == b'"' {
            return self.scan_string(start);
        }

        // Multi-byte operators first, longest match wins.
        let two = match (c, self.peek_at(1)) {
            (b'<', b'-') => Some(TokenKind::Assign),
            (b'-', b'>') => Some(TokenKind::Arrow),
            (b'=', b'=') => Some(TokenKind::EqEq),
            (b'!', b'=') => Some(TokenKind::NotEq),
            (b'<', b'=') => Some(TokenKind::LtEq),
            (b'>', b'=') => Some(TokenKind::GtEq),
            (b'&', b'&') => Some(TokenKind::AmpAmp),
            (b'|', b'|') => Some(TokenKind::PipePipe),
            (b'+', b'+') => Some(TokenKind::PlusPlus),
            (b'-', b'-') => Some(TokenKind::MinusMinus),
            (b'+', b'=') => Some(TokenKind::PlusAssign),
            (b'-', b'=') => Some(TokenKind::MinusAssign),
            (b'*', b'=') => Some(TokenKind::StarAssign),
            (b'/', b'=') => Some(TokenKind::SlashAssign),
            _ => None,
        };
        if let Some(kind) = two {
            self.pos += 2;
            return Ok(self.token(kind, start..self.pos));
        }

        let kind = match c {
            b'+' => TokenKind::Plus,
            b'-' => TokenKind::Minus,
            b'*' => TokenKind::Star,
            b'/' => TokenKind::Slash,
            b'%' => TokenKind::Percent,
            b'&' => TokenKind::Amp,
            b'|' => TokenKind::Pipe,
            b'^' => TokenKind::Caret,
            b'!' => TokenKind::Bang,
            b'<' => TokenKind::Lt,
            b'>' => TokenKind::Gt,
            b'?' => TokenKind::Question,
            b':' => TokenKind::Colon,
            b'(' => TokenKind::OpenParen,
            b')' => TokenKind::CloseParen,
            b'{' => TokenKind::OpenBrace,
            b'}' => TokenKind::CloseBrace,
            b'[' => TokenKind::OpenBracket,
            b']' => TokenKind::CloseBracket,
            b',' => TokenKind::Comma,
            b';' => TokenKind::Semicolon,
            _ => {
                return Err(Diagnostic::error_with_span(
                    "LEXER",
                    ErrorKind::UnexpectedCharacter,
                    format!("unexpected character {:?}", c as char),
                    start..start + 1,
                ));
            }
        };
        self.pos += 1;
        Ok(self.token(kind, start..self.pos))
    }

    fn scan_number(&mut self, start: usize) -> DiagnosticResult<Token> {
        while self.peek().is_ascii_digit() {
            self.pos += 1;
        }

        // A dot followed by a digit makes this a float literal.
        let mut is_float = false;
        if self.peek() == b'.' && self.peek_at(1).is_ascii_digit() {
            is_float = true;
            self.pos += 1;
            while self.peek().is_ascii_digit() {
                self.pos += 1;
            }
        }

        let text = &self.source[start..self.pos];
        let value = if is_float {
            match text.parse::<f32>() {
                Ok(v) => LiteralValue::Float(v),
                Err(_) => {
                    return Err(Diagnostic::error_with_span(
                        "LEXER",
                        ErrorKind::UnexpectedCharacter,
                        format!("invalid float literal \"{}\"", text),
                        start..self.pos,
                    ));
                }
            }
        } else {
            match text.parse::<i32>() {
                Ok(v) => LiteralValue::Int(v),
                Err(_) => {
                    return Err(Diagnostic::error_with_span(
                        "LEXER",
                        ErrorKind::UnexpectedCharacter,
                        format!("integer literal \"{}\" is out of range", text),
                        start..self.pos,
                    ));
                }
            }
        };
        Ok(self.token(TokenKind::Literal(value), start..self.pos))
    }

    fn scan_string(&mut self, start: usize) -> DiagnosticResult<Token> {
        self.pos += 1; // opening quote
        let mut bytes: Vec<u8> = Vec::new();
        loop {
            match self.peek() {
                0 | b'\n' => {
                    return Err(Diagnostic::error_with_span(
                        "LEXER",
                        ErrorKind::UnterminatedString,
                        "unterminated string literal",
                        start..self.pos,
                    ));
                }
                b'"' => {
                    self.pos += 1;
                    break;
                }
                b'\\' => {
                    // Escape sequences: \n \t \r \\ \" \0
                    let escaped = self.peek_at(1);
                    let resolved = match escaped {
                        b'n' => b'\n',
                        b't' => b'\t',
                        b'r' => b'\r',
                        b'\\' => b'\\',
                        b'"' => b'"',
                        b'0' => 0,
                        _ => {
                            return Err(Diagnostic::error_with_span(
                                "LEXER",
                                ErrorKind::UnexpectedCharacter,
                                format!("unknown escape sequence \"\\{}\"", escaped as char),
                                self.pos..self.pos + 2,
                            ));
                        }
                    };
                    bytes.push(resolved);
                    self.pos += 2;
                }
                b => {
                    bytes.push(b);
                    self.pos += 1;
                }
            }
        }
        let value = String::from_utf8_lossy(&bytes).into_owned();
        Ok(self.token(
            TokenKind::Literal(LiteralValue::String(value)),
            start..self.pos,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        Lexer::new(src)
            .tokenize()
            .expect("tokenize failed")
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn scans_declaration_tokens() {
        let ks = kinds("var x int <- 3;");
        assert_eq!(
            ks,
            vec![
                TokenKind::Var,
                TokenKind::Ident("x".into()),
                TokenKind::Ident("int".into()),
                TokenKind::Assign,
                TokenKind::Literal(LiteralValue::Int(3)),
                TokenKind::Semicolon,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn assign_wins_over_less_than() {
        assert_eq!(
            kinds("a <- b < c")[1..4],
            [
                TokenKind::Assign,
                TokenKind::Ident("b".into()),
                TokenKind::Lt,
            ]
        );
    }

    #[test]
    fn scans_string_escapes() {
        let ks = kinds(r#""a\n\"b""#);
        assert_eq!(
            ks[0],
            TokenKind::Literal(LiteralValue::String("a\n\"b".into()))
        );
    }

    #[test]
    fn unterminated_string_is_fatal() {
        let err = Lexer::new("\"oops").tokenize().unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnterminatedString);
    }

    #[test]
    fn float_requires_digit_after_dot() {
        let ks = kinds("1.5 2");
        assert_eq!(ks[0], TokenKind::Literal(LiteralValue::Float(1.5)));
        assert_eq!(ks[1], TokenKind::Literal(LiteralValue::Int(2)));
    }

    #[test]
    fn comments_are_trivia() {
        let ks = kinds("1 // trailing\n2");
        assert_eq!(ks.len(), 3);
    }
}
