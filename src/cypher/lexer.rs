// Copyright (c) 2025 - Cowboy AI, Inc.
//! Cypher lexical analysis.
//!
//! Produces a flat token list with byte spans. Keywords are not separate
//! token kinds: Cypher keywords are case-insensitive and most of them are
//! also legal identifiers, so the parser matches them by text in context.
//!
//! Whitespace, `// line` comments and `/* block */` comments are skipped.
//! Outside string literals, comments and backtick-quoted identifiers only
//! ASCII is accepted.

use std::fmt;

/// Byte range of a token in the source text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// Token kinds for Cypher
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Unquoted identifier or keyword
    Ident(String),
    /// Backtick-quoted identifier (content without the backticks)
    QuotedIdent(String),
    /// String literal (raw content without quotes, escapes untouched)
    Str(String),
    /// Numeric literal as written
    Number(String),
    /// Parameter reference: `$name` or `$0` (stored without the sigil)
    Param(String),

    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Colon,
    Comma,
    Dot,
    DotDot,
    Semicolon,
    Pipe,
    Star,
    Plus,
    PlusEq,
    Minus,
    Slash,
    Percent,
    Caret,
    Eq,
    Neq,
    Lt,
    Gt,
    Le,
    Ge,
    RegexMatch,
    Amp,
    Bang,

    Eof,
}

impl TokenKind {
    /// True for an identifier token (quoted or not) spelling `keyword`
    /// case-insensitively. Quoted identifiers never count as keywords.
    pub fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self, TokenKind::Ident(text) if text.eq_ignore_ascii_case(keyword))
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Ident(s) => write!(f, "'{}'", s),
            TokenKind::QuotedIdent(s) => write!(f, "`{}`", s),
            TokenKind::Str(_) => f.write_str("string literal"),
            TokenKind::Number(n) => write!(f, "number {}", n),
            TokenKind::Param(p) => write!(f, "${}", p),
            TokenKind::LParen => f.write_str("'('"),
            TokenKind::RParen => f.write_str("')'"),
            TokenKind::LBracket => f.write_str("'['"),
            TokenKind::RBracket => f.write_str("']'"),
            TokenKind::LBrace => f.write_str("'{'"),
            TokenKind::RBrace => f.write_str("'}'"),
            TokenKind::Colon => f.write_str("':'"),
            TokenKind::Comma => f.write_str("','"),
            TokenKind::Dot => f.write_str("'.'"),
            TokenKind::DotDot => f.write_str("'..'"),
            TokenKind::Semicolon => f.write_str("';'"),
            TokenKind::Pipe => f.write_str("'|'"),
            TokenKind::Star => f.write_str("'*'"),
            TokenKind::Plus => f.write_str("'+'"),
            TokenKind::PlusEq => f.write_str("'+='"),
            TokenKind::Minus => f.write_str("'-'"),
            TokenKind::Slash => f.write_str("'/'"),
            TokenKind::Percent => f.write_str("'%'"),
            TokenKind::Caret => f.write_str("'^'"),
            TokenKind::Eq => f.write_str("'='"),
            TokenKind::Neq => f.write_str("'<>'"),
            TokenKind::Lt => f.write_str("'<'"),
            TokenKind::Gt => f.write_str("'>'"),
            TokenKind::Le => f.write_str("'<='"),
            TokenKind::Ge => f.write_str("'>='"),
            TokenKind::RegexMatch => f.write_str("'=~'"),
            TokenKind::Amp => f.write_str("'&'"),
            TokenKind::Bang => f.write_str("'!'"),
            TokenKind::Eof => f.write_str("end of input"),
        }
    }
}

/// A token with its source span
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

/// Lexical errors. Offsets are byte positions in the input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LexError {
    #[error("unterminated string literal starting at offset {0}")]
    UnterminatedString(usize),

    #[error("unterminated block comment starting at offset {0}")]
    UnterminatedComment(usize),

    #[error("unterminated quoted identifier starting at offset {0}")]
    UnterminatedIdentifier(usize),

    #[error("unexpected character '{ch}' at offset {offset}")]
    UnexpectedChar { ch: char, offset: usize },
}

/// Tokenize a Cypher query. The returned list always ends with `Eof`.
pub fn tokenize(input: &str) -> Result<Vec<Token>, LexError> {
    Lexer::new(input).run()
}

/// Byte-oriented Cypher lexer
pub struct Lexer<'a> {
    input: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            bytes: input.as_bytes(),
            pos: 0,
        }
    }

    pub fn run(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia()?;
            let start = self.pos;
            let Some(b) = self.peek() else {
                tokens.push(Token {
                    kind: TokenKind::Eof,
                    span: Span::new(start, start),
                });
                return Ok(tokens);
            };

            let kind = match b {
                b'\'' | b'"' => self.string(b)?,
                b'`' => self.quoted_ident()?,
                b'$' => self.param()?,
                b'0'..=b'9' => self.number(),
                b if is_ident_start(b) => {
                    let text = self.take_while(is_ident_char);
                    TokenKind::Ident(text.to_string())
                }
                _ => self.punct()?,
            };

            tokens.push(Token {
                kind,
                span: Span::new(start, self.pos),
            });
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn take_while(&mut self, pred: impl Fn(u8) -> bool) -> &'a str {
        let start = self.pos;
        while self.peek().is_some_and(&pred) {
            self.pos += 1;
        }
        &self.input[start..self.pos]
    }

    fn skip_trivia(&mut self) -> Result<(), LexError> {
        loop {
            match (self.peek(), self.peek_at(1)) {
                (Some(b), _) if b.is_ascii_whitespace() => self.pos += 1,
                (Some(b'/'), Some(b'/')) => {
                    while self.peek().is_some_and(|b| b != b'\n') {
                        self.pos += 1;
                    }
                }
                (Some(b'/'), Some(b'*')) => {
                    let start = self.pos;
                    self.pos += 2;
                    loop {
                        match (self.peek(), self.peek_at(1)) {
                            (Some(b'*'), Some(b'/')) => {
                                self.pos += 2;
                                break;
                            }
                            (Some(_), _) => self.pos += 1,
                            (None, _) => return Err(LexError::UnterminatedComment(start)),
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn string(&mut self, quote: u8) -> Result<TokenKind, LexError> {
        let start = self.pos;
        self.pos += 1;
        let content_start = self.pos;
        loop {
            match self.peek() {
                Some(b'\\') => self.pos += 2,
                Some(b) if b == quote => {
                    let content = &self.input[content_start..self.pos];
                    self.pos += 1;
                    return Ok(TokenKind::Str(content.to_string()));
                }
                Some(_) => self.pos += 1,
                None => return Err(LexError::UnterminatedString(start)),
            }
            if self.pos > self.bytes.len() {
                return Err(LexError::UnterminatedString(start));
            }
        }
    }

    fn quoted_ident(&mut self) -> Result<TokenKind, LexError> {
        let start = self.pos;
        self.pos += 1;
        let mut content = String::new();
        loop {
            match self.peek() {
                Some(b'`') if self.peek_at(1) == Some(b'`') => {
                    content.push('`');
                    self.pos += 2;
                }
                Some(b'`') => {
                    self.pos += 1;
                    return Ok(TokenKind::QuotedIdent(content));
                }
                Some(_) => {
                    let ch = self.current_char();
                    content.push(ch);
                    self.pos += ch.len_utf8();
                }
                None => return Err(LexError::UnterminatedIdentifier(start)),
            }
        }
    }

    fn param(&mut self) -> Result<TokenKind, LexError> {
        let offset = self.pos;
        self.pos += 1;
        let name = self.take_while(is_ident_char);
        if name.is_empty() {
            return Err(LexError::UnexpectedChar { ch: '$', offset });
        }
        Ok(TokenKind::Param(name.to_string()))
    }

    fn number(&mut self) -> TokenKind {
        let start = self.pos;
        if self.peek() == Some(b'0') && matches!(self.peek_at(1), Some(b'x' | b'X')) {
            self.pos += 2;
            self.take_while(|b| b.is_ascii_hexdigit());
            return TokenKind::Number(self.input[start..self.pos].to_string());
        }

        self.take_while(|b| b.is_ascii_digit());

        // `1..3` is a range, not a decimal
        if self.peek() == Some(b'.') && self.peek_at(1).is_some_and(|b| b.is_ascii_digit()) {
            self.pos += 1;
            self.take_while(|b| b.is_ascii_digit());
        }

        if matches!(self.peek(), Some(b'e' | b'E')) {
            let sign = usize::from(matches!(self.peek_at(1), Some(b'+' | b'-')));
            if self.peek_at(1 + sign).is_some_and(|b| b.is_ascii_digit()) {
                self.pos += 1 + sign;
                self.take_while(|b| b.is_ascii_digit());
            }
        }

        TokenKind::Number(self.input[start..self.pos].to_string())
    }

    fn punct(&mut self) -> Result<TokenKind, LexError> {
        let b = self.peek().unwrap_or_default();
        let next = self.peek_at(1);
        let (kind, len) = match (b, next) {
            (b'.', Some(b'.')) => (TokenKind::DotDot, 2),
            (b'<', Some(b'>')) => (TokenKind::Neq, 2),
            (b'!', Some(b'=')) => (TokenKind::Neq, 2),
            (b'<', Some(b'=')) => (TokenKind::Le, 2),
            (b'>', Some(b'=')) => (TokenKind::Ge, 2),
            (b'=', Some(b'~')) => (TokenKind::RegexMatch, 2),
            (b'+', Some(b'=')) => (TokenKind::PlusEq, 2),
            (b'(', _) => (TokenKind::LParen, 1),
            (b')', _) => (TokenKind::RParen, 1),
            (b'[', _) => (TokenKind::LBracket, 1),
            (b']', _) => (TokenKind::RBracket, 1),
            (b'{', _) => (TokenKind::LBrace, 1),
            (b'}', _) => (TokenKind::RBrace, 1),
            (b':', _) => (TokenKind::Colon, 1),
            (b',', _) => (TokenKind::Comma, 1),
            (b'.', _) => (TokenKind::Dot, 1),
            (b';', _) => (TokenKind::Semicolon, 1),
            (b'|', _) => (TokenKind::Pipe, 1),
            (b'*', _) => (TokenKind::Star, 1),
            (b'+', _) => (TokenKind::Plus, 1),
            (b'-', _) => (TokenKind::Minus, 1),
            (b'/', _) => (TokenKind::Slash, 1),
            (b'%', _) => (TokenKind::Percent, 1),
            (b'^', _) => (TokenKind::Caret, 1),
            (b'=', _) => (TokenKind::Eq, 1),
            (b'<', _) => (TokenKind::Lt, 1),
            (b'>', _) => (TokenKind::Gt, 1),
            (b'&', _) => (TokenKind::Amp, 1),
            (b'!', _) => (TokenKind::Bang, 1),
            _ => {
                return Err(LexError::UnexpectedChar {
                    ch: self.current_char(),
                    offset: self.pos,
                })
            }
        };
        self.pos += len;
        Ok(kind)
    }

    fn current_char(&self) -> char {
        self.input[self.pos..].chars().next().unwrap_or('\u{fffd}')
    }
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_ident_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        tokenize(input)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_node_and_arrow() {
        assert_eq!(
            kinds("(a:Person)-[:KNOWS]->(b)"),
            vec![
                TokenKind::LParen,
                TokenKind::Ident("a".into()),
                TokenKind::Colon,
                TokenKind::Ident("Person".into()),
                TokenKind::RParen,
                TokenKind::Minus,
                TokenKind::LBracket,
                TokenKind::Colon,
                TokenKind::Ident("KNOWS".into()),
                TokenKind::RBracket,
                TokenKind::Minus,
                TokenKind::Gt,
                TokenKind::LParen,
                TokenKind::Ident("b".into()),
                TokenKind::RParen,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_left_arrow_is_lt_minus() {
        assert_eq!(
            kinds("<--"),
            vec![TokenKind::Lt, TokenKind::Minus, TokenKind::Minus, TokenKind::Eof]
        );
    }

    #[test]
    fn test_range_is_not_decimal() {
        assert_eq!(
            kinds("1..3"),
            vec![
                TokenKind::Number("1".into()),
                TokenKind::DotDot,
                TokenKind::Number("3".into()),
                TokenKind::Eof,
            ]
        );
        assert_eq!(kinds("1.5e-3"), vec![TokenKind::Number("1.5e-3".into()), TokenKind::Eof]);
    }

    #[test]
    fn test_comments_and_strings() {
        assert_eq!(
            kinds("RETURN 'a // not a comment' // trailing\n/* block */ 1"),
            vec![
                TokenKind::Ident("RETURN".into()),
                TokenKind::Str("a // not a comment".into()),
                TokenKind::Number("1".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_escaped_quote_in_string() {
        assert_eq!(
            kinds(r#"'it\'s' "say \"hi\"""#),
            vec![
                TokenKind::Str(r"it\'s".into()),
                TokenKind::Str(r#"say \"hi\""#.into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_quoted_identifier_and_param() {
        assert_eq!(
            kinds("`My``Label` $name $0"),
            vec![
                TokenKind::QuotedIdent("My`Label".into()),
                TokenKind::Param("name".into()),
                TokenKind::Param("0".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_unicode_in_string_is_fine() {
        assert_eq!(
            kinds("'Zoë'"),
            vec![TokenKind::Str("Zoë".into()), TokenKind::Eof]
        );
    }

    #[test]
    fn test_errors() {
        assert_eq!(tokenize("'open"), Err(LexError::UnterminatedString(0)));
        assert_eq!(tokenize("/* open"), Err(LexError::UnterminatedComment(0)));
        assert_eq!(tokenize("`open"), Err(LexError::UnterminatedIdentifier(0)));
        assert_eq!(
            tokenize("MATCH (é)"),
            Err(LexError::UnexpectedChar { ch: 'é', offset: 7 })
        );
        assert_eq!(
            tokenize("RETURN $"),
            Err(LexError::UnexpectedChar { ch: '$', offset: 7 })
        );
    }

    #[test]
    fn test_spans() {
        let tokens = tokenize("MATCH (n)").unwrap();
        assert_eq!(tokens[0].span, Span::new(0, 5));
        assert_eq!(tokens[2].span, Span::new(7, 8));
    }
}
