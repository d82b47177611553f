use tracing::trace;

use crate::ast::{Token, TokenKind, grammar};

/// Pull-based scanner over a script.
///
/// Yields tokens on demand and ends with exactly one [`TokenKind::Eof`] or
/// one [`TokenKind::Error`] token; nothing follows either of them.
pub struct Lexer {
    input: Vec<char>,
    position: usize,
    line: usize,
    column: usize,
    /// Whether `*` is currently a self reference rather than multiplication
    allow_self_star: bool,
    last_kind: Option<TokenKind>,
    finished: bool,
}

/// Scans `text` lazily.
pub fn scan(text: &str) -> Lexer {
    Lexer::new(text)
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Lexer {
            input: input.chars().collect(),
            position: 0,
            line: 1,
            column: 1,
            allow_self_star: false,
            last_kind: None,
            finished: false,
        }
    }

    fn current_char(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek_char(&self, offset: usize) -> Option<char> {
        self.input.get(self.position + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.current_char()?;
        self.position += 1;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.current_char() {
            if ch == ' ' || ch == '\t' || ch == '\r' {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn slice(&self, start: usize) -> String {
        self.input[start..self.position].iter().collect()
    }

    fn read_comment(&mut self, line: usize, column: usize) -> Token {
        while self.current_char() == Some('#') {
            self.advance();
        }
        let start = self.position;
        while let Some(ch) = self.current_char() {
            if ch == '\n' {
                break;
            }
            self.advance();
        }
        Token::new(TokenKind::Comment, self.slice(start), line, column)
    }

    fn read_identifier(&mut self, line: usize, column: usize) -> Token {
        let start = self.position;
        while let Some(ch) = self.current_char() {
            if ch.is_alphanumeric() {
                self.advance();
            } else {
                break;
            }
        }
        let word = self.slice(start);
        Token::new(grammar::keyword(&word), word, line, column)
    }

    fn read_number(&mut self, line: usize, column: usize) -> Token {
        let start = self.position;
        if matches!(self.current_char(), Some('+' | '-')) {
            self.advance();
        }
        while self.current_char().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }
        if self.current_char() == Some('.') && self.peek_char(1) != Some('.') {
            self.advance();
            while self.current_char().is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
            }
        }
        Token::new(TokenKind::Number, self.slice(start), line, column)
    }

    fn read_string(&mut self, line: usize, column: usize) -> Token {
        let start = self.position;
        self.advance(); // opening quote

        loop {
            match self.advance() {
                None => return Token::new(TokenKind::Error, "unterminated string", line, column),
                Some('\\') => {
                    if self.advance().is_none() {
                        return Token::new(
                            TokenKind::Error,
                            "unterminated string escape",
                            line,
                            column,
                        );
                    }
                }
                Some('"') => break,
                Some(_) => {}
            }
        }
        Token::new(TokenKind::String, self.slice(start), line, column)
    }

    fn starts_signed_number(&self, ch: char) -> bool {
        (ch == '+' || ch == '-')
            && self.peek_char(1).is_some_and(|c| c.is_ascii_digit())
            && !self.last_kind.is_some_and(TokenKind::ends_operand)
    }

    fn scan_token(&mut self) -> Token {
        self.skip_whitespace();

        let line = self.line;
        let column = self.column;

        let ch = match self.current_char() {
            None => return Token::new(TokenKind::Eof, "", line, column),
            Some(ch) => ch,
        };

        match ch {
            '#' => return self.read_comment(line, column),
            '"' => return self.read_string(line, column),
            c if c.is_ascii_digit() => return self.read_number(line, column),
            c if self.starts_signed_number(c) => return self.read_number(line, column),
            c if c.is_alphabetic() => return self.read_identifier(line, column),
            _ => {}
        }

        if let Some(mut kind) = grammar::single_char(ch) {
            self.advance();
            match kind {
                TokenKind::Star if self.allow_self_star => kind = TokenKind::SelfStar,
                TokenKind::Assign | TokenKind::LBracket => self.allow_self_star = true,
                TokenKind::RParen => self.allow_self_star = false,
                _ => {}
            }
            return Token::new(kind, ch.to_string(), line, column);
        }

        if let Some(next) = self.peek_char(1) {
            if let Some(kind) = grammar::two_char(ch, next) {
                self.advance();
                self.advance();
                match kind {
                    TokenKind::Declare => self.allow_self_star = true,
                    TokenKind::Pipe => self.allow_self_star = false,
                    _ => {}
                }
                return Token::new(kind, format!("{ch}{next}"), line, column);
            }
        }

        Token::new(
            TokenKind::Error,
            format!("unexpected character {ch:?} (U+{:04X})", ch as u32),
            line,
            column,
        )
    }
}

impl Iterator for Lexer {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        if self.finished {
            return None;
        }
        let token = self.scan_token();
        trace!(kind = ?token.kind, text = %token.text, line = token.line, column = token.column, "token");
        if matches!(token.kind, TokenKind::Eof | TokenKind::Error) {
            self.finished = true;
        }
        if token.kind != TokenKind::Comment {
            self.last_kind = Some(token.kind);
        }
        Some(token)
    }
}

impl std::iter::FusedIterator for Lexer {}
