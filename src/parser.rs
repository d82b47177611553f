use std::{fmt, mem};

use thiserror::Error;
use tracing::debug;

use crate::{
    ast::{
        Assignment, Command, Expr, MathExpr, MathOp, Pipeline, Statement, SubExpr, Token,
        TokenKind, Value,
    },
    lexer::Lexer,
};

/// Whether a [`ParseError`] came from the scanner or the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    Scan,
    Syntax,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseErrorKind::Scan => f.write_str("scan"),
            ParseErrorKind::Syntax => f.write_str("syntax"),
        }
    }
}

/// A scan or syntax error with its 1-based source position.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{kind} error at {line}:{column}: {message}")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl ParseError {
    fn scan(token: &Token) -> Self {
        ParseError {
            kind: ParseErrorKind::Scan,
            message: token.text.clone(),
            line: token.line,
            column: token.column,
        }
    }

    fn syntax(message: impl Into<String>, token: &Token) -> Self {
        ParseError {
            kind: ParseErrorKind::Syntax,
            message: message.into(),
            line: token.line,
            column: token.column,
        }
    }
}

type ParseResult<T> = Result<T, ParseError>;

/// Deepest allowed nesting of lists, parentheses and unary signs.
const MAX_NESTING: usize = 128;

/// Streaming statement parser.
///
/// Iterating yields one `Ok(Statement)` per statement. A syntax error is
/// yielded as `Err` and the parser skips to the next line, so a caller may
/// keep going; a scan error ends the sequence.
pub struct Parser {
    lexer: Lexer,
    current: Token,
    peek: Token,
    peek2: Token,
    depth: usize,
    done: bool,
}

/// Parses `text` lazily, one statement per iteration.
pub fn parse(text: &str) -> Parser {
    Parser::new(Lexer::new(text))
}

impl Parser {
    pub fn new(mut lexer: Lexer) -> Self {
        let current = Self::fetch(&mut lexer);
        let peek = Self::fetch(&mut lexer);
        let peek2 = Self::fetch(&mut lexer);
        Parser {
            lexer,
            current,
            peek,
            peek2,
            depth: 0,
            done: false,
        }
    }

    /// Next non-comment token. Past the end, repeats an EOF at the last
    /// known position.
    fn fetch(lexer: &mut Lexer) -> Token {
        for token in lexer.by_ref() {
            if token.kind != TokenKind::Comment {
                return token;
            }
        }
        Token::new(TokenKind::Eof, "", 0, 0)
    }

    fn advance(&mut self) -> ParseResult<()> {
        self.shift();
        self.check_scan_error()
    }

    /// Moves the window one token forward without surfacing a scan error.
    fn shift(&mut self) {
        let next = Self::fetch(&mut self.lexer);
        let next = if next.line == 0 && next.kind == TokenKind::Eof {
            Token::new(TokenKind::Eof, "", self.peek2.line, self.peek2.column)
        } else {
            next
        };
        let peek2 = mem::replace(&mut self.peek2, next);
        let peek = mem::replace(&mut self.peek, peek2);
        self.current = peek;
    }

    fn check_scan_error(&self) -> ParseResult<()> {
        if self.current.kind == TokenKind::Error {
            return Err(ParseError::scan(&self.current));
        }
        Ok(())
    }

    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> ParseResult<T>) -> ParseResult<T> {
        if self.depth >= MAX_NESTING {
            return Err(ParseError::syntax(
                format!("expression nested deeper than {MAX_NESTING} levels"),
                &self.current,
            ));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.current.kind == kind
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> ParseResult<()> {
        if !self.check(kind) {
            return Err(self.unexpected(what));
        }
        self.advance()
    }

    fn unexpected(&self, what: &str) -> ParseError {
        ParseError::syntax(format!("expected {what}, got {}", self.current), &self.current)
    }

    fn skip_newlines(&mut self) -> ParseResult<()> {
        while self.check(TokenKind::Newline) {
            self.advance()?;
        }
        Ok(())
    }

    /// A newline directly followed by `|>` continues the pipeline.
    fn skip_continuation(&mut self) -> ParseResult<()> {
        if self.check(TokenKind::Newline) && self.peek.kind == TokenKind::Pipe {
            self.advance()?;
        }
        Ok(())
    }

    /// Skips the rest of the current line after a syntax error.
    fn synchronize(&mut self) {
        while !matches!(
            self.current.kind,
            TokenKind::Newline | TokenKind::Eof | TokenKind::Error
        ) {
            if self.advance().is_err() {
                return;
            }
        }
    }

    /// Parses the next statement, or returns `None` at end of input.
    pub fn parse_statement(&mut self) -> Option<ParseResult<Statement>> {
        if self.done {
            return None;
        }
        if let Err(e) = self.check_scan_error().and_then(|_| self.skip_newlines()) {
            self.done = true;
            return Some(Err(e));
        }
        if self.check(TokenKind::Eof) {
            self.done = true;
            return None;
        }

        let result = self.parse_statement_inner();
        match &result {
            Ok(stmt) => debug!(statement = %stmt, "parsed statement"),
            Err(e) if e.kind == ParseErrorKind::Scan => self.done = true,
            Err(e) => {
                debug!(error = %e, "syntax error, skipping to next line");
                self.synchronize();
                if self.check(TokenKind::Error) {
                    self.done = true;
                }
            }
        }
        Some(result)
    }

    fn parse_statement_inner(&mut self) -> ParseResult<Statement> {
        let stmt = match self.current.kind {
            TokenKind::Identifier
                if matches!(
                    self.peek.kind,
                    TokenKind::Assign | TokenKind::Declare | TokenKind::Comma
                ) =>
            {
                Statement::Assignment(self.parse_assignment()?)
            }
            kind if kind.is_value_start() || kind.is_builtin() => {
                let token = self.current.clone();
                match self.parse_assignable()? {
                    Value::Expr(expr) => Statement::Expr(expr),
                    other => {
                        return Err(ParseError::syntax(
                            format!("expected `|>` after {}, got {}", other.kind(), self.current),
                            &token,
                        ));
                    }
                }
            }
            _ => return Err(self.unexpected("a statement")),
        };

        match self.current.kind {
            // A scan error on the next line belongs to the next statement.
            TokenKind::Newline => self.shift(),
            TokenKind::Eof => {}
            _ => return Err(self.unexpected("end of statement")),
        }
        Ok(stmt)
    }

    fn parse_assignment(&mut self) -> ParseResult<Assignment> {
        let dest = self.parse_ident_list()?;

        let is_declaration = match self.current.kind {
            TokenKind::Declare => true,
            TokenKind::Assign => false,
            _ => return Err(self.unexpected("`=` or `:=`")),
        };
        self.advance()?;
        self.skip_newlines()?;

        let value = self.parse_assignable()?;
        Ok(Assignment {
            dest,
            value,
            is_declaration,
        })
    }

    fn parse_ident_list(&mut self) -> ParseResult<Vec<String>> {
        let mut idents = Vec::new();
        loop {
            if !self.check(TokenKind::Identifier) {
                return Err(self.unexpected("an identifier"));
            }
            idents.push(self.current.text.clone());
            self.advance()?;

            if !self.check(TokenKind::Comma) {
                return Ok(idents);
            }
            self.advance()?;
        }
    }

    /// A value optionally piped into a pipeline, or a bare pipeline.
    fn parse_assignable(&mut self) -> ParseResult<Value> {
        if self.current.kind.is_builtin() {
            let pipeline = self.parse_pipeline()?;
            return Ok(Value::Expr(Expr {
                input: Vec::new(),
                pipeline,
            }));
        }
        if !self.current.kind.is_value_start() {
            return Err(self.unexpected("a value or a command"));
        }

        let value = self.parse_value()?;
        self.skip_continuation()?;
        if !self.check(TokenKind::Pipe) {
            return Ok(value);
        }
        self.advance()?;

        let input = match value {
            Value::List(items) => items,
            other => vec![other],
        };
        let pipeline = self.parse_pipeline()?;
        Ok(Value::Expr(Expr { input, pipeline }))
    }

    fn parse_pipeline(&mut self) -> ParseResult<Pipeline> {
        let mut commands = Vec::new();
        loop {
            commands.push(self.parse_command()?);
            self.skip_continuation()?;
            if !self.check(TokenKind::Pipe) {
                return Ok(Pipeline::new(commands));
            }
            self.advance()?;
            if !self.current.kind.is_builtin() {
                return Err(self.unexpected("a command after `|>`"));
            }
        }
    }

    fn parse_command(&mut self) -> ParseResult<Command> {
        if !self.current.kind.is_builtin() {
            return Err(self.unexpected("a command"));
        }
        let name = self.current.text.clone();
        self.advance()?;

        let mut args = Vec::new();
        while self.current.kind.is_value_start() {
            args.push(self.parse_value()?);
        }
        Ok(Command { name, args })
    }

    fn parse_value(&mut self) -> ParseResult<Value> {
        self.nested(Self::parse_value_inner)
    }

    fn parse_value_inner(&mut self) -> ParseResult<Value> {
        match self.current.kind {
            TokenKind::LBracket => {
                let list = self.parse_list()?;
                if self.check(TokenKind::LParen) {
                    return Ok(Value::SubExpr(self.parse_sub_expr(list)?));
                }
                Ok(Value::List(list))
            }
            TokenKind::LParen => self.parse_math(),
            TokenKind::Number if self.peek.kind.is_arith_operator() => self.parse_math(),
            _ => self.parse_simple(),
        }
    }

    /// Newlines and commas both separate list items; `[]` is empty.
    fn parse_list(&mut self) -> ParseResult<Vec<Value>> {
        let open = self.current.clone();
        self.expect(TokenKind::LBracket, "`[`")?;

        let mut items = Vec::new();
        loop {
            while matches!(self.current.kind, TokenKind::Comma | TokenKind::Newline) {
                self.advance()?;
            }
            match self.current.kind {
                TokenKind::RBracket => {
                    self.advance()?;
                    return Ok(items);
                }
                TokenKind::Eof => {
                    return Err(ParseError::syntax(
                        format!(
                            "unterminated list opened at {}:{}, expected `]`, got {}",
                            open.line, open.column, self.current
                        ),
                        &self.current,
                    ));
                }
                kind if kind.is_value_start() => items.push(self.parse_value()?),
                _ => return Err(self.unexpected("a list item or `]`")),
            }
            if !matches!(
                self.current.kind,
                TokenKind::Comma | TokenKind::Newline | TokenKind::RBracket | TokenKind::Eof
            ) {
                return Err(self.unexpected("`,` or `]` in list"));
            }
        }
    }

    fn parse_sub_expr(&mut self, list: Vec<Value>) -> ParseResult<SubExpr> {
        let mut params = Vec::with_capacity(list.len());
        for item in list {
            match item {
                Value::Identifier(name) => params.push(name),
                other => {
                    return Err(ParseError::syntax(
                        format!(
                            "a sub-expression's parameter list must contain only identifiers, got {} `{other}`",
                            other.kind()
                        ),
                        &self.current,
                    ));
                }
            }
        }

        self.expect(TokenKind::LParen, "`(`")?;
        self.skip_newlines()?;
        if self.check(TokenKind::RParen) {
            return Err(ParseError::syntax("empty sub-expression body", &self.current));
        }
        let body = self.parse_assignable()?;
        self.skip_newlines()?;
        if !self.check(TokenKind::RParen) {
            return Err(self.unexpected("`)` at the end of the sub-expression body"));
        }
        self.advance()?;

        Ok(SubExpr {
            params,
            body: Box::new(body),
        })
    }

    fn parse_simple(&mut self) -> ParseResult<Value> {
        let value = match self.current.kind {
            TokenKind::Identifier | TokenKind::Stream => Value::Identifier(self.current.text.clone()),
            TokenKind::SelfStar => Value::SelfStar,
            TokenKind::Number => Value::Number(self.number_literal()?),
            TokenKind::Bool => Value::Bool(self.current.text == "true"),
            TokenKind::String => Value::String(unquote(&self.current.text)),
            _ => return Err(self.unexpected("a value")),
        };
        self.advance()?;
        Ok(value)
    }

    fn number_literal(&self) -> ParseResult<f64> {
        self.current.text.parse::<f64>().map_err(|_| {
            ParseError::syntax(format!("invalid number `{}`", self.current.text), &self.current)
        })
    }

    fn parse_math(&mut self) -> ParseResult<Value> {
        self.parse_binary(0)
    }

    /// Precedence climbing: operators binding at least `min_prec` extend
    /// `left`; the right operand only takes tighter operators.
    fn parse_binary(&mut self, min_prec: u8) -> ParseResult<Value> {
        let mut left = self.parse_unary()?;

        while let Some(op) = MathOp::from_token(self.current.kind) {
            let prec = op.precedence();
            if prec < min_prec {
                break;
            }
            self.advance()?;
            let right = self.parse_binary(prec + 1)?;
            left = Value::Math(MathExpr::new(left, op, right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> ParseResult<Value> {
        self.nested(Self::parse_unary_inner)
    }

    fn parse_unary_inner(&mut self) -> ParseResult<Value> {
        let op = match self.current.kind {
            TokenKind::Plus => MathOp::Add,
            TokenKind::Minus => MathOp::Subtract,
            _ => return self.parse_primary(),
        };
        self.advance()?;
        let operand = self.parse_unary()?;
        Ok(Value::Math(MathExpr::new(Value::Number(0.0), op, operand)))
    }

    fn parse_primary(&mut self) -> ParseResult<Value> {
        match self.current.kind {
            TokenKind::Identifier => {
                let name = self.current.text.clone();
                self.advance()?;
                Ok(Value::Identifier(name))
            }
            TokenKind::Number => {
                let n = self.number_literal()?;
                self.advance()?;
                Ok(Value::Number(n))
            }
            TokenKind::LParen => {
                self.advance()?;
                let inner = self.parse_math()?;
                if !self.check(TokenKind::RParen) {
                    return Err(self.unexpected("`)` to close the parenthesis"));
                }
                self.advance()?;
                Ok(inner)
            }
            _ => Err(self.unexpected("a number, identifier or `(` in arithmetic expression")),
        }
    }
}

impl Iterator for Parser {
    type Item = ParseResult<Statement>;

    fn next(&mut self) -> Option<Self::Item> {
        self.parse_statement()
    }
}

/// Strips the quotes of a string token; a backslash keeps the character
/// after it verbatim.
fn unquote(raw: &str) -> String {
    let inner = raw
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(raw);
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            if let Some(escaped) = chars.next() {
                out.push(escaped);
            }
        } else {
            out.push(ch);
        }
    }
    out
}
