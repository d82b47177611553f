//! Static lookup tables used by the scanner.

use crate::ast::{Builtin, TokenKind};

/// Name of the global result stream.
pub const GLOBAL_STREAM: &str = "stream";

/// Classifies a scanned word: command keyword, `stream`, bool literal or
/// plain identifier.
pub fn keyword(word: &str) -> TokenKind {
    if let Some(cmd) = Builtin::from_name(word) {
        return TokenKind::Builtin(cmd);
    }
    match word {
        GLOBAL_STREAM => TokenKind::Stream,
        "true" | "false" => TokenKind::Bool,
        _ => TokenKind::Identifier,
    }
}

/// Single-character punctuation and operators.
///
/// `*` always maps to [`TokenKind::Star`] here; the scanner upgrades it to
/// a self-star depending on context.
pub fn single_char(ch: char) -> Option<TokenKind> {
    let kind = match ch {
        '(' => TokenKind::LParen,
        ')' => TokenKind::RParen,
        ',' => TokenKind::Comma,
        '[' => TokenKind::LBracket,
        ']' => TokenKind::RBracket,
        '\n' => TokenKind::Newline,
        '*' => TokenKind::Star,
        '+' => TokenKind::Plus,
        '-' => TokenKind::Minus,
        '/' => TokenKind::Slash,
        '=' => TokenKind::Assign,
        _ => return None,
    };
    Some(kind)
}

/// Two-character operators, tried when no single-character match exists.
pub fn two_char(first: char, second: char) -> Option<TokenKind> {
    match (first, second) {
        (':', '=') => Some(TokenKind::Declare),
        ('|', '>') => Some(TokenKind::Pipe),
        ('.', '.') => Some(TokenKind::DotDot),
        _ => None,
    }
}
