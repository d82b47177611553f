use std::fmt;

/// A lexical token with its source position.
///
/// `line` and `column` are 1-based and point at the first character of
/// the token. For [`TokenKind::Error`] the `text` holds the error message.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub line: usize,
    pub column: usize,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, line: usize, column: usize) -> Self {
        Token {
            kind,
            text: text.into(),
            line,
            column,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TokenKind::Eof => write!(f, "EOF"),
            TokenKind::Error => write!(f, "{}", self.text),
            TokenKind::Newline => write!(f, "newline"),
            TokenKind::Builtin(cmd) => write!(f, "command `{}`", cmd.name()),
            _ if self.text.chars().count() > 10 => {
                let head: String = self.text.chars().take(10).collect();
                write!(f, "`{head}...`")
            }
            _ => write!(f, "`{}`", self.text),
        }
    }
}

/// The kind of a [`Token`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// End of input. Emitted exactly once, as the last token.
    Eof,

    /// Scan error. Terminates the token sequence.
    Error,

    // Identifiers
    /// Variable or stream name
    ///
    /// A maximal run of letters and digits that does not start with a digit.
    ///
    /// # Examples
    /// ```text
    /// intro
    /// clip2
    /// ```
    Identifier,

    /// Self reference (`*`)
    ///
    /// Only produced while the scanner is in a list or right after an
    /// assignment operator; elsewhere `*` is [`TokenKind::Star`].
    ///
    /// # Examples
    /// ```text
    /// audio = [stream, *]
    /// video = * |> brightness 1.3
    /// ```
    SelfStar,

    /// The global result stream (`stream`)
    ///
    /// Always refers to the result of the most recent bare pipeline.
    Stream,

    // Arithmetic
    /// Addition (`+`)
    Plus,
    /// Subtraction or negation (`-`)
    Minus,
    /// Multiplication (`*`)
    Star,
    /// Division (`/`)
    Slash,

    // Stream operators
    /// Assignment to an existing name (`=`)
    Assign,

    /// Declaration (`:=`)
    ///
    /// # Examples
    /// ```text
    /// clip := open "clip.mp4"
    /// ```
    Declare,

    /// Pipe (`|>`)
    ///
    /// Threads the left-hand stream through the command on its right.
    ///
    /// # Examples
    /// ```text
    /// clip |> brightness 1.2 |> export "out.mp4"
    /// ```
    Pipe,

    // Lists
    /// Range/concatenation operator (`..`)
    DotDot,
    LBracket,
    RBracket,
    LParen,
    RParen,
    Comma,

    /// Line break. Significant: it ends a statement unless the next line
    /// starts with `|>`.
    Newline,

    // Literals
    /// Number literal, always a 64-bit float
    ///
    /// # Examples
    /// ```text
    /// 42
    /// 1.25
    /// -0.5
    /// ```
    Number,

    /// String literal; the token text keeps the quotes and escapes
    String,

    /// `true` or `false`
    Bool,

    /// `#` line comment
    Comment,

    /// Built-in command name
    Builtin(Builtin),
}

impl TokenKind {
    /// Arithmetic operators usable inside math expressions.
    ///
    /// A self-star in operator position is read as multiplication.
    pub fn is_arith_operator(self) -> bool {
        matches!(
            self,
            TokenKind::Plus | TokenKind::Minus | TokenKind::Star | TokenKind::Slash | TokenKind::SelfStar
        )
    }

    /// Tokens that can start a value (literal, name, list or group).
    pub fn is_value_start(self) -> bool {
        matches!(
            self,
            TokenKind::LBracket
                | TokenKind::LParen
                | TokenKind::Identifier
                | TokenKind::Stream
                | TokenKind::SelfStar
                | TokenKind::Number
                | TokenKind::String
                | TokenKind::Bool
        )
    }

    pub fn is_builtin(self) -> bool {
        matches!(self, TokenKind::Builtin(_))
    }

    /// Whether a token of this kind can be the last token of an operand.
    ///
    /// Used by the scanner to decide if `-1` is a signed literal or an
    /// operator followed by a number.
    pub fn ends_operand(self) -> bool {
        matches!(
            self,
            TokenKind::Identifier
                | TokenKind::Stream
                | TokenKind::SelfStar
                | TokenKind::Number
                | TokenKind::String
                | TokenKind::Bool
                | TokenKind::RParen
                | TokenKind::RBracket
        )
    }
}

/// Built-in command keywords.
///
/// Every keyword scans as a command token. Not every keyword has a handler
/// in the evaluator's command table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    Brightness,
    Concat,
    Contrast,
    Crossfade,
    Cut,
    Export,
    Fade,
    Flip,
    Gamma,
    Hue,
    Map,
    Open,
    Pitch,
    Saturation,
    Speed,
    Stack,
    Trackline,
    Volume,
}

impl Builtin {
    pub const ALL: [Builtin; 18] = [
        Builtin::Brightness,
        Builtin::Concat,
        Builtin::Contrast,
        Builtin::Crossfade,
        Builtin::Cut,
        Builtin::Export,
        Builtin::Fade,
        Builtin::Flip,
        Builtin::Gamma,
        Builtin::Hue,
        Builtin::Map,
        Builtin::Open,
        Builtin::Pitch,
        Builtin::Saturation,
        Builtin::Speed,
        Builtin::Stack,
        Builtin::Trackline,
        Builtin::Volume,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Builtin::Brightness => "brightness",
            Builtin::Concat => "concat",
            Builtin::Contrast => "contrast",
            Builtin::Crossfade => "crossfade",
            Builtin::Cut => "cut",
            Builtin::Export => "export",
            Builtin::Fade => "fade",
            Builtin::Flip => "flip",
            Builtin::Gamma => "gamma",
            Builtin::Hue => "hue",
            Builtin::Map => "map",
            Builtin::Open => "open",
            Builtin::Pitch => "pitch",
            Builtin::Saturation => "saturation",
            Builtin::Speed => "speed",
            Builtin::Stack => "stack",
            Builtin::Trackline => "trackline",
            Builtin::Volume => "volume",
        }
    }

    pub fn from_name(name: &str) -> Option<Builtin> {
        Builtin::ALL.iter().copied().find(|b| b.name() == name)
    }
}

impl fmt::Display for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
