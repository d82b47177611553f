//! # Vidlang - Abstract Syntax Tree
//!
//! Vidlang scripts describe video edits as pipelines: a stream is opened,
//! threaded through filter commands with `|>`, bound to names and finally
//! exported.
//!
//! ## Architecture Overview
//!
//! - **[tokens]** - Lexical tokens produced by the scanner
//! - **[grammar]** - Keyword and operator tables
//! - **[operators]** - Arithmetic operators and their precedence
//! - **[values]** - Value nodes (literals, names, lists, sub-expressions, math)
//! - **[statements]** - Commands, pipelines, expressions and assignments
//!
//! ## Quick Start
//!
//! ```text
//! clip := open "clip.mp4"
//! clip |> brightness 1.2
//!      |> export "bright.mp4"
//! ```
//!
//! ## Core Concepts
//!
//! ### Statements
//!
//! A script is a sequence of newline-separated statements. A statement is
//! either an assignment (`names := value`, `names = value`) or a bare
//! pipeline. A pipeline may continue on the next line when that line starts
//! with `|>`.
//!
//! ### The global stream
//!
//! `stream` always holds the result of the most recent bare pipeline:
//!
//! ```text
//! open "raw.mp4" |> cut 0 10
//! stream |> export "first-ten-seconds.mp4"
//! ```
//!
//! ### Self reference
//!
//! Inside an assignment `*` refers to the destination itself:
//!
//! ```text
//! video = * |> contrast 1.1
//! ```
//!
//! ### Arithmetic
//!
//! Numbers are 64-bit floats. Arithmetic follows the usual precedence and
//! can be used as a command argument:
//!
//! ```text
//! clip |> brightness 0.1 * 3 + 0.2
//! ```
pub mod grammar;
pub mod operators;
pub mod statements;
pub mod tokens;
pub mod values;

pub use operators::MathOp;
pub use statements::{Assignment, Command, Expr, Pipeline, Statement};
pub use tokens::{Builtin, Token, TokenKind};
pub use values::{MathExpr, SubExpr, Value, ValueKind};
