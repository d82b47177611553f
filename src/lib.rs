//! # vidlang
//!
//! A small pipeline language for editing video. Scripts open media, thread
//! it through filter commands with `|>` and export the result through
//! ffmpeg:
//!
//! ```text
//! clip := open "raw/intake.mp4"
//! clip |> cut 0 12 |> brightness 0.05 |> export "intro.mp4"
//! ```
//!
//! The crate is layered the way a script flows through it:
//!
//! - [`lexer`] turns source text into tokens
//! - [`parser`] builds [`ast`] statements, one at a time
//! - [`evaluator`] runs them against a [`Context`] and a
//!   [`backend::MediaBackend`]
//! - [`backend::graph`] is the ffmpeg backend
//!
//! # Examples
//!
//! ```
//! use vidlang::{Config, Context, Interpreter};
//! use vidlang::backend::graph::{DryRunner, FilterGraph};
//!
//! let config = Config::default();
//! let ctx = Context::new(config.clone()).unwrap();
//! let mut interpreter = Interpreter::new(ctx, FilterGraph::new(&config, DryRunner::default()));
//!
//! interpreter.run("rate := 1.5\nlabel := \"fast\"").unwrap();
//! assert_eq!(interpreter.context().number("rate").unwrap(), 1.5);
//! ```

pub mod arith;
pub mod ast;
pub mod backend;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod evaluator;
pub mod lexer;
pub mod media;
pub mod parser;
pub mod printer;
pub mod store;
pub mod value;

pub use ast::{Statement, Token, TokenKind};
pub use config::Config;
pub use evaluator::{Context, EvalError, Interpreter, run};
pub use lexer::{Lexer, scan};
pub use parser::{ParseError, ParseErrorKind, Parser, parse};
pub use value::{ValueBox, ValueType};
