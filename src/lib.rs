//! A minimal interactive command interpreter.
//!
//! A line goes through the [`lexer`], `$NAME` substitution ([`expand`]) and
//! quote removal ([`quote`]), is grouped into a [`pipeline::Pipeline`] by the
//! [`parser`], and is then run by the [`executor`]: builtins in-process on
//! their own threads, everything else as child processes, with adjacent
//! stages linked by OS pipes.
//!
//! The main entry point is [`Interpreter`], which evaluates lines against a
//! session [`env::Environment`] using a set of pluggable command factories.
//! The public modules [`command`] and [`env`] expose traits and types for
//! implementing your own commands.

mod builtin;
pub mod command;
pub mod env;
pub mod executor;
pub mod expand;
mod external;
mod interpreter;
pub mod lexer;
pub mod parser;
pub mod pipeline;
pub mod quote;

/// Just a convenient re-export of the interactive command runner.
///
/// See [`Interpreter`] for the high-level API and examples.
pub use interpreter::{DEFAULT_PROMPT, Interpreter, PARSE_ERROR, default_commands};
pub use parser::ParseError;
