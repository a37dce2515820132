//! Turns one input line into a [`Pipeline`].
//!
//! raw line → tokens → (`$NAME` substitution + quote removal per word) →
//! per-stage argument lists → pipeline. A line made of a single `NAME=VALUE`
//! word is an assignment: it updates the environment and yields an empty
//! pipeline.

use thiserror::Error;
use tracing::{debug, trace};

use crate::env::Environment;
use crate::expand;
use crate::lexer::{self, LexingError, Token};
use crate::pipeline::Pipeline;
use crate::quote;

/// Errors that reject a whole line before anything runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("input cannot be empty")]
    EmptyInput,
    #[error("unclosed quote")]
    UnclosedQuote,
    #[error("value of variable '{0}' cannot be empty")]
    EmptyAssignmentValue(String),
    #[error("malformed pipeline: {0}")]
    MalformedPipeline(&'static str),
}

impl From<LexingError> for ParseError {
    fn from(err: LexingError) -> Self {
        match err {
            LexingError::UnfinishedQuote => ParseError::UnclosedQuote,
        }
    }
}

/// Parse a line, applying an assignment to `env` if that is what the line is.
///
/// On error the environment is left untouched.
pub fn parse(line: &str, env: &mut Environment) -> Result<Pipeline, ParseError> {
    let line = line.trim();
    if line.is_empty() {
        return Err(ParseError::EmptyInput);
    }

    let tokens = lexer::split_into_tokens(line)?;
    trace!(?tokens, "tokenized");

    if let [Token::Word(word)] = tokens.as_slice() {
        if let Some((name, value)) = split_assignment(word)? {
            let value = expand_word(value, env);
            debug!(name, value = %value, "assignment");
            env.set(name, value);
            return Ok(Pipeline::empty());
        }
    }

    let groups = group_commands(&tokens, env)?;
    debug!(?groups, "grouped commands");
    Ok(Pipeline::build(groups))
}

/// Substitute variables in a word, then strip its quotes.
pub fn expand_word(word: &str, env: &Environment) -> String {
    quote::resolve(&expand::substitute(word, env))
}

/// Recognise `NAME=VALUE`. The name may not contain quotes or `$`, so an `=`
/// inside a quoted span never makes a word an assignment.
fn split_assignment(word: &str) -> Result<Option<(&str, &str)>, ParseError> {
    let Some((name, value)) = word.split_once('=') else {
        return Ok(None);
    };
    if name.is_empty() || name.contains(['"', '\'', '$']) {
        return Ok(None);
    }
    if value.is_empty() {
        return Err(ParseError::EmptyAssignmentValue(name.to_string()));
    }
    Ok(Some((name, value)))
}

/// Split resolved words into one argument list per stage.
///
/// An unquoted word that expands to nothing is dropped, like an unset
/// variable in a POSIX shell.
fn group_commands(tokens: &[Token], env: &Environment) -> Result<Vec<Vec<String>>, ParseError> {
    let mut groups = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut saw_word = false;

    for token in tokens {
        match token {
            Token::PipeOp => {
                if !saw_word {
                    return Err(ParseError::MalformedPipeline("missing command before '|'"));
                }
                if current.is_empty() {
                    return Err(ParseError::MalformedPipeline("command expands to nothing"));
                }
                groups.push(std::mem::take(&mut current));
                saw_word = false;
            }
            Token::Word(word) => {
                saw_word = true;
                let arg = expand_word(word, env);
                if arg.is_empty() && !quote::is_quoted(word) {
                    continue;
                }
                current.push(arg);
            }
        }
    }

    if !saw_word {
        return Err(ParseError::MalformedPipeline("missing command after '|'"));
    }
    if current.is_empty() {
        return Err(ParseError::MalformedPipeline("command expands to nothing"));
    }
    groups.push(current);
    Ok(groups)
}
