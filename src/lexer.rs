//! Lexical analysis (tokenization) of one input line.
//!
//! Words keep their quote characters: quote removal and variable substitution
//! happen later, per word, in [`crate::expand`] and [`crate::quote`].

use std::fmt;

/// Represents a token resulting from lexical analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// A word token, exactly as written (quotes still attached).
    Word(String),
    /// The pipe operator, `|`, outside of any quote.
    PipeOp,
}

impl Token {
    pub fn as_str(&self) -> &str {
        match self {
            Token::Word(w) => w,
            Token::PipeOp => "|",
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur during the lexical analysis process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LexingError {
    /// A closing quote (single or double) was not found.
    UnfinishedQuote,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LexingState {
    Start,
    ReadingWord,
    ReadingSingleQuote,
    ReadingDoubleQuote { escaped: bool },
}

struct LexingFSM<'a> {
    input: std::str::Chars<'a>,
    state: LexingState,
    buffer: String,
}

impl<'a> LexingFSM<'a> {
    /// Creates a new instance of the lexical analysis Finite State Machine.
    ///
    /// # Arguments
    /// * `line` - The input string to be lexed.
    fn new(line: &'a str) -> Self {
        LexingFSM {
            input: line.chars(),
            state: LexingState::Start,
            buffer: String::new(),
        }
    }

    /// Performs lexical analysis on the input string and returns a vector of tokens.
    ///
    /// # Returns
    /// A vector of tokens on success, or a `LexingError` if a quote is left open.
    fn make_tokens(&mut self) -> Result<Vec<Token>, LexingError> {
        let mut out = Vec::new();

        while let Some(ch) = self.input.next() {
            match self.state {
                LexingState::Start | LexingState::ReadingWord => self.handle_unquoted(ch, &mut out),
                LexingState::ReadingSingleQuote => self.handle_single_quote(ch),
                LexingState::ReadingDoubleQuote { escaped } => {
                    self.handle_double_quote(ch, escaped)
                }
            }
        }

        match self.state {
            LexingState::ReadingSingleQuote | LexingState::ReadingDoubleQuote { .. } => {
                Err(LexingError::UnfinishedQuote)
            }
            _ => {
                self.finish_word(&mut out);
                Ok(out)
            }
        }
    }

    fn handle_unquoted(&mut self, ch: char, out: &mut Vec<Token>) {
        match ch {
            c if c.is_whitespace() => self.finish_word(out),
            '|' => {
                self.finish_word(out);
                out.push(Token::PipeOp);
            }
            '\'' => {
                self.buffer.push(ch);
                self.state = LexingState::ReadingSingleQuote;
            }
            '"' => {
                self.buffer.push(ch);
                self.state = LexingState::ReadingDoubleQuote { escaped: false };
            }
            c => {
                self.buffer.push(c);
                self.state = LexingState::ReadingWord;
            }
        }
    }

    fn handle_single_quote(&mut self, ch: char) {
        self.buffer.push(ch);
        if ch == '\'' {
            self.state = LexingState::ReadingWord;
        }
    }

    fn handle_double_quote(&mut self, ch: char, escaped: bool) {
        self.buffer.push(ch);
        self.state = match ch {
            _ if escaped => LexingState::ReadingDoubleQuote { escaped: false },
            '\\' => LexingState::ReadingDoubleQuote { escaped: true },
            '"' => LexingState::ReadingWord,
            _ => LexingState::ReadingDoubleQuote { escaped: false },
        };
    }

    fn finish_word(&mut self, out: &mut Vec<Token>) {
        if !self.buffer.is_empty() {
            out.push(Token::Word(std::mem::take(&mut self.buffer)));
        }
        self.state = LexingState::Start;
    }
}

/// The main entry point function to perform lexical analysis.
///
/// Unquoted whitespace separates words and an unquoted `|` is always its own
/// token. Quoted spans stay inside the word they appear in, together with any
/// unquoted text glued to them (`foo"bar baz"qux` is one word).
pub fn split_into_tokens(line: &str) -> Result<Vec<Token>, LexingError> {
    LexingFSM::new(line).make_tokens()
}
