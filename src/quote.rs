//! Quote removal and escape processing for a substituted word.
//!
//! - `'...'`: content is taken verbatim.
//! - `"..."`: `\n` and `\t` become newline and tab, every other backslash pair
//!   (including `\$` and `\"`) is kept as written.
//! - unquoted text passes through unchanged.
//!
//! Variable values arrive as [`WordPart::Value`] and are copied out untouched,
//! whatever quote or dollar characters they contain.

use crate::expand::WordPart;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QuoteState {
    Unquoted,
    Single,
    Double { escaped: bool },
}

/// Remove quote delimiters and apply escapes, producing the final argument.
pub fn resolve(parts: &[WordPart]) -> String {
    let mut out = String::new();
    let mut state = QuoteState::Unquoted;

    for part in parts {
        let raw = match part {
            WordPart::Value(value) => {
                if state == (QuoteState::Double { escaped: true }) {
                    out.push('\\');
                    state = QuoteState::Double { escaped: false };
                }
                out.push_str(value);
                continue;
            }
            WordPart::Raw(raw) => raw,
        };
        for c in raw.chars() {
            state = match (state, c) {
                (QuoteState::Unquoted, '\'') => QuoteState::Single,
                (QuoteState::Unquoted, '"') => QuoteState::Double { escaped: false },
                (QuoteState::Unquoted, c) => {
                    out.push(c);
                    QuoteState::Unquoted
                }
                (QuoteState::Single, '\'') => QuoteState::Unquoted,
                (QuoteState::Single, c) => {
                    out.push(c);
                    QuoteState::Single
                }
                (QuoteState::Double { escaped: true }, c) => {
                    match c {
                        'n' => out.push('\n'),
                        't' => out.push('\t'),
                        c => {
                            out.push('\\');
                            out.push(c);
                        }
                    }
                    QuoteState::Double { escaped: false }
                }
                (QuoteState::Double { escaped: false }, '\\') => {
                    QuoteState::Double { escaped: true }
                }
                (QuoteState::Double { escaped: false }, '"') => QuoteState::Unquoted,
                (QuoteState::Double { escaped: false }, c) => {
                    out.push(c);
                    QuoteState::Double { escaped: false }
                }
            };
        }
    }

    // The lexer rejects unbalanced quotes, so only a dangling backslash can remain.
    if state == (QuoteState::Double { escaped: true }) {
        out.push('\\');
    }
    out
}

/// Resolve a word that went through no substitution.
pub fn resolve_str(word: &str) -> String {
    resolve(&[WordPart::Raw(word.to_string())])
}

/// True when the word carries quote delimiters of its own.
pub fn is_quoted(word: &str) -> bool {
    word.contains(['\'', '"'])
}
