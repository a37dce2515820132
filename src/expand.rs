//! `$NAME` substitution inside a single word.

use crate::env::Environment;

/// A fragment of a word after substitution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WordPart {
    /// Text copied from the input line, quote delimiters and escapes still in place.
    Raw(String),
    /// The value of a variable. Never quote-resolved and never re-scanned.
    Value(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Quoting {
    None,
    Single,
    Double,
}

fn ends_name(c: char) -> bool {
    matches!(c, '$' | '"' | '\'' | '\\') || c.is_whitespace()
}

/// Replace every `$NAME` outside single quotes with the value of `NAME`.
///
/// Unset names substitute to the empty string. Inside double quotes `\$`
/// is left alone. A `$` not followed by a name stays literal.
pub fn substitute(word: &str, env: &Environment) -> Vec<WordPart> {
    let mut parts = Vec::new();
    let mut raw = String::new();
    let mut quoting = Quoting::None;
    let mut escaped = false;
    let mut chars = word.chars().peekable();

    while let Some(c) = chars.next() {
        if escaped {
            escaped = false;
            raw.push(c);
            continue;
        }
        match (quoting, c) {
            (Quoting::None, '\'') => quoting = Quoting::Single,
            (Quoting::Single, '\'') => quoting = Quoting::None,
            (Quoting::None, '"') => quoting = Quoting::Double,
            (Quoting::Double, '"') => quoting = Quoting::None,
            (Quoting::Double, '\\') => escaped = true,
            (Quoting::None | Quoting::Double, '$') => {
                let mut name = String::new();
                while let Some(&next) = chars.peek() {
                    if ends_name(next) {
                        break;
                    }
                    name.push(next);
                    chars.next();
                }
                if name.is_empty() {
                    raw.push('$');
                } else {
                    if !raw.is_empty() {
                        parts.push(WordPart::Raw(std::mem::take(&mut raw)));
                    }
                    parts.push(WordPart::Value(env.get(&name).to_string()));
                }
                continue;
            }
            _ => {}
        }
        raw.push(c);
    }

    if !raw.is_empty() {
        parts.push(WordPart::Raw(raw));
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(parts: &[WordPart]) -> String {
        parts
            .iter()
            .map(|p| match p {
                WordPart::Raw(s) | WordPart::Value(s) => s.as_str(),
            })
            .collect()
    }

    fn bob_env() -> Environment {
        let mut env = Environment::empty();
        env.set("USER_BOB", "Bob");
        env.set("HOME_BOB", "/home/bob");
        env
    }

    fn subst(word: &str) -> String {
        render(&substitute(word, &bob_env()))
    }

    #[test]
    fn test_plain_variables() {
        assert_eq!(subst("$USER_BOB"), "Bob");
        assert_eq!(subst("someLetters$HOME_BOB"), "someLetters/home/bob");
    }

    #[test]
    fn test_unset_variable_is_empty() {
        assert_eq!(subst("$FOO_NOT_SET_ANYWHERE"), "");
        assert!(substitute("$FOO_NOT_SET_ANYWHERE", &bob_env())
            .iter()
            .all(|p| p == &WordPart::Value(String::new())));
    }

    #[test]
    fn test_double_quotes_are_substituted() {
        assert_eq!(subst("\"$USER_BOB\""), "\"Bob\"");
        assert_eq!(subst("\"Hi $USER_BOB and you\""), "\"Hi Bob and you\"");
    }

    #[test]
    fn test_single_quotes_are_literal() {
        assert_eq!(subst("Hell'$USER_BOB'o"), "Hell'$USER_BOB'o");
        assert_eq!(
            subst("more'quotes'for$USER_BOB\"endQuote\"eee"),
            "more'quotes'forBob\"endQuote\"eee"
        );
        assert_eq!(subst("\"it's $USER_BOB\""), "\"it's Bob\"");
    }

    #[test]
    fn test_lone_dollar_and_escaped_dollar() {
        assert_eq!(subst("$"), "$");
        assert_eq!(subst("a$\"b\""), "a$\"b\"");
        assert_eq!(subst(r#""\$USER_BOB""#), r#""\$USER_BOB""#);
    }

    #[test]
    fn test_names_end_at_next_dollar() {
        assert_eq!(subst("$USER_BOB$HOME_BOB"), "Bob/home/bob");
    }

    #[test]
    fn test_substitution_is_single_pass() {
        let mut env = bob_env();
        env.set("TRICKY", "$USER_BOB'");
        assert_eq!(
            substitute("x$TRICKY", &env),
            vec![
                WordPart::Raw("x".into()),
                WordPart::Value("$USER_BOB'".into())
            ]
        );
    }

    #[test]
    fn test_last_status() {
        let mut env = bob_env();
        env.set_last_status(3);
        assert_eq!(render(&substitute("$?", &env)), "3");
    }
}
