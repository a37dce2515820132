use std::collections::{HashMap, HashSet};
use std::env as stdenv;

use crate::command::ExitCode;

/// Name of the variable holding the status of the most recently completed pipeline.
pub const LAST_STATUS: &str = "?";

/// Variables visible to the interpreter for the lifetime of one session.
///
/// The environment contains:
/// - `vars`: the name to value mapping used by `$NAME` substitution.
/// - `exported`: names taken from the process environment; only these are
///   handed to spawned programs, with their current session values.
/// - `should_exit`: a flag the REPL loop checks to know when to terminate.
///
/// Looking up an unset name yields the empty string. The reserved key `?`
/// always holds the decimal exit status of the last pipeline.
#[derive(Debug, Clone)]
pub struct Environment {
    vars: HashMap<String, String>,
    exported: HashSet<String>,
    /// When set to true, indicates that an interactive loop should exit.
    pub should_exit: bool,
}

impl Environment {
    /// Capture the current process variables into a new `Environment`.
    ///
    /// This copies variables from `std::env::vars()`, marks them exported and
    /// initializes `?` to `0`.
    pub fn new() -> Self {
        let mut env = Self::empty();
        for (k, v) in stdenv::vars() {
            env.exported.insert(k.clone());
            env.vars.insert(k, v);
        }
        env
    }

    /// An environment that only knows about `?`.
    pub fn empty() -> Self {
        let mut vars = HashMap::new();
        vars.insert(LAST_STATUS.to_string(), "0".to_string());
        Self {
            vars,
            exported: HashSet::new(),
            should_exit: false,
        }
    }

    /// Get the value of a variable, or `""` when it is not set.
    pub fn get(&self, key: &str) -> &str {
        self.vars.get(key).map(String::as_str).unwrap_or("")
    }

    /// Set or override a variable.
    pub fn set(&mut self, key: impl Into<String>, val: impl Into<String>) {
        self.vars.insert(key.into(), val.into());
    }

    pub fn has(&self, key: &str) -> bool {
        self.vars.contains_key(key)
    }

    /// Record the exit status of a finished pipeline under `?`.
    pub fn set_last_status(&mut self, code: ExitCode) {
        self.set(LAST_STATUS, code.to_string());
    }

    /// Hand `key` to spawned processes from now on.
    pub fn export(&mut self, key: impl Into<String>) {
        let key = key.into();
        if key != LAST_STATUS {
            self.exported.insert(key);
        }
    }

    /// Exported variables that are currently set, with their session values.
    ///
    /// Names assigned during the session stay private to the interpreter
    /// unless [`Environment::export`] was called for them.
    pub fn exported(&self) -> impl Iterator<Item = (&str, &str)> {
        self.exported
            .iter()
            .filter_map(|k| self.vars.get_key_value(k))
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use crate::env::Environment;

    #[test]
    fn test_env_set_and_get_var() {
        let mut env = Environment::empty();

        // initially absent
        assert_eq!(env.get("SOME_RANDOM_ENV_VAR_12345"), "");
        assert!(!env.has("SOME_RANDOM_ENV_VAR_12345"));

        env.set("KEY", "VALUE");

        assert_eq!(env.get("KEY"), "VALUE");
        assert!(env.has("KEY"));
    }

    #[test]
    fn test_env_reads_from_process_env() {
        let env = Environment::new();
        assert!(env.has("PATH"));
        assert_eq!(env.get("?"), "0");
    }

    #[test]
    fn test_last_status_is_not_exported() {
        let mut env = Environment::empty();
        env.set("A", "1");
        env.export("A");
        env.set_last_status(42);
        env.export("?");

        assert_eq!(env.get("?"), "42");
        let exported: Vec<_> = env.exported().collect();
        assert_eq!(exported, vec![("A", "1")]);
    }

    #[test]
    fn test_session_assignments_stay_private() {
        let mut env = Environment::new();
        env.set("PIPESHELL_SESSION_ONLY", "x".repeat(1 << 20));
        env.set("PATH", "/opt/bin");

        let exported: Vec<_> = env.exported().collect();
        assert!(!exported.iter().any(|(k, _)| *k == "PIPESHELL_SESSION_ONLY"));
        assert!(exported.contains(&("PATH", "/opt/bin")));
    }
}
