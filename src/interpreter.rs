use crate::command::{CommandFactory, ExitCode, InheritedStdin, InheritedStdout, Stdin, Stdout};
use crate::env::Environment;
use crate::executor::{Executor, Outcome};
use crate::parser;
use rustyline::error::ReadlineError;
use rustyline::{DefaultEditor, Result};
use tracing::debug;

/// Status stored in `?` when a line fails to parse.
pub const PARSE_ERROR: ExitCode = 2;

/// Prompt shown by [`Interpreter::repl`] unless configured otherwise.
pub const DEFAULT_PROMPT: &str = "🐒$ ";

/// Factory allows creating instances of ExecutableCommand.
///
/// Implemented for every builtin and for the external command launcher.
pub(crate) struct Factory<T> {
    _phantom: std::marker::PhantomData<T>,
}

impl<T> Default for Factory<T> {
    fn default() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

/// The default set of commands:
/// - built-ins: `echo`, `cat`, `wc`, `pwd`, `grep`
/// - external command launcher (PATH lookup), consulted last
pub fn default_commands() -> Vec<Box<dyn CommandFactory>> {
    use crate::builtin::*;
    use crate::external::ExternalCommand;
    vec![
        Box::new(Factory::<Echo>::default()),
        Box::new(Factory::<Cat>::default()),
        Box::new(Factory::<Wc>::default()),
        Box::new(Factory::<Pwd>::default()),
        Box::new(Factory::<Grep>::default()),
        Box::new(Factory::<ExternalCommand>::default()),
    ]
}

/// A minimal shell-like interpreter that can execute built-in and external commands.
///
/// The interpreter maintains an [`Environment`] and a list of [`CommandFactory`] objects
/// that are queried to create commands by name. See [`Default`] for the built-in
/// factories included out of the box.
///
/// Example
/// ```
/// use pipeshell::Interpreter;
/// let mut sh = Interpreter::default();
/// assert_eq!(sh.eval("GREETING=hello"), 0);
/// assert_eq!(sh.env().get("GREETING"), "hello");
/// ```
pub struct Interpreter {
    env: Environment,
    commands: Vec<Box<dyn CommandFactory>>,
    prompt: String,
}

impl Interpreter {
    /// Create a new interpreter with a custom set of command factories.
    pub fn new(commands: Vec<Box<dyn CommandFactory>>) -> Self {
        Self {
            env: Environment::new(),
            commands,
            prompt: DEFAULT_PROMPT.to_string(),
        }
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn env_mut(&mut self) -> &mut Environment {
        &mut self.env
    }

    /// True once a lone `exit` has been evaluated.
    pub fn should_exit(&self) -> bool {
        self.env.should_exit
    }

    /// Evaluate one line against the process's own stdin and stdout.
    pub fn eval(&mut self, line: &str) -> ExitCode {
        self.eval_with_io(line, Box::new(InheritedStdin::new()), Box::new(InheritedStdout::new()))
    }

    /// Evaluate one line: parse it, run the pipeline, store the status in `?`.
    ///
    /// `stdin` feeds the first stage and the last stage writes to `stdout`.
    /// Never fails: parse errors and execution failures become a status.
    pub fn eval_with_io(
        &mut self,
        line: &str,
        stdin: Box<dyn Stdin>,
        stdout: Box<dyn Stdout>,
    ) -> ExitCode {
        let pipeline = match parser::parse(line, &mut self.env) {
            Ok(pipeline) => pipeline,
            Err(e) => {
                eprintln!("parse error: {e}");
                self.env.set_last_status(PARSE_ERROR);
                return PARSE_ERROR;
            }
        };

        let outcome = Executor::new(&self.commands, &self.env).execute(pipeline, stdin, stdout);
        let code = match outcome {
            Outcome::Finished(code) => code,
            Outcome::Exit => {
                self.env.should_exit = true;
                0
            }
        };
        debug!(code, "pipeline done");
        self.env.set_last_status(code);
        code
    }

    /// Read-Eval-Print Loop: runs until end of input or `exit`.
    pub fn repl(&mut self) -> Result<()> {
        let mut rl = DefaultEditor::new()?;

        while !self.env.should_exit {
            match rl.readline(&self.prompt) {
                Ok(line) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    rl.add_history_entry(line.as_str())?;
                    self.eval(&line);
                }
                Err(ReadlineError::Interrupted) => continue,
                Err(ReadlineError::Eof) => break,
                Err(err) => return Err(err),
            }
        }

        Ok(())
    }
}

impl Default for Interpreter {
    /// Create an interpreter with [`default_commands`].
    fn default() -> Self {
        Self::new(default_commands())
    }
}
