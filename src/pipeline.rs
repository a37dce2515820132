//! Command descriptors and their stream endpoints.

/// Name of the command that ends the interpreter session.
pub const EXIT: &str = "exit";

/// Where a stage reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    /// The interpreter's own input.
    Inherited,
    /// The output of the stage right before this one.
    PreviousStage,
}

/// Where a stage writes to. Standard error is always inherited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Output {
    /// The interpreter's own output.
    Inherited,
    /// The input of the stage right after this one.
    NextStage,
}

/// One stage of a pipeline: a name, its arguments and its endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    argv: Vec<String>,
    pub input: Input,
    pub output: Output,
}

impl Command {
    /// A command reading and writing the interpreter's own streams.
    ///
    /// `argv` must not be empty.
    pub fn new(argv: Vec<String>) -> Self {
        debug_assert!(!argv.is_empty());
        Self {
            argv,
            input: Input::Inherited,
            output: Output::Inherited,
        }
    }

    pub fn name(&self) -> &str {
        &self.argv[0]
    }

    pub fn args(&self) -> &[String] {
        &self.argv[1..]
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    pub fn is_exit(&self) -> bool {
        self.name() == EXIT
    }
}

/// Ordered stages produced by one parse of one line.
///
/// Empty means there is nothing to run (e.g. a variable assignment).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pipeline {
    commands: Vec<Command>,
}

impl Pipeline {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a pipeline from per-stage argument lists and wire the stages.
    ///
    /// Stage `i` writes into stage `i + 1`; the first stage reads the
    /// interpreter's input and the last writes to the interpreter's output.
    /// In a line of two or more stages every `exit` stage is dropped and its
    /// neighbours are connected to each other.
    pub fn build(groups: Vec<Vec<String>>) -> Self {
        let multi_stage = groups.len() > 1;
        let mut commands: Vec<Command> = groups
            .into_iter()
            .filter(|argv| !argv.is_empty())
            .map(Command::new)
            .filter(|cmd| !(multi_stage && cmd.is_exit()))
            .collect();

        let last = commands.len().saturating_sub(1);
        for (i, cmd) in commands.iter_mut().enumerate() {
            if i > 0 {
                cmd.input = Input::PreviousStage;
            }
            if i < last {
                cmd.output = Output::NextStage;
            }
        }
        Self { commands }
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// True for a line consisting of a lone `exit`.
    pub fn is_sole_exit(&self) -> bool {
        matches!(self.commands.as_slice(), [only] if only.is_exit())
    }
}

impl IntoIterator for Pipeline {
    type Item = Command;
    type IntoIter = std::vec::IntoIter<Command>;

    fn into_iter(self) -> Self::IntoIter {
        self.commands.into_iter()
    }
}
