use crate::env::Environment;
use anyhow::Result;
use std::io::{Read, Write};
use std::process::Stdio;
use tracing::debug;

/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
/// This mirrors the convention used by POSIX shells and many command-line tools.
pub type ExitCode = i32;

/// Abstraction over a readable input stream that can also be converted into
/// a [`Stdio`] handle for spawning external processes.
///
/// Implementors typically wrap standard input or one end of a pipe. A blanket
/// implementation exists for any type that implements `Read`, `Send` and
/// `Into<Stdio>` (e.g. `os_pipe::PipeReader` or `File`).
pub trait Stdin: Read + Send {
    /// Convert this input into a [`Stdio`] handle suitable for `std::process::Command`.
    fn stdio(self: Box<Self>) -> Stdio;
}

impl<T: Read + Send + Into<Stdio>> Stdin for T {
    fn stdio(self: Box<Self>) -> Stdio {
        (*self).into()
    }
}

/// Abstraction over a writable output stream that can also be converted into
/// a [`Stdio`] handle for spawning external processes.
///
/// A blanket implementation exists for any type that implements `Write`, `Send`
/// and `Into<Stdio>`.
pub trait Stdout: Write + Send {
    /// Convert this output into a [`Stdio`] handle suitable for `std::process::Command`.
    fn stdio(self: Box<Self>) -> Stdio;
}

impl<T: Write + Send + Into<Stdio>> Stdout for T {
    fn stdio(self: Box<Self>) -> Stdio {
        (*self).into()
    }
}

/// The interpreter's own standard input.
///
/// Builtins read it directly; external processes inherit the descriptor.
pub struct InheritedStdin(std::io::Stdin);

impl InheritedStdin {
    pub fn new() -> Self {
        Self(std::io::stdin())
    }
}

impl Default for InheritedStdin {
    fn default() -> Self {
        Self::new()
    }
}

impl Read for InheritedStdin {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.0.read(buf)
    }
}

impl Stdin for InheritedStdin {
    fn stdio(self: Box<Self>) -> Stdio {
        Stdio::inherit()
    }
}

/// The interpreter's own standard output.
pub struct InheritedStdout(std::io::Stdout);

impl InheritedStdout {
    pub fn new() -> Self {
        Self(std::io::stdout())
    }
}

impl Default for InheritedStdout {
    fn default() -> Self {
        Self::new()
    }
}

impl Write for InheritedStdout {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.0.flush()
    }
}

impl Stdout for InheritedStdout {
    fn stdio(self: Box<Self>) -> Stdio {
        // Anything a builtin buffered must land before the child writes.
        if let Err(e) = std::io::stdout().flush() {
            debug!(error = %e, "can't flush stdout before handing it to a child");
        }
        Stdio::inherit()
    }
}

/// Object-safe trait for any command that can run as a pipeline stage.
///
/// This is implemented by built-ins via a blanket impl and by external commands.
/// Starting a command must not block on its I/O: the executor starts every stage
/// before it waits for any of them.
pub trait ExecutableCommand: Send {
    /// Starts the command with its assigned streams.
    fn spawn(
        self: Box<Self>,
        stdin: Box<dyn Stdin>,
        stdout: Box<dyn Stdout>,
    ) -> Result<Box<dyn RunningCommand>>;
}

/// A started pipeline stage.
pub trait RunningCommand {
    /// Blocks until the stage is done and returns its exit code.
    fn wait(self: Box<Self>) -> Result<ExitCode>;
}

/// A stage that completed while it was being started.
pub struct Finished(pub ExitCode);

impl RunningCommand for Finished {
    fn wait(self: Box<Self>) -> Result<ExitCode> {
        Ok(self.0)
    }
}

/// Factory that tries to create a command from a name and its arguments.
///
/// Returns `None` when the factory doesn't recognize the `name`.
/// Implementations can use the environment to resolve executables (e.g., using PATH).
pub trait CommandFactory {
    /// Attempt to create a command instance for the provided name and arguments.
    fn try_create(
        &self,
        env: &Environment,
        name: &str,
        args: &[&str],
    ) -> Option<Box<dyn ExecutableCommand>>;
}
