use crate::command::{CommandFactory, ExecutableCommand, ExitCode, RunningCommand, Stdin, Stdout};
use crate::env::Environment;
use crate::interpreter::Factory;
use anyhow::Result;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Child, ExitStatus, Stdio};
use tracing::debug;

/// A program started as a child process.
pub struct ExternalCommand {
    name: OsString,
    args: Vec<OsString>,
    vars: Vec<(String, String)>,
}

impl ExternalCommand {
    pub fn new(name: OsString, args: Vec<OsString>) -> Self {
        Self {
            name,
            args,
            vars: Vec::new(),
        }
    }

    /// Variables to set in the child on top of the inherited process environment.
    pub fn with_vars(mut self, vars: Vec<(String, String)>) -> Self {
        self.vars = vars;
        self
    }
}

impl CommandFactory for Factory<ExternalCommand> {
    fn try_create(
        &self,
        env: &Environment,
        name: &str,
        args: &[&str],
    ) -> Option<Box<dyn ExecutableCommand>> {
        let program = locate_program(env.get("PATH"), name)?;
        let vars = env
            .exported()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let args = args.iter().map(OsString::from).collect();
        Some(Box::new(
            ExternalCommand::new(program.into_os_string(), args).with_vars(vars),
        ))
    }
}

impl ExecutableCommand for ExternalCommand {
    fn spawn(
        self: Box<Self>,
        stdin: Box<dyn Stdin>,
        stdout: Box<dyn Stdout>,
    ) -> Result<Box<dyn RunningCommand>> {
        // The Command owns the parent's copies of the pipe ends and drops
        // them once the child is started, so EOF reaches the next stage.
        let child = std::process::Command::new(&self.name)
            .args(&self.args)
            .stdin(stdin.stdio())
            .stdout(stdout.stdio())
            .stderr(Stdio::inherit())
            .envs(self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .spawn()?;
        debug!(pid = child.id(), program = ?self.name, "spawned");
        Ok(Box::new(ExternalStage { child }))
    }
}

struct ExternalStage {
    child: Child,
}

impl RunningCommand for ExternalStage {
    fn wait(mut self: Box<Self>) -> Result<ExitCode> {
        let status = self.child.wait()?;
        Ok(status.code().unwrap_or_else(|| signal_status(status)))
    }
}

/// `128 + N` for a child killed by signal N.
#[cfg(unix)]
fn signal_status(status: ExitStatus) -> ExitCode {
    use std::os::unix::process::ExitStatusExt;
    status.signal().map_or(1, |signal| 128 + signal)
}

#[cfg(not(unix))]
fn signal_status(_status: ExitStatus) -> ExitCode {
    1
}

/// Find the file to run for `name`.
///
/// A name containing a path separator is taken as a path (relative to the
/// working directory unless absolute). A bare name is looked up in each
/// directory of `search_path`, in order; empty entries and files without an
/// execute bit are skipped. An explicit path only has to name a file, so a
/// non-executable one fails at spawn time.
pub fn locate_program(search_path: &str, name: &str) -> Option<PathBuf> {
    if name.is_empty() {
        return None;
    }
    if name.contains(std::path::MAIN_SEPARATOR) {
        let path = Path::new(name);
        return path.is_file().then(|| path.to_path_buf());
    }
    std::env::split_paths(search_path)
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(|dir| dir.join(name))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .is_ok_and(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
