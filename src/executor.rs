//! Runs a [`Pipeline`]: one stage per command, linked by OS pipes.
//!
//! Every stage is started before any is waited on. External stages are
//! connected to each other directly through the pipe descriptors, builtins
//! run on their own threads, so no stage ever waits on a relay that is itself
//! waiting on another stage. Standard error is inherited by every stage.

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::command::{CommandFactory, ExecutableCommand, ExitCode, Finished, RunningCommand, Stdin, Stdout};
use crate::env::Environment;
use crate::pipeline::{Command, Input, Output, Pipeline};

/// Status of a stage whose program could not be found.
pub const NOT_FOUND: ExitCode = 127;
/// Status of a stage whose program was found but could not be started.
pub const CANNOT_EXECUTE: ExitCode = 126;

/// How a pipeline ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The last stage finished with this status.
    Finished(ExitCode),
    /// The line was a lone `exit`; nothing was run.
    Exit,
}

/// Placeholder for a name no factory recognised.
struct NotFound {
    name: String,
}

impl ExecutableCommand for NotFound {
    fn spawn(
        self: Box<Self>,
        _stdin: Box<dyn Stdin>,
        _stdout: Box<dyn Stdout>,
    ) -> Result<Box<dyn RunningCommand>> {
        eprintln!("{}: command not found", self.name);
        Ok(Box::new(Finished(NOT_FOUND)))
    }
}

enum Stage {
    Running(String, Box<dyn RunningCommand>),
    Done(ExitCode),
}

pub struct Executor<'a> {
    factories: &'a [Box<dyn CommandFactory>],
    env: &'a Environment,
}

impl<'a> Executor<'a> {
    pub fn new(factories: &'a [Box<dyn CommandFactory>], env: &'a Environment) -> Self {
        Self { factories, env }
    }

    /// Run every stage of `pipeline` and return the status of the last one.
    ///
    /// `stdin` feeds the first stage and `stdout` receives the output of the
    /// last one. Failures never escape: they are reported on stderr and
    /// turned into a stage status.
    pub fn execute(
        &self,
        pipeline: Pipeline,
        stdin: Box<dyn Stdin>,
        stdout: Box<dyn Stdout>,
    ) -> Outcome {
        if pipeline.is_sole_exit() {
            debug!("exit requested");
            return Outcome::Exit;
        }
        if pipeline.is_empty() {
            return Outcome::Finished(0);
        }

        let stages = self.start(pipeline, stdin, stdout);
        Outcome::Finished(collect(stages))
    }

    fn start(
        &self,
        pipeline: Pipeline,
        stdin: Box<dyn Stdin>,
        stdout: Box<dyn Stdout>,
    ) -> Vec<Stage> {
        let mut stdin = Some(stdin);
        let mut stdout = Some(stdout);
        let mut upstream = None;
        let mut stages = Vec::with_capacity(pipeline.len());

        for cmd in pipeline {
            match connect(&cmd, &mut stdin, &mut stdout, &mut upstream) {
                Ok((input, output)) => stages.push(self.start_stage(&cmd, input, output)),
                Err(e) => {
                    warn!(stage = cmd.name(), error = %e, "can't wire stage");
                    eprintln!("{}: {:#}", cmd.name(), e);
                    stages.push(Stage::Done(1));
                    break;
                }
            }
        }
        stages
    }

    fn start_stage(&self, cmd: &Command, stdin: Box<dyn Stdin>, stdout: Box<dyn Stdout>) -> Stage {
        let name = cmd.name().to_string();
        let executable = self.resolve(cmd);
        match executable.spawn(stdin, stdout) {
            Ok(running) => {
                debug!(stage = %name, "started");
                Stage::Running(name, running)
            }
            Err(e) => {
                eprintln!("{}: {:#}", name, e);
                Stage::Done(CANNOT_EXECUTE)
            }
        }
    }

    /// Builtins first, then PATH lookup.
    fn resolve(&self, cmd: &Command) -> Box<dyn ExecutableCommand> {
        let args: Vec<&str> = cmd.args().iter().map(String::as_str).collect();
        self.factories
            .iter()
            .find_map(|factory| factory.try_create(self.env, cmd.name(), &args))
            .unwrap_or_else(|| {
                Box::new(NotFound {
                    name: cmd.name().to_string(),
                })
            })
    }
}

/// Wait for every stage; the last one decides the status.
fn collect(stages: Vec<Stage>) -> ExitCode {
    let mut last = 0;
    for stage in stages {
        last = match stage {
            Stage::Done(code) => code,
            Stage::Running(name, running) => match running.wait().with_context(|| name.clone()) {
                Ok(code) => {
                    debug!(stage = %name, code, "finished");
                    code
                }
                Err(e) => {
                    eprintln!("{:#}", e);
                    1
                }
            },
        };
    }
    last
}

/// Pick the streams for one stage.
///
/// The interpreter's own streams go to the first and last stage; in between,
/// a fresh pipe links this stage's output to the next stage's input.
fn connect(
    cmd: &Command,
    stdin: &mut Option<Box<dyn Stdin>>,
    stdout: &mut Option<Box<dyn Stdout>>,
    upstream: &mut Option<os_pipe::PipeReader>,
) -> Result<(Box<dyn Stdin>, Box<dyn Stdout>)> {
    let input: Box<dyn Stdin> = match cmd.input {
        Input::Inherited => stdin.take().context("interpreter input already in use")?,
        Input::PreviousStage => Box::new(upstream.take().context("no stage before this one")?),
    };
    let output: Box<dyn Stdout> = match cmd.output {
        Output::Inherited => stdout.take().context("interpreter output already in use")?,
        Output::NextStage => {
            let (reader, writer) = os_pipe::pipe().context("can't create pipe")?;
            *upstream = Some(reader);
            Box::new(writer)
        }
    };
    Ok((input, output))
}
