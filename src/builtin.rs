use crate::command::{
    CommandFactory, ExecutableCommand, ExitCode, Finished, RunningCommand, Stdin, Stdout,
};
use crate::env::Environment;
use crate::interpreter::Factory;
use anyhow::{Context, Result};
use argh::{EarlyExit, FromArgs};
use regex::RegexBuilder;
use std::fs;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::thread::JoinHandle;
use tracing::debug;

/// A command run inside the interpreter process.
///
/// Arguments are parsed using the [`argh`] crate (`FromArgs`) and executed
/// in-process, each on its own thread, so they stream through a pipeline
/// exactly like a child process would.
pub(crate) trait BuiltinCommand: Sized + FromArgs + Send + 'static {
    /// Canonical name of the command, e.g. "echo" or "wc".
    fn name() -> &'static str;

    /// Run to completion over the given streams and return the exit status.
    fn execute(self, stdin: &mut dyn Read, stdout: &mut dyn Write) -> Result<ExitCode>;
}

impl<T: BuiltinCommand> ExecutableCommand for T {
    fn spawn(
        self: Box<Self>,
        stdin: Box<dyn Stdin>,
        stdout: Box<dyn Stdout>,
    ) -> Result<Box<dyn RunningCommand>> {
        spawn_on_thread(T::name(), stdin, stdout, move |input, output| {
            (*self).execute(input, output)
        })
    }
}

/// Start `body` on its own thread with the stage's streams.
fn spawn_on_thread<F>(
    name: &'static str,
    stdin: Box<dyn Stdin>,
    stdout: Box<dyn Stdout>,
    body: F,
) -> Result<Box<dyn RunningCommand>>
where
    F: FnOnce(&mut dyn Read, &mut dyn Write) -> Result<ExitCode> + Send + 'static,
{
    let handle = std::thread::Builder::new()
        .name(format!("builtin-{name}"))
        .spawn(move || run_builtin(name, stdin, stdout, body))
        .with_context(|| format!("{name}: can't start builtin"))?;
    Ok(Box::new(BuiltinStage { handle }))
}

/// Run a builtin body to completion and turn any failure into a status.
fn run_builtin<F>(
    name: &'static str,
    mut stdin: Box<dyn Stdin>,
    stdout: Box<dyn Stdout>,
    body: F,
) -> ExitCode
where
    F: FnOnce(&mut dyn Read, &mut dyn Write) -> Result<ExitCode>,
{
    let mut stdout = BufWriter::new(stdout);
    let result = body(&mut stdin, &mut stdout)
        .and_then(|code| stdout.flush().map(|_| code).map_err(Into::into));
    match result {
        Ok(code) => code,
        Err(e) if is_broken_pipe(&e) => {
            debug!(builtin = name, "reader went away, output dropped");
            0
        }
        Err(e) => {
            eprintln!("{name}: {e:#}");
            1
        }
    }
}

fn is_broken_pipe(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<io::Error>()
            .is_some_and(|e| e.kind() == io::ErrorKind::BrokenPipe)
    })
}

struct BuiltinStage {
    handle: JoinHandle<ExitCode>,
}

impl RunningCommand for BuiltinStage {
    fn wait(self: Box<Self>) -> Result<ExitCode> {
        self.handle
            .join()
            .map_err(|_| anyhow::anyhow!("builtin thread panicked"))
    }
}

/// Result of argument parsing that ended early: `--help` or a usage error.
///
/// Help text is written by a builtin thread like any other output; usage
/// errors only touch stderr.
struct InvalidArgs {
    name: &'static str,
    output: String,
    is_error: bool,
}

impl ExecutableCommand for InvalidArgs {
    fn spawn(
        self: Box<Self>,
        stdin: Box<dyn Stdin>,
        stdout: Box<dyn Stdout>,
    ) -> Result<Box<dyn RunningCommand>> {
        let InvalidArgs {
            name,
            output: text,
            is_error,
        } = *self;
        if is_error {
            eprintln!("{}", text.trim_end());
            return Ok(Box::new(Finished(1)));
        }
        spawn_on_thread(name, stdin, stdout, move |_, output| {
            writeln!(output, "{}", text.trim_end())?;
            Ok(0)
        })
    }
}

impl<T: BuiltinCommand> CommandFactory for Factory<T> {
    fn try_create(
        &self,
        _env: &Environment,
        name: &str,
        args: &[&str],
    ) -> Option<Box<dyn ExecutableCommand>> {
        if name == T::name() {
            Some(match T::from_args(&[name], args) {
                Ok(cmd) => Box::new(cmd),
                Err(EarlyExit { output, status }) => Box::new(InvalidArgs {
                    name: T::name(),
                    output,
                    is_error: status.is_err(),
                }),
            })
        } else {
            None
        }
    }
}

#[derive(FromArgs)]
/// print the working directory of the interpreter
pub struct Pwd {}

impl BuiltinCommand for Pwd {
    fn name() -> &'static str {
        "pwd"
    }

    fn execute(self, _stdin: &mut dyn Read, stdout: &mut dyn Write) -> Result<ExitCode> {
        let cwd = std::env::current_dir().context("can't read the current directory")?;
        writeln!(stdout, "{}", cwd.to_string_lossy())?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// print the arguments joined by single spaces, then a newline
pub struct Echo {
    #[argh(switch, short = 'n')]
    /// omit the newline
    pub no_newline: bool,

    #[argh(positional, greedy)]
    /// words to print
    pub args: Vec<String>,
}

impl BuiltinCommand for Echo {
    fn name() -> &'static str {
        "echo"
    }

    fn execute(self, _stdin: &mut dyn Read, stdout: &mut dyn Write) -> Result<ExitCode> {
        let s = self.args.join(" ");
        if self.no_newline {
            write!(stdout, "{}", s)?;
        } else {
            writeln!(stdout, "{}", s)?;
        }
        Ok(0)
    }
}

#[derive(FromArgs)]
/// count newlines, words and bytes of each input
pub struct Wc {
    #[argh(switch, short = 'l')]
    /// only count newlines
    pub lines: bool,

    #[argh(switch, short = 'w')]
    /// only count words
    pub words: bool,

    #[argh(switch, short = 'c')]
    /// only count bytes
    pub bytes: bool,

    #[argh(positional, greedy)]
    /// files to count; standard input when omitted
    pub files: Vec<String>,
}

impl Wc {
    fn report(&self, input: &mut dyn Read, stdout: &mut dyn Write, file: Option<&str>) -> Result<()> {
        let mut buf = Vec::new();
        input.read_to_end(&mut buf)?;

        let all = !(self.lines || self.words || self.bytes);
        let mut fields = Vec::new();
        if all || self.lines {
            fields.push(buf.iter().filter(|&&b| b == b'\n').count().to_string());
        }
        if all || self.words {
            fields.push(String::from_utf8_lossy(&buf).split_whitespace().count().to_string());
        }
        if all || self.bytes {
            fields.push(buf.len().to_string());
        }
        if let Some(name) = file {
            fields.push(name.to_string());
        }
        writeln!(stdout, "{}", fields.join(" "))?;
        Ok(())
    }
}

impl BuiltinCommand for Wc {
    fn name() -> &'static str {
        "wc"
    }

    fn execute(self, stdin: &mut dyn Read, stdout: &mut dyn Write) -> Result<ExitCode> {
        if self.files.is_empty() {
            self.report(stdin, stdout, None)?;
            return Ok(0);
        }
        for fname in &self.files {
            let mut f = fs::File::open(fname).with_context(|| fname.clone())?;
            self.report(&mut f, stdout, Some(fname))?;
        }
        Ok(0)
    }
}

#[derive(FromArgs)]
/// concatenate files to standard output
pub struct Cat {
    #[argh(positional, greedy)]
    /// files to print; standard input when omitted
    pub files: Vec<String>,
}

impl BuiltinCommand for Cat {
    fn name() -> &'static str {
        "cat"
    }

    fn execute(self, stdin: &mut dyn Read, stdout: &mut dyn Write) -> Result<ExitCode> {
        if self.files.is_empty() {
            io::copy(stdin, stdout)?;
            return Ok(0);
        }
        for fname in self.files {
            let mut f = fs::File::open(&fname).with_context(|| fname.clone())?;
            io::copy(&mut f, stdout)?;
        }
        Ok(0)
    }
}

#[derive(FromArgs)]
/// print the lines that match a regular expression
pub struct Grep {
    #[argh(positional)]
    /// regular expression
    pub pattern: String,

    #[argh(positional, greedy)]
    /// files to search; standard input when omitted
    pub files: Vec<String>,

    #[argh(switch, short = 'w')]
    /// require the match to be a whole word
    pub word_regexp: bool,

    #[argh(switch, short = 'i')]
    /// case-insensitive matching
    pub ignore_case: bool,

    #[argh(option, short = 'A', default = "0")]
    /// lines to print after each match
    pub after_context: usize,
}

impl Grep {
    /// Print matching lines (plus trailing context) and report whether any matched.
    fn process_source(
        &self,
        reader: &mut dyn Read,
        stdout: &mut dyn Write,
        file_name: Option<&str>,
        re: &regex::Regex,
    ) -> Result<bool> {
        let reader = BufReader::new(reader);
        let prefix = file_name
            .map(|name| format!("{}:", name))
            .unwrap_or_default();

        let mut matched = false;
        // Lines still to print after the last match.
        let mut context_left = 0;
        let mut last_printed: Option<usize> = None;

        for (i, line) in reader.lines().enumerate() {
            let line = line.context("read error")?;
            let print = if re.is_match(&line) {
                matched = true;
                context_left = self.after_context;
                true
            } else if context_left > 0 {
                context_left -= 1;
                true
            } else {
                false
            };
            if !print {
                continue;
            }
            if self.after_context > 0 && last_printed.is_some_and(|last| i > last + 1) {
                stdout.write_all(b"--\n")?;
            }
            writeln!(stdout, "{}{}", prefix, line)?;
            last_printed = Some(i);
        }

        Ok(matched)
    }
}

impl BuiltinCommand for Grep {
    fn name() -> &'static str {
        "grep"
    }

    fn execute(self, stdin: &mut dyn Read, stdout: &mut dyn Write) -> Result<ExitCode> {
        let pattern = if self.word_regexp {
            format!(r"\b({})\b", self.pattern)
        } else {
            self.pattern.clone()
        };

        let re = RegexBuilder::new(&pattern)
            .case_insensitive(self.ignore_case)
            .build()
            .with_context(|| format!("invalid regex pattern: {}", pattern))?;

        let matched = if self.files.is_empty() {
            self.process_source(stdin, stdout, None, &re)?
        } else {
            let mut any = false;
            for file_name in &self.files {
                let mut f = fs::File::open(file_name).with_context(|| file_name.clone())?;
                any |= self.process_source(&mut f, stdout, Some(file_name), &re)?;
            }
            any
        };
        Ok(if matched { 0 } else { 1 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::TempDir;

    fn run<T: BuiltinCommand>(cmd: T, input: &[u8]) -> (ExitCode, String) {
        let mut out = Vec::new();
        let code = cmd
            .execute(&mut Cursor::new(input.to_vec()), &mut out)
            .unwrap();
        (code, String::from_utf8(out).unwrap())
    }

    fn write_file(dir: &TempDir, name: &str, content: &str) -> String {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path.to_string_lossy().to_string()
    }

    #[test]
    fn test_pwd() {
        let cur = std::env::current_dir().unwrap();
        let (code, s) = run(Pwd {}, b"");
        assert_eq!(code, 0);
        assert_eq!(s, format!("{}\n", cur.to_string_lossy()));
    }

    #[test]
    fn test_echo_newline_switch() {
        let plain = Echo {
            no_newline: false,
            args: vec!["hello".to_string(), "world".to_string()],
        };
        assert_eq!(run(plain, b""), (0, "hello world\n".to_string()));

        let bare = Echo {
            no_newline: true,
            args: vec!["foo".to_string(), "bar".to_string()],
        };
        assert_eq!(run(bare, b""), (0, "foo bar".to_string()));
    }

    #[test]
    fn test_echo_parses_its_own_flags() {
        let echo = Echo::from_args(&["echo"], &["-n", "a", "b"]).unwrap();
        assert!(echo.no_newline);
        assert_eq!(echo.args, ["a", "b"]);
    }

    #[test]
    fn test_cat_file() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "cat.txt", "first\nsecond\n");
        let (code, s) = run(Cat { files: vec![path] }, b"");
        assert_eq!(code, 0);
        assert_eq!(s, "first\nsecond\n");
    }

    #[test]
    fn test_cat_passes_input_through() {
        let (code, s) = run(Cat { files: Vec::new() }, b"piped\ninput\n");
        assert_eq!(code, 0);
        assert_eq!(s, "piped\ninput\n");
    }

    #[test]
    fn test_cat_missing_file_errors() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope").to_string_lossy().to_string();
        let cat = Cat { files: vec![missing.clone()] };
        let err = cat
            .execute(&mut Cursor::new(Vec::new()), &mut Vec::new())
            .unwrap_err();
        assert!(format!("{:#}", err).starts_with(&missing));
    }

    #[test]
    fn test_wc_file_reports_name() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "wc.txt", "one two\nthree\n");
        let wc = Wc::from_args(&["wc"], &[path.as_str()]).unwrap();
        let (code, s) = run(wc, b"");
        assert_eq!(code, 0);
        assert_eq!(s, format!("2 3 14 {}\n", path));
    }

    #[test]
    fn test_wc_input() {
        let wc = Wc::from_args(&["wc"], &[]).unwrap();
        assert_eq!(run(wc, b"a b c\n"), (0, "1 3 6\n".to_string()));
    }

    #[test]
    fn test_wc_selected_counts() {
        let wc = Wc::from_args(&["wc"], &["-l"]).unwrap();
        assert_eq!(run(wc, b"a\nb\nc"), (0, "2\n".to_string()));

        let wc = Wc::from_args(&["wc"], &["-w", "-c"]).unwrap();
        assert_eq!(run(wc, b"x y\n"), (0, "2 4\n".to_string()));
    }

    #[test]
    fn test_wc_one_row_per_file() {
        let dir = TempDir::new().unwrap();
        let first = write_file(&dir, "a.txt", "a b\n");
        let second = write_file(&dir, "b.txt", "c\n");
        let wc = Wc::from_args(&["wc"], &[first.as_str(), second.as_str()]).unwrap();
        let (code, s) = run(wc, b"");
        assert_eq!(code, 0);
        assert_eq!(s, format!("1 2 4 {}\n1 1 2 {}\n", first, second));
    }

    fn grep(pattern: &str, files: Vec<String>, ignore_case: bool, after_context: usize) -> Grep {
        Grep {
            pattern: pattern.to_string(),
            files,
            word_regexp: false,
            ignore_case,
            after_context,
        }
    }

    #[test]
    fn test_grep_ignore_case() {
        let dir = TempDir::new().unwrap();
        let filename = write_file(&dir, "data.txt", "Target 1\nTaRgEt 2\nNo match\n");
        let (code, s) = run(grep("target", vec![filename.clone()], true, 0), b"");
        assert_eq!(code, 0);
        assert_eq!(s, format!("{0}:Target 1\n{0}:TaRgEt 2\n", filename));
    }

    #[test]
    fn test_grep_trailing_context() {
        let dir = TempDir::new().unwrap();
        let content = "a\nMATCH 1\nb\nc\nMATCH 2\nd\ne\nf\n";
        let filename = write_file(&dir, "data.txt", content);
        let (code, s) = run(grep("MATCH", vec![filename.clone()], false, 1), b"");
        assert_eq!(code, 0);
        assert_eq!(
            s,
            format!("{0}:MATCH 1\n{0}:b\n--\n{0}:MATCH 2\n{0}:d\n", filename)
        );
    }

    #[test]
    fn test_grep_context_overlap() {
        let input = b"MATCH 1\nLine 2\nMATCH 2\nLine 4\nLine 5\nLine 6\n";
        let (code, s) = run(grep("MATCH", Vec::new(), false, 2), input);
        assert_eq!(code, 0);
        assert_eq!(s, "MATCH 1\nLine 2\nMATCH 2\nLine 4\nLine 5\n");
    }

    #[test]
    fn test_grep_stdin_and_no_match_status() {
        let input = b"one\na pipe target\nthree\n";
        let (code, s) = run(grep("pipe", Vec::new(), false, 0), input);
        assert_eq!(code, 0);
        assert_eq!(s, "a pipe target\n");

        let (code, s) = run(grep("absent", Vec::new(), false, 0), input);
        assert_eq!(code, 1);
        assert!(s.is_empty());
    }

    #[test]
    fn test_grep_whole_words() {
        let mut g = grep("cat", Vec::new(), false, 0);
        g.word_regexp = true;
        let (_, s) = run(g, b"concatenate\na cat here\n");
        assert_eq!(s, "a cat here\n");
    }

    #[test]
    fn test_invalid_regex_is_an_error() {
        let g = grep("(", Vec::new(), false, 0);
        assert!(g.execute(&mut Cursor::new(Vec::new()), &mut Vec::new()).is_err());
    }

    #[test]
    fn test_factory_matches_by_name() {
        let env = Environment::empty();
        let factory = Factory::<Echo>::default();
        assert!(factory.try_create(&env, "echo", &["hi"]).is_some());
        assert!(factory.try_create(&env, "cat", &[]).is_none());
        // usage errors still produce a stage that reports them
        assert!(factory.try_create(&env, "echo", &["--bogus"]).is_some());
    }

    fn spawn_and_capture(cmd: Box<dyn ExecutableCommand>) -> (ExitCode, String) {
        use std::io::{Seek, SeekFrom};
        let (stdin, closed) = os_pipe::pipe().unwrap();
        drop(closed);
        let mut out = tempfile::tempfile().unwrap();
        let running = cmd
            .spawn(Box::new(stdin), Box::new(out.try_clone().unwrap()))
            .unwrap();
        let code = running.wait().unwrap();
        let mut captured = String::new();
        out.seek(SeekFrom::Start(0)).unwrap();
        out.read_to_string(&mut captured).unwrap();
        (code, captured)
    }

    #[test]
    fn test_help_goes_to_output() {
        let env = Environment::empty();
        let help = Factory::<Wc>::default()
            .try_create(&env, "wc", &["--help"])
            .unwrap();
        let (code, out) = spawn_and_capture(help);
        assert_eq!(code, 0);
        assert!(out.starts_with("Usage: wc"), "{out}");
        assert!(out.ends_with('\n'));
    }

    #[test]
    fn test_usage_error_status() {
        let env = Environment::empty();
        let bad = Factory::<Wc>::default()
            .try_create(&env, "wc", &["--bogus"])
            .unwrap();
        assert_eq!(spawn_and_capture(bad), (1, String::new()));
    }

    #[test]
    fn test_builtin_runs_on_its_own_thread() {
        let echo = Echo::from_args(&["echo"], &["threaded"]).unwrap();
        assert_eq!(spawn_and_capture(Box::new(echo)), (0, "threaded\n".to_string()));
    }

    #[test]
    fn test_broken_pipe_detection() {
        let err = anyhow::Error::from(io::Error::from(io::ErrorKind::BrokenPipe)).context("write");
        assert!(is_broken_pipe(&err));
        assert!(!is_broken_pipe(&anyhow::anyhow!("other")));
    }
}
