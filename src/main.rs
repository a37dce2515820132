use argh::FromArgs;
use pipeshell::{DEFAULT_PROMPT, Interpreter};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(FromArgs)]
/// A minimal interactive command interpreter with pipelines.
struct Args {
    #[argh(option, short = 'c')]
    /// evaluate one command line and exit with its status
    command: Option<String>,

    #[argh(option, default = "DEFAULT_PROMPT.to_string()")]
    /// prompt shown before each line
    prompt: String,
}

fn main() {
    // Logs go to stderr so they never mix with pipeline output (RUST_LOG).
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    let args: Args = argh::from_env();
    let mut sh = Interpreter::default().with_prompt(args.prompt);

    if let Some(line) = args.command {
        let code = sh.eval(&line);
        std::process::exit(if sh.should_exit() { 0 } else { code });
    }

    if let Err(e) = sh.repl() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
    std::process::exit(0);
}
