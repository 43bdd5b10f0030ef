//! `shi` — the command-line front end (§6): runs a source file, pipes a
//! program in over stdin, or starts a line-at-a-time REPL, depending on
//! how it was invoked.
//!
//! Grounded on `faxt`'s `clap` + `tracing_subscriber` bootstrap shape, cut
//! down to this interpreter's single-purpose surface (no subcommands: the
//! entire CLI is "run this program somehow").

use std::io::{IsTerminal, Read, Write};
use std::path::PathBuf;

use clap::Parser;
use shi_eval::{Interpreter, InterpreterConfig};
use tracing_subscriber::EnvFilter;

/// A small Lisp-family interpreter.
#[derive(Parser, Debug)]
#[command(name = "shi")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "A small Lisp-family interpreter", long_about = None)]
struct Cli {
    /// Source file to evaluate. If omitted, reads a piped stdin in full, or
    /// starts a REPL if stdin is a terminal.
    file: Option<PathBuf>,
}

fn main() -> std::process::ExitCode {
    // `ExitCode` (rather than `process::exit`) lets normal unwinding run, so
    // stdout's internal buffer is flushed before the process terminates —
    // matters here since `write` may leave unterminated bytes buffered.
    std::process::ExitCode::from(run() as u8)
}

fn run() -> i32 {
    init_logging();
    let cli = Cli::parse();

    let config = InterpreterConfig::from_env();
    let mut interp = match Interpreter::new(config) {
        Ok(i) => i,
        Err(e) => {
            eprintln!("unhandled error: {e}");
            return 1;
        }
    };

    let argv: Vec<String> = std::env::args().collect();
    if let Err(e) = interp.bind_args(&argv) {
        eprintln!("unhandled error: {e}");
        return 1;
    }

    match &cli.file {
        Some(path) => run_file(&mut interp, path),
        None if !std::io::stdin().is_terminal() => run_stdin(&mut interp),
        None => run_repl(&mut interp),
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

fn run_file(interp: &mut Interpreter, path: &PathBuf) -> i32 {
    let source = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("unhandled error: {e}");
            return 1;
        }
    };
    eval_and_report(interp, &source)
}

fn run_stdin(interp: &mut Interpreter) -> i32 {
    let mut source = String::new();
    if let Err(e) = std::io::stdin().read_to_string(&mut source) {
        eprintln!("unhandled error: {e}");
        return 1;
    }
    eval_and_report(interp, &source)
}

fn eval_and_report(interp: &mut Interpreter, source: &str) -> i32 {
    match interp.eval_source(source) {
        Ok(_) => 0,
        Err(e) => {
            restore_terminal();
            eprintln!("unhandled error: {e}");
            1
        }
    }
}

/// The REPL's history file: `$HOME/.shi-history` (§6). Every accepted
/// top-level form is appended verbatim; there is no line-editing or
/// arrow-key recall since the dependency stack carries no readline-style
/// crate — the contract this satisfies is the history *file*, not
/// interactive history navigation.
fn history_path() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".shi-history"))
}

fn run_repl(interp: &mut Interpreter) -> i32 {
    let history = history_path();
    let mut stdout = std::io::stdout();
    let stdin = std::io::stdin();

    loop {
        print!("shi> ");
        if stdout.flush().is_err() {
            return 0;
        }

        let mut line = String::new();
        let read = match stdin.read_line(&mut line) {
            Ok(0) => return 0,
            Ok(n) => n,
            Err(e) => {
                eprintln!("unhandled error: {e}");
                return 1;
            }
        };
        let _ = read;

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if let Some(path) = &history {
            append_history(path, trimmed);
        }

        match interp.eval_source(&line) {
            Ok(v) => println!("{}", interp.heap.print_value(v)),
            Err(e) => eprintln!("unhandled error: {e}"),
        }
    }
}

fn append_history(path: &PathBuf, line: &str) {
    use std::fs::OpenOptions;
    if let Ok(mut f) = OpenOptions::new().create(true).append(true).open(path) {
        let _ = writeln!(f, "{line}");
    }
}

/// Restores canonical terminal mode on stdin before exiting on an unhandled
/// error (§7: "restores terminal state"), undoing any `term-raw` toggle the
/// failed program left in place.
#[cfg(unix)]
fn restore_terminal() {
    unsafe {
        let mut termios: libc::termios = std::mem::zeroed();
        if libc::tcgetattr(0, &mut termios) == 0 {
            termios.c_lflag |= libc::ICANON | libc::ECHO;
            let _ = libc::tcsetattr(0, libc::TCSANOW, &termios);
        }
    }
}

#[cfg(not(unix))]
fn restore_terminal() {}
