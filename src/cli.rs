//! Thin CLI driver (SPEC_FULL.md §A.3). One subcommand's worth of work:
//! preprocess a file to stdout, with `-I` include dirs and `-D` command-line
//! defines. Does not attempt mainstream-compiler search-path conventions,
//! dependency-file generation, or any other driver responsibility spec.md
//! scopes out as an external collaborator.

use std::io::Write;
use std::path::PathBuf;

use clap::Parser;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::engine::Preprocessor;
use crate::errors::PpError;

#[derive(Parser, Debug)]
#[command(name = "cpp99", about = "A C99-conforming preprocessor")]
pub struct Args {
    /// C source file to preprocess.
    pub input: PathBuf,

    /// Additional directory to search for `<...>` includes. Repeatable.
    #[arg(short = 'I', value_name = "DIR")]
    pub include_dirs: Vec<PathBuf>,

    /// Define a macro as `NAME` or `NAME=VALUE`. Repeatable.
    #[arg(short = 'D', value_name = "NAME[=VALUE]")]
    pub defines: Vec<String>,

    /// Write output to this file instead of stdout.
    #[arg(short = 'o', value_name = "FILE")]
    pub output: Option<PathBuf>,
}

pub fn run(args: Args) -> i32 {
    let mut pp = Preprocessor::new();
    for dir in &args.include_dirs {
        pp.add_path(dir.clone());
    }
    for def in &args.defines {
        pp.define(&cli_define_to_directive(def));
    }

    let source_name = args.input.to_string_lossy().to_string();
    let text = match std::fs::read_to_string(&args.input) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("cpp99: cannot read '{source_name}': {e}");
            return 1;
        }
    };

    pp.parse(&text, Some(&source_name));

    let exit_code = pp.return_code();
    print_diagnostics(&pp.diagnostics);

    let write_result = match &args.output {
        Some(path) => {
            let mut f = match std::fs::File::create(path) {
                Ok(f) => f,
                Err(e) => {
                    eprintln!("cpp99: cannot write '{}': {e}", path.display());
                    return 1;
                }
            };
            pp.write(&mut f)
        }
        None => {
            let stdout = std::io::stdout();
            let mut lock = stdout.lock();
            pp.write(&mut lock)
        }
    };
    if let Err(e) = write_result {
        eprintln!("cpp99: write error: {e}");
        return 1;
    }

    if exit_code > 0 { 1 } else { 0 }
}

/// Turns `-D NAME=VALUE` / `-D NAME` into the text `Preprocessor::define`
/// expects (spec §6 `define(text_or_tokens)` accepts a raw `"NAME value"` string).
fn cli_define_to_directive(def: &str) -> String {
    match def.split_once('=') {
        Some((name, value)) => format!("{name} {value}"),
        None => format!("{def} 1"),
    }
}

fn print_diagnostics(diagnostics: &[PpError]) {
    let stderr_choice = if atty::is(atty::Stream::Stderr) { ColorChoice::Auto } else { ColorChoice::Never };
    let mut stderr = StandardStream::stderr(stderr_choice);
    for d in diagnostics {
        let color = if d.is_warning() { Color::Yellow } else { Color::Red };
        let _ = stderr.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(true));
        let _ = write!(&mut stderr, "{}", if d.is_warning() { "warning: " } else { "error: " });
        let _ = stderr.reset();
        let _ = writeln!(&mut stderr, "{d}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translates_name_equals_value() {
        assert_eq!(cli_define_to_directive("FOO=42"), "FOO 42");
    }

    #[test]
    fn translates_bare_name_to_value_one() {
        assert_eq!(cli_define_to_directive("FOO"), "FOO 1");
    }
}
