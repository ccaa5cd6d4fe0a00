//! CLI entry point for the zdis disassembler binary.

use std::env;
use std::ffi::OsString;
use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;

use zdis_core::{Disassembler, OpcodeTables, Options};

#[cfg(test)]
use tempfile as _;

const HELP_TEXT: &str =
    "Usage: zdis [<input>] [-o <output>] [--stat] [--start <hex>] [--csect <name>] [--help]";

#[derive(Debug, PartialEq, Eq)]
struct CliArgs {
    input: Option<PathBuf>,
    output: Option<PathBuf>,
    stats: bool,
    start: u32,
    section: Option<String>,
}

#[derive(Debug)]
enum ParseResult {
    Args(CliArgs),
    Help,
}

fn parse_args(mut args: impl Iterator<Item = OsString>) -> Result<ParseResult, String> {
    let mut input: Option<PathBuf> = None;
    let mut output: Option<PathBuf> = None;
    let mut stats = false;
    let mut start = 0u32;
    let mut section: Option<String> = None;

    while let Some(arg) = args.next() {
        if arg == "--help" {
            return Ok(ParseResult::Help);
        }

        if arg == "--stat" {
            stats = true;
            continue;
        }

        if arg == "--start" {
            let value = args
                .next()
                .ok_or_else(|| String::from("missing value for --start"))?;
            let text = value.to_string_lossy();
            start = u32::from_str_radix(text.trim_start_matches("0x"), 16)
                .map_err(|_| format!("bad --start value: {text}"))?;
            continue;
        }

        if arg == "--csect" {
            let value = args
                .next()
                .ok_or_else(|| String::from("missing value for --csect"))?;
            section = Some(value.to_string_lossy().into_owned());
            continue;
        }

        if arg == "-o" {
            let value = args
                .next()
                .ok_or_else(|| String::from("missing value for -o"))?;
            output = Some(PathBuf::from(value));
            continue;
        }

        if arg != "-" && arg.to_string_lossy().starts_with('-') {
            return Err(format!("unknown option: {}", arg.to_string_lossy()));
        }

        if input.is_some() {
            return Err(String::from("multiple input paths provided"));
        }
        if arg != "-" {
            input = Some(PathBuf::from(arg));
        }
    }

    Ok(ParseResult::Args(CliArgs {
        input,
        output,
        stats,
        start,
        section,
    }))
}

fn read_input(path: Option<&PathBuf>) -> io::Result<String> {
    match path {
        Some(path) => fs::read_to_string(path),
        None => {
            let mut text = String::new();
            io::stdin().read_to_string(&mut text)?;
            Ok(text)
        }
    }
}

fn run(args: &CliArgs) -> Result<(), String> {
    let tables = OpcodeTables::load().map_err(|e| e.to_string())?;
    let input = read_input(args.input.as_ref())
        .map_err(|e| format!("cannot read input: {e}"))?;

    let options = Options {
        start: args.start,
        stats: args.stats,
        section: args.section.clone(),
    };
    let listing = Disassembler::new(&tables, options).disassemble(&input);

    match &args.output {
        Some(path) => {
            let mut file =
                fs::File::create(path).map_err(|e| format!("cannot create output: {e}"))?;
            listing
                .write_to(&mut file)
                .map_err(|e| format!("cannot write output: {e}"))?;
        }
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            listing
                .write_to(&mut handle)
                .map_err(|e| format!("cannot write output: {e}"))?;
        }
    }

    if listing.summary.todo_count > 0 || listing.summary.undefined_count > 0 {
        eprintln!(
            "zdis: {} TODO position(s), {} undefined label(s)",
            listing.summary.todo_count, listing.summary.undefined_count
        );
    }
    Ok(())
}

fn main() {
    match parse_args(env::args_os().skip(1)) {
        Ok(ParseResult::Help) => {
            println!("{HELP_TEXT}");
        }
        Ok(ParseResult::Args(args)) => {
            if let Err(error) = run(&args) {
                eprintln!("error: {error}");
                let code = if error.starts_with("DIS000") { 2 } else { 1 };
                std::process::exit(code);
            }
            io::stdout().flush().ok();
        }
        Err(error) => {
            eprintln!("error: {error}");
            eprintln!("{HELP_TEXT}");
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_args, run, CliArgs, ParseResult};
    use std::ffi::OsString;
    use std::io::Write;
    use std::path::PathBuf;

    fn os(args: &[&str]) -> impl Iterator<Item = OsString> {
        args.iter().map(OsString::from).collect::<Vec<_>>().into_iter()
    }

    #[test]
    fn parses_input_only() {
        let result = parse_args(os(&["dump.txt"])).expect("input-only args should parse");
        let ParseResult::Args(args) = result else {
            panic!("expected parsed args");
        };
        assert_eq!(
            args,
            CliArgs {
                input: Some(PathBuf::from("dump.txt")),
                output: None,
                stats: false,
                start: 0,
                section: None,
            }
        );
    }

    #[test]
    fn parses_all_options() {
        let result = parse_args(os(&[
            "dump.txt", "-o", "out.asm", "--stat", "--start", "1F0", "--csect", "MYPROG",
        ]))
        .expect("valid args should parse");
        let ParseResult::Args(args) = result else {
            panic!("expected parsed args");
        };
        assert_eq!(
            args,
            CliArgs {
                input: Some(PathBuf::from("dump.txt")),
                output: Some(PathBuf::from("out.asm")),
                stats: true,
                start: 0x1F0,
                section: Some("MYPROG".into()),
            }
        );
    }

    #[test]
    fn dash_means_stdin() {
        let result = parse_args(os(&["-"])).expect("dash should parse");
        let ParseResult::Args(args) = result else {
            panic!("expected parsed args");
        };
        assert_eq!(args.input, None);
    }

    #[test]
    fn parses_help_flag() {
        let result = parse_args(os(&["--help"])).expect("help should parse");
        assert!(matches!(result, ParseResult::Help));
    }

    #[test]
    fn rejects_unknown_flags() {
        let error = parse_args(os(&["--unknown"])).expect_err("unknown flag should fail");
        assert!(error.contains("unknown option"));
    }

    #[test]
    fn rejects_bad_start_values() {
        let error = parse_args(os(&["--start", "xyz"])).expect_err("bad hex should fail");
        assert!(error.contains("bad --start value"));
    }

    #[test]
    fn rejects_multiple_inputs() {
        let error = parse_args(os(&["a.txt", "b.txt"])).expect_err("two inputs should fail");
        assert!(error.contains("multiple input paths"));
    }

    #[test]
    fn file_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input_path = dir.path().join("dump.txt");
        let output_path = dir.path().join("out.asm");
        let mut input = std::fs::File::create(&input_path).expect("create input");
        writeln!(input, "18CF").expect("write input");

        let args = CliArgs {
            input: Some(input_path),
            output: Some(output_path.clone()),
            stats: false,
            start: 0,
            section: None,
        };
        run(&args).expect("run should succeed");

        let listing = std::fs::read_to_string(&output_path).expect("read output");
        assert!(listing.contains("LR    R12,R15"));
        assert!(listing.trim_end().ends_with("END"));
    }
}
