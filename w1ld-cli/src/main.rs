//! Entrypoint for CLI
use std::{env, process, time::Instant};

use itertools::Itertools;
use log::{debug, info, LevelFilter};
use w1ld::{
    compiler::{tokenize, TokenKind},
    constants::POOL_SIZE,
    prelude::*,
    IMPL_VERSION,
};

static USAGE: &str = r#"
usage: w1ld [OPTIONS] [CMD] FILE [ARGS...]

commands:
    run     Compile and run the target C file (default)
    lex     Print the tokens of the target C file
    dis     Compile the target C file and print the bytecode

options:
    --pool-size N   Size in bytes of each memory segment
    --strict        Reject functions that can end without return

exit status:
    The program's exit value when it lies in 0..=255. Negative values keep
    their low byte (-1 exits with 255). Values the shell would read as 0,
    and values above 255, exit with 255.

examples:
    w1ld hello.c
    w1ld run wc.c input.txt
    w1ld --strict dis hello.c
"#;

fn run_program(filepath: &str, args: &[String], opts: &Opts) -> W1ldResult<i64> {
    let source_code = load_source(filepath)?;
    let program = compile_with(source_code, opts.compile_conf())?;

    let mut vm = Vm::new(VmConf {
        pool_size: opts.pool_size,
    })?;

    // The program sees its own file name as argv[0].
    let argv: Vec<&str> = std::iter::once(filepath)
        .chain(args.iter().map(String::as_str))
        .collect();
    debug!("argv: {}", argv.iter().join(" "));
    vm.load_program(&program, &argv)?;

    let start = Instant::now();
    let result = vm.execute();
    let end = Instant::now();

    info!(
        "time taken: {}ms",
        end.duration_since(start).as_nanos() as f64 / 1000000.0
    ); // to millis

    result
}

fn run_lexer(filepath: &str) -> W1ldResult<()> {
    use TokenKind as TK;

    let source_code = load_source(filepath)?;
    let (tokens, symbols) = tokenize(&source_code)?;

    println!("line | offset:len | token                | fragment ");
    for token in tokens {
        let kind = match token.kind {
            TK::Id(id) => format!("Id({})", symbols.name(id)),
            other => format!("{other:?}"), // cannot format debug print {:?} into columns
        };
        let line = token.line;
        let offset = token.span.index;
        let len = token.span.size;
        let fragment = token.span.fragment(&source_code);
        println!("{line:4} | {offset:7}:{len: <3} | {kind: <20} | \"{fragment}\"");
    }

    Ok(())
}

fn run_disassembler(filepath: &str, opts: &Opts) -> W1ldResult<()> {
    let source_code = load_source(filepath)?;
    let program = compile_with(source_code, opts.compile_conf())?;
    Disassembler::from_program(&program).print_text();
    Ok(())
}

fn main() {
    if let Err(err) = simple_logger::SimpleLogger::new()
        .with_level(LevelFilter::Warn)
        .env()
        .init()
    {
        eprintln!("failed to initialise logger: {err}");
    }

    let (cmd, opts) = match parse_args(env::args().skip(1)) {
        Some(parsed) => parsed,
        None => {
            print_usage();
            // FreeBSD EX_USAGE (64)
            process::exit(64)
        }
    };

    let result = match cmd {
        Cmd::Run { filepath, args } => run_program(&filepath, &args, &opts),
        Cmd::Lex { filepath } => run_lexer(&filepath).map(|_| 0),
        Cmd::Dis { filepath } => run_disassembler(&filepath, &opts).map(|_| 0),
    };

    match result {
        Ok(code) => process::exit(exit_status(code)),
        Err(err) => {
            eprintln!("{err}");
            process::exit(err.exit_code())
        }
    }
}

/// Map the program's exit value onto a process status the shell can see.
fn exit_status(code: i64) -> i32 {
    match code {
        0..=255 => code as i32,
        i64::MIN..=-1 if code as u8 != 0 => (code as u8) as i32,
        _ => 255,
    }
}

fn parse_args(args: impl Iterator<Item = String>) -> Option<(Cmd, Opts)> {
    let mut args = args.peekable();
    let mut opts = Opts::default();

    while let Some(flag) = args.next_if(|arg| arg.starts_with("--")) {
        match flag.as_str() {
            "--strict" => opts.strict = true,
            "--pool-size" => opts.pool_size = args.next()?.parse::<usize>().ok().filter(|n| *n > 0)?,
            _ => return None,
        }
    }

    let cmd = match args.next()?.as_str() {
        "run" => Cmd::Run {
            filepath: args.next()?,
            args: args.collect(),
        },
        "lex" => Cmd::Lex {
            filepath: args.next()?,
        },
        "dis" => Cmd::Dis {
            filepath: args.next()?,
        },
        "-h" | "help" => return None,
        filepath => Cmd::Run {
            filepath: filepath.to_string(),
            args: args.collect(),
        },
    };

    Some((cmd, opts))
}

fn print_usage() {
    println!("w1ld v{IMPL_VERSION}");
    println!("{USAGE}");
}

#[derive(Debug, PartialEq, Eq)]
enum Cmd {
    /// Compile and run
    Run { filepath: String, args: Vec<String> },
    /// Token dump
    Lex { filepath: String },
    /// Disassemble
    Dis { filepath: String },
}

#[derive(Debug, PartialEq, Eq)]
struct Opts {
    pool_size: usize,
    strict: bool,
}

impl Default for Opts {
    fn default() -> Self {
        Self {
            pool_size: POOL_SIZE,
            strict: false,
        }
    }
}

impl Opts {
    fn compile_conf(&self) -> CompileConf {
        CompileConf {
            pool_size: self.pool_size,
            strict_returns: self.strict,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn parse(args: &[&str]) -> Option<(Cmd, Opts)> {
        parse_args(args.iter().map(|arg| arg.to_string()))
    }

    #[test]
    fn test_parse_run() {
        let (cmd, opts) = parse(&["hello.c", "a", "--b"]).unwrap();
        assert_eq!(
            cmd,
            Cmd::Run {
                filepath: "hello.c".to_string(),
                args: vec!["a".to_string(), "--b".to_string()],
            }
        );
        assert_eq!(opts, Opts::default());

        let (cmd, _) = parse(&["run", "hello.c"]).unwrap();
        assert!(matches!(cmd, Cmd::Run { args, .. } if args.is_empty()));
    }

    #[test]
    fn test_parse_options() {
        let (cmd, opts) = parse(&["--strict", "--pool-size", "4096", "dis", "x.c"]).unwrap();
        assert_eq!(
            cmd,
            Cmd::Dis {
                filepath: "x.c".to_string()
            }
        );
        assert!(opts.strict);
        assert_eq!(opts.pool_size, 4096);
    }

    #[test]
    fn test_parse_usage_errors() {
        assert!(parse(&[]).is_none());
        assert!(parse(&["lex"]).is_none());
        assert!(parse(&["--pool-size", "big", "x.c"]).is_none());
        assert!(parse(&["--pool-size", "0", "x.c"]).is_none());
        assert!(parse(&["--verbose", "x.c"]).is_none());
        assert!(parse(&["-h"]).is_none());
    }

    #[test]
    fn test_exit_status() {
        assert_eq!(exit_status(0), 0);
        assert_eq!(exit_status(42), 42);
        assert_eq!(exit_status(-1), 255);
        assert_eq!(exit_status(-2), 254);
        assert_eq!(exit_status(256), 255);
        assert_eq!(exit_status(-256), 255);
        assert_eq!(exit_status(i64::MAX), 255);
        assert_eq!(exit_status(i64::MIN), 255);
    }
}
