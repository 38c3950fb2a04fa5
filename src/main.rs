// krun: run a C program against a checked memory model

use std::io::Write;
use std::path::PathBuf;
use std::process::exit;

use anyhow::{Context, Result};
use clap::Parser as CliParser;

use krun::{execute, FileSystem, HostFs, MemoryFs, OverflowPolicy, Phase, RunConfig};

/// Exit status for programs that fail to lex, parse or resolve
const EXIT_COMPILE_ERROR: i32 = 1;
/// Exit status for programs stopped by a runtime error (`EX_SOFTWARE`)
const EXIT_RUNTIME_ERROR: i32 = 70;

#[derive(CliParser, Debug)]
#[clap(name = "krun", version, about = "Run a K&R-style C program with checked memory")]
struct Cli {
    /// C source file
    #[clap(value_name = "FILE")]
    source: PathBuf,

    /// Arguments passed to the program as argv[1..]
    #[clap(value_name = "ARGS", trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,

    /// Feed this file to the program's stdin
    #[clap(long, value_name = "FILE")]
    stdin: Option<PathBuf>,

    /// Directory the program's file calls are confined to
    #[clap(long, value_name = "DIR", default_value = ".")]
    root: PathBuf,

    /// Give the program an empty in-memory filesystem instead
    #[clap(long, conflicts_with = "root")]
    memfs: bool,

    /// Heap budget for malloc and friends
    #[clap(long, value_name = "BYTES")]
    heap_limit: Option<usize>,

    /// Budget for local variables across all live frames
    #[clap(long, value_name = "BYTES")]
    stack_limit: Option<usize>,

    /// Budget for globals and static locals
    #[clap(long, value_name = "BYTES")]
    static_limit: Option<usize>,

    /// Maximum depth of nested calls
    #[clap(long, value_name = "N")]
    max_depth: Option<usize>,

    /// Treat signed integer overflow as a runtime error
    #[clap(long)]
    trap_overflow: bool,

    /// Allow reads of uninitialized memory
    #[clap(long)]
    no_uninit_check: bool,

    /// More log output (-v debug, -vv trace)
    #[clap(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn config_from(cli: &Cli) -> Result<RunConfig> {
    let mut config = RunConfig::default()
        .with_program_name(cli.source.display().to_string())
        .with_args(cli.args.iter().cloned())
        .with_uninitialized_check(!cli.no_uninit_check);
    if let Some(path) = &cli.stdin {
        let input = std::fs::read(path).with_context(|| format!("cannot read stdin file {}", path.display()))?;
        config = config.with_stdin(input);
    }
    if let Some(limit) = cli.heap_limit {
        config = config.with_heap_limit(limit);
    }
    if let Some(limit) = cli.stack_limit {
        config = config.with_stack_limit(limit);
    }
    if let Some(limit) = cli.static_limit {
        config = config.with_static_limit(limit);
    }
    if let Some(depth) = cli.max_depth {
        config = config.with_max_call_depth(depth);
    }
    if cli.trap_overflow {
        config = config.with_overflow(OverflowPolicy::Trap);
    }
    Ok(config)
}

fn run(cli: Cli) -> Result<i32> {
    let source = std::fs::read_to_string(&cli.source)
        .with_context(|| format!("cannot read {}", cli.source.display()))?;
    let config = config_from(&cli)?;
    let fs: Box<dyn FileSystem> = if cli.memfs {
        Box::new(MemoryFs::new())
    } else {
        Box::new(HostFs::new(&cli.root))
    };

    let outcome = execute(&source, config, fs);

    let mut stdout = std::io::stdout().lock();
    let mut stderr = std::io::stderr().lock();
    let (out, err) = match &outcome {
        Ok(run) => (&run.stdout, &run.stderr),
        Err(failure) => (&failure.stdout, &failure.stderr),
    };
    stdout.write_all(out).context("cannot write program output")?;
    stdout.flush()?;
    stderr.write_all(err).context("cannot write program output")?;

    match outcome {
        Ok(run) => Ok(run.status),
        Err(failure) => {
            writeln!(stderr, "krun: {}: {}", cli.source.display(), failure.error)?;
            Ok(match failure.error.phase() {
                Phase::Runtime => EXIT_RUNTIME_ERROR,
                Phase::Lex | Phase::Parse | Phase::Resolve => EXIT_COMPILE_ERROR,
            })
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(status) => exit(status),
        Err(err) => {
            eprintln!("krun: {:#}", err);
            exit(EXIT_COMPILE_ERROR);
        }
    }
}
