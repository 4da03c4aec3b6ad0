use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use libloading::{Library, Symbol};
use serde::Serialize;
use tracing_subscriber::EnvFilter;
use wrapio::{
    marshal_entry, Argv, Bridge, CIoEntryPoint, CMainEntryPoint, Channel, ConfigMap, ConfigValue,
    EntryPoint, FileMode, FileSink, IoMainFn, MainFn, Settings, SinkHandle, Stdio, WrapioError,
};
use wrapio_contracts::{WRAPIO_MARSHAL_REPORT_SCHEMA_VERSION, WRAPIO_RUN_REPORT_SCHEMA_VERSION};

#[derive(Parser, Debug)]
#[command(name = "wrapio")]
#[command(about = "Marshal JSON configuration into argv and run CLI-shaped native entry points.", long_about = None)]
#[command(version)]
struct Cli {
    /// Raise log verbosity (RUST_LOG overrides).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Settings JSON (echo_command, initial_buffer_capacity, pair_key).
    #[arg(long, global = true, value_name = "FILE")]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the argument vector a configuration marshals to.
    Marshal(ConfigArgs),
    /// Load a shared library and invoke one of its entry points.
    Run(Box<RunArgs>),
}

#[derive(Args, Debug)]
struct ConfigArgs {
    /// Configuration mapping as a JSON object.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Nested pair mapping as a JSON object (replaces any pair key in --config).
    #[arg(long, value_name = "FILE")]
    pair: Option<PathBuf>,

    /// Legacy option group such as "-b 62" or "-F" (repeatable).
    #[arg(long = "option", value_name = "FRAGMENT", allow_hyphen_values = true)]
    options: Vec<String>,

    /// Program name placed in argv[0].
    #[arg(long)]
    program: Option<String>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Abi {
    /// int f(int argc, char **argv); captured at the descriptor level
    Plain,
    /// int f(int argc, char **argv, wrapio_io *io)
    Io,
}

#[derive(Args, Debug)]
struct RunArgs {
    #[command(flatten)]
    config: ConfigArgs,

    #[arg(long, value_name = "PATH")]
    library: PathBuf,

    /// Exported entry point symbol.
    #[arg(long)]
    symbol: String,

    #[arg(long, value_enum, default_value_t = Abi::Plain)]
    abi: Abi,

    /// Capture the output channel into a file.
    #[arg(long, value_name = "PATH")]
    stdout: Option<PathBuf>,

    /// Capture the error channel into a file.
    #[arg(long, value_name = "PATH")]
    stderr: Option<PathBuf>,

    /// Append to capture files instead of truncating them.
    #[arg(long, default_value_t = false)]
    append: bool,
}

#[derive(Serialize)]
struct MarshalReport<'a> {
    schema_version: &'static str,
    program: &'a str,
    argv: &'a [String],
}

#[derive(Serialize)]
struct RunReport<'a> {
    schema_version: &'static str,
    ok: bool,
    exit_status: Option<i32>,
    argv: &'a [String],
    error: Option<String>,
}

fn main() -> ExitCode {
    match try_main() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err:#}");
            ExitCode::from(2)
        }
    }
}

fn try_main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let settings = match &cli.settings {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    }
    .apply_env();
    tracing::debug!(?settings, "settings loaded");

    match cli.command {
        Command::Marshal(args) => cmd_marshal(&args, &settings),
        Command::Run(args) => cmd_run(&args, &settings),
    }
}

fn init_tracing(verbose: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("wrapio=debug,info"),
        _ => EnvFilter::new("trace"),
    });
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn read_mapping(path: &Path, what: &str) -> Result<ConfigMap> {
    let bytes = std::fs::read(path).with_context(|| format!("read {what}: {}", path.display()))?;
    ConfigMap::from_json_slice(&bytes).with_context(|| format!("parse {what}: {}", path.display()))
}

fn build_argv(args: &ConfigArgs, default_program: &str, settings: &Settings) -> Result<Argv> {
    let mut config = match &args.config {
        Some(path) => read_mapping(path, "config")?,
        None => ConfigMap::new(),
    };
    config.extend_from_fragments(&args.options);
    if let Some(path) = &args.pair {
        let pair = read_mapping(path, "pair config")?;
        config.insert(settings.pair_key.as_str(), ConfigValue::Map(pair));
    }
    let program = args.program.as_deref().unwrap_or(default_program);
    let argv = marshal_entry(&config, program, Some(settings.pair_key.as_str()))
        .context("marshal configuration")?;
    Ok(argv)
}

fn print_json<T: Serialize>(v: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(v).context("serialize report")?;
    println!("{text}");
    Ok(())
}

fn cmd_marshal(args: &ConfigArgs, settings: &Settings) -> Result<ExitCode> {
    let argv = build_argv(args, "run", settings)?;
    print_json(&MarshalReport {
        schema_version: WRAPIO_MARSHAL_REPORT_SCHEMA_VERSION,
        program: argv.program(),
        argv: argv.tokens(),
    })?;
    Ok(ExitCode::SUCCESS)
}

fn capture(io: &mut Stdio, channel: Channel, path: &Path, mode: FileMode) -> Result<()> {
    let sink = FileSink::open(path, mode)
        .with_context(|| format!("open {channel} capture: {}", path.display()))?;
    io.register(channel, SinkHandle::new(sink));
    Ok(())
}

fn cmd_run(args: &RunArgs, settings: &Settings) -> Result<ExitCode> {
    let argv = build_argv(&args.config, &args.symbol, settings)?;

    // SAFETY: loading runs the library's initializers; the caller vouches for it.
    let lib = unsafe { Library::new(&args.library) }
        .with_context(|| format!("load library: {}", args.library.display()))?;
    let symbol = format!("{}\0", args.symbol);

    let entry: Box<dyn EntryPoint> = match args.abi {
        Abi::Plain => {
            // SAFETY: the symbol is declared as `int f(int, char **)` by --abi plain.
            let func: Symbol<MainFn> = unsafe { lib.get(symbol.as_bytes()) }
                .with_context(|| format!("resolve symbol: {}", args.symbol))?;
            Box::new(unsafe { CMainEntryPoint::new(*func) })
        }
        Abi::Io => {
            // SAFETY: the symbol is declared as `int f(int, char **, wrapio_io *)` by --abi io.
            let func: Symbol<IoMainFn> = unsafe { lib.get(symbol.as_bytes()) }
                .with_context(|| format!("resolve symbol: {}", args.symbol))?;
            Box::new(unsafe { CIoEntryPoint::new(*func) })
        }
    };

    let mode = if args.append {
        FileMode::Append
    } else {
        FileMode::Write
    };
    let mut io = Stdio::from_settings(settings);
    if let Some(path) = &args.stdout {
        capture(&mut io, Channel::Output, path, mode)?;
    }
    if let Some(path) = &args.stderr {
        capture(&mut io, Channel::Error, path, mode)?;
    }

    let tokens = argv.tokens().to_vec();
    let res = Bridge::from_settings(settings).invoke(entry.as_ref(), argv, &mut io);
    // Capture files are flushed and closed before the report goes out.
    drop(io);
    drop(entry);
    drop(lib);

    // A non-zero status is 1 only when nothing on the adapter side failed.
    let code = match &res.error {
        None => ExitCode::SUCCESS,
        Some(WrapioError::Invocation { .. }) => ExitCode::from(1),
        Some(_) => ExitCode::from(2),
    };
    print_json(&RunReport {
        schema_version: WRAPIO_RUN_REPORT_SCHEMA_VERSION,
        ok: res.is_success(),
        exit_status: res.status,
        argv: &tokens,
        error: res.error.as_ref().map(|e| e.to_string()),
    })?;
    Ok(code)
}
