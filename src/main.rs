use std::{
    fs,
    io::{self, Read},
    path::PathBuf,
};

use clap::{Parser as ClapParser, Subcommand};
use vidlang::{
    Config,
    cli::{self, CliError, ParseOptions, RunOptions},
};

#[derive(ClapParser)]
#[command(name = "vidlang")]
#[command(about = "vidlang - a pipeline language for editing video with ffmpeg")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a script
    Run {
        /// Script file (`-` or omitted reads stdin)
        script: Option<PathBuf>,

        /// Trace every command as it is dispatched
        #[arg(short, long)]
        debug: bool,

        /// Do not stream exports to the preview sink
        #[arg(long)]
        no_preview: bool,

        /// Print the ffmpeg command lines instead of running them
        #[arg(long)]
        dry_run: bool,

        /// Media extension picked up when opening a directory (repeatable)
        #[arg(long = "ext", value_name = "EXT")]
        extensions: Vec<String>,

        /// ffmpeg executable
        #[arg(long, value_name = "PATH")]
        ffmpeg: Option<PathBuf>,
    },

    /// Print the statement tree of a script
    Parse {
        /// Script file (`-` or omitted reads stdin)
        script: Option<PathBuf>,

        /// Emit JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let debug = matches!(cli.command, Commands::Run { debug: true, .. });
    init_tracing(debug);

    let result = match cli.command {
        Commands::Run {
            script,
            debug,
            no_preview,
            dry_run,
            extensions,
            ffmpeg,
        } => {
            let mut config = Config::default();
            if !extensions.is_empty() {
                config.media_extensions = extensions;
            }
            if let Some(ffmpeg) = ffmpeg {
                config.ffmpeg = ffmpeg;
            }
            read_script(script).and_then(|script| {
                run(RunOptions {
                    script,
                    config,
                    debug,
                    preview: !no_preview,
                    dry_run,
                })
            })
        }
        Commands::Parse { script, json } => read_script(script).and_then(|script| {
            let output = cli::execute_parse(&ParseOptions { script, json })?;
            println!("{output}");
            Ok(())
        }),
    };

    if let Err(e) = result {
        eprintln!("{e}");
        std::process::exit(1);
    }
}

/// stderr logging; `--debug` lowers the default level, `RUST_LOG` wins.
fn init_tracing(debug: bool) {
    use tracing_subscriber::{EnvFilter, fmt};

    let default = if debug { "vidlang=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn read_script(path: Option<PathBuf>) -> Result<String, CliError> {
    match path {
        Some(path) if path.as_os_str() != "-" => Ok(fs::read_to_string(path)?),
        Some(_) => read_stdin(),
        None if !atty::is(atty::Stream::Stdin) => read_stdin(),
        None => Err(CliError::NoInput),
    }
}

fn read_stdin() -> Result<String, CliError> {
    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer)?;
    Ok(buffer)
}

fn run(options: RunOptions) -> Result<(), CliError> {
    let report = cli::execute_run(&options)?;
    for invocation in &report.invocations {
        println!("{invocation}");
    }
    println!("script evaluated successfully");
    Ok(())
}
