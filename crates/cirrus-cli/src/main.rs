use anyhow::Result;
use cirrus_cli::report::{self, Output};
use cirrus_cli::{load_source, Settings};
use cirrus_solver::{DirectiveCache, MAX_CALL_DEPTH};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "cirrus")]
#[command(about = "Cirrus: symbolic evaluation of infrastructure programs")]
struct Cli {
    /// Raise log verbosity (-v info, -vv debug, -vvv trace); RUST_LOG wins
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Parse a source file and dump the AST
    Parse {
        /// Path to the source file
        file: String,

        /// Output format
        #[arg(long, value_enum, default_value_t = Format::Pretty)]
        format: Format,
    },

    /// Solve a module and print its exports
    Solve {
        /// Path to the source file
        file: String,

        #[command(flatten)]
        solver: SolverArgs,

        #[arg(long, value_enum, default_value_t = Output::Text)]
        format: Output,
    },

    /// Call a top-level function
    Invoke {
        /// Path to the source file
        file: String,

        /// Name of the function
        function: String,

        /// Arguments, each a JSON value
        args: Vec<String>,

        #[command(flatten)]
        solver: SolverArgs,

        #[arg(long, value_enum, default_value_t = Output::Text)]
        format: Output,
    },

    /// Construct an instance of a top-level class
    Instance {
        /// Path to the source file
        file: String,

        /// Name of the class
        class: String,

        /// Constructor arguments, each a JSON value
        args: Vec<String>,

        #[command(flatten)]
        solver: SolverArgs,

        #[arg(long, value_enum, default_value_t = Output::Text)]
        format: Output,
    },

    /// List compiler directives of the file and its statements
    Directives {
        /// Path to the source file
        file: String,

        #[arg(long, value_enum, default_value_t = Output::Text)]
        format: Output,
    },
}

#[derive(Args, Debug)]
struct SolverArgs {
    /// Treat imported names as undeclared instead of unknown
    #[arg(long)]
    strict_imports: bool,

    /// Active calls beyond which a call evaluates to unknown
    #[arg(long, default_value_t = MAX_CALL_DEPTH)]
    max_call_depth: usize,
}

impl SolverArgs {
    fn settings(&self) -> Settings {
        Settings {
            strict_imports: self.strict_imports,
            max_call_depth: self.max_call_depth,
        }
    }
}

#[derive(ValueEnum, Clone, Debug)]
enum Format {
    Pretty,
    Json,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(err) = run(cli.command) {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(command: Commands) -> Result<()> {
    let out = match command {
        Commands::Parse { file, format } => cmd_parse(&file, format)?,
        Commands::Solve {
            file,
            solver,
            format,
        } => report::solve(&load_source(&file)?, &solver.settings(), format)?,
        Commands::Invoke {
            file,
            function,
            args,
            solver,
            format,
        } => report::invoke(&load_source(&file)?, &solver.settings(), &function, &args, format)?,
        Commands::Instance {
            file,
            class,
            args,
            solver,
            format,
        } => report::instance(&load_source(&file)?, &solver.settings(), &class, &args, format)?,
        Commands::Directives { file, format } => {
            report::directives(&load_source(&file)?, &DirectiveCache::new(), format)?
        }
    };
    print!("{out}");
    Ok(())
}

fn cmd_parse(file: &str, format: Format) -> Result<String> {
    let source = load_source(file)?;
    Ok(match format {
        Format::Pretty => format!("{source:#?}\n"),
        Format::Json => serde_json::to_string_pretty(&source)? + "\n",
    })
}
