use clap::{Parser as ClapParser, Subcommand};
use quill_lang::cli::{self, CliError, RunOptions, ScriptOptions, ScriptOutcome};
use quill_lang::{Compiler, Value, to_json, to_json_pretty};
use std::io::{self, Read};
use tracing_subscriber::EnvFilter;

#[derive(ClapParser)]
#[command(name = "quill")]
#[command(about = "Quill - An expression language for querying and reshaping JSON records")]
#[command(version)]
struct Cli {
    /// Log compiler steps to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile and execute an expression against a JSON document
    Run {
        /// The expression to execute
        expression: String,

        /// JSON input (reads from stdin if not provided)
        #[arg(short, long)]
        input: Option<String>,

        /// JSON object with parameter values
        #[arg(short, long)]
        params: Option<String>,

        /// Pretty-print the output
        #[arg(long)]
        pretty: bool,

        /// Rewrite $now/$today into constant dates first
        #[arg(long)]
        precompile: bool,
    },

    /// Run a script of `;` separated statements
    Script {
        /// The script source
        source: String,

        /// JSON object with parameter values
        #[arg(short, long)]
        params: Option<String>,

        /// Pretty-print the output
        #[arg(long)]
        pretty: bool,

        /// Print every statement with its result
        #[arg(long)]
        debug: bool,
    },

    /// Parse only and print the syntax tree as source
    Check {
        /// The expression to check
        expression: String,
    },

    /// Print an expression with $now/$today rewritten
    Precompile {
        /// The expression to rewrite
        expression: String,
    },

    /// List the available functions
    Functions,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Run {
            expression,
            input,
            params,
            pretty,
            precompile,
        } => run(expression, input, params, pretty, precompile),
        Commands::Script {
            source,
            params,
            pretty,
            debug,
        } => run_script(source, params, pretty, debug),
        Commands::Check { expression } => cli::execute_check(&expression).map(|rendered| {
            for statement in rendered {
                println!("{}", statement);
            }
        }),
        Commands::Precompile { expression } => Compiler::new()
            .precompile(&expression)
            .map(|rewritten| println!("{}", rewritten))
            .map_err(CliError::from),
        Commands::Functions => {
            for signature in cli::list_functions() {
                println!("{}", signature);
            }
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn print(value: &Value, pretty: bool) {
    let json = if pretty {
        to_json_pretty(value)
    } else {
        to_json(value)
    };
    println!("{}", json);
}

fn run(
    expression: String,
    input: Option<String>,
    params: Option<String>,
    pretty: bool,
    precompile: bool,
) -> Result<(), CliError> {
    let input = match input {
        Some(s) => Some(s),
        None if !atty::is(atty::Stream::Stdin) => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer).map_err(CliError::Io)?;
            Some(buffer)
        }
        None => None,
    };

    let options = RunOptions {
        expression,
        input,
        parameters: params,
        precompile,
    };
    let result = cli::execute_run(&options)?;
    print(&result, pretty);
    Ok(())
}

fn run_script(
    source: String,
    params: Option<String>,
    pretty: bool,
    debug: bool,
) -> Result<(), CliError> {
    let options = ScriptOptions {
        source,
        parameters: params,
        debug,
    };
    match cli::execute_script(&options)? {
        ScriptOutcome::Result(value) => print(&value, pretty),
        ScriptOutcome::Steps(steps) => {
            for (i, step) in steps.iter().enumerate() {
                match (&step.result, &step.error) {
                    (_, Some(error)) => println!("{:>3} {}  !! {}", i + 1, step.statement, error),
                    (Some(value), None) => {
                        println!("{:>3} {}  => {}", i + 1, step.statement, to_json(value))
                    }
                    (None, None) => println!("{:>3} {}", i + 1, step.statement),
                }
            }
        }
    }
    Ok(())
}
