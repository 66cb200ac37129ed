use clap::{Parser, Subcommand};
use kumitate::{Config, Orchestrator, pipeline};

const CMD_NAME: &str = "kumitate";
const DEFAULT_CONFIG: &str = "kumitate.toml";

#[derive(Parser, Debug)]
#[command(name = CMD_NAME, version, about, long_about = None)]
struct Args {
    /// Configuration file
    #[arg(short, long, value_name = "FILE", default_value = DEFAULT_CONFIG)]
    #[arg(env = "KUMITATE_CONFIG")]
    config: String,

    /// Print additional debugging info
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// Clean the output directory and run the full build once
    Build,
    /// Build, then serve the output and rebuild on changes (default)
    Dev,
    /// Run a single registered task
    Task {
        /// Task name, see `kumitate tasks`
        name: String,
    },
    /// List registered tasks
    Tasks,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    kumitate::init_logging(args.verbose)?;

    let config = Config::load(&args.config)?;

    let mut orchestrator = Orchestrator::new(config.source, config.output);
    pipeline::register(&mut orchestrator)?;

    match args.command.unwrap_or(Command::Dev) {
        Command::Build => {
            orchestrator.execute(&pipeline::build())?;
        }
        Command::Dev => {
            orchestrator.dev(&pipeline::dev(), pipeline::watch_rules(), &config.server)?;
        }
        Command::Task { name } => {
            orchestrator.run_task(&name)?;
        }
        Command::Tasks => {
            for name in orchestrator.registry().names() {
                println!("{name}");
            }
        }
    }

    Ok(())
}
