use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use retrace_engine::sim::{run_simulator, SimulatorConfig};
use retrace_engine::EngineConfig;
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    Command::new("retrace-sim")
        .version(retrace_engine::VERSION)
        .about("Randomized consistency checks for the retrace undo/redo engine")
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines (filter with RUST_LOG)"),
        )
        .subcommand(
            Command::new("simulate")
                .about("Run a randomized campaign against a flaky in-memory remote")
                .arg(
                    Arg::new("steps")
                        .long("steps")
                        .default_value("500")
                        .value_parser(value_parser!(u64))
                        .help("Number of caller actions to simulate"),
                )
                .arg(
                    Arg::new("seed")
                        .long("seed")
                        .default_value("42")
                        .value_parser(value_parser!(u64))
                        .help("Random seed for reproducibility"),
                )
                .arg(
                    Arg::new("failure-rate")
                        .long("failure-rate")
                        .default_value("0.2")
                        .value_parser(value_parser!(f64))
                        .help("Probability that a remote call fails transiently"),
                )
                .arg(
                    Arg::new("items")
                        .long("items")
                        .default_value("8")
                        .value_parser(value_parser!(usize))
                        .help("Items on the remote before the first step"),
                )
                .arg(
                    Arg::new("config")
                        .long("config")
                        .value_name("FILE")
                        .help("Engine configuration (TOML)"),
                )
                .arg(
                    Arg::new("client-ids")
                        .long("client-ids")
                        .action(ArgAction::SetTrue)
                        .help("Keep client-generated ids instead of server-assigned ones"),
                )
                .arg(
                    Arg::new("keep-going")
                        .long("keep-going")
                        .action(ArgAction::SetTrue)
                        .help("Continue after the first violation"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output the report as JSON"),
                ),
        )
        .subcommand(
            Command::new("config")
                .about("Print the effective engine configuration")
                .arg(
                    Arg::new("config")
                        .long("config")
                        .value_name("FILE")
                        .help("Engine configuration (TOML)"),
                ),
        )
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(args: &ArgMatches) -> anyhow::Result<EngineConfig> {
    match args.get_one::<String>("config") {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading config file {path}"))?;
            EngineConfig::from_toml_str(&raw).with_context(|| format!("parsing config file {path}"))
        }
        None => Ok(EngineConfig::default()),
    }
}

fn arg<T: Clone + Send + Sync + 'static>(args: &ArgMatches, name: &str) -> anyhow::Result<T> {
    args.get_one::<T>(name)
        .cloned()
        .with_context(|| format!("missing --{name}"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("log-json"));

    match matches.subcommand() {
        Some(("simulate", args)) => {
            let config = SimulatorConfig {
                seed: arg(args, "seed")?,
                steps: arg(args, "steps")?,
                failure_rate: arg(args, "failure-rate")?,
                server_ids: !args.get_flag("client-ids"),
                initial_items: arg(args, "items")?,
                stop_on_first_violation: !args.get_flag("keep-going"),
                engine: load_config(args)?,
            };
            anyhow::ensure!(
                (0.0..=1.0).contains(&config.failure_rate),
                "--failure-rate must be between 0 and 1"
            );

            let report = run_simulator(config).await?;
            if args.get_flag("json") {
                println!("{}", report.to_json()?);
            } else {
                println!("{}", report.generate_text());
            }
            std::process::exit(i32::from(!report.passed()));
        }
        Some(("config", args)) => {
            let config = load_config(args)?;
            println!("{}", toml::to_string_pretty(&config)?);
        }
        _ => {
            cli().print_help()?;
        }
    }
    Ok(())
}
