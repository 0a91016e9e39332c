mod config;
mod logger;
mod service;
mod store;

use std::error::Error;
use std::io::{self, ErrorKind};
use std::path::PathBuf;

use bracket_generator_core::options::OptionValues;
use bracket_generator_core::{BracketKind, TournamentId};
use clap::{Args as ClapArgs, Parser, Subcommand};

use crate::config::{Config, ConfigError};
use crate::service::BracketGenerationService;
use crate::store::mysql::MySqlStore;
use crate::store::MatchStore;

#[derive(Debug, Parser)]
#[clap(version, about)]
struct Args {
    /// Path to the config file. The environment is used if the file does not exist.
    #[clap(short, long, default_value = "config.toml")]
    config: PathBuf,
    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Creates the database tables.
    Migrate,
    /// Generates the bracket of a tournament without any matches.
    Generate(GenerateArgs),
    /// Replaces all matches of a tournament with a new bracket.
    Regenerate(GenerateArgs),
    /// Prints the stored matches of a tournament.
    Show {
        #[clap(short, long)]
        tournament: TournamentId,
    },
}

#[derive(Debug, ClapArgs)]
struct GenerateArgs {
    #[clap(short, long)]
    tournament: TournamentId,
    #[clap(short, long, default_value = "single_elimination")]
    kind: BracketKind,
    /// A generation option as `key=value`. Can be given multiple times.
    #[clap(short = 'o', long = "option")]
    options: Vec<String>,
}

impl GenerateArgs {
    fn values(&self) -> Result<OptionValues, Box<dyn Error>> {
        let accepted = self.kind.options();

        let mut values = OptionValues::new();
        for option in &self.options {
            let (key, value) = option
                .split_once('=')
                .ok_or_else(|| format!("invalid option {}: expected key=value", option))?;

            let value = accepted
                .parse(key, value)
                .map_err(bracket_generator_core::Error::from)?;
            values.set(key, value);
        }

        Ok(values)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let config = match Config::from_file(&args.config).await {
        Ok(config) => config.with_environment(),
        Err(ConfigError::Io(err)) if err.kind() == ErrorKind::NotFound => {
            Config::from_environment()?
        }
        Err(err) => return Err(err.into()),
    };

    logger::init(config.loglevel)?;

    log::debug!("Using config file {:?}", args.config);

    let store = MySqlStore::connect(&config.database).await?;

    match args.command {
        Command::Migrate => {
            store.migrate().await?;
            log::info!("Created tables with prefix {:?}", store.table_prefix);
        }
        Command::Generate(generate) => {
            let service = BracketGenerationService::new(store, config.generation);
            run_generation(&service, &generate, false).await?;
        }
        Command::Regenerate(generate) => {
            let service = BracketGenerationService::new(store, config.generation);
            run_generation(&service, &generate, true).await?;
        }
        Command::Show { tournament } => {
            let matches = store.list_matches(tournament).await?;
            print_json(&matches)?;
        }
    }

    Ok(())
}

async fn run_generation(
    service: &BracketGenerationService<MySqlStore>,
    args: &GenerateArgs,
    regenerate: bool,
) -> Result<(), Box<dyn Error>> {
    let values = args.values()?;

    match service
        .generate_from_source(args.tournament, args.kind, values, regenerate)
        .await
    {
        Ok(generated) => print_json(&generated),
        Err(err) => {
            if err.is_invalid_input() {
                log::warn!("Rejected request for tournament {}: {}", args.tournament, err);
            }

            Err(err.into())
        }
    }
}

fn print_json<T>(value: &T) -> Result<(), Box<dyn Error>>
where
    T: serde::Serialize,
{
    serde_json::to_writer_pretty(io::stdout().lock(), value)?;
    println!();
    Ok(())
}
