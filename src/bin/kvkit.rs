use std::path::PathBuf;
use std::process::exit;
use std::str::FromStr;

use clap::{Parser, Subcommand, ValueEnum};
use rust_decimal::Decimal;

use kvkit::{
    DynamicStorage, PlistStorage, ReadableDynamicStorage, ReadableStorage, Result, Storage,
    StorageError, Value,
};

/// Inspect and edit property list stores
#[derive(Parser)]
#[command(name = "kvkit", version, about = "Inspect and edit property list stores")]
struct Cli {
    /// Property list file to operate on (created if missing)
    #[arg(value_name = "FILE")]
    file: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the value stored under a key
    Get {
        /// The key to get
        key: String,
    },
    /// Store a value under a key
    Set {
        /// The key to set
        key: String,
        /// The value to store
        value: String,
        /// How to interpret the value
        #[arg(long, value_enum, default_value_t = Kind::String)]
        kind: Kind,
    },
    /// Remove a key
    #[command(name = "rm")]
    Remove {
        /// The key to remove
        key: String,
    },
    /// Print every entry, sorted by key
    List,
    /// Remove every entry
    Clear,
}

#[derive(Clone, Copy, ValueEnum)]
enum Kind {
    String,
    Int,
    Double,
    Decimal,
    Bool,
}

fn main() {
    env_logger::builder()
        .filter_level(log::LevelFilter::Warn)
        .parse_default_env()
        .target(env_logger::Target::Stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("{}", e);
        exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let storage = PlistStorage::open(cli.file)?;

    match cli.command {
        Commands::Get { key } => match storage.value(&key) {
            Some(value) => println!("{}", value),
            None => println!("Key not found"),
        },
        Commands::Set { key, value, kind } => {
            storage.set(parse(&value, kind)?, &key);
        }
        Commands::Remove { key } => {
            if !storage.has_value(&key) {
                println!("Key not found");
                exit(1);
            }
            storage.remove_value(&key);
        }
        Commands::List => {
            let dictionary = storage.dictionary();
            let mut keys: Vec<&String> = dictionary.keys().collect();
            keys.sort();
            for key in keys {
                println!("{} = {}", key, dictionary[key]);
            }
        }
        Commands::Clear => {
            storage.remove_all();
        }
    }

    storage.flush()
}

fn parse(raw: &str, kind: Kind) -> Result<Value> {
    let invalid = || StorageError::InvalidValue(raw.to_owned());
    Ok(match kind {
        Kind::String => Value::from(raw),
        Kind::Int => Value::Integer(raw.parse().map_err(|_| invalid())?),
        Kind::Double => Value::Double(raw.parse().map_err(|_| invalid())?),
        Kind::Decimal => Value::Decimal(Decimal::from_str(raw).map_err(|_| invalid())?),
        Kind::Bool => Value::Boolean(raw.parse().map_err(|_| invalid())?),
    })
}
