use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use kvadmin::{archive, AdminConfig, AdminService, KeyPath, Locator, StoreHandle, Value};

#[derive(Parser)]
#[command(author, version, about = "Administer a key-value store", long_about = None)]
struct Cli {
    /// Store file path, or `:memory:`
    locator: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Clone)]
enum Commands {
    /// Dump the entries under a prefix to a JSON file
    Dump { file: PathBuf, prefix: Vec<String> },
    /// List the entries under a prefix
    List { prefix: Vec<String> },
    /// Print the value stored at a key
    Get {
        #[arg(required = true)]
        key: Vec<String>,
    },
    /// Write the bytes stored at a key to a file: KEY... OUT_FILE
    GetBinary {
        #[arg(num_args = 2.., required = true, value_name = "KEY... OUT_FILE")]
        args: Vec<String>,
    },
    /// Store a JSON value at a key: KEY... VALUE
    Set {
        #[arg(num_args = 2.., required = true, value_name = "KEY... VALUE")]
        args: Vec<String>,
    },
    /// Store the contents of a file at a key: KEY... IN_FILE
    SetBinary {
        #[arg(num_args = 2.., required = true, value_name = "KEY... IN_FILE")]
        args: Vec<String>,
    },
    /// Delete a key
    Delete {
        #[arg(required = true)]
        key: Vec<String>,
    },
    /// Delete every entry under a prefix
    Clear { prefix: Vec<String> },
    /// Restore entries from a JSON dump
    Restore { file: PathBuf },
}

/// Splits `KEY... LAST` into the key and the trailing argument.
fn split_last(mut args: Vec<String>) -> anyhow::Result<(KeyPath, String)> {
    let last = args.pop().context("missing trailing argument")?;
    Ok((KeyPath::new(args)?, last))
}

/// How a command finished. Mapped to the process exit status in `main`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Success,
    Failure,
}

impl From<Outcome> for ExitCode {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Success => ExitCode::SUCCESS,
            Outcome::Failure => ExitCode::FAILURE,
        }
    }
}

/// Parses arguments. Usage errors become `Err(Outcome::Failure)` (exit 1,
/// not clap's 2); `--help`/`--version` become `Err(Outcome::Success)`.
fn parse_args<I, T>(args: I) -> Result<Cli, Outcome>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    Cli::try_parse_from(args).map_err(|e| {
        let outcome = if e.use_stderr() { Outcome::Failure } else { Outcome::Success };
        let _ = e.print();
        outcome
    })
}

async fn run(cli: Cli, config: AdminConfig, out: &mut impl Write) -> anyhow::Result<Outcome> {
    let locator: Locator = cli.locator.parse()?;
    let handle = StoreHandle::open(&locator).await?;
    let admin = AdminService::with_config(handle, config);

    match cli.command {
        Commands::Dump { file, prefix } => {
            let count = admin.dump(&file, &KeyPath::new(prefix)?).await?;
            log::info!("wrote {} records to {:?}", count, file);
        }
        Commands::List { prefix } => {
            let records = admin.list(&KeyPath::new(prefix)?).await?;
            writeln!(out, "{}", archive::encode_pretty(&records)?)?;
        }
        Commands::Get { key } => {
            let key = KeyPath::new(key)?;
            match admin.get(&key).await? {
                Some(Value::Structured(json)) => writeln!(out, "{}", serde_json::to_string_pretty(&json)?)?,
                Some(Value::Binary(bytes)) => writeln!(out, "{}", serde_json::to_string_pretty(&bytes)?)?,
                None => {
                    log::warn!("no value at {}", key);
                    writeln!(out, "null")?;
                }
            }
        }
        Commands::GetBinary { args } => {
            let (key, path) = split_last(args)?;
            match admin.get_binary(&key).await? {
                Some(bytes) => tokio::fs::write(&path, bytes)
                    .await
                    .with_context(|| format!("writing {}", path))?,
                None => {
                    eprintln!("no value at {}", key);
                    return Ok(Outcome::Failure);
                }
            }
        }
        Commands::Set { args } => {
            let (key, raw) = split_last(args)?;
            let value: serde_json::Value =
                serde_json::from_str(&raw).with_context(|| format!("value is not valid JSON: {}", raw))?;
            if !admin.set(&key, value).await? {
                return Ok(Outcome::Failure);
            }
        }
        Commands::SetBinary { args } => {
            let (key, path) = split_last(args)?;
            if !admin.set_binary_from_file(&key, Path::new(&path)).await? {
                return Ok(Outcome::Failure);
            }
        }
        Commands::Delete { key } => {
            admin.delete(&KeyPath::new(key)?).await?;
        }
        Commands::Clear { prefix } => {
            let count = admin.clear(&KeyPath::new(prefix)?).await?;
            log::info!("removed {} records", count);
        }
        Commands::Restore { file } => {
            let count = admin.restore(&file).await?;
            log::info!("restored {} records from {:?}", count, file);
        }
    }

    Ok(Outcome::Success)
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    env_logger::init();

    let cli = match parse_args(std::env::args_os()) {
        Ok(cli) => cli,
        Err(outcome) => return Ok(outcome.into()),
    };
    let mut stdout = std::io::stdout();
    Ok(run(cli, AdminConfig::from_env(), &mut stdout).await?.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::{tempdir, TempDir};

    struct Store {
        dir: TempDir,
        locator: String,
    }

    fn store() -> Store {
        let dir = tempdir().unwrap();
        let locator = dir.path().join("kv.redb").to_string_lossy().into_owned();
        Store { dir, locator }
    }

    async fn exec(store: &Store, args: &[&str], config: AdminConfig) -> (Outcome, String) {
        let mut argv = vec!["kvadmin", store.locator.as_str()];
        argv.extend_from_slice(args);
        let cli = parse_args(argv).unwrap();
        let mut out = Vec::new();
        let outcome = run(cli, config, &mut out).await.unwrap();
        (outcome, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_usage_errors_fail() {
        assert_eq!(parse_args(["kvadmin"]).err(), Some(Outcome::Failure));
        assert_eq!(parse_args(["kvadmin", "kv.redb", "set", "a"]).err(), Some(Outcome::Failure));
        assert_eq!(parse_args(["kvadmin", "kv.redb", "get"]).err(), Some(Outcome::Failure));
        assert_eq!(parse_args(["kvadmin", "kv.redb", "bogus"]).err(), Some(Outcome::Failure));
        assert_eq!(parse_args(["kvadmin", "--help"]).err(), Some(Outcome::Success));
    }

    #[test]
    fn test_trailing_argument_is_split_off() {
        let cli = parse_args(["kvadmin", "kv.redb", "set", "user", "1", r#"{"name":"Ann"}"#]).unwrap();
        let Commands::Set { args } = cli.command else {
            panic!("expected set");
        };
        let (key, value) = split_last(args).unwrap();
        assert_eq!(key, KeyPath::new(["user", "1"]).unwrap());
        assert_eq!(value, r#"{"name":"Ann"}"#);
    }

    #[tokio::test]
    async fn test_set_then_get_prints_value() {
        let store = store();
        let (outcome, _) = exec(&store, &["set", "user", "1", r#"{"name":"Ann"}"#], AdminConfig::default()).await;
        assert_eq!(outcome, Outcome::Success);

        let (outcome, out) = exec(&store, &["get", "user", "1"], AdminConfig::default()).await;
        assert_eq!(outcome, Outcome::Success);
        let printed: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(printed, json!({"name": "Ann"}));
    }

    #[tokio::test]
    async fn test_get_absent_prints_null() {
        let store = store();
        let (outcome, out) = exec(&store, &["get", "nope"], AdminConfig::default()).await;
        assert_eq!(outcome, Outcome::Success);
        assert_eq!(out.trim(), "null");
    }

    #[tokio::test]
    async fn test_refused_set_fails() {
        let store = store();
        let config = AdminConfig {
            max_value_size: Some(2),
            ..AdminConfig::default()
        };
        let (outcome, _) = exec(&store, &["set", "a", r#""long""#], config).await;
        assert_eq!(outcome, Outcome::Failure);

        let (_, out) = exec(&store, &["get", "a"], AdminConfig::default()).await;
        assert_eq!(out.trim(), "null");
    }

    #[tokio::test]
    async fn test_binary_commands() {
        let store = store();
        let input = store.dir.path().join("in.bin");
        let output = store.dir.path().join("out.bin");
        std::fs::write(&input, [1u8, 2, 3]).unwrap();
        let input = input.to_string_lossy().into_owned();
        let output = output.to_string_lossy().into_owned();

        let (outcome, _) = exec(&store, &["get-binary", "files", "a.bin", &output], AdminConfig::default()).await;
        assert_eq!(outcome, Outcome::Failure);
        assert!(!Path::new(&output).exists());

        let (outcome, _) = exec(&store, &["set-binary", "files", "a.bin", &input], AdminConfig::default()).await;
        assert_eq!(outcome, Outcome::Success);
        let (outcome, _) = exec(&store, &["get-binary", "files", "a.bin", &output], AdminConfig::default()).await;
        assert_eq!(outcome, Outcome::Success);
        assert_eq!(std::fs::read(&output).unwrap(), vec![1u8, 2, 3]);
    }

    #[tokio::test]
    async fn test_dump_clear_restore_commands() {
        let store = store();
        let dump = store.dir.path().join("dump.json").to_string_lossy().into_owned();
        exec(&store, &["set", "x", "1"], AdminConfig::default()).await;
        exec(&store, &["set", "y", "2"], AdminConfig::default()).await;

        assert_eq!(exec(&store, &["dump", &dump], AdminConfig::default()).await.0, Outcome::Success);
        assert_eq!(exec(&store, &["clear"], AdminConfig::default()).await.0, Outcome::Success);
        let (_, out) = exec(&store, &["list"], AdminConfig::default()).await;
        assert_eq!(serde_json::from_str::<serde_json::Value>(&out).unwrap(), json!([]));

        assert_eq!(exec(&store, &["restore", &dump], AdminConfig::default()).await.0, Outcome::Success);
        let (_, out) = exec(&store, &["list"], AdminConfig::default()).await;
        assert_eq!(
            serde_json::from_str::<serde_json::Value>(&out).unwrap(),
            json!([{"key": ["x"], "value": 1}, {"key": ["y"], "value": 2}])
        );
    }
}
