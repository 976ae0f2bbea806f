//! refsync: device key and request-signing tool.
//!
//! Mints the ECDSA P-384 device key a client identifies with, and
//! produces the signing triple for any request, which makes scripting
//! against a running refsync-server possible without a full client.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use refsync_core::core_identity::{sign_request, CanonicalRequest, Keypair};
use refsync_core::logging::{init_logging_with_config, LogConfig, LogLevel};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "refsync")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Set the log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a device keypair and write it to a key file
    Keygen {
        /// Where to write the key file
        #[arg(short, long, default_value = "refsync-key.json")]
        output: PathBuf,

        /// Overwrite an existing key file
        #[arg(long)]
        force: bool,
    },
    /// Print the peer id derived from a key file
    PeerId {
        /// Path to the key file
        #[arg(short, long, default_value = "refsync-key.json")]
        key: PathBuf,
    },
    /// Produce the signing triple for a request
    Sign {
        /// Path to the key file
        #[arg(short, long, default_value = "refsync-key.json")]
        key: PathBuf,

        /// HTTP method
        #[arg(short, long)]
        method: String,

        /// Host the request is addressed to
        #[arg(long)]
        host: String,

        /// Request path, e.g. /api/RE-VRC-24-1234/create
        #[arg(short, long)]
        path: String,

        /// Query parameters as key=value, repeatable
        #[arg(short = 'q', long = "query")]
        query: Vec<String>,

        /// Request body (empty for GET/DELETE)
        #[arg(short, long, default_value = "")]
        body: String,
    },
    /// Mint a fresh opaque record id
    NewId,
}

/// On-disk key file shape.
#[derive(Serialize, Deserialize)]
struct KeyFile {
    peer_id: String,
    secret_hex: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = LogLevel::from_str(&args.log_level).unwrap_or_else(|| {
        eprintln!("Invalid log level '{}', using 'warn'", args.log_level);
        LogLevel::Warn
    });
    init_logging_with_config(LogConfig::new(log_level).with_target(false))?;

    match args.command {
        Command::Keygen { output, force } => keygen(&output, force),
        Command::PeerId { key } => {
            let keypair = load_key(&key)?;
            println!("{}", keypair.peer_id());
            Ok(())
        }
        Command::Sign {
            key,
            method,
            host,
            path,
            query,
            body,
        } => sign(&key, &method, &host, &path, &query, &body),
        Command::NewId => {
            println!("{}", uuid::Uuid::new_v4());
            Ok(())
        }
    }
}

fn keygen(output: &Path, force: bool) -> Result<()> {
    if output.exists() && !force {
        bail!(
            "{} already exists; pass --force to overwrite",
            output.display()
        );
    }

    let keypair = Keypair::generate();
    let file = KeyFile {
        peer_id: keypair.peer_id().0,
        secret_hex: keypair.to_secret_hex(),
    };
    std::fs::write(output, serde_json::to_vec_pretty(&file)?)
        .with_context(|| format!("writing {}", output.display()))?;

    info!(path = %output.display(), "key file written");
    println!("{}", file.peer_id);
    Ok(())
}

fn load_key(path: &Path) -> Result<Keypair> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("reading key file {}", path.display()))?;
    let file: KeyFile = serde_json::from_str(&data)
        .with_context(|| format!("parsing key file {}", path.display()))?;
    let keypair = Keypair::from_secret_hex(&file.secret_hex)
        .context("key file holds an invalid secret")?;
    Ok(keypair)
}

fn sign(
    key: &Path,
    method: &str,
    host: &str,
    path: &str,
    query: &[String],
    body: &str,
) -> Result<()> {
    let keypair = load_key(key)?;

    let pairs: Vec<(String, String)> = query
        .iter()
        .map(|entry| {
            entry
                .split_once('=')
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .with_context(|| format!("query parameter `{}` is not key=value", entry))
        })
        .collect::<Result<_>>()?;

    let request = CanonicalRequest {
        method,
        host,
        path,
        query: &pairs,
        body,
    };
    let triple = sign_request(&keypair, &request);
    println!("{}", serde_json::to_string_pretty(&triple)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keygen_round_trips_through_key_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("key.json");

        keygen(&path, false).unwrap();
        let keypair = load_key(&path).unwrap();
        assert!(keypair.peer_id().0.starts_with("ecdsa-p384:"));

        // Without --force a second keygen refuses to clobber the key.
        assert!(keygen(&path, false).is_err());
        assert!(keygen(&path, true).is_ok());
    }
}
