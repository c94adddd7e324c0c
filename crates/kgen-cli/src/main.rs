//! kgen CLI - deterministic generation, content identifiers and attestations.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use kgen_canonical::DigestAlg;
use kgen_keys::KeyAlgorithm;

mod commands;
mod config;
mod logging;
mod output;

use commands::{attest, canonicalize, graph, hash, id, keys, render, resolve};
use config::Config;

#[derive(Parser)]
#[command(name = "kgen")]
#[command(about = "Deterministic generation, content identifiers and signed attestations")]
struct Cli {
    /// Configuration file (default: ./kgen.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Increase log detail on stderr (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show canonical bytes for input JSON
    Canonicalize {
        /// Input JSON file (or stdin if not provided)
        input: Option<String>,
        /// Print a JSON report with the identifier and stripped fields
        #[arg(long)]
        report: bool,
    },
    /// Compute the content identifier of input JSON
    Hash {
        /// Input file (or stdin if not provided)
        input: Option<String>,
        /// Digest algorithm (default: from config)
        #[arg(long)]
        alg: Option<DigestAlg>,
        /// Hash the input bytes as-is instead of their canonical form
        #[arg(long)]
        raw: bool,
    },
    /// Derive a short deterministic identifier
    Id {
        /// Namespace
        namespace: String,
        /// Parts, in order
        parts: Vec<String>,
    },
    /// Canonicalize an N-Triples graph
    Graph {
        /// N-Triples file (or stdin if not provided)
        input: Option<String>,
        /// Refinement round cap
        #[arg(long)]
        max_rounds: Option<usize>,
        /// Digest algorithm (default: from config)
        #[arg(long)]
        alg: Option<DigestAlg>,
    },
    /// Render a template against a JSON context
    Render {
        /// Template file
        template: String,
        /// Context JSON file (or stdin if not provided)
        #[arg(long)]
        context: Option<String>,
        /// Digest algorithm (default: from config)
        #[arg(long)]
        alg: Option<DigestAlg>,
        /// Print only the rendered bytes
        #[arg(long)]
        raw: bool,
    },
    /// Manage signing keys
    Keys {
        #[command(subcommand)]
        command: KeysCommand,
    },
    /// Sign and store an attestation about a content identifier
    Attest {
        /// Subject identifier, e.g. sha256:<hex>
        subject: String,
        /// Signing key (default: from config)
        #[arg(long)]
        key: Option<String>,
        /// Creating entity (default: from config)
        #[arg(long)]
        creator: Option<String>,
        /// Start of validity, RFC 3339 (default: now)
        #[arg(long)]
        valid_from: Option<String>,
        /// End of validity, RFC 3339
        #[arg(long)]
        valid_until: Option<String>,
        /// Validity length in days (default: from config)
        #[arg(long)]
        validity_days: Option<i64>,
        /// Compliance standard (repeatable)
        #[arg(long = "standard")]
        standards: Vec<String>,
        /// Trust link as entity:role:level (repeatable)
        #[arg(long = "trust")]
        trust_chain: Vec<String>,
        /// Property as key=value; JSON values are parsed (repeatable)
        #[arg(long = "property")]
        properties: Vec<String>,
    },
    /// Resolve and verify an attest:// URI
    Resolve {
        /// Attestation URI
        uri: String,
        /// Also check the validity window at this RFC 3339 instant
        #[arg(long)]
        at: Option<String>,
    },
}

#[derive(Subcommand)]
enum KeysCommand {
    /// Generate a key pair
    Generate {
        /// Algorithm: ed25519 or rsa-2048 (default: from config)
        #[arg(long)]
        algorithm: Option<KeyAlgorithm>,
        /// Explicit key id (default: derived from the fingerprint)
        #[arg(long)]
        id: Option<String>,
    },
    /// List keys
    List,
    /// Revoke a key and create its successor
    Rotate {
        /// Key to rotate
        key_id: String,
    },
    /// Revoke a key
    Revoke {
        /// Key to revoke
        key_id: String,
    },
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load(cli.config.as_deref())?;
    let config = &config;
    match cli.command {
        Commands::Canonicalize { input, report } => canonicalize::run(config, input, report),
        Commands::Hash { input, alg, raw } => hash::run(config, input, alg, raw),
        Commands::Id { namespace, parts } => id::run(namespace, parts),
        Commands::Graph {
            input,
            max_rounds,
            alg,
        } => graph::run(config, input, max_rounds, alg),
        Commands::Render {
            template,
            context,
            alg,
            raw,
        } => render::run(config, template, context, alg, raw),
        Commands::Keys { command } => match command {
            KeysCommand::Generate { algorithm, id } => keys::generate(config, algorithm, id),
            KeysCommand::List => keys::list(config),
            KeysCommand::Rotate { key_id } => keys::rotate(config, key_id),
            KeysCommand::Revoke { key_id } => keys::revoke(config, key_id),
        },
        Commands::Attest {
            subject,
            key,
            creator,
            valid_from,
            valid_until,
            validity_days,
            standards,
            trust_chain,
            properties,
        } => attest::run(
            config,
            attest::AttestArgs {
                subject,
                key,
                creator,
                valid_from,
                valid_until,
                validity_days,
                standards,
                trust_chain,
                properties,
            },
        ),
        Commands::Resolve { uri, at } => resolve::run(config, uri, at),
    }
}
