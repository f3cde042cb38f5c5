//! The `age-import` command.
//!
//! Resolves age-encrypted files into a local content-addressed store and
//! prints the decrypted text, an evaluated JSON document, or the store path.

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::{Map, Value};

use age_import::identity::IDENTITY_FILE_ENV;
use age_import::output::{import_age_with, read_age_with};
use age_import::{
    AgeCommand, EncryptedReference, EvaluationMode, FsProbe, FsStore, Hash, HashAlgorithm,
    IdentityConfig, JsonEvaluator, Operation, Origin, Resolution, ResolveSettings, Resolver,
};

// ── Directory helpers ─────────────────────────────────────────────────────────

fn default_store_dir() -> Result<PathBuf> {
    let home = std::env::var_os("HOME")
        .filter(|h| !h.is_empty())
        .ok_or_else(|| anyhow!("HOME is not set; pass --store explicitly"))?;
    Ok(PathBuf::from(home)
        .join(".cache")
        .join("age-import")
        .join("store"))
}

// ── CLI structure ─────────────────────────────────────────────────────────────

/// Decrypt age files once into a hash-locked store.
#[derive(Parser, Debug)]
#[command(
    name = "age-import",
    about = "Hash-locked age decryption into a content-addressed store",
    version,
    long_about = "age-import: hash-locked age decryption\n\nDecrypts an age file at most once per declared hash, verifies the\nplaintext, and materializes it in a content-addressed store."
)]
struct Cli {
    /// Store directory (default: ~/.cache/age-import/store)
    #[arg(long, global = true, env = "AGE_IMPORT_STORE")]
    store: Option<PathBuf>,

    /// Directory to substitute missing objects from (repeatable)
    #[arg(long = "substituter", global = true)]
    substituters: Vec<PathBuf>,

    /// Refuse to decrypt anything without a declared hash
    #[arg(long, global = true)]
    pure: bool,

    /// Rewrite store objects even if they already exist
    #[arg(long, global = true)]
    repair: bool,

    /// The age program to run
    #[arg(long, global = true, env = "AGE_PROGRAM", default_value = "age")]
    age_bin: PathBuf,

    /// Identity file; takes precedence over AGE_IDENTITY_FILE
    #[arg(long, global = true)]
    identity_file: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct Target {
    /// Path to the age-encrypted file
    #[arg(long)]
    file: PathBuf,

    /// Expected hash of the decrypted content (SRI, e.g. sha256-...)
    #[arg(long)]
    hash: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the decrypted content as text
    Read(Target),
    /// Evaluate the decrypted content as a JSON document and print it
    Import(Target),
    /// Print the store path of the resolved artifact
    Path {
        #[command(flatten)]
        target: Target,

        /// Print the full resolution as JSON
        #[arg(long)]
        json: bool,
    },
    /// Normalise a hash string to SRI form
    Hash {
        /// Hash in SRI, prefixed, or bare SHA-256 form
        hash: String,
    },
}

// ── Main entry point ──────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "error" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    if let Err(e) = run(cli) {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    match &cli.command {
        Commands::Hash { hash } => cmd_hash(hash),
        Commands::Read(target) => cmd_read(&cli, target),
        Commands::Import(target) => cmd_import(&cli, target),
        Commands::Path { target, json } => cmd_path(&cli, target, *json),
    }
}

// ── Shared setup ──────────────────────────────────────────────────────────────

fn open_store(cli: &Cli) -> Result<FsStore> {
    let root = match &cli.store {
        Some(root) => root.clone(),
        None => default_store_dir()?,
    };
    let mut store = FsStore::open(&root)
        .with_context(|| format!("failed to open store at {}", root.display()))?;
    for dir in &cli.substituters {
        store = store.with_substituter(dir);
    }
    Ok(store)
}

fn identity_config(cli: &Cli) -> IdentityConfig {
    let mut config = IdentityConfig::from_env();
    if let Some(path) = &cli.identity_file {
        config.override_file = Some(path.clone());
    }
    log::debug!(
        "identity override: {:?} ({IDENTITY_FILE_ENV}), home: {:?}",
        config.override_file,
        config.home
    );
    config
}

fn settings(cli: &Cli) -> ResolveSettings {
    ResolveSettings {
        mode: if cli.pure {
            EvaluationMode::Pure
        } else {
            EvaluationMode::Impure
        },
        repair: cli.repair,
    }
}

fn reference(target: &Target, who: Operation) -> Result<EncryptedReference> {
    let mut attrs = Map::new();
    attrs.insert(
        "file".to_string(),
        Value::String(target.file.to_string_lossy().into_owned()),
    );
    if let Some(hash) = &target.hash {
        attrs.insert("hash".to_string(), Value::String(hash.clone()));
    }
    let cwd = std::env::current_dir().context("failed to determine current directory")?;
    Ok(EncryptedReference::from_attrs(&attrs, &cwd, who)?)
}

/// Run `f` with a resolver wired to the real store, `age` and filesystem.
fn with_resolver<T>(cli: &Cli, f: impl FnOnce(&Resolver<'_>) -> Result<T>) -> Result<T> {
    let store = open_store(cli)?;
    let age = AgeCommand::new(&cli.age_bin);
    let resolver = Resolver::new(&store, &age, &FsProbe, identity_config(cli), settings(cli));
    f(&resolver)
}

fn report(resolution: &Resolution, verbose: bool) {
    if let Some(hint) = &resolution.pin_hint {
        // Already printed by the resolver when the logger shows warnings.
        if !log::log_enabled!(target: "age_import::resolve", log::Level::Warn) {
            eprintln!("warning: {hint}");
        }
    }
    if verbose {
        let origin = match resolution.origin {
            Origin::Cached => "cached",
            Origin::Decrypted => "decrypted",
        };
        eprintln!(
            "{} ({origin}, {})",
            resolution.artifact.location.display(),
            resolution.artifact.content_hash
        );
    }
}

// ── Command implementations ───────────────────────────────────────────────────

/// `age-import read --file F [--hash H]`
fn cmd_read(cli: &Cli, target: &Target) -> Result<()> {
    let reference = reference(target, Operation::ReadAge)?;
    let (text, resolution) = with_resolver(cli, |r| Ok(read_age_with(r, &reference)?))?;
    report(&resolution, cli.verbose);
    print!("{text}");
    Ok(())
}

/// `age-import import --file F [--hash H]`
fn cmd_import(cli: &Cli, target: &Target) -> Result<()> {
    let reference = reference(target, Operation::ImportAge)?;
    let (value, resolution) =
        with_resolver(cli, |r| Ok(import_age_with(r, &reference, &JsonEvaluator)?))?;
    report(&resolution, cli.verbose);
    println!(
        "{}",
        serde_json::to_string_pretty(&value).context("failed to render document")?
    );
    Ok(())
}

/// `age-import path --file F [--hash H] [--json]`
fn cmd_path(cli: &Cli, target: &Target, json: bool) -> Result<()> {
    let reference = reference(target, Operation::ReadAge)?;
    let resolution = with_resolver(cli, |r| Ok(r.resolve(Operation::ReadAge, &reference)?))?;
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&resolution).context("failed to render resolution")?
        );
        return Ok(());
    }
    report(&resolution, cli.verbose);
    println!("{}", resolution.artifact.location.display());
    Ok(())
}

/// `age-import hash <HASH>`
fn cmd_hash(hash: &str) -> Result<()> {
    let hash = Hash::parse(hash, Some(HashAlgorithm::Sha256))
        .with_context(|| format!("invalid hash '{hash}'"))?;
    println!("{}", hash.to_sri());
    Ok(())
}
