//! gql-cache: inspect and exercise the normalized GraphQL cache.
//!
//! Subcommands:
//! - `normalize` - flatten a response payload into records and print them
//! - `read` - rebuild an operation's data from a saved cache snapshot
//! - `query` - run an operation through the client under a fetch policy
//! - `stats` - summarize a saved cache snapshot
//!
//! Logging goes to stderr and is controlled by `RUST_LOG` (default `info`).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use gql_runtime::loader::{
    default_snapshot_path, load_operation, load_response_data, ResolverKind,
};
use gql_runtime::logging::init_tracing;
use gql_runtime::{CacheStore, ClientConfig, FetchPolicy, GraphQLClient, HttpTransport, Operation};
use serde_json::{json, Value};
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "gql-cache", author, version, about)]
struct Cli {
    /// Print compact JSON instead of pretty JSON.
    #[arg(long, global = true)]
    compact: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Normalize a response payload and print the resulting records.
    Normalize {
        /// Operation descriptor (JSON).
        #[arg(long, value_name = "PATH")]
        operation: PathBuf,

        /// Response payload: `{"data": ...}` or the bare data object.
        #[arg(long, value_name = "PATH")]
        response: PathBuf,

        /// Variables object, replacing the operation's own.
        #[arg(long, value_name = "PATH")]
        variables: Option<PathBuf>,

        /// Identity policy: path, id, or typename-id.
        #[arg(long, default_value = "path")]
        resolver: ResolverKind,

        /// Also merge the records into this snapshot file.
        #[arg(long, value_name = "PATH")]
        snapshot: Option<PathBuf>,
    },

    /// Rebuild an operation's data from a cache snapshot.
    Read {
        #[arg(long, value_name = "PATH")]
        operation: PathBuf,

        #[arg(long, value_name = "PATH")]
        variables: Option<PathBuf>,

        /// Snapshot to read from.
        #[arg(long, value_name = "PATH")]
        snapshot: PathBuf,

        #[arg(long, default_value = "path")]
        resolver: ResolverKind,
    },

    /// Run an operation through the client and print every emission.
    Query {
        #[arg(long, value_name = "PATH")]
        operation: PathBuf,

        #[arg(long, value_name = "PATH")]
        variables: Option<PathBuf>,

        /// Server URL (overrides GQL_ENDPOINT).
        #[arg(long, value_name = "URL")]
        endpoint: Option<String>,

        /// Fetch policy (default: GQL_FETCH_POLICY or cache-first).
        #[arg(long)]
        policy: Option<FetchPolicy>,

        /// Snapshot loaded before and saved after the call.
        #[arg(long, value_name = "PATH")]
        snapshot: Option<PathBuf>,

        #[arg(long, default_value = "path")]
        resolver: ResolverKind,
    },

    /// Summarize a cache snapshot.
    Stats {
        /// Snapshot file (default: the user cache directory).
        #[arg(long, value_name = "PATH")]
        snapshot: Option<PathBuf>,
    },
}

fn print_json(value: &Value, compact: bool) -> Result<()> {
    let text = if compact {
        serde_json::to_string(value)?
    } else {
        serde_json::to_string_pretty(value)?
    };
    println!("{}", text);
    Ok(())
}

fn store_with(resolver: ResolverKind, eviction: gql_runtime::EvictionPolicy) -> CacheStore {
    CacheStore::builder()
        .shared_resolver(resolver.build())
        .eviction(eviction)
        .build()
}

fn load_snapshot_if_present(store: &CacheStore, path: &Path) -> Result<()> {
    if path.exists() {
        let changes = store
            .load_snapshot(path)
            .with_context(|| format!("Failed to load snapshot {}", path.display()))?;
        info!(path = %path.display(), changed_fields = changes.len(), "loaded snapshot");
    }
    Ok(())
}

fn normalize(
    operation: &Operation,
    response: &Path,
    resolver: ResolverKind,
    snapshot: Option<&Path>,
    compact: bool,
) -> Result<()> {
    let data = load_response_data(response)?;
    let store = store_with(resolver, Default::default());
    let payload = store
        .normalize_payload(operation, &data)
        .context("Response does not match the operation")?;

    let records: Vec<Value> = payload
        .normalized
        .records
        .iter()
        .map(serde_json::to_value)
        .collect::<Result<_, _>>()?;
    print_json(
        &json!({
            "records": records,
            "dependent_keys": payload.normalized.dependent_keys,
        }),
        compact,
    )?;

    if let Some(path) = snapshot {
        load_snapshot_if_present(&store, path)?;
        store.merge_records(payload.normalized.records);
        let count = store.save_snapshot(path)?;
        info!(path = %path.display(), records = count, "snapshot updated");
    }
    Ok(())
}

fn read(operation: &Operation, snapshot: &Path, resolver: ResolverKind, compact: bool) -> Result<()> {
    let store = store_with(resolver, Default::default());
    store
        .load_snapshot(snapshot)
        .with_context(|| format!("Failed to load snapshot {}", snapshot.display()))?;

    let output = match store.read_operation(operation)? {
        Some(cached) => json!({"data": cached.data, "dependent_keys": cached.dependent_keys}),
        None => {
            warn!(operation = %operation.name, "cache miss");
            json!({"data": null, "dependent_keys": []})
        }
    };
    print_json(&output, compact)
}

async fn query(
    operation: Operation,
    endpoint: Option<String>,
    policy: Option<FetchPolicy>,
    snapshot: Option<PathBuf>,
    resolver: ResolverKind,
    compact: bool,
) -> Result<()> {
    let mut config = ClientConfig::from_env();
    if let Some(endpoint) = endpoint {
        config = config.with_endpoint(gql_runtime::transport::resolve_endpoint(Some(&endpoint)));
    }
    if let Some(policy) = policy {
        config = config.with_fetch_policy(policy);
    }

    let store = Arc::new(store_with(resolver, config.eviction));
    if let Some(path) = &snapshot {
        load_snapshot_if_present(&store, path)?;
    }
    let transport = HttpTransport::with_timeouts(
        &config.endpoint,
        config.request_timeout,
        config.connect_timeout,
    )
    .with_retry(config.retry);
    let client = GraphQLClient::builder()
        .transport(transport)
        .store(store.clone())
        .config(config)
        .build();

    info!(operation = %operation.name, policy = %client.default_policy(), "running query");
    let mut emissions = client.query(operation).enqueue();
    let mut failure = None;
    while let Some(item) = emissions.next().await {
        match item {
            Ok(response) => print_json(&serde_json::to_value(&response)?, compact)?,
            Err(e) => failure = Some(e),
        }
    }

    if let Some(path) = &snapshot {
        let count = store.save_snapshot(path)?;
        info!(path = %path.display(), records = count, "snapshot saved");
    }
    eprintln!("{}", store.metrics().snapshot().format_report());

    match failure {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}

fn stats(snapshot: Option<PathBuf>, compact: bool) -> Result<()> {
    let path = snapshot.unwrap_or_else(default_snapshot_path);
    let store = CacheStore::default();
    store
        .load_snapshot(&path)
        .with_context(|| format!("Failed to load snapshot {}", path.display()))?;
    let records = store.records().dump();
    let fields: usize = records.iter().map(|r| r.fields().len()).sum();
    let bytes: usize = records.iter().map(|r| r.size_estimate_bytes()).sum();
    print_json(
        &json!({
            "snapshot": path.display().to_string(),
            "records": records.len(),
            "fields": fields,
            "estimated_bytes": bytes,
        }),
        compact,
    )
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("info");
    let cli = Cli::parse();

    match cli.command {
        Command::Normalize {
            operation,
            response,
            variables,
            resolver,
            snapshot,
        } => {
            let operation = load_operation(&operation, variables.as_deref())?;
            normalize(&operation, &response, resolver, snapshot.as_deref(), cli.compact)
        }
        Command::Read {
            operation,
            variables,
            snapshot,
            resolver,
        } => {
            let operation = load_operation(&operation, variables.as_deref())?;
            read(&operation, &snapshot, resolver, cli.compact)
        }
        Command::Query {
            operation,
            variables,
            endpoint,
            policy,
            snapshot,
            resolver,
        } => {
            let operation = load_operation(&operation, variables.as_deref())?;
            query(operation, endpoint, policy, snapshot, resolver, cli.compact).await
        }
        Command::Stats { snapshot } => stats(snapshot, cli.compact),
    }
}
