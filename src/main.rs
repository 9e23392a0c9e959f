// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::{Context as _, Result};
use clap::Parser;
use kubemeta::{
    codec,
    config::{ConfigOverrides, FilterConfig},
    constants::TOKIO_WORKER_THREADS,
    context::KubeContext,
    errors::ResolveError,
    metrics,
    resolver::{ResolvedMetadata, Resolver},
};
use serde_json::{json, Value};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, warn};

/// Enrich container log tags with Kubernetes pod metadata.
///
/// Reads one tag per line on stdin and writes one JSON object per line on stdout.
#[derive(Debug, Parser)]
#[command(name = "kubemeta", version, about)]
struct Cli {
    /// YAML configuration file
    #[arg(long, short = 'c', env = "KUBEMETA_CONFIG")]
    config: Option<PathBuf>,

    /// Print Prometheus metrics to stderr on exit
    #[arg(long)]
    dump_metrics: bool,

    #[command(flatten)]
    overrides: ConfigOverrides,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(TOKIO_WORKER_THREADS)
        .thread_name("kubemeta")
        .enable_all()
        .build()?;

    runtime.block_on(async_main(cli))
}

fn init_logging() {
    // Respects RUST_LOG environment variable if set, otherwise defaults to INFO level
    // Example: RUST_LOG=debug kubemeta
    //
    // Respects RUST_LOG_FORMAT environment variable for output format
    // Example: RUST_LOG_FORMAT=json kubemeta
    //
    // Logs go to stderr; stdout carries the enriched records.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }
}

/// Load the configuration file, if any, and apply command line overrides.
fn load_config(cli: &Cli) -> Result<FilterConfig> {
    let mut config = match &cli.config {
        Some(path) => FilterConfig::from_file(path)?,
        None => FilterConfig::default(),
    };
    config.apply(&cli.overrides);
    Ok(config)
}

/// One output line for a resolved (or failed) tag.
fn output_record(tag: &str, result: &Result<ResolvedMetadata, ResolveError>) -> Value {
    match result {
        Ok(resolved) => match codec::to_json(&resolved.buf) {
            Ok(metadata) => json!({
                "tag": tag,
                "source": resolved.source.as_str(),
                "metadata": metadata,
            }),
            Err(e) => json!({ "tag": tag, "error": e.to_string() }),
        },
        Err(e) => json!({ "tag": tag, "error": e.to_string() }),
    }
}

/// Resolve one tag per input line and write one record per tag to `out`.
///
/// Only an I/O error on `input` or `out` ends the loop. Returns the number of
/// resolved and failed tags.
async fn process_tags<R, W>(resolver: &Resolver, mut input: R, out: &mut W) -> Result<(u64, u64)>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut resolved = 0u64;
    let mut failed = 0u64;
    let mut buf = Vec::new();

    loop {
        buf.clear();
        if input.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }

        let record = match std::str::from_utf8(&buf) {
            Ok(line) => {
                let tag = line.trim();
                if tag.is_empty() {
                    continue;
                }

                let result = resolver.resolve(tag).await;
                match &result {
                    Ok(_) => resolved += 1,
                    Err(e) if e.is_upstream() => {
                        failed += 1;
                        error!(tag = %tag, error = %e, "Failed to enrich tag");
                    }
                    Err(e) => {
                        failed += 1;
                        warn!(tag = %tag, error = %e, "Tag not resolved");
                    }
                }
                output_record(tag, &result)
            }
            Err(e) => {
                failed += 1;
                let tag = String::from_utf8_lossy(&buf);
                let tag = tag.trim();
                warn!(tag = %tag, error = %e, "Tag is not valid UTF-8");
                json!({ "tag": tag, "error": format!("tag is not valid UTF-8: {e}") })
            }
        };

        writeln!(out, "{record}")?;
        out.flush()?;
    }

    Ok((resolved, failed))
}

async fn async_main(cli: Cli) -> Result<()> {
    init_logging();

    info!(version = env!("CARGO_PKG_VERSION"), "Starting kubemeta");

    let config = load_config(&cli).context("failed to load configuration")?;
    debug!(config = ?config, "Configuration loaded");

    let context = KubeContext::init(&config)
        .await
        .context("failed to initialize Kubernetes metadata context")?;
    let resolver = Resolver::new(Arc::new(context));

    info!("Reading tags from stdin");

    let (resolved, failed) = process_tags(
        &resolver,
        BufReader::new(tokio::io::stdin()),
        &mut std::io::stdout(),
    )
    .await?;

    info!(resolved, failed, "Input closed, shutting down");

    if cli.dump_metrics {
        eprint!("{}", metrics::gather_metrics()?);
    }

    Ok(())
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod main_tests;
