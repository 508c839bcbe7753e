//! hook-replay — run the proxy hooks against recorded call data
//!
//! Usage:
//!   hook-replay rewrite [FILE] [--config <path>]   Print the rewritten request
//!   hook-replay record [FILE] [--config <path>]    Run the post-call pipeline, print events
//!
//! FILE defaults to stdin. A `record` document looks like
//! `{"kind": "success" | "failure", "metadata": {...}, "response": {...} | null}`.

use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use anyhow::{bail, Context};
use serde::Deserialize;
use serde_json::Value;

use llm_proxy_hooks::hooks::{CallHooks, RequestContext, UsageHooks};
use llm_proxy_hooks::telemetry::{CompositeUsageSink, InMemoryUsageSink, RecordKind};
use llm_proxy_hooks::types::{CallMetadata, CallRequest, CallType, Response};
use llm_proxy_hooks::HooksConfig;

#[derive(Debug, Deserialize)]
struct ReplayDocument {
    kind: RecordKind,
    #[serde(default)]
    metadata: Value,
    #[serde(default)]
    response: Option<Value>,
    #[serde(default)]
    latency_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage();
        std::process::exit(1);
    }

    match args[1].as_str() {
        "rewrite" => cmd_rewrite(&args[2..]).await,
        "record" => cmd_record(&args[2..]).await,
        "version" | "--version" | "-V" => {
            println!("hook-replay {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}

fn print_usage() {
    println!(
        r#"hook-replay — run the proxy hooks against recorded call data

USAGE:
    hook-replay <COMMAND> [FILE] [OPTIONS]

COMMANDS:
    rewrite [FILE]      Apply the pre-call hook to a request document
    record [FILE]       Apply the post-call hooks to a call document
    version             Show version information
    help                Show this help message

OPTIONS:
    --config <path>     YAML configuration file

ENVIRONMENT:
    LLM_PROXY_HOOKS_CONFIG    Configuration file used when --config is absent
    RUST_LOG                  Log filter (e.g. llm_proxy_hooks=debug)"#
    );
}

struct Options {
    input: Option<PathBuf>,
    config: Option<PathBuf>,
}

fn parse_options(args: &[String]) -> anyhow::Result<Options> {
    let mut opts = Options {
        input: None,
        config: None,
    };
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => {
                let path = iter.next().context("--config requires a path")?;
                opts.config = Some(PathBuf::from(path));
            }
            "-" => opts.input = None,
            flag if flag.starts_with("--") => bail!("unknown option: {flag}"),
            path => opts.input = Some(PathBuf::from(path)),
        }
    }
    Ok(opts)
}

fn load_config(opts: &Options) -> anyhow::Result<HooksConfig> {
    let config = match &opts.config {
        Some(path) => HooksConfig::from_path(path)?,
        None => HooksConfig::from_env()?,
    };
    Ok(config)
}

fn read_input(opts: &Options) -> anyhow::Result<Value> {
    let mut text = String::new();
    match &opts.input {
        Some(path) => {
            text = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
        }
        None => {
            std::io::stdin()
                .read_to_string(&mut text)
                .context("reading stdin")?;
        }
    }
    serde_json::from_str(&text).context("input is not valid JSON")
}

async fn cmd_rewrite(args: &[String]) -> anyhow::Result<()> {
    let opts = parse_options(args)?;
    let hooks = UsageHooks::from_config(load_config(&opts)?)?;
    let request = CallRequest::from_value(read_input(&opts)?);
    let rewritten = hooks
        .pre_call(&RequestContext::new(), CallType::ChatCompletion, request)
        .await
        .into_value()?;
    println!("{}", serde_json::to_string_pretty(&rewritten)?);
    Ok(())
}

async fn cmd_record(args: &[String]) -> anyhow::Result<()> {
    let opts = parse_options(args)?;
    let config = load_config(&opts)?;
    let doc: ReplayDocument =
        serde_json::from_value(read_input(&opts)?).context("not a replay document")?;

    let memory = Arc::new(InMemoryUsageSink::default());
    let sink = CompositeUsageSink::new()
        .add_sink(config.recorder.sink.build())
        .add_sink(memory.clone());
    let hooks = UsageHooks::builder()
        .config(config)
        .sink(Arc::new(sink))
        .build()?;

    let meta = CallMetadata::from_value(doc.metadata);
    let response = doc.response.filter(|v| !v.is_null()).map(Response::from_value);
    let end = SystemTime::now();
    let start = end
        .checked_sub(Duration::from_millis(doc.latency_ms.unwrap_or(0)))
        .unwrap_or(end);

    match doc.kind {
        RecordKind::Success => hooks.on_success(&meta, response.as_ref(), start, end).await,
        RecordKind::Failure => hooks.on_failure(&meta, response.as_ref(), start, end).await,
    }

    println!("{}", serde_json::to_string_pretty(&memory.events())?);
    Ok(())
}
