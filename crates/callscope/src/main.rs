mod client;
mod output;
mod protocol;
mod server;
mod telemetry;

use std::io::IsTerminal;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::Context;
use callscope_capture::{EventKind, Exchange, Normalizer, RawTransaction};
use callscope_core::config::Config;
use callscope_recorder::{Collect, Recorder, RecorderCollector};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use crate::client::QueryClient;
use crate::output::{
    print_call_human, print_calls_human, print_clear_human, print_status_human,
    print_summary_human,
};
use crate::protocol::CallsQuery;
use crate::telemetry::{init_cli_tracing, init_server_tracing};

#[derive(Parser, Debug)]
#[command(name = "callscope")]
#[command(about = "Record and inspect outbound HTTP calls")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, global = true)]
    json: bool,

    #[arg(long, global = true, help = "Address of a running callscope server")]
    addr: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Run the sidecar recorder")]
    Serve {
        #[arg(long)]
        listen: Option<String>,
        #[arg(long)]
        capacity: Option<usize>,
        #[arg(long)]
        capture_stack: bool,
        #[arg(long, help = "Emit server logs as JSON")]
        log_json: bool,
    },
    #[command(about = "Summarize exchanges from a JSON lines file")]
    Report {
        file: PathBuf,
        #[command(flatten)]
        filter: FilterArgs,
    },
    #[command(about = "Aggregate view of every buffered call")]
    Summary,
    #[command(about = "List buffered calls")]
    Calls {
        #[command(flatten)]
        filter: FilterArgs,
    },
    #[command(about = "Inspect one call with its timing breakdown")]
    Call { id: String },
    #[command(about = "Show recorder state of the running sidecar")]
    Status,
    #[command(about = "Drop every buffered call")]
    Clear,
}

#[derive(Args, Debug, Clone)]
struct FilterArgs {
    #[arg(long)]
    method: Option<String>,
    #[arg(long, help = "Host glob, e.g. '*.example.com'")]
    host: Option<String>,
    #[arg(long, help = "Only failed calls")]
    errors: bool,
    #[arg(long, help = "Only calls served from cache")]
    cached: bool,
    #[arg(long, help = "Minimum total time in seconds")]
    min_duration: Option<f64>,
    #[arg(long, default_value = "observed")]
    sort: String,
    #[arg(long, default_value_t = 100)]
    limit: usize,
}

impl FilterArgs {
    fn into_query(self) -> CallsQuery {
        CallsQuery {
            method: self.method,
            host: self.host,
            errors_only: self.errors,
            cached_only: self.cached,
            min_duration: self.min_duration,
            sort: Some(self.sort),
            limit: Some(self.limit),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let color = std::io::stdout().is_terminal();

    match cli.command {
        Commands::Serve {
            listen,
            capacity,
            capture_stack,
            log_json,
        } => {
            init_server_tracing(log_json);
            let mut cfg = Config::load().context("load configuration")?;
            if let Some(listen) = listen.or(cli.addr) {
                cfg.listen_addr = listen;
            }
            if let Some(capacity) = capacity {
                cfg.capacity = capacity;
            }
            cfg.capture_stack |= capture_stack;
            run_serve(cfg).await
        }
        Commands::Report { file, filter } => {
            init_cli_tracing();
            let cfg = Config::load().context("load configuration")?;
            let exchanges = load_exchanges(&file)?;
            let collector = offline_collector(&cfg, exchanges)?;
            let req = filter.into_query().into_request()?;
            let response = collector.collect().select(&req);
            if cli.json {
                print_json(&response)
            } else {
                print_calls_human(&response, color);
                Ok(())
            }
        }
        Commands::Summary => {
            init_cli_tracing();
            let client = QueryClient::connect(cli.addr)?;
            let summary = client.summary().await?;
            if cli.json {
                print_json(&summary)
            } else {
                print_summary_human(&summary, color);
                Ok(())
            }
        }
        Commands::Calls { filter } => {
            init_cli_tracing();
            let client = QueryClient::connect(cli.addr)?;
            let query = filter.into_query();
            // Reject bad filters before talking to the server.
            query.clone().into_request()?;
            let response = client.calls(&query).await?;
            if cli.json {
                print_json(&response)
            } else {
                print_calls_human(&response, color);
                Ok(())
            }
        }
        Commands::Call { id } => {
            init_cli_tracing();
            let client = QueryClient::connect(cli.addr)?;
            let call = client.call(&id).await?;
            if cli.json {
                print_json(&call)
            } else {
                print_call_human(&call, color);
                Ok(())
            }
        }
        Commands::Status => {
            init_cli_tracing();
            let client = QueryClient::connect(cli.addr)?;
            let status = client.status().await?;
            if cli.json {
                print_json(&status)
            } else {
                print_status_human(&status);
                Ok(())
            }
        }
        Commands::Clear => {
            init_cli_tracing();
            let client = QueryClient::connect(cli.addr)?;
            let cleared = client.clear().await?;
            if cli.json {
                print_json(&cleared)
            } else {
                print_clear_human(&cleared);
                Ok(())
            }
        }
    }
}

async fn run_serve(cfg: Config) -> anyhow::Result<()> {
    let addr: SocketAddr = cfg
        .listen_addr
        .parse()
        .with_context(|| format!("invalid listen address {}", cfg.listen_addr))?;
    // Starting the sidecar is the opt-in; the library toggle stays for embedders.
    let recorder = Recorder::from_config(&cfg)?.with_enabled(true);
    let collector = RecorderCollector::new(recorder, Normalizer::from_config(&cfg));

    eprintln!("callscope serve");
    eprintln!("  listen: {addr}");
    eprintln!("  capacity: {}", cfg.capacity);
    eprintln!("  capture stack: {}", cfg.capture_stack);
    tracing::info!(%addr, capacity = cfg.capacity, "sidecar recorder started");

    server::run_server(collector, addr).await
}

fn load_exchanges(path: &Path) -> anyhow::Result<Vec<Exchange>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("read exchanges from {}", path.display()))?;
    parse_exchanges(&raw).with_context(|| format!("parse {}", path.display()))
}

fn parse_exchanges(raw: &str) -> anyhow::Result<Vec<Exchange>> {
    raw.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            serde_json::from_str::<Exchange>(line)
                .with_context(|| format!("invalid exchange on line {}", idx + 1))
        })
        .collect()
}

fn offline_collector(cfg: &Config, exchanges: Vec<Exchange>) -> anyhow::Result<RecorderCollector> {
    let recorder = Recorder::new(exchanges.len().max(1))?;
    for exchange in exchanges {
        let kind = if exchange.response.is_some() {
            EventKind::Complete
        } else {
            EventKind::Error
        };
        recorder.record(kind, RawTransaction::Exchange(exchange));
    }
    Ok(RecorderCollector::new(recorder, Normalizer::from_config(cfg)))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
