mod reader;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use queque::{CancellationToken, Client, Config, HandlerError, Meta, Verdict};

#[tokio::main]
pub async fn main() -> ExitCode {
    env_logger::init();

    match Cli::parse().run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "queque")]
#[command(about = "produce to and consume from SQS-compatible queues", long_about = None)]
pub struct Cli {
    /// JSON config file; flags and environment variables override its values
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Queue name, created on first use if missing
    #[arg(long, env = "QUEQUE_QUEUE_NAME", global = true)]
    queue: Option<String>,

    #[arg(long, env = "QUEQUE_REGION", global = true)]
    region: Option<String>,

    /// Endpoint URL, e.g. http://localhost:4566 for LocalStack
    #[arg(long, env = "QUEQUE_ENDPOINT", global = true)]
    endpoint: Option<String>,

    #[arg(long, env = "QUEQUE_ACCESS_KEY", global = true, hide_env_values = true)]
    access_key: Option<String>,

    #[arg(
        long,
        env = "QUEQUE_SECRET_ACCESS_KEY",
        global = true,
        hide_env_values = true
    )]
    secret_access_key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print every received payload as a JSON line and settle it with a fixed verdict
    Consume {
        #[arg(long, value_enum, default_value_t = VerdictArg::Acknowledge)]
        verdict: VerdictArg,

        /// Deferrals past this attempt count drop the message
        #[arg(long)]
        max_retry_count: Option<u32>,

        /// Seconds per attempt a deferred message stays invisible
        #[arg(long)]
        retry_timestep: Option<u64>,

        /// Messages per receive call (1-10)
        #[arg(long)]
        batch_size: Option<i32>,

        /// Settle a single batch and exit
        #[arg(long)]
        once: bool,
    },
    /// Send every JSON line read from stdin; lines that are not JSON are sent as strings
    Produce,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum VerdictArg {
    Acknowledge,
    Reject,
    Defer,
}

impl From<VerdictArg> for Verdict {
    fn from(value: VerdictArg) -> Self {
        match value {
            VerdictArg::Acknowledge => Verdict::Acknowledge,
            VerdictArg::Reject => Verdict::Reject,
            VerdictArg::Defer => Verdict::Defer,
        }
    }
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let mut config = self.base_config()?;

        match self.command {
            Commands::Consume {
                verdict,
                max_retry_count,
                retry_timestep,
                batch_size,
                once,
            } => {
                if let Some(max_retry_count) = max_retry_count {
                    config.max_retry_count = max_retry_count;
                }
                if let Some(retry_timestep) = retry_timestep {
                    config.retry_timestep_seconds = retry_timestep;
                }
                if let Some(batch_size) = batch_size {
                    config.batch_size = batch_size;
                }
                config.validate().context("invalid configuration")?;
                consume(config, verdict.into(), once).await
            }
            Commands::Produce => {
                config.validate().context("invalid configuration")?;
                produce(config).await
            }
        }
    }

    /// Config file (if any) with the global flags applied on top.
    fn base_config(&self) -> anyhow::Result<Config> {
        let mut config = match (&self.config, &self.queue) {
            (Some(path), _) => Config::from_file(path)
                .with_context(|| format!("failed to load {}", path.display()))?,
            (None, Some(queue)) => Config::new(queue.clone()),
            (None, None) => anyhow::bail!(
                "a queue name is required: pass --queue, set QUEQUE_QUEUE_NAME or use --config"
            ),
        };

        if let Some(queue) = &self.queue {
            config.queue_name = queue.clone();
        }
        if let Some(region) = &self.region {
            config.region = Some(region.clone());
        }
        if let Some(endpoint) = &self.endpoint {
            config.endpoint_url = Some(endpoint.clone());
        }
        if let Some(access_key) = &self.access_key {
            config.access_key = Some(access_key.clone());
        }
        if let Some(secret_access_key) = &self.secret_access_key {
            config.secret_access_key = Some(secret_access_key.clone());
        }

        Ok(config)
    }
}

async fn consume(config: Config, verdict: Verdict, once: bool) -> anyhow::Result<()> {
    let client = Client::new(config).await;
    let cancel = CancellationToken::new();
    shutdown_on_ctrl_c(cancel.clone());

    let handler = Arc::new(
        move |_cancel: CancellationToken, payload: serde_json::Value, meta: Meta| async move {
            println!("{payload}");
            log::debug!("attempt {} settled as {verdict}", meta.attempt_count);
            Ok::<_, HandlerError>(verdict)
        },
    );

    if once {
        let report = client
            .consume::<serde_json::Value, _>(&cancel, &handler)
            .await?;
        log::info!(
            "settled {} messages: {} acknowledged, {} requeued",
            report.received,
            report.acknowledged,
            report.requeued
        );
        return Ok(());
    }

    client
        .run::<serde_json::Value, _>(&cancel, handler)
        .await
        .context("consumer stopped")
}

async fn produce(config: Config) -> anyhow::Result<()> {
    let client = Client::new(config).await;
    client.connect().await?;

    let (h_stdin, mut rx_stdin) = reader::concurrent_lines(tokio::io::stdin(), 100);

    let mut sent = 0;
    let batch_size = queque::MAX_BATCH_SIZE as usize;
    let mut batch = Vec::with_capacity(batch_size);
    while let Some(line) = rx_stdin.recv().await {
        if line.trim().is_empty() {
            continue;
        }
        batch.push(parse_line(line));

        if batch.len() == batch_size {
            client.produce(&batch).await?;
            sent += batch.len();
            batch.clear();
        }
    }
    if !batch.is_empty() {
        client.produce(&batch).await?;
        sent += batch.len();
    }

    h_stdin.await.context("stdin reader failed")?;
    log::info!("sent {sent} messages");
    Ok(())
}

fn parse_line(line: String) -> serde_json::Value {
    serde_json::from_str(&line).unwrap_or(serde_json::Value::String(line))
}

fn shutdown_on_ctrl_c(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("shutting down");
            cancel.cancel();
        }
    });
}
