mod options;

use anyhow::{Context, bail};
use clap::Parser;
use retdec_client::{ClientConfig, RetdecClient};
use retdec_core::prelude::*;
use retdec_fs::FileSaveConsumer;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use options::DecompileArgs;

#[derive(Parser, Debug)]
#[command(name = "retdec", version, about = "Decompile executables with the retdec service")]
struct Cli {
    /// API key of the service.
    #[arg(long, env = "RETDEC_API_KEY")]
    api_key: Option<String>,

    /// Root URL of the service API.
    #[arg(long, env = "RETDEC_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Seconds between two status requests.
    #[arg(long, default_value_t = DEFAULT_POLL_INTERVAL.as_secs())]
    poll_interval: u64,

    /// Follow a previous decompilation instead of submitting a new one.
    #[arg(long, conflicts_with = "input")]
    id: Option<String>,

    /// The file to decompile.
    #[arg(long, required_unless_present_any = ["id", "echo"])]
    input: Option<PathBuf>,

    /// Decompilation mode: c|bin|raw.
    #[arg(long, default_value = "c")]
    mode: Mode,

    /// Directory the outputs are saved to.
    #[arg(long, default_value = ".")]
    outdir: PathBuf,

    /// Only save these outputs (hll,dsm,cg,cfgs,archive,binary). Saves everything if omitted.
    #[arg(long, value_delimiter = ',')]
    outputs: Vec<OutputKind>,

    /// Check connectivity and the API key, then exit.
    #[arg(long)]
    echo: bool,

    #[command(flatten)]
    options: DecompileArgs,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,retdec_client=info,retdec_cli=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let client = RetdecClient::with_config(ClientConfig {
        base_url: cli.base_url.clone(),
        api_key: cli.api_key.clone(),
        poll_interval: Duration::from_secs(cli.poll_interval),
        timeout: None,
    })?;

    if cli.echo {
        let echoed = client
            .echo(&[("client", "retdec")])
            .await
            .context("Echo request failed")?;
        println!("{}", serde_json::to_string_pretty(&echoed)?);
        return Ok(());
    }

    let handle = match (&cli.id, &cli.input) {
        (Some(id), _) => client.resume(id),
        (None, Some(input)) => {
            let job = cli
                .options
                .into_descriptor(cli.mode, InputFile::from_path(input))?;
            client
                .submit(&job)
                .await
                .with_context(|| format!("Submitting {}", input.display()))?
        }
        (None, None) => bail!("Either --input or --id is required"),
    };

    let mut consumer = FileSaveConsumer::new(&cli.outdir);
    if !cli.outputs.is_empty() {
        consumer = consumer.with_kinds(cli.outputs.iter().copied());
    }

    let cancel = CancellationToken::new();
    let task = client.spawn_with_token(handle, consumer, cancel.clone());
    let id = task.id().to_string();

    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, cancelling");
            cancel.cancel();
        }
    });

    let consumer = task.join().await?;
    interrupt.abort();

    if let Some(error) = consumer.error() {
        bail!("Decompilation {id} failed: {error}");
    }

    if let Some(status) = consumer.status().filter(|s| s.failed) {
        tracing::warn!(
            job = %id,
            error = status.error.as_deref().unwrap_or_default(),
            "The service reported a failed decompilation"
        );
    }

    eprintln!(
        "Saved {} output(s) to {}",
        consumer.saved().len(),
        cli.outdir.display()
    );
    Ok(())
}
