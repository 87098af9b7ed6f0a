use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{HttpRemoteService, RemoteService, Resolution, SessionController};
use shared::{
    domain::{EffectMix, PitchShift, RemixParameters, Tempo},
    protocol::ArtifactRef,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

#[derive(Parser, Debug)]
#[command(name = "remixer", about = "Client for the remote audio remix service")]
struct Cli {
    /// Overrides the backend URL from config and environment.
    #[arg(long)]
    backend_url: Option<String>,
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Probe the backend status and health endpoints.
    Status,
    /// Ingest audio from a URL.
    Url { url: String },
    /// Select, upload, and remix local files in one go.
    Remix {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[arg(long, default_value_t = Tempo::DEFAULT, allow_negative_numbers = true)]
        tempo: i32,
        #[arg(long, default_value_t = PitchShift::DEFAULT, allow_negative_numbers = true)]
        pitch: i32,
        #[arg(long, default_value_t = EffectMix::DEFAULT, allow_negative_numbers = true)]
        effect_mix: i32,
        /// Write the result payload here instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Download a stem or separated track by service path.
    Download {
        path: String,
        /// Treat `path` as relative to the separated-output root.
        #[arg(long)]
        separated: bool,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Start an interactive session.
    Session,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    let mut settings = config::load_settings(cli.config.as_deref())?;
    if let Some(url) = cli.backend_url {
        settings.backend_url = url;
    }
    let remote = Arc::new(
        HttpRemoteService::with_timeouts(
            &settings.backend_url,
            settings.connect_timeout(),
            settings.request_timeout(),
        )
        .with_context(|| format!("cannot use backend url '{}'", settings.backend_url))?,
    );
    let session = SessionController::new(remote.clone());
    info!(session = %session.id(), backend = %remote.base_url(), "session started");

    match cli.command {
        Command::Status => {
            let shown = session.refresh_backend_status().await?;
            println!("Backend status: {shown}");
            match remote.probe_health().await {
                Ok(()) => println!("Health: OK"),
                Err(err) => println!("Health: unavailable ({err})"),
            }
        }
        Command::Url { url } => {
            let resolution = session.submit_url(&url).await?;
            let snapshot = session.snapshot().await;
            println!("{}", snapshot.status_message);
            for artifact in &snapshot.artifacts {
                println!("  {}", artifact.path());
            }
            finish(resolution, &snapshot.status_message)?;
        }
        Command::Remix {
            files,
            tempo,
            pitch,
            effect_mix,
            output,
        } => {
            let params = RemixParameters::try_new(tempo, pitch, effect_mix)?;
            session
                .select_files(commands::read_inputs(&files).await?)
                .await?;
            session.set_tempo(params.tempo.get()).await?;
            session.set_pitch_shift(params.pitch_shift.get()).await?;
            session.set_effect_mix(params.effect_mix.get()).await?;

            let uploaded = session.upload().await?;
            println!("{}", session.snapshot().await.status_message);
            finish(uploaded, &session.snapshot().await.status_message)?;

            let generated = session.generate().await?;
            let snapshot = session.snapshot().await;
            println!("{}", snapshot.status_message);
            finish(generated, &snapshot.status_message)?;

            if let Some(result) = snapshot.last_result {
                let rendered = serde_json::to_string_pretty(&result.payload)?;
                match output {
                    Some(path) => {
                        tokio::fs::write(&path, rendered)
                            .await
                            .with_context(|| format!("failed to write '{}'", path.display()))?;
                        println!("saved {}", path.display());
                    }
                    None => println!("{rendered}"),
                }
            }
        }
        Command::Download {
            path,
            separated,
            output,
        } => {
            let artifact = if separated {
                ArtifactRef::Separated(path)
            } else {
                ArtifactRef::Stem(path)
            };
            let resolution = session.download_artifact(artifact.clone()).await?;
            let status = session.snapshot().await.status_message;
            match resolution {
                Resolution::Succeeded(bytes) => {
                    let target =
                        commands::write_artifact(&artifact, output.as_deref(), &bytes).await?;
                    println!("{status} Saved to {}", target.display());
                }
                Resolution::Failed => bail!("{status}"),
            }
        }
        Command::Session => commands::run_interactive(&session).await?,
    }

    Ok(())
}

fn finish(resolution: Resolution, status: &str) -> Result<()> {
    match resolution {
        Resolution::Succeeded(()) => Ok(()),
        Resolution::Failed => bail!("{status}"),
    }
}
