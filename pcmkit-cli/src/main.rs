mod commands;
mod config;

use crate::config::AppConfig;
use clap::{Parser, Subcommand};
use pcmkit_audio::{SampleFormat, WorkerPool};
use std::path::PathBuf;
use tokio::runtime::Handle;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(version)]
#[command(about = "Convert, split, interleave and downmix headerless PCM files")]
struct CliArgs {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert every sample of a file to another sample format
    Format {
        #[arg(long)]
        from: SampleFormat,
        #[arg(long)]
        to: SampleFormat,
        input: PathBuf,
        output: PathBuf,
    },
    /// Split an interleaved file into one file per channel, named `<prefix>.<channel>.raw`
    Unzip {
        #[arg(long)]
        channels: usize,
        /// Bytes per sample
        #[arg(long)]
        alignment: usize,
        input: PathBuf,
        prefix: PathBuf,
    },
    /// Interleave equally sized planar files, one per channel
    Zip {
        /// Bytes per sample
        #[arg(long)]
        alignment: usize,
        output: PathBuf,
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },
    /// Downmix equally sized planar files into a single channel
    Mix {
        #[arg(long)]
        format: SampleFormat,
        output: PathBuf,
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    let config = AppConfig::parse()?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.filter.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::trace!(?config, "Parsed config");

    let pool = WorkerPool::new(Handle::current(), &config.engine.worker);
    match args.command {
        Command::Format {
            from,
            to,
            input,
            output,
        } => {
            commands::format(&pool, &config.engine.formatter, from, to, &input, &output).await?;
        }
        Command::Unzip {
            channels,
            alignment,
            input,
            prefix,
        } => {
            commands::unzip(&pool, channels, alignment, &input, &prefix).await?;
        }
        Command::Zip {
            alignment,
            output,
            inputs,
        } => {
            commands::zip(&pool, alignment, &inputs, &output).await?;
        }
        Command::Mix {
            format,
            output,
            inputs,
        } => {
            commands::mix(&pool, format, &inputs, &output).await?;
        }
    }

    Ok(())
}
