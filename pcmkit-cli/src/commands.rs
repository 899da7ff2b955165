use anyhow::Context;
use bytes::{Bytes, BytesMut};
use pcmkit_audio::config::FormatterConfig;
use pcmkit_audio::{
    Formatter, Mixer, SAMPLES_PER_BUFFER, SampleFormat, Unzipper, WorkerPool, Zipper,
};
use std::ops::Range;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::mpsc;

pub async fn format(
    pool: &WorkerPool,
    config: &FormatterConfig,
    from: SampleFormat,
    to: SampleFormat,
    input: &Path,
    output: &Path,
) -> anyhow::Result<()> {
    let data = read(input).await?;
    let formatter =
        Formatter::with_config(from, to, config, pool).context("Failed to create formatter")?;

    let converted = formatter
        .format_all(data)
        .await
        .context("Failed to format samples")?;
    write(output, &converted).await?;

    tracing::info!(%from, %to, output = %output.display(), bytes = converted.len(), "Formatted samples");
    Ok(())
}

pub async fn unzip(
    pool: &WorkerPool,
    channels: usize,
    sample_alignment: usize,
    input: &Path,
    prefix: &Path,
) -> anyhow::Result<Vec<PathBuf>> {
    let data = read(input).await?;
    let unzipper =
        Unzipper::new(channels, sample_alignment, pool).context("Failed to create unzipper")?;

    let planes = unzipper
        .unzip_all(data)
        .await
        .context("Failed to unzip samples")?;

    let mut outputs = Vec::with_capacity(planes.len());
    for (channel, plane) in planes.iter().enumerate() {
        let output = channel_path(prefix, channel);
        write(&output, plane).await?;
        outputs.push(output);
    }

    tracing::info!(channels, prefix = %prefix.display(), "Unzipped samples");
    Ok(outputs)
}

pub async fn zip(
    pool: &WorkerPool,
    sample_alignment: usize,
    inputs: &[PathBuf],
    output: &Path,
) -> anyhow::Result<()> {
    let planes = read_planes(inputs).await?;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let zipper = Zipper::new(planes.len(), sample_alignment, pool, move |result| {
        let _ = tx.send(result);
    })
    .context("Failed to create zipper")?;

    let mut zipped = BytesMut::new();
    for range in rounds(planes[0].len(), sample_alignment) {
        for (channel, plane) in planes.iter().enumerate() {
            zipper
                .write(channel, plane.slice(range.clone()))
                .with_context(|| format!("Failed to write channel {channel}"))?;
        }
        let round = rx.recv().await.context("Zipper stopped")?;
        zipped.extend_from_slice(&round.context("Failed to zip round")?);
    }
    write(output, &zipped).await?;

    tracing::info!(channels = planes.len(), output = %output.display(), bytes = zipped.len(), "Zipped samples");
    Ok(())
}

pub async fn mix(
    pool: &WorkerPool,
    format: SampleFormat,
    inputs: &[PathBuf],
    output: &Path,
) -> anyhow::Result<()> {
    let planes = read_planes(inputs).await?;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mixer = Mixer::new(planes.len(), format.alignment(), format, pool, move |result| {
        let _ = tx.send(result);
    })
    .context("Failed to create mixer")?;

    let mut mixed = BytesMut::new();
    for range in rounds(planes[0].len(), format.alignment()) {
        for (channel, plane) in planes.iter().enumerate() {
            mixer
                .write(channel, BytesMut::from(&plane[range.clone()]))
                .with_context(|| format!("Failed to write channel {channel}"))?;
        }
        let round = rx.recv().await.context("Mixer stopped")?;
        mixed.extend_from_slice(&round.context("Failed to mix round")?);
    }
    write(output, &mixed).await?;

    tracing::info!(channels = planes.len(), %format, output = %output.display(), "Mixed samples");
    Ok(())
}

fn channel_path(prefix: &Path, channel: usize) -> PathBuf {
    let mut name = prefix.as_os_str().to_owned();
    name.push(format!(".{channel}.raw"));
    PathBuf::from(name)
}

/// Byte ranges of consecutive rounds of at most [`SAMPLES_PER_BUFFER`] samples.
fn rounds(len: usize, sample_alignment: usize) -> impl Iterator<Item = Range<usize>> {
    let round_len = SAMPLES_PER_BUFFER * sample_alignment;
    (0..len)
        .step_by(round_len)
        .map(move |start| start..(start + round_len).min(len))
}

async fn read_planes(inputs: &[PathBuf]) -> anyhow::Result<Vec<Bytes>> {
    let mut planes = Vec::with_capacity(inputs.len());
    for input in inputs {
        planes.push(read(input).await?);
    }

    let Some(len) = planes.first().map(Bytes::len) else {
        anyhow::bail!("No input files given");
    };
    if let Some((input, plane)) = inputs.iter().zip(&planes).find(|(_, p)| p.len() != len) {
        anyhow::bail!(
            "Input {} holds {} bytes, expected {len} like {}",
            input.display(),
            plane.len(),
            inputs[0].display()
        );
    }

    Ok(planes)
}

async fn read(path: &Path) -> anyhow::Result<Bytes> {
    let data = fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    tracing::debug!(path = %path.display(), bytes = data.len(), "Read input");
    Ok(Bytes::from(data))
}

async fn write(path: &Path, data: &[u8]) -> anyhow::Result<()> {
    fs::write(path, data)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))
}
