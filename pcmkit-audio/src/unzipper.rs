use crate::SAMPLES_PER_BUFFER;
use crate::dsp;
use crate::error::{Error, Operation, Result};
use crate::worker::{BusyGuard, WorkerPool};
use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::instrument;

/// One round of a [`Unzipper::unzip`] call, one planar buffer per channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnzippedRound {
    pub channels: Vec<Bytes>,
    pub is_final: bool,
}

/// Splits interleaved multi-channel audio into one buffer per channel.
#[derive(Debug)]
pub struct Unzipper {
    inner: Arc<UnzipperInner>,
    pool: WorkerPool,
}

#[derive(Debug)]
struct UnzipperInner {
    channels: usize,
    sample_alignment: usize,
    scratch: Mutex<Vec<Vec<u8>>>,
    busy: Arc<AtomicBool>,
}

impl Unzipper {
    #[instrument(level = "debug", skip(pool), err)]
    pub fn new(channels: usize, sample_alignment: usize, pool: &WorkerPool) -> Result<Self> {
        crate::validate_channels(channels)?;
        crate::validate_alignment(sample_alignment)?;

        Ok(Self {
            inner: Arc::new(UnzipperInner {
                channels,
                sample_alignment,
                scratch: Mutex::new(vec![
                    vec![0u8; sample_alignment * SAMPLES_PER_BUFFER];
                    channels
                ]),
                busy: Arc::new(AtomicBool::new(false)),
            }),
            pool: pool.clone(),
        })
    }

    pub fn channels(&self) -> usize {
        self.inner.channels
    }

    pub fn sample_alignment(&self) -> usize {
        self.inner.sample_alignment
    }

    pub fn is_unzipping(&self) -> bool {
        self.inner.busy.load(Ordering::Acquire)
    }

    /// Starts splitting `chunk`, calling `on_round` once per round of at most
    /// [`SAMPLES_PER_BUFFER`] frames.
    ///
    /// A trailing partial frame is dropped. The busy flag is cleared before the final round is
    /// delivered.
    #[instrument(level = "debug", skip(self, chunk, on_round), fields(chunk_len = chunk.len()), err)]
    pub fn unzip<F>(&self, chunk: Bytes, mut on_round: F) -> Result<JoinHandle<()>>
    where
        F: FnMut(Result<UnzippedRound>) + Send + 'static,
    {
        let guard = BusyGuard::try_acquire(&self.inner.busy, Operation::Unzipping)?;

        let frame_alignment = self.inner.frame_alignment();
        let total = chunk.len() / frame_alignment;
        let trailing = chunk.len() % frame_alignment;
        if trailing > 0 {
            tracing::warn!(trailing, frame_alignment, "Dropping trailing partial frame");
        }

        let inner = self.inner.clone();
        let pool = self.pool.clone();
        Ok(self.pool.spawn(async move {
            let mut unzipped = 0;
            loop {
                let frames = (total - unzipped).min(SAMPLES_PER_BUFFER);
                let round = {
                    let inner = inner.clone();
                    let chunk = chunk.clone();
                    pool.offload(move || inner.unzip_round(&chunk, unzipped, frames))
                        .await
                };

                let channels = match round {
                    Ok(channels) => channels,
                    Err(err) => {
                        drop(guard);
                        on_round(Err(err));
                        return;
                    }
                };

                unzipped += frames;
                let is_final = unzipped >= total;
                tracing::trace!(unzipped, total, is_final, "Unzipped round");

                if is_final {
                    drop(guard);
                    on_round(Ok(UnzippedRound { channels, is_final }));
                    return;
                }
                on_round(Ok(UnzippedRound { channels, is_final }));
            }
        }))
    }

    /// Splits `chunk` completely and returns every channel's samples in one buffer.
    pub async fn unzip_all(&self, chunk: Bytes) -> Result<Vec<Bytes>> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        self.unzip(chunk, move |result| {
            let _ = tx.send(result);
        })?;

        let mut channels = vec![BytesMut::new(); self.inner.channels];
        while let Some(result) = rx.recv().await {
            let round = result?;
            for (output, buffer) in channels.iter_mut().zip(&round.channels) {
                output.extend_from_slice(buffer);
            }
            if round.is_final {
                return Ok(channels.into_iter().map(BytesMut::freeze).collect());
            }
        }

        Err(Error::Worker(
            "unzipping stopped before the final round".to_string(),
        ))
    }
}

impl UnzipperInner {
    fn frame_alignment(&self) -> usize {
        self.sample_alignment * self.channels
    }

    fn unzip_round(&self, chunk: &[u8], offset: usize, frames: usize) -> Vec<Bytes> {
        let frame_alignment = self.frame_alignment();
        let input = &chunk[offset * frame_alignment..(offset + frames) * frame_alignment];

        let mut scratch = self.scratch.lock();
        dsp::deinterleave(input, self.sample_alignment, &mut scratch);

        let len = frames * self.sample_alignment;
        scratch
            .iter()
            .map(|plane| Bytes::copy_from_slice(&plane[..len]))
            .collect()
    }
}
