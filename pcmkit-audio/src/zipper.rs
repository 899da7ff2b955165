use crate::error::{Operation, Result};
use crate::slots::ChannelSlots;
use crate::worker::WorkerPool;
use crate::{OnRoundCb, SAMPLES_PER_BUFFER, dsp};
use bytes::Bytes;
use parking_lot::Mutex;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use tracing::instrument;

/// Interleaves one planar buffer per channel into a single multi-channel buffer.
///
/// Every channel is written once per round. The write completing the set starts the round, its
/// interleaved output is passed to the session's `on_round` callback after the slots have been
/// reset for the next round.
pub struct Zipper {
    inner: Arc<ZipperInner>,
    pool: WorkerPool,
}

struct ZipperInner {
    slots: ChannelSlots<Bytes>,
    output: Mutex<Vec<u8>>,
    on_round: OnRoundCb,
}

impl Zipper {
    #[instrument(level = "debug", skip(pool, on_round), err)]
    pub fn new(
        channels: usize,
        sample_alignment: usize,
        pool: &WorkerPool,
        on_round: impl Fn(Result<Bytes>) + Send + Sync + 'static,
    ) -> Result<Self> {
        crate::validate_channels(channels)?;
        crate::validate_alignment(sample_alignment)?;

        Ok(Self {
            inner: Arc::new(ZipperInner {
                slots: ChannelSlots::new(Operation::Zipping, channels, sample_alignment),
                output: Mutex::new(vec![0u8; sample_alignment * channels * SAMPLES_PER_BUFFER]),
                on_round: Arc::new(on_round),
            }),
            pool: pool.clone(),
        })
    }

    pub fn channels(&self) -> usize {
        self.inner.slots.channels()
    }

    pub fn sample_alignment(&self) -> usize {
        self.inner.slots.sample_alignment()
    }

    pub fn samples_per_buffer(&self) -> usize {
        SAMPLES_PER_BUFFER
    }

    pub fn is_zipping(&self) -> bool {
        self.inner.slots.is_busy()
    }

    /// Snapshot of the buffers written for the current round. Empty while a round runs.
    pub fn channel_buffers(&self) -> Vec<Option<Bytes>> {
        self.inner.slots.buffers()
    }

    pub fn channels_ready(&self) -> Vec<bool> {
        self.inner.slots.ready()
    }

    /// Submits the samples of `channel` for the current round.
    ///
    /// `Ok` acknowledges the write. Rejected writes leave the session untouched.
    #[instrument(level = "trace", skip(self, buffer), fields(len = buffer.len()))]
    pub fn write(&self, channel: usize, buffer: Bytes) -> Result<()> {
        let Some(planes) = self.inner.slots.write(channel, buffer)? else {
            return Ok(());
        };

        tracing::trace!(channels = planes.len(), "All channels ready, zipping");
        let inner = self.inner.clone();
        let pool = self.pool.clone();
        self.pool.spawn(async move {
            let result = {
                let inner = inner.clone();
                pool.offload(move || inner.zip_round(&planes)).await
            };
            inner.slots.finish_round();
            (inner.on_round)(result);
        });

        Ok(())
    }
}

impl ZipperInner {
    fn zip_round(&self, planes: &[Bytes]) -> Bytes {
        let sample_alignment = self.slots.sample_alignment();
        let samples = planes.first().map_or(0, |plane| plane.len() / sample_alignment);
        let len = samples * sample_alignment * planes.len();

        let mut output = self.output.lock();
        dsp::interleave(planes, sample_alignment, &mut output[..len]);
        Bytes::copy_from_slice(&output[..len])
    }
}

impl Debug for Zipper {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Zipper")
            .field("slots", &self.inner.slots)
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}
