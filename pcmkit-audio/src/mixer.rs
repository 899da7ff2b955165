use crate::error::{ConfigError, Operation, Result};
use crate::format::SampleFormat;
use crate::slots::ChannelSlots;
use crate::worker::WorkerPool;
use crate::{OnRoundCb, SAMPLES_PER_BUFFER, dsp};
use bytes::{Bytes, BytesMut};
use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use tracing::instrument;

/// Downmixes one buffer per channel into a single channel.
///
/// Same round protocol as [`crate::Zipper`]. The mix is computed in place in the buffer written
/// for channel 0, which is then handed to the session's `on_round` callback.
pub struct Mixer {
    inner: Arc<MixerInner>,
    pool: WorkerPool,
}

struct MixerInner {
    format: SampleFormat,
    slots: ChannelSlots<BytesMut>,
    on_round: OnRoundCb,
}

impl Mixer {
    #[instrument(level = "debug", skip(pool, on_round), err)]
    pub fn new(
        channels: usize,
        sample_alignment: usize,
        format: SampleFormat,
        pool: &WorkerPool,
        on_round: impl Fn(Result<Bytes>) + Send + Sync + 'static,
    ) -> Result<Self> {
        crate::validate_channels(channels)?;
        crate::validate_alignment(sample_alignment)?;
        if sample_alignment != format.alignment() {
            return Err(ConfigError::AlignmentMismatch {
                format,
                alignment: sample_alignment,
                expected: format.alignment(),
            }
            .into());
        }

        Ok(Self {
            inner: Arc::new(MixerInner {
                format,
                slots: ChannelSlots::new(Operation::Mixing, channels, sample_alignment),
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

    pub fn format(&self) -> SampleFormat {
        self.inner.format
    }

    pub fn samples_per_buffer(&self) -> usize {
        SAMPLES_PER_BUFFER
    }

    pub fn is_mixing(&self) -> bool {
        self.inner.slots.is_busy()
    }

    /// Snapshot of the buffers written for the current round. Empty while a round runs.
    pub fn channel_buffers(&self) -> Vec<Option<BytesMut>> {
        self.inner.slots.buffers()
    }

    pub fn channels_ready(&self) -> Vec<bool> {
        self.inner.slots.ready()
    }

    /// Submits the samples of `channel` for the current round.
    ///
    /// `Ok` acknowledges the write. The buffer of channel 0 is overwritten by the mix.
    #[instrument(level = "trace", skip(self, buffer), fields(len = buffer.len()))]
    pub fn write(&self, channel: usize, buffer: BytesMut) -> Result<()> {
        let Some(planes) = self.inner.slots.write(channel, buffer)? else {
            return Ok(());
        };

        tracing::trace!(channels = planes.len(), format = %self.inner.format, "All channels ready, mixing");
        let inner = self.inner.clone();
        let pool = self.pool.clone();
        self.pool.spawn(async move {
            let result = {
                let format = inner.format;
                pool.offload(move || mix_round(format, planes)).await
            };
            inner.slots.finish_round();
            (inner.on_round)(result);
        });

        Ok(())
    }
}

fn mix_round(format: SampleFormat, mut planes: Vec<BytesMut>) -> Bytes {
    dsp::mix_in_place(format, &mut planes);
    planes
        .into_iter()
        .next()
        .map(BytesMut::freeze)
        .unwrap_or_default()
}

impl Debug for Mixer {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mixer")
            .field("format", &self.inner.format)
            .field("slots", &self.inner.slots)
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}
