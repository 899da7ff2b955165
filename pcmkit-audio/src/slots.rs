use crate::SAMPLES_PER_BUFFER;
use crate::error::{ConcurrencyError, Error, Operation, Result};
use parking_lot::Mutex;

/// Per-channel submission slots of a [`crate::Zipper`] or [`crate::Mixer`].
///
/// Each channel may be written once per round. The write that completes the set marks the slots
/// busy and hands every buffer over to the round; the ready bits stay set until
/// [`ChannelSlots::finish_round`] clears everything under the same lock.
#[derive(Debug)]
pub(crate) struct ChannelSlots<B> {
    operation: Operation,
    channels: usize,
    sample_alignment: usize,
    state: Mutex<SlotState<B>>,
}

#[derive(Debug)]
struct SlotState<B> {
    buffers: Vec<Option<B>>,
    ready: u64,
    busy: bool,
}

impl<B: AsRef<[u8]>> ChannelSlots<B> {
    pub(crate) fn new(operation: Operation, channels: usize, sample_alignment: usize) -> Self {
        debug_assert!((1..=crate::MAX_CHANNELS).contains(&channels));
        Self {
            operation,
            channels,
            sample_alignment,
            state: Mutex::new(SlotState {
                buffers: (0..channels).map(|_| None).collect(),
                ready: 0,
                busy: false,
            }),
        }
    }

    pub(crate) fn channels(&self) -> usize {
        self.channels
    }

    pub(crate) fn sample_alignment(&self) -> usize {
        self.sample_alignment
    }

    fn all_ready(&self) -> u64 {
        if self.channels == crate::MAX_CHANNELS {
            u64::MAX
        } else {
            (1u64 << self.channels) - 1
        }
    }

    /// Stores `buffer` for `channel`. Returns the buffers of all channels, in channel order, if this
    /// write completed the round. Rejected writes leave the slots untouched.
    pub(crate) fn write(&self, channel: usize, buffer: B) -> Result<Option<Vec<B>>> {
        let mut state = self.state.lock();

        if state.busy {
            return Err(ConcurrencyError::Busy(self.operation).into());
        }
        if channel >= self.channels {
            return Err(Error::ChannelOutOfRange {
                channel,
                channels: self.channels,
            });
        }
        let bit = 1u64 << channel;
        if state.ready & bit != 0 {
            return Err(ConcurrencyError::AlreadyReady(channel).into());
        }
        self.validate(&state, channel, buffer.as_ref())?;

        state.buffers[channel] = Some(buffer);
        state.ready |= bit;
        tracing::trace!(
            channel,
            ready = state.ready.count_ones(),
            channels = self.channels,
            "Channel ready"
        );

        if state.ready != self.all_ready() {
            return Ok(None);
        }

        state.busy = true;
        Ok(Some(
            state.buffers.iter_mut().filter_map(Option::take).collect(),
        ))
    }

    fn validate(&self, state: &SlotState<B>, channel: usize, bytes: &[u8]) -> Result<()> {
        let invalid = |reason: String| Error::InvalidBuffer { channel, reason };

        if bytes.len() % self.sample_alignment != 0 {
            return Err(invalid(format!(
                "length {} is not a multiple of the sample alignment {}",
                bytes.len(),
                self.sample_alignment
            )));
        }

        let samples = bytes.len() / self.sample_alignment;
        if samples > SAMPLES_PER_BUFFER {
            return Err(invalid(format!(
                "holds {samples} samples, at most {SAMPLES_PER_BUFFER} fit into one round"
            )));
        }

        if let Some(other) = state.buffers.iter().flatten().next() {
            let expected = other.as_ref().len() / self.sample_alignment;
            if expected != samples {
                return Err(invalid(format!(
                    "holds {samples} samples, other channels of this round hold {expected}"
                )));
            }
        }

        Ok(())
    }

    /// Resets every slot to empty and accepts writes for the next round.
    pub(crate) fn finish_round(&self) {
        let mut state = self.state.lock();
        state.buffers.iter_mut().for_each(|buffer| *buffer = None);
        state.ready = 0;
        state.busy = false;
    }

    pub(crate) fn is_busy(&self) -> bool {
        self.state.lock().busy
    }

    pub(crate) fn ready(&self) -> Vec<bool> {
        let ready = self.state.lock().ready;
        (0..self.channels)
            .map(|channel| ready & (1u64 << channel) != 0)
            .collect()
    }

    pub(crate) fn buffers(&self) -> Vec<Option<B>>
    where
        B: Clone,
    {
        self.state.lock().buffers.clone()
    }
}
