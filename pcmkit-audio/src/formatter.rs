use crate::SAMPLES_PER_BUFFER;
use crate::config::FormatterConfig;
use crate::dsp;
use crate::error::{Error, Operation, Result};
use crate::format::{Conversion, IntToFloat, SampleFormat};
use crate::worker::{BusyGuard, WorkerPool};
use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::instrument;

/// One converted step of a [`Formatter::format`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedChunk {
    pub buffer: Bytes,
    /// Set on the last step of the call. Earlier steps are continuations, not errors.
    pub is_final: bool,
}

/// Converts sample buffers from one [`SampleFormat`] to another.
///
/// Input is processed in steps of at most [`SAMPLES_PER_BUFFER`] samples, each converted into the
/// session's scratch buffer on a worker thread and delivered as a copy. Only one `format` call may
/// be in flight per session.
#[derive(Debug)]
pub struct Formatter {
    inner: Arc<FormatterInner>,
    pool: WorkerPool,
}

#[derive(Debug)]
struct FormatterInner {
    input: SampleFormat,
    output: SampleFormat,
    conversion: Conversion,
    mode: IntToFloat,
    scratch: Mutex<Vec<u8>>,
    busy: Arc<AtomicBool>,
}

impl Formatter {
    pub fn new(input: SampleFormat, output: SampleFormat, pool: &WorkerPool) -> Result<Self> {
        Self::with_config(input, output, &FormatterConfig::default(), pool)
    }

    #[instrument(level = "debug", skip(pool), err)]
    pub fn with_config(
        input: SampleFormat,
        output: SampleFormat,
        config: &FormatterConfig,
        pool: &WorkerPool,
    ) -> Result<Self> {
        let conversion = Conversion::resolve(input, output)?;

        let formatter = Self {
            inner: Arc::new(FormatterInner {
                input,
                output,
                conversion,
                mode: config.int_to_float,
                scratch: Mutex::new(vec![0u8; output.alignment() * SAMPLES_PER_BUFFER]),
                busy: Arc::new(AtomicBool::new(false)),
            }),
            pool: pool.clone(),
        };

        tracing::debug!(?conversion, "Formatter created");
        Ok(formatter)
    }

    pub fn input_format(&self) -> SampleFormat {
        self.inner.input
    }

    pub fn output_format(&self) -> SampleFormat {
        self.inner.output
    }

    pub fn is_formatting(&self) -> bool {
        self.inner.busy.load(Ordering::Acquire)
    }

    /// Starts converting `chunk`, calling `on_chunk` once per step.
    ///
    /// Returns [`crate::ConcurrencyError::Busy`] without touching the running call if the session
    /// is still formatting. The busy flag is cleared before the final chunk is delivered, so
    /// `on_chunk` may start the next call from there. Trailing bytes of a partial sample are
    /// ignored, an empty chunk yields a single empty final chunk.
    #[instrument(level = "debug", skip(self, chunk, on_chunk), fields(chunk_len = chunk.len()), err)]
    pub fn format<F>(&self, chunk: Bytes, mut on_chunk: F) -> Result<JoinHandle<()>>
    where
        F: FnMut(Result<FormattedChunk>) + Send + 'static,
    {
        let guard = BusyGuard::try_acquire(&self.inner.busy, Operation::Formatting)?;

        let alignment = self.inner.input.alignment();
        let total = chunk.len() / alignment;
        let trailing = chunk.len() % alignment;
        if trailing > 0 {
            tracing::warn!(trailing, "Ignoring trailing bytes of a partial sample");
        }

        let inner = self.inner.clone();
        let pool = self.pool.clone();
        Ok(self.pool.spawn(async move {
            let mut converted = 0;
            loop {
                let samples = (total - converted).min(SAMPLES_PER_BUFFER);
                let step = {
                    let inner = inner.clone();
                    let chunk = chunk.clone();
                    pool.offload(move || inner.convert_step(&chunk, converted, samples))
                        .await
                };

                let buffer = match step {
                    Ok(buffer) => buffer,
                    Err(err) => {
                        drop(guard);
                        on_chunk(Err(err));
                        return;
                    }
                };

                converted += samples;
                let is_final = converted >= total;
                tracing::trace!(converted, total, is_final, "Formatted chunk");

                if is_final {
                    drop(guard);
                    on_chunk(Ok(FormattedChunk { buffer, is_final }));
                    return;
                }
                on_chunk(Ok(FormattedChunk { buffer, is_final }));
            }
        }))
    }

    /// Converts `chunk` completely and returns the concatenation of all steps.
    pub async fn format_all(&self, chunk: Bytes) -> Result<Bytes> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        self.format(chunk, move |result| {
            let _ = tx.send(result);
        })?;

        let mut output = BytesMut::new();
        while let Some(result) = rx.recv().await {
            let chunk = result?;
            output.extend_from_slice(&chunk.buffer);
            if chunk.is_final {
                return Ok(output.freeze());
            }
        }

        Err(Error::Worker(
            "formatting stopped before the final chunk".to_string(),
        ))
    }
}

impl FormatterInner {
    fn convert_step(&self, chunk: &[u8], offset: usize, samples: usize) -> Bytes {
        let in_alignment = self.input.alignment();
        let out_alignment = self.output.alignment();
        let input = &chunk[offset * in_alignment..(offset + samples) * in_alignment];

        let mut scratch = self.scratch.lock();
        let output = &mut scratch[..samples * out_alignment];
        dsp::convert(self.conversion, self.mode, input, output);

        Bytes::copy_from_slice(output)
    }
}
