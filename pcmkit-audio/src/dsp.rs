use crate::format::{Conversion, IntToFloat, SampleFormat};

/// Full-scale magnitude used when quantizing float samples.
const SCALE: f32 = 32767.0;
/// Offset between signed and unsigned 16-bit samples, also the divisor when widening to float.
const OFFSET: i32 = 32768;

/// Converts every whole sample of `input` into `output`. Both slices must hold the same number of
/// samples in their respective formats.
pub(crate) fn convert(conversion: Conversion, mode: IntToFloat, input: &[u8], output: &mut [u8]) {
    match conversion {
        Conversion::F32ToS16 => map_samples(input, output, |b: [u8; 4]| {
            f32_to_s16(f32::from_le_bytes(b)).to_le_bytes()
        }),
        Conversion::F32ToU16 => map_samples(input, output, |b: [u8; 4]| {
            f32_to_u16(f32::from_le_bytes(b)).to_le_bytes()
        }),
        Conversion::S16ToF32 => map_samples(input, output, |b: [u8; 2]| {
            widen(i16::from_le_bytes(b) as i32, mode).to_le_bytes()
        }),
        Conversion::S16ToU16 => map_samples(input, output, |b: [u8; 2]| {
            ((i16::from_le_bytes(b) as i32 + OFFSET) as u16).to_le_bytes()
        }),
        Conversion::U16ToF32 => map_samples(input, output, |b: [u8; 2]| {
            widen(u16::from_le_bytes(b) as i32 - OFFSET, mode).to_le_bytes()
        }),
        Conversion::U16ToS16 => map_samples(input, output, |b: [u8; 2]| {
            ((u16::from_le_bytes(b) as i32 - OFFSET) as i16).to_le_bytes()
        }),
    }
}

#[inline]
fn map_samples<const I: usize, const O: usize>(
    input: &[u8],
    output: &mut [u8],
    f: impl Fn([u8; I]) -> [u8; O],
) {
    let (input, _) = input.as_chunks::<I>();
    let (output, _) = output.as_chunks_mut::<O>();
    debug_assert_eq!(input.len(), output.len());

    for (src, dst) in input.iter().zip(output.iter_mut()) {
        *dst = f(*src);
    }
}

#[inline]
fn f32_to_s16(value: f32) -> i16 {
    // `as` truncates toward zero and saturates out-of-range values.
    (value * SCALE) as i16
}

#[inline]
fn f32_to_u16(value: f32) -> u16 {
    let quantized = (value * SCALE).clamp(-(OFFSET as f32), SCALE) as i32;
    (quantized + OFFSET) as u16
}

/// Widens a sample already centered around zero.
#[inline]
fn widen(centered: i32, mode: IntToFloat) -> f32 {
    match mode {
        IntToFloat::Exact => centered as f32 / OFFSET as f32,
        IntToFloat::Truncate => (centered / OFFSET) as f32,
    }
}

/// Copies every whole frame of `input` into one plane per channel, starting at offset zero of
/// every plane.
pub(crate) fn deinterleave(input: &[u8], sample_alignment: usize, planes: &mut [Vec<u8>]) {
    let frame_alignment = sample_alignment * planes.len();
    debug_assert!(frame_alignment > 0);

    for (frame_idx, frame) in input.chunks_exact(frame_alignment).enumerate() {
        let at = frame_idx * sample_alignment;
        for (plane, sample) in planes.iter_mut().zip(frame.chunks_exact(sample_alignment)) {
            plane[at..at + sample_alignment].copy_from_slice(sample);
        }
    }
}

/// Fills `output` frame by frame from equally sized planes.
pub(crate) fn interleave<B: AsRef<[u8]>>(planes: &[B], sample_alignment: usize, output: &mut [u8]) {
    let frame_alignment = sample_alignment * planes.len();
    debug_assert!(frame_alignment > 0);

    for (sample, frame) in output.chunks_exact_mut(frame_alignment).enumerate() {
        let at = sample * sample_alignment;
        for (slot, plane) in frame.chunks_exact_mut(sample_alignment).zip(planes) {
            slot.copy_from_slice(&plane.as_ref()[at..at + sample_alignment]);
        }
    }
}

/// Downmixes all channels into the first one, overwriting its contents.
///
/// Float samples are summed and divided once. Integer samples are divided per channel before being
/// summed, which rounds differently than the float path and keeps the accumulator in range.
pub(crate) fn mix_in_place<B>(format: SampleFormat, channels: &mut [B])
where
    B: AsRef<[u8]> + AsMut<[u8]>,
{
    let count = channels.len();
    let Some((first, rest)) = channels.split_first_mut() else {
        return;
    };

    match format {
        SampleFormat::Float32LE => mix_samples(first.as_mut(), |i, out: [u8; 4]| {
            let sum = rest.iter().fold(f32::from_le_bytes(out), |acc, plane| {
                acc + f32::from_le_bytes(sample_at(plane.as_ref(), i))
            });
            (sum / count as f32).to_le_bytes()
        }),
        SampleFormat::Int16LE => mix_samples(first.as_mut(), |i, out: [u8; 2]| {
            let term = |bytes: [u8; 2]| i16::from_le_bytes(bytes) as i32 / count as i32;
            let sum = rest.iter().fold(term(out), |acc, plane| {
                acc + term(sample_at(plane.as_ref(), i))
            });
            (sum as i16).to_le_bytes()
        }),
        SampleFormat::UInt16LE => mix_samples(first.as_mut(), |i, out: [u8; 2]| {
            let term = |bytes: [u8; 2]| (u16::from_le_bytes(bytes) as i32 - OFFSET) / count as i32;
            let sum = rest.iter().fold(term(out), |acc, plane| {
                acc + term(sample_at(plane.as_ref(), i))
            });
            ((sum + OFFSET) as u16).to_le_bytes()
        }),
    }
}

#[inline]
fn mix_samples<const N: usize>(output: &mut [u8], f: impl Fn(usize, [u8; N]) -> [u8; N]) {
    let (output, _) = output.as_chunks_mut::<N>();
    for (i, sample) in output.iter_mut().enumerate() {
        *sample = f(i, *sample);
    }
}

#[inline]
fn sample_at<const N: usize>(plane: &[u8], index: usize) -> [u8; N] {
    plane.as_chunks::<N>().0[index]
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_log::test;

    fn f32_bytes(samples: &[f32]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    fn i16_bytes(samples: &[i16]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    fn u16_bytes(samples: &[u16]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    fn run(
        conversion: Conversion,
        mode: IntToFloat,
        input: &[u8],
        out_alignment: usize,
        in_alignment: usize,
    ) -> Vec<u8> {
        let mut output = vec![0u8; input.len() / in_alignment * out_alignment];
        convert(conversion, mode, input, &mut output);
        output
    }

    #[test]
    fn float_to_int16_truncates() {
        let input = f32_bytes(&[0.0, 1.0, -1.0, 0.5, -0.5, 0.99999, 2.0, -2.0]);
        let output = run(Conversion::F32ToS16, IntToFloat::Exact, &input, 2, 4);
        assert_eq!(
            output,
            i16_bytes(&[0, 32767, -32767, 16383, -16383, 32766, 32767, -32768])
        );
    }

    #[test]
    fn float_to_uint16_recenters() {
        let input = f32_bytes(&[0.0, 1.0, -1.0, -0.5, 3.0, -3.0]);
        let output = run(Conversion::F32ToU16, IntToFloat::Exact, &input, 2, 4);
        assert_eq!(output, u16_bytes(&[32768, 65535, 1, 16385, 65535, 0]));
    }

    #[test]
    fn int16_to_float_modes() {
        let input = i16_bytes(&[0, 16384, -32768, 32767]);

        let exact = run(Conversion::S16ToF32, IntToFloat::Exact, &input, 4, 2);
        assert_eq!(exact, f32_bytes(&[0.0, 0.5, -1.0, 32767.0 / 32768.0]));

        let truncated = run(Conversion::S16ToF32, IntToFloat::Truncate, &input, 4, 2);
        assert_eq!(truncated, f32_bytes(&[0.0, 0.0, -1.0, 0.0]));
    }

    #[test]
    fn uint16_to_float_modes() {
        let input = u16_bytes(&[32768, 0, 49152, 65535]);

        let exact = run(Conversion::U16ToF32, IntToFloat::Exact, &input, 4, 2);
        assert_eq!(exact, f32_bytes(&[0.0, -1.0, 0.5, 32767.0 / 32768.0]));

        let truncated = run(Conversion::U16ToF32, IntToFloat::Truncate, &input, 4, 2);
        assert_eq!(truncated, f32_bytes(&[0.0, -1.0, 0.0, 0.0]));
    }

    #[test]
    fn int16_uint16_offsets() {
        let signed = i16_bytes(&[-32768, -1, 0, 1, 32767]);
        let unsigned = u16_bytes(&[0, 32767, 32768, 32769, 65535]);

        assert_eq!(
            run(Conversion::S16ToU16, IntToFloat::Exact, &signed, 2, 2),
            unsigned
        );
        assert_eq!(
            run(Conversion::U16ToS16, IntToFloat::Exact, &unsigned, 2, 2),
            signed
        );
    }

    #[test]
    fn deinterleave_stereo() {
        let input = i16_bytes(&[1, -1, 2, -2, 3, -3]);
        let mut planes = vec![vec![0u8; 8], vec![0u8; 8]];

        deinterleave(&input, 2, &mut planes);

        assert_eq!(&planes[0][..6], i16_bytes(&[1, 2, 3]).as_slice());
        assert_eq!(&planes[1][..6], i16_bytes(&[-1, -2, -3]).as_slice());
    }

    #[test]
    fn interleave_three_channels() {
        let planes = [
            i16_bytes(&[1, 2]),
            i16_bytes(&[10, 20]),
            i16_bytes(&[100, 200]),
        ];
        let mut output = vec![0u8; 12];

        interleave(&planes, 2, &mut output);

        assert_eq!(output, i16_bytes(&[1, 10, 100, 2, 20, 200]));
    }

    #[test]
    fn mix_float_sums_then_divides() {
        let mut channels = vec![f32_bytes(&[1.0, 0.5, 0.25]), f32_bytes(&[-1.0, 0.5, 0.0])];

        mix_in_place(SampleFormat::Float32LE, &mut channels);

        assert_eq!(channels[0], f32_bytes(&[0.0, 0.5, 0.125]));
    }

    #[test]
    fn mix_int16_divides_each_term() {
        let mut channels = vec![i16_bytes(&[1, 3, -3, 32767]), i16_bytes(&[1, 3, -3, 32767])];

        mix_in_place(SampleFormat::Int16LE, &mut channels);

        // 1/2 + 1/2 truncates to 0 + 0, a sum-then-divide mix would give 1.
        assert_eq!(channels[0], i16_bytes(&[0, 2, -2, 32766]));
    }

    #[test]
    fn mix_uint16_recenters() {
        let mut channels = vec![
            u16_bytes(&[32768, 65535, 0, 32769]),
            u16_bytes(&[32768, 0, 0, 32769]),
        ];

        mix_in_place(SampleFormat::UInt16LE, &mut channels);

        // (32767/2) + (-32768/2) = 16383 - 16384 = -1
        assert_eq!(channels[0], u16_bytes(&[32768, 32767, 0, 32768]));
    }

    #[test]
    fn mix_single_channel_is_identity() {
        let original = u16_bytes(&[0, 1, 32768, 65535]);
        let mut channels = vec![original.clone()];

        mix_in_place(SampleFormat::UInt16LE, &mut channels);

        assert_eq!(channels[0], original);
    }
}
