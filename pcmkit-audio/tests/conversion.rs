use bytes::Bytes;
use pcmkit_audio::{Formatter, SampleFormat, WorkerPool};
use pretty_assertions::assert_eq;
use test_log::test;
use tokio::sync::mpsc;

fn f32_samples(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

fn i32_samples(format: SampleFormat, bytes: &[u8]) -> Vec<i32> {
    bytes
        .chunks_exact(2)
        .map(|b| match format {
            SampleFormat::Int16LE => i16::from_le_bytes([b[0], b[1]]) as i32,
            _ => u16::from_le_bytes([b[0], b[1]]) as i32,
        })
        .collect()
}

async fn round_trip(from: SampleFormat, to: SampleFormat, input: Bytes) -> Bytes {
    let pool = WorkerPool::current();
    let forward = Formatter::new(from, to, &pool).unwrap();
    let backward = Formatter::new(to, from, &pool).unwrap();

    let converted = forward.format_all(input).await.unwrap();
    backward.format_all(converted).await.unwrap()
}

fn float_input() -> Bytes {
    (-2048..=2048)
        .map(|i| i as f32 / 2048.0)
        .flat_map(f32::to_le_bytes)
        .collect()
}

#[test(tokio::test)]
async fn float_round_trips_within_two_lsb() {
    for via in [SampleFormat::Int16LE, SampleFormat::UInt16LE] {
        let input = float_input();
        let output = round_trip(SampleFormat::Float32LE, via, input.clone()).await;

        let expected = f32_samples(&input);
        let actual = f32_samples(&output);
        assert_eq!(actual.len(), expected.len());
        for (i, (a, e)) in actual.iter().zip(&expected).enumerate() {
            assert!(
                (a - e).abs() <= 2.0 / 32768.0,
                "{via}: sample {i} expected {e}, got {a}"
            );
        }
    }
}

#[test(tokio::test)]
async fn int_float_round_trips_within_one_lsb() {
    let signed: Bytes = (i16::MIN..=i16::MAX)
        .step_by(7)
        .chain([i16::MAX])
        .flat_map(i16::to_le_bytes)
        .collect();
    let unsigned: Bytes = (u16::MIN..=u16::MAX)
        .step_by(7)
        .chain([u16::MAX])
        .flat_map(u16::to_le_bytes)
        .collect();

    for (format, input) in [
        (SampleFormat::Int16LE, signed),
        (SampleFormat::UInt16LE, unsigned),
    ] {
        let output = round_trip(format, SampleFormat::Float32LE, input.clone()).await;

        let expected = i32_samples(format, &input);
        let actual = i32_samples(format, &output);
        assert_eq!(actual.len(), expected.len());
        for (i, (a, e)) in actual.iter().zip(&expected).enumerate() {
            assert!((a - e).abs() <= 1, "{format}: sample {i} expected {e}, got {a}");
        }
    }
}

#[test(tokio::test)]
async fn int_round_trips_are_exact() {
    let signed: Bytes = (i16::MIN..=i16::MAX).flat_map(i16::to_le_bytes).collect();
    let output = round_trip(SampleFormat::Int16LE, SampleFormat::UInt16LE, signed.clone()).await;
    assert_eq!(output, signed);

    let unsigned: Bytes = (u16::MIN..=u16::MAX).flat_map(u16::to_le_bytes).collect();
    let output = round_trip(SampleFormat::UInt16LE, SampleFormat::Int16LE, unsigned.clone()).await;
    assert_eq!(output, unsigned);
}

#[test(tokio::test)]
async fn chunk_count_matches_input_length() {
    let pool = WorkerPool::current();
    let formatter = Formatter::new(SampleFormat::Int16LE, SampleFormat::Float32LE, &pool).unwrap();

    for samples in [1usize, 1023, 1024, 1025, 3072, 3073] {
        let input: Bytes = (0..samples)
            .flat_map(|i| (i as i16).to_le_bytes())
            .collect();

        let (tx, mut rx) = mpsc::unbounded_channel();
        formatter
            .format(input.clone(), move |result| {
                tx.send(result.unwrap()).unwrap();
            })
            .unwrap()
            .await
            .unwrap();

        let mut chunks = vec![];
        while let Ok(chunk) = rx.try_recv() {
            chunks.push(chunk);
        }

        assert_eq!(chunks.len(), samples.div_ceil(1024), "{samples} samples");
        assert!(chunks[..chunks.len() - 1].iter().all(|c| !c.is_final));
        assert!(chunks[chunks.len() - 1].is_final);

        let concatenated: Vec<u8> = chunks.iter().flat_map(|c| c.buffer.to_vec()).collect();
        let expected = formatter.format_all(input).await.unwrap();
        assert_eq!(concatenated, expected.to_vec());
    }
}
