//! Benchmarks for EBML writing and WebM muxing
//!
//! Covers the VINT writers on their own and whole documents built from
//! synthetic chunks at a few frame counts.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::time::Duration;
use webmux_media::{
    AudioTrackConfig, Chunk, Codec, GrowableByteBuffer, MuxerConfig, MuxerOptions, TrackConfig,
    WebmMuxer,
};

fn video_chunks(frames: u64, payload_len: usize) -> Vec<Chunk> {
    let payload = vec![0xAB; payload_len];
    (0..frames)
        .map(|i| Chunk::new(i * 33_333, 33_333, i % 30 == 0, payload.clone()))
        .collect()
}

fn bench_vint(c: &mut Criterion) {
    let values: Vec<u64> = (0..1000u64).map(|i| i * i * 1013).collect();

    let mut group = c.benchmark_group("vint");
    group.throughput(Throughput::Elements(values.len() as u64));

    group.bench_function("write_vint", |b| {
        b.iter(|| {
            let mut buffer = GrowableByteBuffer::with_capacity(8 * 1024);
            for &value in &values {
                buffer.write_vint(black_box(value)).unwrap();
            }
            black_box(buffer.size())
        })
    });

    group.bench_function("measure_vint", |b| {
        b.iter(|| {
            values
                .iter()
                .map(|&v| GrowableByteBuffer::measure_vint(black_box(v)))
                .sum::<usize>()
        })
    });

    group.finish();
}

fn bench_mux_document(c: &mut Criterion) {
    let mut group = c.benchmark_group("mux_document");
    group.measurement_time(Duration::from_secs(5));

    for frames in [30u64, 300, 3000] {
        let chunks = video_chunks(frames, 4096);
        group.throughput(Throughput::Bytes(frames * 4096));
        group.bench_with_input(BenchmarkId::new("video", frames), &chunks, |b, chunks| {
            b.iter(|| {
                let config =
                    MuxerConfig::video_only(TrackConfig::video(Codec::Vp9, 1280, 720, 30.0));
                let mut muxer = WebmMuxer::new(config, MuxerOptions::default()).unwrap();
                for chunk in chunks {
                    muxer.add_video_chunk(chunk).unwrap();
                }
                black_box(muxer.finalize().unwrap())
            })
        });
    }

    let video = video_chunks(300, 4096);
    let audio: Vec<Chunk> = (0..500u64)
        .map(|i| Chunk::new(i * 20_000, 20_000, true, vec![0xCD; 160]))
        .collect();
    group.bench_function("video_and_audio", |b| {
        b.iter(|| {
            let config = MuxerConfig::video_only(TrackConfig::video(Codec::Vp8, 640, 480, 30.0))
                .with_audio(AudioTrackConfig::new(Codec::Opus, 48_000.0, 2));
            let mut muxer = WebmMuxer::new(config, MuxerOptions::default()).unwrap();
            let (mut v, mut a) = (video.iter().peekable(), audio.iter().peekable());
            loop {
                match (v.peek(), a.peek()) {
                    (Some(vc), Some(ac)) if vc.timestamp_micros <= ac.timestamp_micros => {
                        muxer.add_video_chunk(v.next().unwrap()).unwrap()
                    }
                    (_, Some(_)) => muxer.add_audio_chunk(a.next().unwrap()).unwrap(),
                    (Some(_), None) => muxer.add_video_chunk(v.next().unwrap()).unwrap(),
                    (None, None) => break,
                }
            }
            black_box(muxer.finalize().unwrap())
        })
    });

    group.finish();
}

criterion_group!(benches, bench_vint, bench_mux_document);
criterion_main!(benches);
