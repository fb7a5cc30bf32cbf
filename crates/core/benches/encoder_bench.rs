use criterion::{black_box, criterion_group, criterion_main, Criterion};
use relaygate_core::stream::{FrameEncoder, FrameParser};
use relaygate_domain::{Event, StreamEvent};
use serde_json::json;

fn answer_event() -> Event {
    Event::new(StreamEvent::answer(json!({
        "content": "Three aircraft match.\nThe cheapest departs at 09:00.",
        "threadId": "thread-1",
        "threadItemId": "item-1",
        "raw": {"results": [{"message": "G650"}, {"message": "Falcon 7X"}, {"message": "Global 6000"}]}
    })))
    .with_id("42")
}

fn bench_encode(c: &mut Criterion) {
    let event = answer_event();
    let compact = FrameEncoder::new();
    let pretty = FrameEncoder::pretty();

    c.bench_function("encode_answer_compact", |b| {
        b.iter(|| compact.encode(black_box(&event)));
    });
    c.bench_function("encode_answer_pretty", |b| {
        b.iter(|| pretty.encode(black_box(&event)));
    });
}

fn bench_parse(c: &mut Criterion) {
    let mut wire = String::new();
    for _ in 0..32 {
        if let Ok(frame) = FrameEncoder::pretty().encode(&answer_event()) {
            wire.push_str(&String::from_utf8_lossy(&frame));
        }
    }

    c.bench_function("parse_32_frames_in_small_chunks", |b| {
        b.iter(|| {
            let mut parser = FrameParser::new();
            let mut count = 0;
            for piece in wire.as_bytes().chunks(64) {
                count += parser.push(&String::from_utf8_lossy(piece)).len();
            }
            black_box(count)
        });
    });
}

criterion_group!(benches, bench_encode, bench_parse);
criterion_main!(benches);
