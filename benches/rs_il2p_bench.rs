//! Stable-Rust benchmark harness, timed with `std::time::Instant`.
//!
//! The teacher's `benches/bench_rustradio.rs` uses `#![feature(test)]`
//! and `test::Bencher`, both nightly-only, and times the old `Block`/
//! `Stream` graph machinery that no longer exists in this crate. This
//! harness keeps the teacher's "loop N times, report ns/iter" shape
//! but implements it by hand against [`rustradio_packet::rs`] and
//! [`rustradio_packet::il2p`], since `Cargo.toml` carries no
//! `criterion` dependency.
//!
//! Run with `cargo bench` once a `[[bench]] harness = false` entry
//! points at this file.

use std::time::Instant;

use rustradio_packet::ax25::{Address, FrameKind, Packet, UKind};
use rustradio_packet::callsign::Callsign;
use rustradio_packet::il2p;
use rustradio_packet::rs::RsCodecs;

fn time_it<F: FnMut()>(name: &str, iters: u32, mut f: F) {
    let start = Instant::now();
    for _ in 0..iters {
        f();
    }
    let elapsed = start.elapsed();
    let per_iter = elapsed / iters.max(1);
    println!("{name}: {iters} iters, {elapsed:?} total, {per_iter:?}/iter");
}

fn sample_packet() -> Packet {
    Packet {
        addresses: vec![
            Address {
                callsign: Callsign::parse("APRS").unwrap(),
                command_response: true,
                has_been_repeated: false,
            },
            Address {
                callsign: Callsign::parse("N0CALL").unwrap(),
                command_response: false,
                has_been_repeated: false,
            },
        ],
        modulo128: false,
        control: FrameKind::U {
            kind: UKind::Ui,
            pf: false,
        },
        pid: Some(0xF0),
        info: (0..200u32).map(|i| i as u8).collect(),
    }
}

fn bench_rs_roundtrip() {
    let codecs = RsCodecs::new();
    let engine = codecs.get(16);
    let data: Vec<u8> = (0..200u32).map(|i| i as u8).collect();

    time_it("rs_encode(200 data, 16 parity)", 10_000, || {
        let _ = engine.encode(&data);
    });

    let parity = engine.encode(&data);
    let mut block = data.clone();
    block.extend(parity);
    time_it("rs_decode(clean 216-byte block)", 10_000, || {
        let mut b = block.clone();
        let _ = engine.decode(&mut b);
    });

    time_it("rs_decode(2 errors injected)", 10_000, || {
        let mut b = block.clone();
        b[3] ^= 0xFF;
        b[40] ^= 0x55;
        let _ = engine.decode(&mut b);
    });
}

fn bench_il2p_pipeline() {
    let codecs = RsCodecs::new();
    let pkt = sample_packet();

    time_it("il2p_encode_type1_header", 10_000, || {
        let _ = il2p::encode_type1_header(&pkt, &codecs, pkt.info.len() as u16, false);
    });

    let header = il2p::encode_type1_header(&pkt, &codecs, pkt.info.len() as u16, false)
        .expect("UI frame should always produce a Type 1 header");
    time_it("il2p_decode_type1_header", 10_000, || {
        let _ = il2p::decode_type1_header(&header, &codecs);
    });

    time_it("il2p_encode_payload(200 bytes)", 10_000, || {
        let _ = il2p::encode_payload(&pkt.info, false, &codecs);
    });

    let wire = il2p::encode_payload(&pkt.info, false, &codecs);
    time_it("il2p_decode_payload(200 bytes)", 10_000, || {
        let _ = il2p::decode_payload(&wire, pkt.info.len(), false, &codecs);
    });
}

fn main() {
    bench_rs_roundtrip();
    bench_il2p_pipeline();
}
