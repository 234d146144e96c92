//! Decoding must not depend on how the byte stream is cut into deliveries.

use bytes::BytesMut;
use sockframe::frame::encode_frame;
use sockframe::{Config, Event, OpCode, Parser};

fn frame(opcode: OpCode, payload: &[u8], fin: bool, mask: Option<[u8; 4]>) -> Vec<u8> {
    let mut buf = BytesMut::new();
    encode_frame(&mut buf, opcode, payload, fin, mask);
    buf.to_vec()
}

/// A stream exercising every tier, masking, fragmentation and pings
fn sample_stream() -> Vec<u8> {
    let mut bytes = Vec::new();
    bytes.extend(frame(OpCode::Text, b"hi", true, None));
    bytes.extend(frame(OpCode::Ping, b"", true, None));
    bytes.extend(frame(OpCode::Text, "héllo".as_bytes(), true, Some([0x37, 0xfa, 0x21, 0x3d])));
    bytes.extend(frame(OpCode::Text, b"frag-", false, Some([1, 2, 3, 4])));
    bytes.extend(frame(OpCode::Ping, b"mid", true, Some([5, 6, 7, 8])));
    bytes.extend(frame(OpCode::Continuation, b"ment", false, None));
    bytes.extend(frame(OpCode::Continuation, b"ed", true, Some([9, 9, 9, 9])));
    bytes.extend(frame(OpCode::Text, &[b'm'; 300], true, Some([0xaa, 0xbb, 0xcc, 0xdd])));
    bytes
}

fn describe(events: &[Event]) -> Vec<String> {
    events.iter().map(|e| format!("{:?}", e)).collect()
}

fn decode_in_chunks(bytes: &[u8], cuts: &[usize]) -> Vec<String> {
    let mut parser = Parser::default();
    let mut events = Vec::new();
    let mut start = 0;
    for &cut in cuts {
        parser.process_into(&bytes[start..cut], &mut events);
        start = cut;
    }
    parser.process_into(&bytes[start..], &mut events);
    describe(&events)
}

#[test]
fn whole_stream_events() {
    let bytes = sample_stream();
    let mut parser = Parser::default();
    let events = parser.process(&bytes);

    let expected: Vec<String> = vec![
        Event::Data("hi".into()),
        Event::Ping(String::new()),
        Event::Data("héllo".into()),
        Event::Ping("mid".into()),
        Event::Data("frag-mented".into()),
        Event::Data("m".repeat(300)),
    ]
    .iter()
    .map(|e| format!("{:?}", e))
    .collect();
    assert_eq!(describe(&events), expected);
    assert_eq!(parser.buffered(), 0);
}

#[test]
fn every_single_split_point() {
    let bytes = sample_stream();
    let whole = decode_in_chunks(&bytes, &[]);
    for cut in 0..=bytes.len() {
        assert_eq!(decode_in_chunks(&bytes, &[cut]), whole, "cut at {}", cut);
    }
}

#[test]
fn every_pair_of_split_points() {
    let mut bytes = frame(OpCode::Text, b"ab", false, Some([1, 2, 3, 4]));
    bytes.extend(frame(OpCode::Ping, b"p", true, None));
    bytes.extend(frame(OpCode::Continuation, &[b'c'; 130], true, Some([4, 3, 2, 1])));

    let whole = decode_in_chunks(&bytes, &[]);
    for a in 0..=bytes.len() {
        for b in a..=bytes.len() {
            assert_eq!(decode_in_chunks(&bytes, &[a, b]), whole, "cuts {} {}", a, b);
        }
    }
}

#[test]
fn one_byte_at_a_time() {
    let bytes = sample_stream();
    let cuts: Vec<usize> = (1..bytes.len()).collect();
    assert_eq!(decode_in_chunks(&bytes, &cuts), decode_in_chunks(&bytes, &[]));
}

#[test]
fn random_chunk_sizes() {
    let bytes = sample_stream();
    let whole = decode_in_chunks(&bytes, &[]);
    let mut rng = fastrand::Rng::with_seed(0x5eed);

    for _ in 0..200 {
        let mut cuts = Vec::new();
        let mut pos = 0;
        loop {
            pos += rng.usize(1..=17);
            if pos >= bytes.len() {
                break;
            }
            cuts.push(pos);
        }
        assert_eq!(decode_in_chunks(&bytes, &cuts), whole, "cuts {:?}", cuts);
    }
}

#[test]
fn recovers_after_error_in_later_delivery() {
    let mut parser = Parser::default();
    let mut events = parser.process(&[0xB1, 0x00]);
    assert_eq!(events.len(), 1);
    assert!(events[0].is_error());

    events = parser.process(&sample_stream());
    assert_eq!(events.len(), 6);
    assert!(events.iter().all(|e| !e.is_error()));
}

#[test]
fn large_extended_frame_split_in_pieces() {
    let config = Config::builder().max_frame_size(1 << 20).build();
    let payload = vec![b'z'; 200_000];
    let bytes = frame(OpCode::Text, &payload, true, Some([0x10, 0x20, 0x30, 0x40]));

    let mut parser = Parser::new(&config);
    let mut events = Vec::new();
    for chunk in bytes.chunks(4093) {
        parser.process_into(chunk, &mut events);
    }
    assert!(matches!(&events[..], [Event::Data(t)] if t.len() == 200_000));
    assert_eq!(parser.stats().messages, 1);
}

#[test]
fn masked_close_at_every_split_point() {
    let mut bytes = frame(OpCode::Text, b"bye", true, Some([1, 2, 3, 4]));
    let status = 1000u16.to_be_bytes();
    bytes.extend(frame(OpCode::Close, &status, true, Some([0x0f, 0xf0, 0x55, 0xaa])));
    // Whatever follows the close is never decoded
    bytes.extend(frame(OpCode::Text, b"late", true, None));
    bytes.extend_from_slice(&[0xB1, 0x00]);

    let whole = decode_in_chunks(&bytes, &[]);
    assert_eq!(whole, describe(&[Event::Data("bye".into()), Event::Close]));

    for cut in 0..=bytes.len() {
        assert_eq!(decode_in_chunks(&bytes, &[cut]), whole, "cut at {}", cut);
    }
    let cuts: Vec<usize> = (1..bytes.len()).collect();
    assert_eq!(decode_in_chunks(&bytes, &cuts), whole);
}

#[test]
fn empty_masked_close_split_after_header() {
    let bytes = [0x88, 0x80, 0, 0, 0, 0];
    let whole = decode_in_chunks(&bytes, &[]);
    assert_eq!(whole, describe(&[Event::Close]));
    assert_eq!(decode_in_chunks(&bytes, &[2]), whole);
}
