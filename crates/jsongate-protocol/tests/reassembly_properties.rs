//! Generated checks for the framing round trip and resynchronisation.

use bytes::Bytes;
use jsongate_protocol::{Frame, Reassembler, encode_json, split_chunks};
use proptest::collection::{btree_map, vec};
use proptest::prelude::*;
use serde_json::{Value, json};

fn json_value() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        any::<i64>().prop_map(Value::from),
        any::<bool>().prop_map(Value::from),
        "\\PC{0,24}".prop_map(Value::from),
    ];
    btree_map("[a-zA-Z_]{1,12}", leaf, 0..24).prop_map(|map| json!(map))
}

fn feed(reassembler: &mut Reassembler, wire: &[u8], chunk_size: usize) -> Vec<Frame> {
    wire.chunks(chunk_size)
        .flat_map(|chunk| reassembler.push(chunk))
        .collect()
}

fn payloads(frames: &[Frame]) -> Vec<Bytes> {
    frames.iter().map(|f| f.payload().clone()).collect()
}

proptest! {
    #[test]
    fn json_round_trips_through_any_mtu(value in json_value(), mtu in 1usize..=120) {
        let frame = encode_json(&value).unwrap();
        let mut reassembler = Reassembler::new();

        let mut frames = Vec::new();
        for chunk in split_chunks(&frame, mtu).unwrap() {
            prop_assert!(chunk.len() <= mtu);
            frames.extend(reassembler.push(&chunk));
        }

        prop_assert_eq!(frames.len(), 1);
        prop_assert_eq!(frames[0].decode_json::<Value>().unwrap(), value);
        prop_assert_eq!(reassembler.buffered_len(), 0);
    }

    #[test]
    fn chunking_does_not_change_output(
        values in vec(json_value(), 1..5),
        chunk_size in 1usize..=64,
    ) {
        let wire: Vec<u8> = values
            .iter()
            .flat_map(|v| encode_json(v).unwrap().to_vec())
            .collect();

        let whole = Reassembler::new().push(&wire);
        let split = feed(&mut Reassembler::new(), &wire, chunk_size);
        let bytewise = feed(&mut Reassembler::new(), &wire, 1);

        prop_assert_eq!(whole.len(), values.len());
        prop_assert_eq!(payloads(&split), payloads(&whole));
        prop_assert_eq!(payloads(&bytewise), payloads(&whole));
    }

    #[test]
    fn non_zero_garbage_never_yields_frames(
        garbage in vec(1u8..=255, 0..300),
        value in json_value(),
        chunk_size in 1usize..=32,
    ) {
        let frame = encode_json(&value).unwrap();
        let mut wire = garbage.clone();
        wire.extend_from_slice(&frame);

        let mut reassembler = Reassembler::new();
        let frames = feed(&mut reassembler, &wire, chunk_size);

        prop_assert_eq!(payloads(&frames), vec![frame.slice(3..)]);
        prop_assert_eq!(reassembler.buffered_len(), 0);
        prop_assert_eq!(reassembler.stats().skipped_bytes, garbage.len() as u64);
    }

    #[test]
    fn arbitrary_input_is_bounded(input in vec(any::<u8>(), 0..2048), chunk_size in 1usize..=100) {
        let mut reassembler = Reassembler::new();
        for chunk in input.chunks(chunk_size) {
            reassembler.push(chunk);
            // one maximal payload plus a header is the most it may hold
            prop_assert!(reassembler.buffered_len() <= 5000 + 3 + chunk_size);
        }
    }
}
