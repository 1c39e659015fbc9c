#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use shiguredo_wire_decoder::ChunkedBodyDecoder;

#[derive(Arbitrary, Debug)]
struct FuzzChunked {
    chunks: Vec<Vec<u8>>,
    garbage: Vec<u8>,
    split_hint: u8,
}

fn encode_chunks(chunks: &[Vec<u8>]) -> Vec<u8> {
    let mut out = Vec::new();
    for chunk in chunks {
        out.extend_from_slice(format!("{:x}\r\n", chunk.len()).as_bytes());
        out.extend_from_slice(chunk);
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(b"0\r\n\r\n");
    out
}

fn decode(encoded: &[u8], split_size: usize) -> Option<Vec<u8>> {
    let mut decoder = ChunkedBodyDecoder::new();
    let mut body = Vec::new();
    for part in encoded.chunks(split_size) {
        let mut input = part;
        if decoder.decode(&mut input, &mut body).ok()? {
            return Some(body);
        }
    }
    None
}

fuzz_target!(|input: FuzzChunked| {
    let mut chunks = input.chunks;
    chunks.retain(|chunk| !chunk.is_empty());
    chunks.truncate(64);
    let expected = chunks.concat();
    let split_size = (input.split_hint as usize % 32) + 1;

    let encoded = encode_chunks(&chunks);
    assert_eq!(decode(&encoded, split_size), Some(expected));

    // 任意のバイト列でもパニックしない
    let _ = decode(&input.garbage, split_size);
});
