#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use shiguredo_wire_decoder::{Request, RequestDecoder};

#[derive(Arbitrary, Debug)]
struct FuzzRequest {
    data: Vec<u8>,
    split_hint: u8,
}

fn decode(data: &[u8], split_size: usize) -> Option<(Request, usize)> {
    let mut decoder = RequestDecoder::new();
    let mut request = Request::default();
    let mut consumed = 0;
    for chunk in data.chunks(split_size) {
        let mut input = chunk;
        let complete = decoder.decode(&mut input, &mut request).ok()?;
        consumed += chunk.len() - input.len();
        if complete {
            return Some((request, consumed));
        }
    }
    decoder.close(&mut request).ok()?;
    Some((request, consumed))
}

fuzz_target!(|input: FuzzRequest| {
    let whole = decode(&input.data, input.data.len().max(1));
    let split = decode(&input.data, (input.split_hint as usize % 32) + 1);

    // 分割しても成否と結果は変わらない
    assert_eq!(whole.is_some(), split.is_some());
    if let (Some(whole), Some(split)) = (whole, split) {
        assert_eq!(whole, split);
    }
});
