#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use shiguredo_wire_decoder::ajp::{AjpDataDecoder, ForwardRequest, ForwardRequestDecoder};

#[derive(Arbitrary, Debug)]
struct FuzzAjp {
    data: Vec<u8>,
    split_hint: u8,
}

fn decode_forward(data: &[u8], split_size: usize) -> Option<ForwardRequest> {
    let mut decoder = ForwardRequestDecoder::new();
    let mut request = ForwardRequest::new();
    for chunk in data.chunks(split_size) {
        let mut input = chunk;
        if decoder.decode(&mut input, &mut request).ok()? {
            return Some(request);
        }
    }
    None
}

fn decode_data(data: &[u8], split_size: usize) -> Option<Vec<u8>> {
    let mut decoder = AjpDataDecoder::new();
    let mut body = Vec::new();
    for chunk in data.chunks(split_size) {
        let mut input = chunk;
        if decoder.decode(&mut input, &mut body).ok()? {
            return Some(body);
        }
    }
    None
}

fuzz_target!(|input: FuzzAjp| {
    let split_size = (input.split_hint as usize % 32) + 1;
    let whole_len = input.data.len().max(1);

    assert_eq!(
        decode_forward(&input.data, whole_len),
        decode_forward(&input.data, split_size)
    );
    assert_eq!(
        decode_data(&input.data, whole_len),
        decode_data(&input.data, split_size)
    );
});
