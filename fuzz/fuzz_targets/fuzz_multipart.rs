#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use shiguredo_wire_decoder::multipart::{MultipartDecoder, PartCollector};

#[derive(Arbitrary, Debug)]
struct FuzzMultipart {
    data: Vec<u8>,
    split_hint: u8,
}

fn decode(boundary: &str, data: &[u8], split_size: usize) -> Option<Vec<(Option<String>, Vec<u8>)>> {
    let mut decoder = MultipartDecoder::new(boundary).ok()?;
    let mut collector = PartCollector::new();
    for chunk in data.chunks(split_size) {
        let mut input = chunk;
        if decoder.decode(&mut input, &mut collector).ok()? {
            break;
        }
    }
    decoder.close(&mut collector).ok()?;
    Some(
        collector
            .into_parts()
            .into_iter()
            .map(|part| (part.name(), part.body))
            .collect(),
    )
}

fuzz_target!(|input: FuzzMultipart| {
    let boundaries = ["boundary", "----WebKitFormBoundary", "abc123", "---"];
    let split_size = (input.split_hint as usize % 32) + 1;

    for boundary in boundaries {
        let whole = decode(boundary, &input.data, input.data.len().max(1));
        let split = decode(boundary, &input.data, split_size);
        assert_eq!(whole, split);
    }
});
