#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use shiguredo_wire_decoder::multipart::{MultipartDecoder, PartCollector};
use shiguredo_wire_decoder::{DecoderLimits, Request, RequestDecoder};

#[derive(Arbitrary, Debug)]
struct FuzzLimits {
    max_request_line_size: u16,
    max_header_size: u16,
    max_header_count: u8,
    max_parameter_count: u8,
    max_chunk_line_size: u8,
    max_multipart_depth: u8,
    data: Vec<u8>,
}

fn build_limits(input: &FuzzLimits) -> DecoderLimits {
    DecoderLimits {
        max_request_line_size: input.max_request_line_size as usize,
        max_header_size: input.max_header_size as usize,
        max_header_count: input.max_header_count as usize,
        max_parameter_count: input.max_parameter_count as usize,
        max_chunk_line_size: input.max_chunk_line_size as usize,
        max_multipart_depth: input.max_multipart_depth as usize,
    }
}

fuzz_target!(|input: FuzzLimits| {
    let limits = build_limits(&input);

    let mut request_decoder = RequestDecoder::with_limits(limits.clone());
    let mut request = Request::default();
    let mut cursor: &[u8] = &input.data;
    if let Ok(false) = request_decoder.decode(&mut cursor, &mut request) {
        let _ = request_decoder.close(&mut request);
    }

    if let Ok(mut multipart) = MultipartDecoder::with_limits("boundary", limits) {
        let mut collector = PartCollector::new();
        let mut cursor: &[u8] = &input.data;
        let _ = multipart.decode(&mut cursor, &mut collector);
    }
});
