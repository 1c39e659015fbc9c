#![no_main]

use libfuzzer_sys::fuzz_target;
use shiguredo_wire_decoder::accept::parse_quality_list;
use shiguredo_wire_decoder::attribute::{attribute, attributes};
use shiguredo_wire_decoder::{Parameters, QueryStringDecoder};

fuzz_target!(|data: &[u8]| {
    // パニックしなければ OK
    if let Ok(s) = std::str::from_utf8(data) {
        for separator in [';', ','] {
            for (name, value) in attributes(s, separator) {
                assert!(!name.is_empty());
                let _ = value;
            }
            let _ = attribute(s, separator, "name");
        }
        let items = parse_quality_list(s);
        assert!(items.windows(2).all(|w| w[0].q() >= w[1].q()));
    }

    let mut decoder = QueryStringDecoder::new();
    let mut params = Parameters::new();
    let mut input = data;
    if decoder.decode(&mut input, &mut params).is_ok() {
        let _ = decoder.close(&mut params);
    }
});
