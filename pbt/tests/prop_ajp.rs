//! AJP13 デコーダーのプロパティテスト

use pbt::{ajp_string, form_urlencode, header_value, path, split_by_sizes, split_sizes, token};
use proptest::prelude::*;
use shiguredo_wire_decoder::ajp::code::{self, attribute};
use shiguredo_wire_decoder::ajp::{AjpDataDecoder, ForwardRequest, ForwardRequestDecoder};

// ========================================
// Strategy 定義
// ========================================

#[derive(Debug, Clone)]
struct Forward {
    method: &'static str,
    protocol: String,
    uri: String,
    remote_addr: String,
    server_name: String,
    server_port: u16,
    is_ssl: bool,
    headers: Vec<(String, String)>,
    params: Vec<(String, String)>,
}

fn ajp_method() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS", "PROPFIND", "PURGE"])
}

fn coded_or_named_header() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("accept".to_string()),
        Just("content-type".to_string()),
        Just("host".to_string()),
        Just("user-agent".to_string()),
        token(16),
    ]
}

fn forward() -> impl Strategy<Value = Forward> {
    (
        ajp_method(),
        prop_oneof![Just("HTTP/1.0".to_string()), Just("HTTP/1.1".to_string())],
        path(),
        "[0-9]{1,3}\\.[0-9]{1,3}\\.[0-9]{1,3}\\.[0-9]{1,3}",
        "[a-z]{1,10}(\\.[a-z]{1,6}){0,2}",
        any::<u16>(),
        any::<bool>(),
        proptest::collection::vec((coded_or_named_header(), header_value()), 0..6),
        proptest::collection::vec(("[a-z][a-z0-9]{0,7}", "\\PC{0,12}"), 0..4),
    )
        .prop_map(
            |(
                method,
                protocol,
                uri,
                remote_addr,
                server_name,
                server_port,
                is_ssl,
                headers,
                params,
            )| Forward {
                method,
                protocol,
                uri,
                remote_addr,
                server_name,
                server_port,
                is_ssl,
                headers,
                params,
            },
        )
}

fn query_string(params: &[(String, String)]) -> String {
    params
        .iter()
        .map(|(n, v)| format!("{}={}", n, form_urlencode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

fn encode_forward(forward: &Forward) -> Vec<u8> {
    let mut payload = vec![code::AjpPacketKind::ForwardRequest.code()];
    payload.push(code::method_code(forward.method).unwrap_or(code::STORED_METHOD));
    ajp_string(&mut payload, &forward.protocol);
    ajp_string(&mut payload, &forward.uri);
    ajp_string(&mut payload, &forward.remote_addr);
    payload.extend_from_slice(&[0xFF, 0xFF]);
    ajp_string(&mut payload, &forward.server_name);
    payload.extend_from_slice(&forward.server_port.to_be_bytes());
    payload.push(forward.is_ssl as u8);
    payload.extend_from_slice(&(forward.headers.len() as u16).to_be_bytes());
    for (name, value) in &forward.headers {
        match code::header_code(name) {
            Some(header) => payload.extend_from_slice(&header.to_be_bytes()),
            None => ajp_string(&mut payload, name),
        }
        ajp_string(&mut payload, value);
    }
    if code::method_code(forward.method).is_none() {
        payload.push(attribute::STORED_METHOD);
        ajp_string(&mut payload, forward.method);
    }
    if !forward.params.is_empty() {
        payload.push(attribute::QUERY_STRING);
        ajp_string(&mut payload, &query_string(&forward.params));
    }
    payload.push(code::ATTRIBUTE_TERMINATOR);

    let mut packet = code::SERVER_MAGIC.to_be_bytes().to_vec();
    packet.extend_from_slice(&(payload.len() as u16).to_be_bytes());
    packet.extend_from_slice(&payload);
    packet
}

// コードで送られたヘッダーは小文字の名前で届く
fn expected_headers(headers: &[(String, String)]) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            let name = code::header_code(name)
                .and_then(code::header_name)
                .map(str::to_string)
                .unwrap_or_else(|| name.clone());
            (name, value.clone())
        })
        .collect()
}

fn decode_forward(chunks: &[&[u8]]) -> ForwardRequest {
    let mut decoder = ForwardRequestDecoder::new();
    let mut request = ForwardRequest::new();
    let mut complete = false;
    for chunk in chunks {
        let mut input = *chunk;
        complete = decoder.decode(&mut input, &mut request).unwrap();
        assert!(input.is_empty());
    }
    assert!(complete);
    request
}

// ========================================
// Forward Request
// ========================================

proptest! {
    #[test]
    fn forward_request_fields_survive_any_split(
        forward in forward(),
        sizes in split_sizes(),
    ) {
        let packet = encode_forward(&forward);
        let whole = decode_forward(&[&packet[..]]);

        prop_assert_eq!(&whole.method, forward.method);
        prop_assert_eq!(&whole.protocol, &forward.protocol);
        prop_assert_eq!(&whole.uri, &forward.uri);
        prop_assert_eq!(&whole.remote_addr, &forward.remote_addr);
        prop_assert_eq!(&whole.remote_host, "");
        prop_assert_eq!(&whole.server_name, &forward.server_name);
        prop_assert_eq!(whole.server_port, forward.server_port);
        prop_assert_eq!(whole.is_ssl, forward.is_ssl);
        prop_assert_eq!(&whole.headers, &expected_headers(&forward.headers));
        prop_assert_eq!(whole.parameters.entries(), forward.params.as_slice());
        if !forward.params.is_empty() {
            let query = query_string(&forward.params);
            prop_assert_eq!(whole.attribute("query_string"), Some(query.as_str()));
        }

        let split = decode_forward(&split_by_sizes(&packet, &sizes));
        prop_assert_eq!(split, whole);
    }
}

proptest! {
    #[test]
    fn truncated_forward_request_is_incomplete(
        forward in forward(),
        cut in any::<prop::sample::Index>(),
    ) {
        let packet = encode_forward(&forward);
        let len = cut.index(packet.len());

        let mut decoder = ForwardRequestDecoder::new();
        let mut request = ForwardRequest::new();
        let mut input = &packet[..len];
        prop_assert!(!decoder.decode(&mut input, &mut request).unwrap());
        prop_assert!(decoder.close(&mut request).is_err());
    }
}

// ========================================
// データパケット
// ========================================

proptest! {
    #[test]
    fn data_packets_reassembled(
        bodies in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 1..64), 0..6),
        sizes in split_sizes(),
    ) {
        let mut stream = Vec::new();
        for body in &bodies {
            stream.extend_from_slice(&code::SERVER_MAGIC.to_be_bytes());
            stream.extend_from_slice(&(body.len() as u16 + 2).to_be_bytes());
            stream.extend_from_slice(&(body.len() as u16).to_be_bytes());
            stream.extend_from_slice(body);
        }
        stream.extend_from_slice(&[0x12, 0x34, 0x00, 0x00]);

        let mut decoder = AjpDataDecoder::new();
        let mut received = Vec::new();
        let mut end_of_body = false;
        for chunk in split_by_sizes(&stream, &sizes) {
            let mut input = chunk;
            while !input.is_empty() {
                if decoder.decode(&mut input, &mut received).unwrap() {
                    end_of_body = decoder.is_end_of_body();
                    decoder.reset();
                }
            }
        }
        prop_assert!(end_of_body);
        prop_assert_eq!(received, bodies.concat());
    }
}
