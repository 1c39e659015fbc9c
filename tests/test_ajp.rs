//! AJP13 デコーダーの結合テスト

use shiguredo_wire_decoder::ajp::{
    AjpDataDecoder, ForwardRequest, ForwardRequestDecoder, ForwardRequestListener,
};
use shiguredo_wire_decoder::{DecoderLimits, Error, ParameterListener};

/// `GET /test/test.jsp?A=A&B=B` を mod_jk が転送したときのパケット
#[rustfmt::skip]
const FORWARD_REQUEST: &[u8] = &[
    0x12, 0x34, 0x00, 0x8F,
    0x02,                                                       // JK_AJP13_FORWARD_REQUEST
    0x02,                                                       // GET
    0x00, 0x08, b'H', b'T', b'T', b'P', b'/', b'1', b'.', b'1', 0x00,
    0x00, 0x0E, b'/', b't', b'e', b's', b't', b'/', b't', b'e', b's', b't', b'.', b'j', b's', b'p', 0x00,
    0x00, 0x09, b'1', b'2', b'7', b'.', b'0', b'.', b'0', b'.', b'1', 0x00,
    0xFF, 0xFF,                                                 // remote_host (null)
    0x00, 0x09, b'l', b'o', b'c', b'a', b'l', b'h', b'o', b's', b't', 0x00,
    0x00, 0x50,                                                 // port 80
    0x00,                                                       // is_ssl
    0x00, 0x03,                                                 // num_headers
    0xA0, 0x0B,                                                 // host
    0x00, 0x09, b'l', b'o', b'c', b'a', b'l', b'h', b'o', b's', b't', 0x00,
    0xA0, 0x0E,                                                 // user-agent
    0x00, 0x04, b'c', b'u', b'r', b'l', 0x00,
    0x00, 0x06, b'X', b'-', b'T', b'e', b's', b't', 0x00,       // 名前付きヘッダー
    0x00, 0x03, b'y', b'e', b's', 0x00,
    0x05,                                                       // query_string
    0x00, 0x07, b'A', b'=', b'A', b'&', b'B', b'=', b'B', 0x00,
    0x06,                                                       // jvm_route
    0x00, 0x05, b'n', b'o', b'd', b'e', b'1', 0x00,
    0x0A,                                                       // req_attribute
    0x00, 0x0B, b'R', b'E', b'M', b'O', b'T', b'E', b'_', b'P', b'O', b'R', b'T', 0x00,
    0x00, 0x05, b'5', b'4', b'3', b'2', b'1', 0x00,
    0xFF,
];

/// 受け取ったイベントを順に記録するリスナー
#[derive(Debug, Default, PartialEq, Eq)]
struct Events(Vec<String>);

impl ParameterListener for Events {
    fn on_parameter(&mut self, name: &str, value: &str) {
        self.0.push(format!("parameter {name}={value}"));
    }
}

impl ForwardRequestListener for Events {
    fn on_method(&mut self, method: &str) {
        self.0.push(format!("method {method}"));
    }

    fn on_protocol(&mut self, protocol: &str) {
        self.0.push(format!("protocol {protocol}"));
    }

    fn on_uri(&mut self, uri: &str) {
        self.0.push(format!("uri {uri}"));
    }

    fn on_remote_addr(&mut self, addr: &str) {
        self.0.push(format!("remote_addr {addr}"));
    }

    fn on_remote_host(&mut self, host: &str) {
        self.0.push(format!("remote_host {host}"));
    }

    fn on_server_name(&mut self, name: &str) {
        self.0.push(format!("server_name {name}"));
    }

    fn on_server_port(&mut self, port: u16) {
        self.0.push(format!("server_port {port}"));
    }

    fn on_ssl(&mut self, is_ssl: bool) {
        self.0.push(format!("ssl {is_ssl}"));
    }

    fn on_header(&mut self, name: &str, value: &str) {
        self.0.push(format!("header {name}: {value}"));
    }

    fn on_attribute(&mut self, name: &str, value: &str) {
        self.0.push(format!("attribute {name}={value}"));
    }
}

fn decode_chunks<'a>(chunks: impl IntoIterator<Item = &'a [u8]>) -> Result<Events, Error> {
    let mut decoder = ForwardRequestDecoder::new();
    let mut events = Events::default();
    for chunk in chunks {
        let mut input = chunk;
        decoder.decode(&mut input, &mut events)?;
        assert!(input.is_empty());
    }
    decoder.close(&mut events)?;
    Ok(events)
}

#[test]
fn test_declared_size_matches_payload() {
    assert_eq!(FORWARD_REQUEST.len(), 4 + 0x8F);
}

#[test]
fn test_forward_request_events() {
    let events = decode_chunks([FORWARD_REQUEST]).unwrap();
    assert_eq!(
        events.0,
        vec![
            "method GET",
            "protocol HTTP/1.1",
            "uri /test/test.jsp",
            "remote_addr 127.0.0.1",
            "remote_host ",
            "server_name localhost",
            "server_port 80",
            "ssl false",
            "header host: localhost",
            "header user-agent: curl",
            "header X-Test: yes",
            "parameter A=A",
            "parameter B=B",
            "attribute query_string=A=A&B=B",
            "attribute jvm_route=node1",
            "attribute REMOTE_PORT=54321",
        ]
    );
}

#[test]
fn test_forward_request_any_chunking() {
    let expected = decode_chunks([FORWARD_REQUEST]).unwrap();
    for size in 1..=FORWARD_REQUEST.len() {
        assert_eq!(
            decode_chunks(FORWARD_REQUEST.chunks(size)).unwrap(),
            expected,
            "chunk size {size}"
        );
    }
    for i in 0..=FORWARD_REQUEST.len() {
        let (head, tail) = FORWARD_REQUEST.split_at(i);
        assert_eq!(decode_chunks([head, tail]).unwrap(), expected, "split at {i}");
    }
}

#[test]
fn test_forward_request_collected() {
    let mut decoder = ForwardRequestDecoder::new();
    let mut request = ForwardRequest::new();
    let mut input = FORWARD_REQUEST;
    assert!(decoder.decode(&mut input, &mut request).unwrap());
    assert_eq!(request.method, "GET");
    assert_eq!(request.uri, "/test/test.jsp");
    assert_eq!(request.server_port, 80);
    assert_eq!(request.header("User-Agent"), Some("curl"));
    assert_eq!(request.parameters.get("B"), Some("B"));
    assert_eq!(request.attribute("jvm_route"), Some("node1"));
}

#[test]
fn test_forward_request_header_limit() {
    let limits = DecoderLimits {
        max_header_count: 2,
        ..DecoderLimits::default()
    };
    let mut decoder = ForwardRequestDecoder::with_limits(limits);
    let mut input = FORWARD_REQUEST;
    assert!(matches!(
        decoder.decode(&mut input, &mut ForwardRequest::new()),
        Err(Error::TooLong { limit: 2, .. })
    ));
}

#[test]
fn test_request_then_body_packets() {
    // Forward Request の後にボディのデータパケットと空パケットが続く
    let mut stream = FORWARD_REQUEST.to_vec();
    stream.extend_from_slice(&[0x12, 0x34, 0x00, 0x07, 0x00, 0x05, b'h', b'e', b'l', b'l', b'o']);
    stream.extend_from_slice(&[0x12, 0x34, 0x00, 0x00]);

    let mut input: &[u8] = &stream;
    let mut request = ForwardRequest::new();
    assert!(
        ForwardRequestDecoder::new()
            .decode(&mut input, &mut request)
            .unwrap()
    );

    let mut decoder = AjpDataDecoder::new();
    let mut body = Vec::new();
    assert!(decoder.decode(&mut input, &mut body).unwrap());
    assert!(!decoder.is_end_of_body());
    decoder.reset();
    assert!(decoder.decode(&mut input, &mut body).unwrap());
    assert!(decoder.is_end_of_body());
    assert!(input.is_empty());
    assert_eq!(body, b"hello");
}
