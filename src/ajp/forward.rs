//! AJP13 Forward Request パケット
//!
//! ```text
//! magic (2) size (2)
//! prefix_code (1) = 0x02
//! method (1)
//! protocol, req_uri, remote_addr, remote_host, server_name (string)
//! server_port (2) is_ssl (1)
//! num_headers (2) { (code (2) | name (string)) value (string) } * num_headers
//! { attribute_code (1) value } * 0xFF
//! ```
//!
//! 宣言されたパケット長がペイロードの上限になる。
//! 終端 0xFF の後に残ったバイトは読み飛ばし、上限を超えて読もうとした場合は BadRequest になる。

use crate::error::{Error, LimitKind};
use crate::limits::DecoderLimits;
use crate::query::{ParameterListener, Parameters, QueryStringDecoder};

use super::code::{
    self, AjpPacketKind, ATTRIBUTE_TERMINATOR, HEADER_CODE_MIN, SERVER_MAGIC, STORED_METHOD,
};
use super::field::{ByteReader, IntReader, StringReader};

/// Forward Request の各フィールドの受け取り先
///
/// フィールドはパケット内の順に呼ばれる。
/// `query_string` 属性はパラメータに分解されて [`ParameterListener::on_parameter`] に渡された後、
/// 生の値が [`on_attribute`](Self::on_attribute) にも渡される。
pub trait ForwardRequestListener: ParameterListener {
    fn on_method(&mut self, method: &str);

    fn on_protocol(&mut self, protocol: &str);

    fn on_uri(&mut self, uri: &str);

    fn on_remote_addr(&mut self, addr: &str);

    fn on_remote_host(&mut self, host: &str);

    fn on_server_name(&mut self, name: &str);

    fn on_server_port(&mut self, port: u16);

    fn on_ssl(&mut self, is_ssl: bool);

    /// ヘッダー (コードで送られたヘッダーは小文字の名前になる)
    fn on_header(&mut self, name: &str, value: &str);

    fn on_attribute(&mut self, name: &str, value: &str);
}

/// デコード済みの Forward Request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForwardRequest {
    pub method: String,
    pub protocol: String,
    pub uri: String,
    pub remote_addr: String,
    pub remote_host: String,
    pub server_name: String,
    pub server_port: u16,
    pub is_ssl: bool,
    pub headers: Vec<(String, String)>,
    pub attributes: Vec<(String, String)>,
    pub parameters: Parameters,
}

impl ForwardRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// ヘッダーを名前 (大文字小文字を区別しない) で取得
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// 属性を名前で取得
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

impl ParameterListener for ForwardRequest {
    fn on_parameter(&mut self, name: &str, value: &str) {
        self.parameters.on_parameter(name, value);
    }
}

impl ForwardRequestListener for ForwardRequest {
    fn on_method(&mut self, method: &str) {
        self.method = method.to_string();
    }

    fn on_protocol(&mut self, protocol: &str) {
        self.protocol = protocol.to_string();
    }

    fn on_uri(&mut self, uri: &str) {
        self.uri = uri.to_string();
    }

    fn on_remote_addr(&mut self, addr: &str) {
        self.remote_addr = addr.to_string();
    }

    fn on_remote_host(&mut self, host: &str) {
        self.remote_host = host.to_string();
    }

    fn on_server_name(&mut self, name: &str) {
        self.server_name = name.to_string();
    }

    fn on_server_port(&mut self, port: u16) {
        self.server_port = port;
    }

    fn on_ssl(&mut self, is_ssl: bool) {
        self.is_ssl = is_ssl;
    }

    fn on_header(&mut self, name: &str, value: &str) {
        self.headers.push((name.to_string(), value.to_string()));
    }

    fn on_attribute(&mut self, name: &str, value: &str) {
        self.attributes.push((name.to_string(), value.to_string()));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ForwardPhase {
    Magic,
    Size,
    Prefix,
    Method,
    Protocol,
    Uri,
    RemoteAddr,
    RemoteHost,
    ServerName,
    ServerPort,
    IsSsl,
    NumHeaders,
    HeaderName,
    HeaderNameString,
    HeaderValue,
    AttributeCode,
    AttributeValue(u8),
    AttributeReqName,
    AttributeReqValue,
    AttributeKeySize,
    Skip,
    Complete,
}

/// AJP13 Forward Request デコーダー
///
/// 2 バイト整数、長さ付き文字列、1 バイトの各フィールドを
/// 入力がどこで分割されていても同じ結果になるように読む。
#[derive(Debug, Clone)]
pub struct ForwardRequestDecoder {
    phase: ForwardPhase,
    byte: ByteReader,
    int: IntReader,
    string: StringReader,
    /// パケットの残りバイト数
    remaining: usize,
    num_headers: usize,
    header_count: usize,
    header_name: String,
    attribute_name: String,
    method_pending: bool,
    query: QueryStringDecoder,
    limits: DecoderLimits,
}

impl Default for ForwardRequestDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ForwardRequestDecoder {
    pub fn new() -> Self {
        Self::with_limits(DecoderLimits::default())
    }

    pub fn with_limits(limits: DecoderLimits) -> Self {
        Self {
            phase: ForwardPhase::Magic,
            byte: ByteReader::new(),
            int: IntReader::new(),
            string: StringReader::new(),
            remaining: 0,
            num_headers: 0,
            header_count: 0,
            header_name: String::new(),
            attribute_name: String::new(),
            method_pending: false,
            query: QueryStringDecoder::with_limits(limits.clone()),
            limits,
        }
    }

    pub fn limits(&self) -> &DecoderLimits {
        &self.limits
    }

    pub fn is_complete(&self) -> bool {
        self.phase == ForwardPhase::Complete
    }

    pub fn decode<L: ForwardRequestListener + ?Sized>(
        &mut self,
        input: &mut &[u8],
        listener: &mut L,
    ) -> Result<bool, Error> {
        loop {
            match self.phase {
                ForwardPhase::Complete => return Ok(true),
                _ if input.is_empty() => return Ok(false),
                ForwardPhase::Magic => {
                    let Some(magic) = self.int.read_u16(input) else {
                        continue;
                    };
                    if magic != SERVER_MAGIC {
                        return Err(Error::bad_request(format!(
                            "invalid AJP magic {magic:#06x}"
                        )));
                    }
                    self.phase = ForwardPhase::Size;
                }
                ForwardPhase::Size => {
                    let Some(size) = self.int.read_u16(input) else {
                        continue;
                    };
                    self.remaining = usize::from(size);
                    self.phase = ForwardPhase::Prefix;
                }
                ForwardPhase::Skip => {
                    let n = self.remaining.min(input.len());
                    *input = &input[n..];
                    self.remaining -= n;
                    self.finish_if_drained();
                }
                _ => {
                    if self.remaining == 0 {
                        return Err(Error::bad_request(
                            "AJP forward request exceeds declared packet size",
                        ));
                    }
                    let len = self.remaining.min(input.len());
                    let mut window = &input[..len];
                    let result = self.step(&mut window, listener);
                    let consumed = len - window.len();
                    *input = &input[consumed..];
                    self.remaining -= consumed;
                    result?;
                    if self.phase == ForwardPhase::Skip {
                        self.finish_if_drained();
                    }
                }
            }
        }
    }

    /// 入力の終端を通知する
    pub fn close<L: ForwardRequestListener + ?Sized>(
        &mut self,
        listener: &mut L,
    ) -> Result<(), Error> {
        let _ = listener;
        if self.phase != ForwardPhase::Complete {
            return Err(Error::bad_request("incomplete AJP forward request"));
        }
        Ok(())
    }

    pub fn reset(&mut self) {
        self.phase = ForwardPhase::Magic;
        self.byte.reset();
        self.int.reset();
        self.string.reset();
        self.remaining = 0;
        self.num_headers = 0;
        self.header_count = 0;
        self.header_name.clear();
        self.attribute_name.clear();
        self.method_pending = false;
        self.query.reset();
    }

    fn finish_if_drained(&mut self) {
        if self.remaining == 0 {
            crate::log::trace!("AJP forward request complete");
            self.phase = ForwardPhase::Complete;
        }
    }

    /// パケット内の 1 フィールドを読む
    ///
    /// `window` はパケットの残りバイト数で切り詰められている。
    fn step<L: ForwardRequestListener + ?Sized>(
        &mut self,
        window: &mut &[u8],
        listener: &mut L,
    ) -> Result<(), Error> {
        match self.phase {
            ForwardPhase::Prefix => {
                let Some(prefix) = self.byte.read_u8(window) else {
                    return Ok(());
                };
                if AjpPacketKind::from_code(prefix) != Some(AjpPacketKind::ForwardRequest) {
                    return Err(Error::bad_request(format!(
                        "unexpected AJP prefix code {prefix:#04x}"
                    )));
                }
                self.phase = ForwardPhase::Method;
            }
            ForwardPhase::Method => {
                let Some(method) = self.byte.read_u8(window) else {
                    return Ok(());
                };
                if method == STORED_METHOD {
                    self.method_pending = true;
                } else {
                    let name = code::method_name(method).ok_or_else(|| {
                        Error::bad_request(format!("unknown AJP method code {method}"))
                    })?;
                    listener.on_method(name);
                }
                self.phase = ForwardPhase::Protocol;
            }
            ForwardPhase::Protocol => {
                if let Some(value) = self.string.read(window)? {
                    listener.on_protocol(&value);
                    self.phase = ForwardPhase::Uri;
                }
            }
            ForwardPhase::Uri => {
                if let Some(value) = self.string.read(window)? {
                    listener.on_uri(&value);
                    self.phase = ForwardPhase::RemoteAddr;
                }
            }
            ForwardPhase::RemoteAddr => {
                if let Some(value) = self.string.read(window)? {
                    listener.on_remote_addr(&value);
                    self.phase = ForwardPhase::RemoteHost;
                }
            }
            ForwardPhase::RemoteHost => {
                if let Some(value) = self.string.read(window)? {
                    listener.on_remote_host(&value);
                    self.phase = ForwardPhase::ServerName;
                }
            }
            ForwardPhase::ServerName => {
                if let Some(value) = self.string.read(window)? {
                    listener.on_server_name(&value);
                    self.phase = ForwardPhase::ServerPort;
                }
            }
            ForwardPhase::ServerPort => {
                if let Some(port) = self.int.read_u16(window) {
                    listener.on_server_port(port);
                    self.phase = ForwardPhase::IsSsl;
                }
            }
            ForwardPhase::IsSsl => {
                if let Some(is_ssl) = self.byte.read_u8(window) {
                    listener.on_ssl(is_ssl != 0);
                    self.phase = ForwardPhase::NumHeaders;
                }
            }
            ForwardPhase::NumHeaders => {
                let Some(n) = self.int.read_u16(window) else {
                    return Ok(());
                };
                self.num_headers = usize::from(n);
                if self.num_headers > self.limits.max_header_count {
                    return Err(Error::too_long(
                        LimitKind::HeaderCount,
                        self.limits.max_header_count,
                    ));
                }
                self.header_count = 0;
                self.phase = if self.num_headers == 0 {
                    ForwardPhase::AttributeCode
                } else {
                    ForwardPhase::HeaderName
                };
            }
            ForwardPhase::HeaderName => {
                let Some(code) = self.int.read_u16(window) else {
                    return Ok(());
                };
                if code >= HEADER_CODE_MIN {
                    let name = code::header_name(code).ok_or_else(|| {
                        Error::bad_request(format!("unknown AJP header code {code:#06x}"))
                    })?;
                    self.header_name.clear();
                    self.header_name.push_str(name);
                    self.phase = ForwardPhase::HeaderValue;
                } else {
                    // コードではなくヘッダー名の長さ
                    self.string.start_with_length(code);
                    self.phase = ForwardPhase::HeaderNameString;
                }
            }
            ForwardPhase::HeaderNameString => {
                if let Some(name) = self.string.read(window)? {
                    self.header_name = name;
                    self.phase = ForwardPhase::HeaderValue;
                }
            }
            ForwardPhase::HeaderValue => {
                let Some(value) = self.string.read(window)? else {
                    return Ok(());
                };
                listener.on_header(&self.header_name, &value);
                self.header_count += 1;
                self.phase = if self.header_count == self.num_headers {
                    ForwardPhase::AttributeCode
                } else {
                    ForwardPhase::HeaderName
                };
            }
            ForwardPhase::AttributeCode => {
                let Some(attribute) = self.byte.read_u8(window) else {
                    return Ok(());
                };
                match attribute {
                    ATTRIBUTE_TERMINATOR => {
                        if self.method_pending {
                            return Err(Error::bad_request(
                                "AJP stored method without stored_method attribute",
                            ));
                        }
                        self.phase = ForwardPhase::Skip;
                    }
                    code::attribute::REQ_ATTRIBUTE => self.phase = ForwardPhase::AttributeReqName,
                    code::attribute::SSL_KEY_SIZE => self.phase = ForwardPhase::AttributeKeySize,
                    _ if code::attribute_name(attribute).is_some() => {
                        self.phase = ForwardPhase::AttributeValue(attribute);
                    }
                    _ => {
                        crate::log::debug!("ignore unknown AJP attribute code {:#04x}", attribute);
                    }
                }
            }
            ForwardPhase::AttributeValue(attribute) => {
                let Some(value) = self.string.read(window)? else {
                    return Ok(());
                };
                self.attribute_value(attribute, &value, listener)?;
                self.phase = ForwardPhase::AttributeCode;
            }
            ForwardPhase::AttributeReqName => {
                if let Some(name) = self.string.read(window)? {
                    self.attribute_name = name;
                    self.phase = ForwardPhase::AttributeReqValue;
                }
            }
            ForwardPhase::AttributeReqValue => {
                if let Some(value) = self.string.read(window)? {
                    listener.on_attribute(&self.attribute_name, &value);
                    self.phase = ForwardPhase::AttributeCode;
                }
            }
            ForwardPhase::AttributeKeySize => {
                if let Some(size) = self.int.read_u16(window) {
                    listener.on_attribute("ssl_key_size", &size.to_string());
                    self.phase = ForwardPhase::AttributeCode;
                }
            }
            ForwardPhase::Magic
            | ForwardPhase::Size
            | ForwardPhase::Skip
            | ForwardPhase::Complete => {}
        }
        Ok(())
    }

    fn attribute_value<L: ForwardRequestListener + ?Sized>(
        &mut self,
        attribute: u8,
        value: &str,
        listener: &mut L,
    ) -> Result<(), Error> {
        match attribute {
            code::attribute::QUERY_STRING => {
                self.query.reset();
                let mut input = value.as_bytes();
                self.query.decode(&mut input, listener)?;
                self.query.close(listener)?;
            }
            code::attribute::STORED_METHOD if self.method_pending => {
                if value.is_empty() {
                    return Err(Error::bad_request("empty AJP stored method"));
                }
                self.method_pending = false;
                listener.on_method(value);
            }
            _ => {}
        }
        if let Some(name) = code::attribute_name(attribute) {
            listener.on_attribute(name, value);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn string(buf: &mut Vec<u8>, s: &str) {
        buf.extend_from_slice(&(s.len() as u16).to_be_bytes());
        buf.extend_from_slice(s.as_bytes());
        buf.push(0);
    }

    fn packet(payload: &[u8]) -> Vec<u8> {
        let mut buf = vec![0x12, 0x34];
        buf.extend_from_slice(&(payload.len() as u16).to_be_bytes());
        buf.extend_from_slice(payload);
        buf
    }

    fn head(method: u8) -> Vec<u8> {
        let mut p = vec![0x02, method];
        string(&mut p, "HTTP/1.1");
        string(&mut p, "/test/test.jsp");
        string(&mut p, "127.0.0.1");
        p.extend_from_slice(&[0xFF, 0xFF]); // remote_host は null
        string(&mut p, "localhost");
        p.extend_from_slice(&8080u16.to_be_bytes());
        p.push(0x00);
        p
    }

    fn sample() -> Vec<u8> {
        let mut p = head(0x02);
        p.extend_from_slice(&[0x00, 0x02]);
        p.extend_from_slice(&[0xA0, 0x0B]);
        string(&mut p, "localhost:8080");
        string(&mut p, "X-Custom");
        string(&mut p, "abc");
        p.push(0x05);
        string(&mut p, "A=A&B=B");
        p.push(0x0A);
        string(&mut p, "k");
        string(&mut p, "v");
        p.push(0x0B);
        p.extend_from_slice(&128u16.to_be_bytes());
        p.push(0x0E); // 未知の属性
        p.push(0xFF);
        packet(&p)
    }

    fn decode_whole(bytes: &[u8]) -> Result<ForwardRequest, Error> {
        let mut decoder = ForwardRequestDecoder::new();
        let mut request = ForwardRequest::new();
        let mut input = bytes;
        assert!(decoder.decode(&mut input, &mut request)?);
        decoder.close(&mut request)?;
        Ok(request)
    }

    #[test]
    fn test_forward_request() {
        let request = decode_whole(&sample()).unwrap();
        assert_eq!(request.method, "GET");
        assert_eq!(request.protocol, "HTTP/1.1");
        assert_eq!(request.uri, "/test/test.jsp");
        assert_eq!(request.remote_addr, "127.0.0.1");
        assert_eq!(request.remote_host, "");
        assert_eq!(request.server_name, "localhost");
        assert_eq!(request.server_port, 8080);
        assert!(!request.is_ssl);
        assert_eq!(
            request.headers,
            vec![
                ("host".to_string(), "localhost:8080".to_string()),
                ("X-Custom".to_string(), "abc".to_string()),
            ]
        );
        assert_eq!(request.header("HOST"), Some("localhost:8080"));
        assert_eq!(request.parameters.get("A"), Some("A"));
        assert_eq!(request.parameters.get("B"), Some("B"));
        assert_eq!(request.attribute("query_string"), Some("A=A&B=B"));
        assert_eq!(request.attribute("k"), Some("v"));
        assert_eq!(request.attribute("ssl_key_size"), Some("128"));
        assert_eq!(request.attributes.len(), 3);
    }

    #[test]
    fn test_every_split_gives_same_result() {
        let bytes = sample();
        let expected = decode_whole(&bytes).unwrap();
        for size in 1..=bytes.len() {
            let mut decoder = ForwardRequestDecoder::new();
            let mut request = ForwardRequest::new();
            let mut complete = false;
            for chunk in bytes.chunks(size) {
                let mut input = chunk;
                complete = decoder.decode(&mut input, &mut request).unwrap();
                assert!(input.is_empty());
            }
            assert!(complete, "chunk size {size}");
            assert_eq!(request, expected, "chunk size {size}");
        }
    }

    #[test]
    fn test_stored_method() {
        let mut p = head(STORED_METHOD);
        p.extend_from_slice(&[0x00, 0x00]);
        p.push(0x0D);
        string(&mut p, "BREW");
        p.push(0xFF);
        let request = decode_whole(&packet(&p)).unwrap();
        assert_eq!(request.method, "BREW");
        assert_eq!(request.attribute("stored_method"), Some("BREW"));

        let mut p = head(STORED_METHOD);
        p.extend_from_slice(&[0x00, 0x00, 0xFF]);
        assert!(matches!(
            decode_whole(&packet(&p)),
            Err(Error::BadRequest(_))
        ));
    }

    #[test]
    fn test_unknown_codes() {
        let mut p = head(99);
        p.extend_from_slice(&[0x00, 0x00, 0xFF]);
        assert!(matches!(
            decode_whole(&packet(&p)),
            Err(Error::BadRequest(_))
        ));

        let mut p = head(0x02);
        p.extend_from_slice(&[0x00, 0x01, 0xA0, 0x0F]);
        string(&mut p, "x");
        p.push(0xFF);
        assert!(matches!(
            decode_whole(&packet(&p)),
            Err(Error::BadRequest(_))
        ));
    }

    #[test]
    fn test_bad_prefix_and_magic() {
        let mut p = head(0x02);
        p[0] = AjpPacketKind::CPing.code();
        assert!(matches!(
            decode_whole(&packet(&p)),
            Err(Error::BadRequest(_))
        ));

        let mut bytes = sample();
        bytes[0] = b'A';
        bytes[1] = b'B';
        assert!(matches!(decode_whole(&bytes), Err(Error::BadRequest(_))));
    }

    #[test]
    fn test_header_count_limit() {
        let mut p = head(0x02);
        p.extend_from_slice(&[0x00, 0x04]);
        let bytes = packet(&p);
        let limits = DecoderLimits {
            max_header_count: 3,
            ..Default::default()
        };
        let mut decoder = ForwardRequestDecoder::with_limits(limits);
        let mut request = ForwardRequest::new();
        let mut input: &[u8] = &bytes;
        assert_eq!(
            decoder.decode(&mut input, &mut request),
            Err(Error::TooLong {
                kind: LimitKind::HeaderCount,
                limit: 3
            })
        );
    }

    #[test]
    fn test_packet_size_bounds_payload() {
        // 終端の後のパディングは読み飛ばし、次のパケットは残す
        let mut p = head(0x02);
        p.extend_from_slice(&[0x00, 0x00, 0xFF, 0x00, 0x00]);
        let mut bytes = packet(&p);
        bytes.extend_from_slice(b"next");
        let mut decoder = ForwardRequestDecoder::new();
        let mut request = ForwardRequest::new();
        let mut input: &[u8] = &bytes;
        assert!(decoder.decode(&mut input, &mut request).unwrap());
        assert_eq!(input, b"next");

        // 宣言された長さを超えるフィールド
        let mut p = head(0x02);
        p.extend_from_slice(&[0x00, 0x00, 0xFF]);
        let mut bytes = packet(&p[..p.len() - 2]);
        bytes.extend_from_slice(&[0x00, 0xFF]);
        assert!(matches!(decode_whole(&bytes), Err(Error::BadRequest(_))));
    }

    #[test]
    fn test_close_and_reset() {
        let bytes = sample();
        let mut decoder = ForwardRequestDecoder::new();
        let mut request = ForwardRequest::new();
        let mut input = &bytes[..10];
        assert!(!decoder.decode(&mut input, &mut request).unwrap());
        assert!(matches!(
            decoder.close(&mut request),
            Err(Error::BadRequest(_))
        ));

        decoder.reset();
        let mut request = ForwardRequest::new();
        let mut input: &[u8] = &bytes;
        assert!(decoder.decode(&mut input, &mut request).unwrap());
        assert!(decoder.is_complete());
        assert_eq!(request.method, "GET");
    }
}
