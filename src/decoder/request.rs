//! HTTP リクエストデコーダー
//!
//! リクエスト行、ヘッダーブロック、ボディを順にデコードする。
//! ボディのフレーミングは Content-Length / Transfer-Encoding から決める。

use crate::error::Error;
use crate::limits::DecoderLimits;
use crate::query::ParameterListener;

use super::chunked::{ChunkListener, ChunkedBodyDecoder};
use super::header::{HeaderBlockDecoder, HeaderListener};
use super::phase::{BodyKind, DecodePhase};
use super::request_line::{HTTP_0_9, RequestLine, RequestLineDecoder, RequestLineListener};

/// リクエスト全体を受け取るリスナー
pub trait RequestListener: RequestLineListener + HeaderListener {
    /// ボディの断片 (chunked の場合はデコード済み)
    fn on_body(&mut self, data: &[u8]);

    /// chunked のトレーラーフィールド
    fn on_trailer(&mut self, name: &str, value: &str) {
        let _ = (name, value);
    }
}

/// デコードしたリクエスト
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Request {
    pub line: RequestLine,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub trailers: Vec<(String, String)>,
}

impl Request {
    /// ヘッダーを名前 (大文字小文字を区別しない) で取得
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

impl ParameterListener for Request {
    fn on_parameter(&mut self, name: &str, value: &str) {
        self.line.on_parameter(name, value);
    }
}

impl RequestLineListener for Request {
    fn on_method(&mut self, method: &str) {
        self.line.on_method(method);
    }

    fn on_uri(&mut self, uri: &str) {
        self.line.on_uri(uri);
    }

    fn on_query_string(&mut self, query: &str) {
        self.line.on_query_string(query);
    }

    fn on_protocol(&mut self, protocol: &str) {
        self.line.on_protocol(protocol);
    }
}

impl HeaderListener for Request {
    fn on_header(&mut self, name: &str, value: &str) {
        self.headers.push((name.to_string(), value.to_string()));
    }
}

impl RequestListener for Request {
    fn on_body(&mut self, data: &[u8]) {
        self.body.extend_from_slice(data);
    }

    fn on_trailer(&mut self, name: &str, value: &str) {
        self.trailers.push((name.to_string(), value.to_string()));
    }
}

/// プロトコルを控えながらリクエスト行を転送する
struct LineTap<'a, L: ?Sized> {
    inner: &'a mut L,
    protocol: &'a mut String,
}

impl<L: RequestListener + ?Sized> ParameterListener for LineTap<'_, L> {
    fn on_parameter(&mut self, name: &str, value: &str) {
        self.inner.on_parameter(name, value);
    }
}

impl<L: RequestListener + ?Sized> RequestLineListener for LineTap<'_, L> {
    fn on_method(&mut self, method: &str) {
        self.inner.on_method(method);
    }

    fn on_uri(&mut self, uri: &str) {
        self.inner.on_uri(uri);
    }

    fn on_query_string(&mut self, query: &str) {
        self.inner.on_query_string(query);
    }

    fn on_protocol(&mut self, protocol: &str) {
        self.protocol.clear();
        self.protocol.push_str(protocol);
        self.inner.on_protocol(protocol);
    }
}

/// フレーミングに関わるヘッダーを控えながらヘッダーを転送する
struct HeaderTap<'a, L: ?Sized> {
    inner: &'a mut L,
    framing: &'a mut Vec<(String, String)>,
}

impl<L: RequestListener + ?Sized> HeaderListener for HeaderTap<'_, L> {
    fn on_header(&mut self, name: &str, value: &str) {
        if name.eq_ignore_ascii_case("Content-Length")
            || name.eq_ignore_ascii_case("Transfer-Encoding")
        {
            self.framing.push((name.to_string(), value.to_string()));
        }
        self.inner.on_header(name, value);
    }
}

/// chunked ボディを [`RequestListener`] に転送する
struct BodyTap<'a, L: ?Sized>(&'a mut L);

impl<L: RequestListener + ?Sized> ChunkListener for BodyTap<'_, L> {
    fn on_chunk(&mut self, data: &[u8]) {
        self.0.on_body(data);
    }

    fn on_trailer(&mut self, name: &str, value: &str) {
        RequestListener::on_trailer(&mut *self.0, name, value);
    }
}

/// HTTP リクエストデコーダー
///
/// 1 つのリクエストを読み終えると `Ok(true)` を返し、
/// パイプライン化された次のリクエストのバイトはカーソルに残す。
/// 次のリクエストの前に [`reset`](Self::reset) を呼ぶ。
#[derive(Debug, Clone)]
pub struct RequestDecoder {
    phase: DecodePhase,
    line: RequestLineDecoder,
    headers: HeaderBlockDecoder,
    chunked: ChunkedBodyDecoder,
    protocol: String,
    framing: Vec<(String, String)>,
    body_kind: Option<BodyKind>,
    limits: DecoderLimits,
}

impl Default for RequestDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestDecoder {
    /// 新しいデコーダーを作成
    pub fn new() -> Self {
        Self::with_limits(DecoderLimits::default())
    }

    /// 制限付きでデコーダーを作成
    pub fn with_limits(limits: DecoderLimits) -> Self {
        Self {
            phase: DecodePhase::RequestLine,
            line: RequestLineDecoder::with_limits(limits.clone()),
            headers: HeaderBlockDecoder::with_limits(limits.clone()),
            chunked: ChunkedBodyDecoder::with_limits(limits.clone()),
            protocol: String::new(),
            framing: Vec::new(),
            body_kind: None,
            limits,
        }
    }

    /// 制限設定を取得
    pub fn limits(&self) -> &DecoderLimits {
        &self.limits
    }

    /// ヘッダーブロックから決まったボディの種類 (ヘッダーを読み終えるまでは `None`)
    pub fn body_kind(&self) -> Option<BodyKind> {
        self.body_kind
    }

    /// 入力を読めるだけ読む
    pub fn decode<L: RequestListener + ?Sized>(
        &mut self,
        input: &mut &[u8],
        listener: &mut L,
    ) -> Result<bool, Error> {
        loop {
            match self.phase {
                DecodePhase::RequestLine => {
                    let mut tap = LineTap {
                        inner: &mut *listener,
                        protocol: &mut self.protocol,
                    };
                    if !self.line.decode(input, &mut tap)? {
                        return Ok(false);
                    }
                    self.after_request_line();
                }
                DecodePhase::Headers => {
                    let mut tap = HeaderTap {
                        inner: &mut *listener,
                        framing: &mut self.framing,
                    };
                    if !self.headers.decode(input, &mut tap)? {
                        return Ok(false);
                    }
                    self.after_headers()?;
                }
                DecodePhase::BodyContentLength { remaining } => {
                    if remaining == 0 {
                        self.phase = DecodePhase::Complete;
                        continue;
                    }
                    if input.is_empty() {
                        return Ok(false);
                    }
                    let n = usize::try_from(remaining)
                        .map_or(input.len(), |remaining| remaining.min(input.len()));
                    let (data, rest) = input.split_at(n);
                    listener.on_body(data);
                    *input = rest;
                    self.phase = DecodePhase::BodyContentLength {
                        remaining: remaining - n as u64,
                    };
                }
                DecodePhase::BodyChunked => {
                    if !self.chunked.decode(input, &mut BodyTap(&mut *listener))? {
                        return Ok(false);
                    }
                    self.phase = DecodePhase::Complete;
                }
                DecodePhase::Complete => return Ok(true),
            }
        }
    }

    /// 入力の終端を通知する
    ///
    /// 終端のないリクエスト行とヘッダーブロックは確定させるが、
    /// ボディが途中で終わっている場合は `BadRequest` になる。
    pub fn close<L: RequestListener + ?Sized>(&mut self, listener: &mut L) -> Result<(), Error> {
        if self.phase == DecodePhase::RequestLine {
            let mut tap = LineTap {
                inner: &mut *listener,
                protocol: &mut self.protocol,
            };
            self.line.close(&mut tap)?;
            self.after_request_line();
        }
        if self.phase == DecodePhase::Headers {
            let mut tap = HeaderTap {
                inner: &mut *listener,
                framing: &mut self.framing,
            };
            self.headers.close(&mut tap)?;
            self.after_headers()?;
        }
        match self.phase {
            DecodePhase::BodyContentLength { remaining: 0 } | DecodePhase::Complete => {
                self.phase = DecodePhase::Complete;
                Ok(())
            }
            DecodePhase::BodyContentLength { .. } => {
                Err(Error::bad_request("request body is shorter than Content-Length"))
            }
            DecodePhase::BodyChunked => self.chunked.close(&mut BodyTap(&mut *listener)),
            DecodePhase::RequestLine | DecodePhase::Headers => Ok(()),
        }
    }

    /// 次のリクエストのためにリセット
    pub fn reset(&mut self) {
        self.phase = DecodePhase::RequestLine;
        self.line.reset();
        self.headers.reset();
        self.chunked.reset();
        self.protocol.clear();
        self.framing.clear();
        self.body_kind = None;
    }

    fn after_request_line(&mut self) {
        if self.protocol == HTTP_0_9 {
            // HTTP/0.9 の simple-request にはヘッダーもボディもない
            self.body_kind = Some(BodyKind::None);
            self.phase = DecodePhase::Complete;
        } else {
            self.phase = DecodePhase::Headers;
        }
    }

    fn after_headers(&mut self) -> Result<(), Error> {
        let kind = resolve_body_kind(&self.framing)?;
        self.body_kind = Some(kind);
        self.phase = match kind {
            BodyKind::ContentLength(remaining) => DecodePhase::BodyContentLength { remaining },
            BodyKind::Chunked => DecodePhase::BodyChunked,
            BodyKind::None => DecodePhase::Complete,
        };
        Ok(())
    }
}

/// Transfer-Encoding ヘッダーを解析
///
/// RFC 9112: chunked は一度だけ指定可能で、最後のエンコーディングでなければならない。
/// 複数の Transfer-Encoding ヘッダーは連結して単一のリストとして扱う。
fn parse_transfer_encoding_chunked(headers: &[(String, String)]) -> Result<bool, Error> {
    let mut chunked = false;
    for (name, value) in headers {
        if !name.eq_ignore_ascii_case("Transfer-Encoding") {
            continue;
        }
        for token in value.split(',') {
            let token = token.trim();
            if token.is_empty() {
                return Err(Error::bad_request("invalid Transfer-Encoding: empty token"));
            }
            if chunked {
                return Err(Error::bad_request(
                    "invalid Transfer-Encoding: chunked is not the final coding",
                ));
            }
            if token.eq_ignore_ascii_case("chunked") {
                chunked = true;
            } else {
                return Err(Error::bad_request(format!(
                    "invalid Transfer-Encoding: unsupported coding {token}"
                )));
            }
        }
    }
    Ok(chunked)
}

/// Content-Length ヘッダーを解析
fn parse_content_length(headers: &[(String, String)]) -> Result<Option<u64>, Error> {
    let mut value: Option<u64> = None;
    for (name, raw) in headers {
        if !name.eq_ignore_ascii_case("Content-Length") {
            continue;
        }
        let raw = raw.trim();
        if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::bad_request("invalid Content-Length: not a number"));
        }
        let parsed = raw
            .parse::<u64>()
            .map_err(|_| Error::bad_request("invalid Content-Length: overflow"))?;
        match value {
            Some(prev) if prev != parsed => {
                return Err(Error::bad_request("invalid Content-Length: mismatched values"));
            }
            _ => value = Some(parsed),
        }
    }
    Ok(value)
}

/// ボディ関連ヘッダーからボディの種類を決める
fn resolve_body_kind(headers: &[(String, String)]) -> Result<BodyKind, Error> {
    let chunked = parse_transfer_encoding_chunked(headers)?;
    let content_length = parse_content_length(headers)?;
    match (chunked, content_length) {
        (true, Some(_)) => Err(Error::bad_request(
            "invalid message: both Transfer-Encoding and Content-Length",
        )),
        (true, None) => Ok(BodyKind::Chunked),
        (false, Some(length)) => Ok(BodyKind::ContentLength(length)),
        (false, None) => Ok(BodyKind::None),
    }
}
