//! リクエスト行デコーダー (RFC 9112 Section 3)
//!
//! `method SP request-target [ SP HTTP-version ] CRLF` をデコードする。
//! 区切りの SP / HTAB は連続していてもよく、HTTP-version がなければ `HTTP/0.9` とみなす。
//! request-target のクエリ文字列は [`QueryStringDecoder`] に流し込み、パラメータとして emit する。

use crate::error::{Error, LimitKind};
use crate::limits::DecoderLimits;
use crate::percent::{Plus, percent_decode};
use crate::query::{ParameterListener, Parameters, QueryStringDecoder};
use crate::scan::{
    DecodeContext, bytes_to_string, is_line_end, is_token_char, is_whitespace, next_byte,
    skip_while, trim_whitespace,
};

/// HTTP-version が省略されたときのプロトコル
pub const HTTP_0_9: &str = "HTTP/0.9";

/// リクエスト行のトークンを受け取るリスナー
///
/// クエリ文字列のパラメータは [`ParameterListener::on_parameter`] で受け取る。
pub trait RequestLineListener: ParameterListener {
    fn on_method(&mut self, method: &str);

    /// パス (パーセントデコード済み、クエリ文字列を含まない)
    fn on_uri(&mut self, uri: &str);

    /// デコード前のクエリ文字列 (パラメータをすべて emit した後に呼ばれる)
    fn on_query_string(&mut self, query: &str) {
        let _ = query;
    }

    fn on_protocol(&mut self, protocol: &str);
}

/// デコードしたリクエスト行
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestLine {
    pub method: String,
    pub uri: String,
    pub query_string: Option<String>,
    pub parameters: Parameters,
    pub protocol: String,
}

impl ParameterListener for RequestLine {
    fn on_parameter(&mut self, name: &str, value: &str) {
        self.parameters.on_parameter(name, value);
    }
}

impl RequestLineListener for RequestLine {
    fn on_method(&mut self, method: &str) {
        self.method = method.to_string();
    }

    fn on_uri(&mut self, uri: &str) {
        self.uri = uri.to_string();
    }

    fn on_query_string(&mut self, query: &str) {
        self.query_string = Some(query.to_string());
    }

    fn on_protocol(&mut self, protocol: &str) {
        self.protocol = protocol.to_string();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineState {
    Method,
    Uri,
    QueryString,
    Protocol,
    /// 行末の CR を読んだ
    LineEnd,
    Complete,
}

/// リクエスト行デコーダー
#[derive(Debug, Clone)]
pub struct RequestLineDecoder {
    ctx: DecodeContext<LineState>,
    query: QueryStringDecoder,
    /// 消費したバイト数
    size: usize,
    limits: DecoderLimits,
}

impl Default for RequestLineDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestLineDecoder {
    /// 新しいデコーダーを作成
    pub fn new() -> Self {
        Self::with_limits(DecoderLimits::default())
    }

    /// 制限付きでデコーダーを作成
    pub fn with_limits(limits: DecoderLimits) -> Self {
        Self {
            ctx: DecodeContext::new(LineState::Method),
            query: QueryStringDecoder::with_limits(limits.clone()),
            size: 0,
            limits,
        }
    }

    /// 制限設定を取得
    pub fn limits(&self) -> &DecoderLimits {
        &self.limits
    }

    /// 入力を読めるだけ読む
    ///
    /// 行末の LF まで読むと `Ok(true)` を返し、以降のバイトはカーソルに残す。
    pub fn decode<L: RequestLineListener + ?Sized>(
        &mut self,
        input: &mut &[u8],
        listener: &mut L,
    ) -> Result<bool, Error> {
        while !self.ctx.done && !input.is_empty() {
            match self.ctx.state {
                LineState::Method => {
                    if self.ctx.token.is_empty() {
                        // 先頭の空行と空白は読み飛ばす (RFC 9112 Section 2.2)
                        let n = skip_while(input, |b| is_whitespace(b) || is_line_end(b));
                        self.charge(n)?;
                        if input.is_empty() {
                            break;
                        }
                    }
                    let budget = self.budget();
                    let scanned = self
                        .ctx
                        .accumulate(input, budget, |b| !is_token_char(b))
                        .map_err(|_| self.size_error())?;
                    self.size += scanned.consumed;
                    let Some(b) = scanned.delimiter else {
                        break;
                    };
                    if self.ctx.token.is_empty() {
                        return Err(Error::illegal(b, "method"));
                    }
                    if is_line_end(b) {
                        return Err(Error::bad_request("missing request-target"));
                    }
                    if !is_whitespace(b) {
                        return Err(Error::illegal(b, "method"));
                    }
                    listener.on_method(&self.ctx.take_text());
                    self.ctx.skip = true;
                    self.ctx.state = LineState::Uri;
                }
                LineState::Uri => {
                    if self.ctx.skip {
                        let n = skip_while(input, is_whitespace);
                        self.charge(n)?;
                        if input.is_empty() {
                            break;
                        }
                        self.ctx.skip = false;
                    }
                    let budget = self.budget();
                    let scanned = self
                        .ctx
                        .accumulate(input, budget, |b| !is_uri_char(b))
                        .map_err(|_| self.size_error())?;
                    self.size += scanned.consumed;
                    self.ctx.note_decode_triggers(scanned.start);
                    let Some(b) = scanned.delimiter else {
                        break;
                    };
                    if !(b == b'?' || is_whitespace(b) || is_line_end(b)) {
                        return Err(Error::illegal(b, "request-target"));
                    }
                    if self.ctx.token.is_empty() {
                        return Err(Error::bad_request("missing request-target"));
                    }
                    self.emit_uri(listener);
                    self.after_token(b, listener, LineState::QueryString);
                }
                LineState::QueryString => {
                    let budget = self.budget();
                    let Ok(scanned) = self
                        .ctx
                        .accumulate(input, budget, |b| b < 0x20 || b == 0x7F || b == b' ')
                    else {
                        // 上限までのバイトはパラメータとして読んでから失敗する
                        let mut part = &input[..budget];
                        self.query.decode(&mut part, listener)?;
                        return Err(self.size_error());
                    };
                    self.size += scanned.consumed;
                    let mut part = &self.ctx.token[scanned.start..];
                    self.query.decode(&mut part, listener)?;
                    let Some(b) = scanned.delimiter else {
                        break;
                    };
                    if !(is_whitespace(b) || is_line_end(b)) {
                        return Err(Error::illegal(b, "query string"));
                    }
                    self.emit_query(listener)?;
                    self.after_token(b, listener, LineState::Protocol);
                }
                LineState::Protocol => {
                    if self.ctx.skip {
                        let n = skip_while(input, is_whitespace);
                        self.charge(n)?;
                        if input.is_empty() {
                            break;
                        }
                        self.ctx.skip = false;
                    }
                    let budget = self.budget();
                    let scanned = self
                        .ctx
                        .accumulate(input, budget, is_line_end)
                        .map_err(|_| self.size_error())?;
                    self.size += scanned.consumed;
                    match scanned.delimiter {
                        Some(b'\r') => self.ctx.state = LineState::LineEnd,
                        Some(_) => self.finish(listener),
                        None => break,
                    }
                }
                LineState::LineEnd => {
                    let Some(b) = next_byte(input) else {
                        break;
                    };
                    self.charge(1)?;
                    if b != b'\n' {
                        return Err(Error::illegal(b, "request line end"));
                    }
                    self.finish(listener);
                }
                LineState::Complete => self.ctx.done = true,
            }
        }
        Ok(self.ctx.done)
    }

    /// 入力の終端を通知し、途中のトークンを確定する
    ///
    /// request-target まで読めていれば、行末がなくてもリクエスト行として確定する。
    pub fn close<L: RequestLineListener + ?Sized>(
        &mut self,
        listener: &mut L,
    ) -> Result<(), Error> {
        if self.ctx.done {
            return Ok(());
        }
        match self.ctx.state {
            LineState::Method => {
                return Err(Error::bad_request("missing request-target"));
            }
            LineState::Uri => {
                if self.ctx.token.is_empty() {
                    return Err(Error::bad_request("missing request-target"));
                }
                self.emit_uri(listener);
            }
            LineState::QueryString => self.emit_query(listener)?,
            LineState::Protocol | LineState::LineEnd | LineState::Complete => {}
        }
        self.finish(listener);
        Ok(())
    }

    /// デコーダーをリセット
    pub fn reset(&mut self) {
        self.ctx.reset(LineState::Method);
        self.query.reset();
        self.size = 0;
    }

    fn emit_uri<L: RequestLineListener + ?Sized>(&mut self, listener: &mut L) {
        let uri = if self.ctx.needs_decode {
            let decoded = percent_decode(&self.ctx.token, Plus::Literal);
            self.ctx.clear_token();
            decoded
        } else {
            self.ctx.take_text()
        };
        listener.on_uri(&uri);
    }

    fn emit_query<L: RequestLineListener + ?Sized>(&mut self, listener: &mut L) -> Result<(), Error> {
        self.query.close(listener)?;
        listener.on_query_string(&self.ctx.take_text());
        Ok(())
    }

    /// トークンの区切りに応じて次の状態へ進む
    fn after_token<L: RequestLineListener + ?Sized>(
        &mut self,
        delimiter: u8,
        listener: &mut L,
        on_separator: LineState,
    ) {
        match delimiter {
            b'\r' => self.ctx.state = LineState::LineEnd,
            b'\n' => self.finish(listener),
            b'?' => self.ctx.state = on_separator,
            _ => {
                self.ctx.skip = true;
                self.ctx.state = LineState::Protocol;
            }
        }
    }

    fn finish<L: RequestLineListener + ?Sized>(&mut self, listener: &mut L) {
        let protocol = trim_whitespace(&self.ctx.token);
        if protocol.is_empty() {
            listener.on_protocol(HTTP_0_9);
        } else {
            listener.on_protocol(&bytes_to_string(protocol));
        }
        self.ctx.clear_token();
        self.ctx.state = LineState::Complete;
        self.ctx.done = true;
    }

    fn budget(&self) -> usize {
        self.limits.max_request_line_size - self.size
    }

    fn charge(&mut self, n: usize) -> Result<(), Error> {
        if n > self.budget() {
            return Err(self.size_error());
        }
        self.size += n;
        Ok(())
    }

    fn size_error(&self) -> Error {
        Error::too_long(LimitKind::RequestLine, self.limits.max_request_line_size)
    }
}

/// request-target のパスに使える文字か (RFC 3986 pchar / "/" と "*", obs-text)
fn is_uri_char(b: u8) -> bool {
    b.is_ascii_alphanumeric()
        || matches!(
            b,
            b'-' | b'.'
                | b'_'
                | b'~'
                | b'!'
                | b'$'
                | b'&'
                | b'\''
                | b'('
                | b')'
                | b'*'
                | b'+'
                | b','
                | b';'
                | b'='
                | b':'
                | b'@'
                | b'/'
                | b'%'
        )
        || b >= 0x80
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_whole(input: &[u8]) -> Result<(RequestLine, usize), Error> {
        let mut decoder = RequestLineDecoder::new();
        let mut line = RequestLine::default();
        let mut cursor = input;
        decoder.decode(&mut cursor, &mut line)?;
        Ok((line, cursor.len()))
    }

    fn decode_bytewise(input: &[u8]) -> Result<RequestLine, Error> {
        let mut decoder = RequestLineDecoder::new();
        let mut line = RequestLine::default();
        for i in 0..input.len() {
            let mut cursor = &input[i..i + 1];
            decoder.decode(&mut cursor, &mut line)?;
        }
        decoder.close(&mut line)?;
        Ok(line)
    }

    #[test]
    fn test_request_line() {
        let input = b"GET /test/test.jsp?A=A&B=B&C=C&D=D HTTP/1.1\r\nHost: x\r\n";
        let (line, rest) = decode_whole(input).unwrap();
        assert_eq!(line.method, "GET");
        assert_eq!(line.uri, "/test/test.jsp");
        assert_eq!(line.protocol, "HTTP/1.1");
        assert_eq!(line.query_string.as_deref(), Some("A=A&B=B&C=C&D=D"));
        assert_eq!(line.parameters.len(), 4);
        assert_eq!(line.parameters.get("C"), Some("C"));
        assert_eq!(rest, b"Host: x\r\n".len());

        assert_eq!(decode_bytewise(input).unwrap(), line);
    }

    #[test]
    fn test_http09() {
        let (line, _) = decode_whole(b"GET /index.html\r\n").unwrap();
        assert_eq!(line.uri, "/index.html");
        assert_eq!(line.protocol, HTTP_0_9);

        let (line, _) = decode_whole(b"GET /?x=1 \r\n").unwrap();
        assert_eq!(line.parameters.get("x"), Some("1"));
        assert_eq!(line.protocol, HTTP_0_9);
    }

    #[test]
    fn test_lenient_whitespace() {
        let (line, _) = decode_whole(b"\r\n\r\n  POST \t /a  HTTP/1.0  \n").unwrap();
        assert_eq!(line.method, "POST");
        assert_eq!(line.uri, "/a");
        assert_eq!(line.protocol, "HTTP/1.0");
    }

    #[test]
    fn test_uri_decoding_keeps_plus() {
        let (line, _) = decode_whole(b"GET /a%20b+c?q=a+b HTTP/1.1\r\n").unwrap();
        assert_eq!(line.uri, "/a b+c");
        assert_eq!(line.parameters.get("q"), Some("a b"));
        assert_eq!(line.query_string.as_deref(), Some("q=a+b"));
    }

    #[test]
    fn test_raw_utf8_uri() {
        let (line, _) = decode_whole("GET /日本 HTTP/1.1\r\n".as_bytes()).unwrap();
        assert_eq!(line.uri, "/日本");
    }

    #[test]
    fn test_missing_uri() {
        assert!(matches!(
            decode_whole(b"GET\r\n"),
            Err(Error::BadRequest(_))
        ));
        assert!(matches!(
            decode_whole(b"GET \r\n"),
            Err(Error::BadRequest(_))
        ));
    }

    #[test]
    fn test_illegal_uri_character() {
        assert_eq!(
            decode_whole(b"GET /a\"b HTTP/1.1\r\n").map(|_| ()),
            Err(Error::IllegalCharacter {
                byte: b'"',
                context: "request-target"
            })
        );
        assert!(matches!(
            decode_whole(b"GET /a#frag HTTP/1.1\r\n"),
            Err(Error::IllegalCharacter { byte: b'#', .. })
        ));
    }

    #[test]
    fn test_illegal_method_character() {
        assert!(matches!(
            decode_whole(b"GE(T / HTTP/1.1\r\n"),
            Err(Error::IllegalCharacter { byte: b'(', .. })
        ));
    }

    #[test]
    fn test_cr_without_lf() {
        assert_eq!(
            decode_whole(b"GET / HTTP/1.1\rX").map(|_| ()),
            Err(Error::IllegalCharacter {
                byte: b'X',
                context: "request line end"
            })
        );
    }

    #[test]
    fn test_too_long_mid_scan() {
        let limits = DecoderLimits {
            max_request_line_size: 16,
            ..DecoderLimits::default()
        };
        let mut decoder = RequestLineDecoder::with_limits(limits);
        let mut line = RequestLine::default();
        let mut cursor: &[u8] = b"GET /0123456789";
        assert!(!decoder.decode(&mut cursor, &mut line).unwrap());
        let mut cursor: &[u8] = b"ab";
        assert_eq!(
            decoder.decode(&mut cursor, &mut line),
            Err(Error::TooLong {
                kind: LimitKind::RequestLine,
                limit: 16
            })
        );
        assert_eq!(line.uri, "");
    }

    #[test]
    fn test_too_long_in_query_is_split_independent() {
        let input = b"GET /?a=1&b=2&cccccccccc HTTP/1.1\r\n";
        let limits = DecoderLimits {
            max_request_line_size: 16,
            ..DecoderLimits::default()
        };
        let expected = Err(Error::TooLong {
            kind: LimitKind::RequestLine,
            limit: 16,
        });

        let mut whole = RequestLine::default();
        let mut decoder = RequestLineDecoder::with_limits(limits.clone());
        let mut cursor: &[u8] = input;
        assert_eq!(decoder.decode(&mut cursor, &mut whole), expected);

        let mut bytewise = RequestLine::default();
        let mut decoder = RequestLineDecoder::with_limits(limits);
        let mut result = Ok(false);
        for i in 0..input.len() {
            let mut cursor = &input[i..i + 1];
            result = decoder.decode(&mut cursor, &mut bytewise);
            if result.is_err() {
                break;
            }
        }
        assert_eq!(result, expected);

        // 上限を超える前に閉じたパラメータはどちらでも emit される
        assert_eq!(
            whole.parameters.entries(),
            &[
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "2".to_string()),
            ]
        );
        assert_eq!(whole, bytewise);
    }

    #[test]
    fn test_exact_limit() {
        let input = b"GET / HTTP/1.1\r\n";
        let limits = DecoderLimits {
            max_request_line_size: input.len(),
            ..DecoderLimits::default()
        };
        let mut decoder = RequestLineDecoder::with_limits(limits);
        let mut line = RequestLine::default();
        let mut cursor: &[u8] = input;
        assert!(decoder.decode(&mut cursor, &mut line).unwrap());
    }

    #[test]
    fn test_close_flushes() {
        let mut decoder = RequestLineDecoder::new();
        let mut line = RequestLine::default();
        let mut cursor: &[u8] = b"GET /path?a=1";
        assert!(!decoder.decode(&mut cursor, &mut line).unwrap());
        decoder.close(&mut line).unwrap();
        assert_eq!(line.uri, "/path");
        assert_eq!(line.parameters.get("a"), Some("1"));
        assert_eq!(line.protocol, HTTP_0_9);

        let mut decoder = RequestLineDecoder::new();
        let mut line = RequestLine::default();
        let mut cursor: &[u8] = b"GET";
        decoder.decode(&mut cursor, &mut line).unwrap();
        assert!(matches!(
            decoder.close(&mut line),
            Err(Error::BadRequest(_))
        ));
    }

    #[test]
    fn test_parameter_limit_through_query() {
        let limits = DecoderLimits {
            max_parameter_count: 1,
            ..DecoderLimits::default()
        };
        let mut decoder = RequestLineDecoder::with_limits(limits);
        let mut line = RequestLine::default();
        let mut cursor: &[u8] = b"GET /?a=1&b=2 HTTP/1.1\r\n";
        assert!(matches!(
            decoder.decode(&mut cursor, &mut line),
            Err(Error::TooLong {
                kind: LimitKind::ParameterCount,
                ..
            })
        ));
    }

    #[test]
    fn test_reset() {
        let mut decoder = RequestLineDecoder::new();
        let mut line = RequestLine::default();
        let mut cursor: &[u8] = b"GET /a?x=1 HTTP/1.1\r\nPUT /b HTTP/1.0\r\n";
        assert!(decoder.decode(&mut cursor, &mut line).unwrap());
        decoder.reset();
        let mut second = RequestLine::default();
        assert!(decoder.decode(&mut cursor, &mut second).unwrap());
        assert_eq!(second.method, "PUT");
        assert_eq!(second.uri, "/b");
        assert!(second.parameters.is_empty());
        assert!(cursor.is_empty());
    }
}
