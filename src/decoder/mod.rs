//! HTTP/1.x デコーダーモジュール
//!
//! Sans I/O 設計に基づくストリーミングデコーダーを提供。
//! どのデコーダーも入力を 1 バイトずつ渡しても、まとめて渡しても同じイベント列を返す。
//!
//! ## 使い方
//!
//! ```rust
//! use shiguredo_wire_decoder::{Request, RequestDecoder};
//!
//! let mut decoder = RequestDecoder::new();
//! let mut request = Request::default();
//!
//! let mut input: &[u8] = b"POST /form?lang=ja HTTP/1.1\r\nContent-Length: 5\r\n\r\nhello";
//! assert!(decoder.decode(&mut input, &mut request).unwrap());
//!
//! assert_eq!(request.line.method, "POST");
//! assert_eq!(request.line.uri, "/form");
//! assert_eq!(request.line.parameters.get("lang"), Some("ja"));
//! assert_eq!(request.header("content-length"), Some("5"));
//! assert_eq!(request.body, b"hello");
//! ```
//!
//! ### 個別のデコーダー
//!
//! ```rust
//! use shiguredo_wire_decoder::HeaderBlockDecoder;
//!
//! let mut decoder = HeaderBlockDecoder::new();
//! let mut headers: Vec<(String, String)> = Vec::new();
//!
//! // 途中で分割された入力
//! let mut input: &[u8] = b"Host: exa";
//! assert!(!decoder.decode(&mut input, &mut headers).unwrap());
//! let mut input: &[u8] = b"mple.com\r\n\r\n";
//! assert!(decoder.decode(&mut input, &mut headers).unwrap());
//!
//! assert_eq!(headers, vec![("Host".to_string(), "example.com".to_string())]);
//! ```

mod chunked;
mod header;
mod phase;
mod request;
mod request_line;

pub use chunked::{ChunkListener, ChunkedBodyDecoder};
pub use header::{HeaderBlockDecoder, HeaderListener};
pub use phase::BodyKind;
pub use request::{Request, RequestDecoder, RequestListener};
pub use request_line::{HTTP_0_9, RequestLine, RequestLineDecoder, RequestLineListener};
