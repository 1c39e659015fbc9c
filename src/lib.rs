//! # shiguredo_wire_decoder
//!
//! サーバー側のワイヤープロトコル向けインクリメンタルデコーダーライブラリ (Sans I/O)
//!
//! ## 特徴
//!
//! - **Sans I/O**: I/O を完全に分離した設計
//! - **再開可能**: 入力がどこで分割されていても、1 バイトずつでも同じ結果になる
//! - **ストリーミング**: トークンは確定した時点でリスナーに渡され、ボディはバッファされない
//! - **上限**: 行長、ヘッダー数、パラメータ数などの上限を超えた時点でエラーになる
//!
//! ## 対応する形式
//!
//! - HTTP/1.x のリクエスト行、ヘッダーブロック、chunked ボディ
//! - クエリ文字列とヘッダー値の属性
//! - multipart/form-data ([`multipart`])
//! - AJP13 ([`ajp`])
//!
//! ## 使い方
//!
//! ```rust
//! use shiguredo_wire_decoder::{RequestLine, RequestLineDecoder};
//!
//! let mut decoder = RequestLineDecoder::new();
//! let mut line = RequestLine::default();
//!
//! // 受信したデータを順に渡す
//! for chunk in [&b"GET /test/test.jsp?A=A&B"[..], &b"=B HTTP/1.1\r\n"[..]] {
//!     let mut input = chunk;
//!     decoder.decode(&mut input, &mut line).unwrap();
//! }
//!
//! assert_eq!(line.method, "GET");
//! assert_eq!(line.uri, "/test/test.jsp");
//! assert_eq!(line.parameters.get("B"), Some("B"));
//! assert_eq!(line.protocol, "HTTP/1.1");
//! ```

mod log;

pub mod accept;
pub mod ajp;
pub mod attribute;
mod decoder;
mod error;
mod limits;
pub mod multipart;
mod percent;
mod query;
mod scan;

pub use attribute::AttributeDecoder;
pub use decoder::{
    BodyKind, ChunkListener, ChunkedBodyDecoder, HTTP_0_9, HeaderBlockDecoder, HeaderListener,
    Request, RequestDecoder, RequestLine, RequestLineDecoder, RequestLineListener,
    RequestListener,
};
pub use error::{Error, LimitKind};
pub use limits::DecoderLimits;
pub use query::{ParameterListener, Parameters, QueryStringDecoder};
