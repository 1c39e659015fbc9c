//! AJP13 (Apache JServ Protocol 1.3) デコーダー
//!
//! 区切り文字を持たない長さ付きのバイナリフレームを、
//! テキストのデコーダーと同じくどこで分割された入力からでも読めるようにする。
//!
//! ## 使い方
//!
//! ```rust
//! use shiguredo_wire_decoder::ajp::{ForwardRequest, ForwardRequestDecoder};
//!
//! let mut payload = vec![0x02, 0x02]; // Forward Request, GET
//! for s in ["HTTP/1.1", "/index.html", "127.0.0.1", "localhost", "localhost"] {
//!     payload.extend_from_slice(&(s.len() as u16).to_be_bytes());
//!     payload.extend_from_slice(s.as_bytes());
//!     payload.push(0);
//! }
//! payload.extend_from_slice(&[0x1F, 0x90, 0x00]); // port 8080, is_ssl
//! payload.extend_from_slice(&[0x00, 0x00, 0xFF]); // ヘッダーなし, 属性の終端
//!
//! let mut packet = vec![0x12, 0x34];
//! packet.extend_from_slice(&(payload.len() as u16).to_be_bytes());
//! packet.extend_from_slice(&payload);
//!
//! let mut decoder = ForwardRequestDecoder::new();
//! let mut request = ForwardRequest::new();
//! let mut input: &[u8] = &packet;
//! assert!(decoder.decode(&mut input, &mut request).unwrap());
//! assert_eq!(request.method, "GET");
//! assert_eq!(request.uri, "/index.html");
//! assert_eq!(request.server_port, 8080);
//! ```

pub mod code;
mod data;
mod field;
mod forward;

pub use code::AjpPacketKind;
pub use data::{AjpDataDecoder, AjpDataListener};
pub use forward::{ForwardRequest, ForwardRequestDecoder, ForwardRequestListener};
