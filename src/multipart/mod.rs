//! multipart/form-data デコーダー (RFC 7578, RFC 2046)
//!
//! ## 使い方
//!
//! ```rust
//! use shiguredo_wire_decoder::multipart::{MultipartDecoder, PartCollector};
//!
//! let body = b"--xyz\r\n\
//! Content-Disposition: form-data; name=\"field\"\r\n\
//! \r\n\
//! value\r\n\
//! --xyz--\r\n";
//!
//! let mut decoder = MultipartDecoder::from_content_type("multipart/form-data; boundary=xyz").unwrap();
//! let mut parts = PartCollector::new();
//! let mut input: &[u8] = body;
//! assert!(decoder.decode(&mut input, &mut parts).unwrap());
//!
//! assert_eq!(parts.parts()[0].name().as_deref(), Some("field"));
//! assert_eq!(parts.parts()[0].body_str(), Some("value"));
//! ```

mod boundary;
mod decoder;
mod part;

pub use boundary::{Boundary, BoundaryKind, BoundaryScanner, BoundaryStack, MAX_BOUNDARY_LEN};
pub use decoder::MultipartDecoder;
pub use part::{Part, PartBuilder, PartCollector, PartHeaders};
