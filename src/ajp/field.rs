//! AJP13 の固定長 / 長さ付きフィールドの読み取り
//!
//! どのリーダーも入力が何バイトずつ届いても同じ値を返す。
//! 値がそろうまでは `None` を返し、読んだバイトは内部に保持する。

use crate::error::Error;
use crate::scan::{bytes_to_string, next_byte};

/// AJP の null 文字列の長さ
const NULL_STRING: u16 = 0xFFFF;

/// N バイト固定長のフィールドを読む
#[derive(Debug, Clone)]
pub(crate) struct FixedReader<const N: usize> {
    buf: [u8; N],
    len: usize,
}

impl<const N: usize> Default for FixedReader<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> FixedReader<N> {
    pub(crate) const fn new() -> Self {
        Self {
            buf: [0; N],
            len: 0,
        }
    }

    pub(crate) fn read(&mut self, input: &mut &[u8]) -> Option<[u8; N]> {
        let n = (N - self.len).min(input.len());
        self.buf[self.len..self.len + n].copy_from_slice(&input[..n]);
        self.len += n;
        *input = &input[n..];
        if self.len < N {
            return None;
        }
        self.len = 0;
        Some(self.buf)
    }

    pub(crate) fn reset(&mut self) {
        self.len = 0;
    }
}

pub(crate) type ByteReader = FixedReader<1>;
pub(crate) type IntReader = FixedReader<2>;

impl FixedReader<1> {
    pub(crate) fn read_u8(&mut self, input: &mut &[u8]) -> Option<u8> {
        self.read(input).map(|[b]| b)
    }
}

impl FixedReader<2> {
    /// ビッグエンディアンの 2 バイト整数
    pub(crate) fn read_u16(&mut self, input: &mut &[u8]) -> Option<u16> {
        self.read(input).map(u16::from_be_bytes)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StringState {
    Length,
    Bytes { remaining: usize },
    Terminator,
}

/// 長さ付き文字列 (2 バイト長 + バイト列 + NUL) を読む
///
/// 長さ 0xFFFF の null 文字列は空文字列として返す (null 文字列には NUL が続かない)。
#[derive(Debug, Clone)]
pub(crate) struct StringReader {
    state: StringState,
    length: IntReader,
    buf: Vec<u8>,
}

impl Default for StringReader {
    fn default() -> Self {
        Self::new()
    }
}

impl StringReader {
    pub(crate) fn new() -> Self {
        Self {
            state: StringState::Length,
            length: IntReader::new(),
            buf: Vec::new(),
        }
    }

    /// 長さを読み終えた状態から始める
    ///
    /// ヘッダー名のように、長さがコードと共用のフィールドで読まれた場合に使う。
    pub(crate) fn start_with_length(&mut self, length: u16) {
        self.buf.clear();
        self.length.reset();
        self.state = StringState::Bytes {
            remaining: usize::from(length),
        };
    }

    pub(crate) fn read(&mut self, input: &mut &[u8]) -> Result<Option<String>, Error> {
        loop {
            match self.state {
                StringState::Length => {
                    let Some(length) = self.length.read_u16(input) else {
                        return Ok(None);
                    };
                    if length == NULL_STRING {
                        return Ok(Some(String::new()));
                    }
                    self.start_with_length(length);
                }
                StringState::Bytes { remaining: 0 } => self.state = StringState::Terminator,
                StringState::Bytes { remaining } => {
                    if input.is_empty() {
                        return Ok(None);
                    }
                    let n = remaining.min(input.len());
                    self.buf.extend_from_slice(&input[..n]);
                    *input = &input[n..];
                    self.state = StringState::Bytes {
                        remaining: remaining - n,
                    };
                }
                StringState::Terminator => {
                    let Some(b) = next_byte(input) else {
                        return Ok(None);
                    };
                    if b != 0 {
                        return Err(Error::illegal(b, "AJP string terminator"));
                    }
                    self.state = StringState::Length;
                    let value = bytes_to_string(&self.buf);
                    self.buf.clear();
                    return Ok(Some(value));
                }
            }
        }
    }

    pub(crate) fn reset(&mut self) {
        self.state = StringState::Length;
        self.length.reset();
        self.buf.clear();
    }
}
