//! chunked 転送コーディングのデコーダー (RFC 9112 Section 7.1)
//!
//! チャンクデータはバッファせず、届いた分だけ [`ChunkListener::on_chunk`] に渡す。
//! 最後のチャンク (サイズ 0) の後のトレーラーは [`HeaderBlockDecoder`] で読む。

use crate::error::{Error, LimitKind};
use crate::limits::DecoderLimits;
use crate::scan::{DecodeContext, next_byte, trim_whitespace};

use super::header::{HeaderBlockDecoder, HeaderListener};

/// チャンクボディを受け取るリスナー
pub trait ChunkListener {
    /// チャンクデータの断片 (チャンク境界とは一致しない)
    fn on_chunk(&mut self, data: &[u8]);

    /// トレーラーフィールド
    fn on_trailer(&mut self, name: &str, value: &str) {
        let _ = (name, value);
    }

    /// 最後のトレーラーまで読み終えた (1 回だけ呼ばれる)
    fn on_complete(&mut self) {}
}

impl ChunkListener for Vec<u8> {
    fn on_chunk(&mut self, data: &[u8]) {
        self.extend_from_slice(data);
    }
}

/// トレーラーを [`ChunkListener::on_trailer`] に転送する
struct TrailerTap<'a, L: ?Sized>(&'a mut L);

impl<L: ChunkListener + ?Sized> HeaderListener for TrailerTap<'_, L> {
    fn on_header(&mut self, name: &str, value: &str) {
        self.0.on_trailer(name, value);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkState {
    /// チャンクサイズ行
    ChunkLength,
    ChunkBody,
    /// チャンクデータ後の CR (または LF)
    ChunkCrlf,
    /// チャンクデータ後の LF
    ChunkLf,
    ChunkTrailer,
    Complete,
}

/// chunked ボディデコーダー
#[derive(Debug, Clone)]
pub struct ChunkedBodyDecoder {
    ctx: DecodeContext<ChunkState>,
    /// 現在のチャンクの残りバイト数
    remaining: u64,
    /// 現在のチャンクサイズ行のバイト数
    line_size: usize,
    /// デコード済みのボディのバイト数
    body_size: u64,
    trailer: HeaderBlockDecoder,
    limits: DecoderLimits,
}

impl Default for ChunkedBodyDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ChunkedBodyDecoder {
    /// 新しいデコーダーを作成
    pub fn new() -> Self {
        Self::with_limits(DecoderLimits::default())
    }

    /// 制限付きでデコーダーを作成
    pub fn with_limits(limits: DecoderLimits) -> Self {
        Self {
            ctx: DecodeContext::new(ChunkState::ChunkLength),
            remaining: 0,
            line_size: 0,
            body_size: 0,
            trailer: HeaderBlockDecoder::with_limits(limits.clone()),
            limits,
        }
    }

    /// 制限設定を取得
    pub fn limits(&self) -> &DecoderLimits {
        &self.limits
    }

    /// これまでにデコードしたボディのバイト数
    pub fn body_size(&self) -> u64 {
        self.body_size
    }

    /// 入力を読めるだけ読む
    ///
    /// トレーラーの終わりの空行まで読むと `Ok(true)` を返す。
    pub fn decode<L: ChunkListener + ?Sized>(
        &mut self,
        input: &mut &[u8],
        listener: &mut L,
    ) -> Result<bool, Error> {
        while !self.ctx.done {
            match self.ctx.state {
                ChunkState::ChunkLength => {
                    let budget = self.limits.max_chunk_line_size - self.line_size;
                    let scanned = self
                        .ctx
                        .accumulate(input, budget, |b| b == b'\n')
                        .map_err(|_| {
                            Error::too_long(LimitKind::ChunkLine, self.limits.max_chunk_line_size)
                        })?;
                    self.line_size += scanned.consumed;
                    if scanned.delimiter.is_none() {
                        break;
                    }
                    let size = parse_chunk_size(&self.ctx.token)?;
                    self.ctx.clear_token();
                    self.line_size = 0;
                    if size == 0 {
                        self.ctx.state = ChunkState::ChunkTrailer;
                    } else {
                        self.remaining = size;
                        self.ctx.state = ChunkState::ChunkBody;
                    }
                }
                ChunkState::ChunkBody => {
                    if input.is_empty() {
                        break;
                    }
                    let n = usize::try_from(self.remaining)
                        .map_or(input.len(), |remaining| remaining.min(input.len()));
                    let (data, rest) = input.split_at(n);
                    listener.on_chunk(data);
                    *input = rest;
                    self.remaining -= n as u64;
                    self.body_size += n as u64;
                    if self.remaining == 0 {
                        self.ctx.state = ChunkState::ChunkCrlf;
                    }
                }
                ChunkState::ChunkCrlf => {
                    let Some(b) = next_byte(input) else {
                        break;
                    };
                    match b {
                        b'\r' => self.ctx.state = ChunkState::ChunkLf,
                        b'\n' => self.ctx.state = ChunkState::ChunkLength,
                        _ => return Err(Error::illegal(b, "chunk terminator")),
                    }
                }
                ChunkState::ChunkLf => {
                    let Some(b) = next_byte(input) else {
                        break;
                    };
                    if b != b'\n' {
                        return Err(Error::illegal(b, "chunk terminator"));
                    }
                    self.ctx.state = ChunkState::ChunkLength;
                }
                ChunkState::ChunkTrailer => {
                    if !self.trailer.decode(input, &mut TrailerTap(&mut *listener))? {
                        break;
                    }
                    self.ctx.state = ChunkState::Complete;
                }
                ChunkState::Complete => {
                    self.ctx.done = true;
                    listener.on_complete();
                }
            }
        }
        Ok(self.ctx.done)
    }

    /// 入力の終端を通知する
    ///
    /// 最後のチャンクとトレーラーを読み終えていなければ `BadRequest` になる。
    pub fn close<L: ChunkListener + ?Sized>(&mut self, listener: &mut L) -> Result<(), Error> {
        let _ = listener;
        if self.ctx.done {
            return Ok(());
        }
        Err(Error::bad_request("chunked body ends before the last chunk"))
    }

    /// デコーダーをリセット
    pub fn reset(&mut self) {
        self.ctx.reset(ChunkState::ChunkLength);
        self.remaining = 0;
        self.line_size = 0;
        self.body_size = 0;
        self.trailer.reset();
    }
}

/// チャンクサイズ行 (LF を除く) からサイズを取り出す
///
/// `chunk-size [ chunk-ext ] CRLF` の chunk-ext と CR は捨てる。
fn parse_chunk_size(line: &[u8]) -> Result<u64, Error> {
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    let line = match line.iter().position(|&b| b == b';') {
        Some(pos) => &line[..pos],
        None => line,
    };
    let digits = trim_whitespace(line);
    if digits.is_empty() {
        return Err(Error::bad_request("empty chunk size"));
    }
    let mut size: u64 = 0;
    for &b in digits {
        let digit = match b {
            b'0'..=b'9' => b - b'0',
            b'a'..=b'f' => b - b'a' + 10,
            b'A'..=b'F' => b - b'A' + 10,
            _ => return Err(Error::illegal(b, "chunk size")),
        };
        size = size
            .checked_mul(16)
            .and_then(|s| s.checked_add(u64::from(digit)))
            .ok_or_else(|| Error::bad_request("chunk size overflow"))?;
    }
    Ok(size)
}
