//! ヘッダーブロックデコーダー
//!
//! `name ":" OWS value OWS CRLF` の並びを空行までデコードする。
//! 行頭が SP / HTAB の行は直前のヘッダー値の続き (obs-fold) として扱い、
//! 空白の並びを 1 つの空白に置き換えて連結する。
//! そのため、ヘッダーは次の行の先頭バイトを見てから emit される。

use crate::error::{Error, LimitKind};
use crate::limits::DecoderLimits;
use crate::scan::{
    DecodeContext, bytes_to_string, is_token_char, is_whitespace, next_byte, peek_byte,
    skip_while, trim_whitespace,
};

/// ヘッダーを受け取るリスナー
pub trait HeaderListener {
    /// ヘッダーが確定した (値は前後の空白を除去済み)
    fn on_header(&mut self, name: &str, value: &str);
}

impl<F: FnMut(&str, &str)> HeaderListener for F {
    fn on_header(&mut self, name: &str, value: &str) {
        self(name, value)
    }
}

impl HeaderListener for Vec<(String, String)> {
    fn on_header(&mut self, name: &str, value: &str) {
        self.push((name.to_string(), value.to_string()));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HeaderState {
    /// 行頭 (折り返しか新しいヘッダーかを判定する)
    Next,
    Name,
    Value,
    /// 空行の CR を読んだ
    BlockEnd,
    Complete,
}

/// ヘッダーブロックデコーダー
///
/// 空行を読むと `Ok(true)` を返し、空行より後ろのバイトはカーソルに残す。
#[derive(Debug, Clone)]
pub struct HeaderBlockDecoder {
    ctx: DecodeContext<HeaderState>,
    /// 値の確定待ちのヘッダー名
    name: String,
    /// 次の行を見るまで emit を保留しているヘッダーがある
    pending: bool,
    /// 消費したバイト数
    size: usize,
    /// 読み始めたヘッダー数
    count: usize,
    limits: DecoderLimits,
}

impl Default for HeaderBlockDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl HeaderBlockDecoder {
    /// 新しいデコーダーを作成
    pub fn new() -> Self {
        Self::with_limits(DecoderLimits::default())
    }

    /// 制限付きでデコーダーを作成
    pub fn with_limits(limits: DecoderLimits) -> Self {
        Self {
            ctx: DecodeContext::new(HeaderState::Next),
            name: String::new(),
            pending: false,
            size: 0,
            count: 0,
            limits,
        }
    }

    /// 制限設定を取得
    pub fn limits(&self) -> &DecoderLimits {
        &self.limits
    }

    /// 読み始めたヘッダー数
    pub fn header_count(&self) -> usize {
        self.count
    }

    /// 空行まで読み終えたか
    pub fn is_complete(&self) -> bool {
        self.ctx.done
    }

    /// 入力を読めるだけ読む
    pub fn decode<L: HeaderListener + ?Sized>(
        &mut self,
        input: &mut &[u8],
        listener: &mut L,
    ) -> Result<bool, Error> {
        while !self.ctx.done {
            match self.ctx.state {
                HeaderState::Next => {
                    let Some(b) = peek_byte(input) else {
                        break;
                    };
                    if self.pending && is_whitespace(b) {
                        // obs-fold: 末尾の空白を落として 1 つの空白でつなぐ
                        let kept = trim_whitespace_end(&self.ctx.token);
                        self.ctx.token.truncate(kept);
                        self.ctx.token.push(b' ');
                        self.ctx.skip = true;
                        self.ctx.folded = true;
                        self.ctx.state = HeaderState::Value;
                        continue;
                    }
                    if self.pending {
                        self.emit(listener);
                    }
                    match b {
                        b'\r' => {
                            self.charge(1)?;
                            next_byte(input);
                            self.ctx.state = HeaderState::BlockEnd;
                        }
                        b'\n' => {
                            self.charge(1)?;
                            next_byte(input);
                            self.finish();
                        }
                        _ => {
                            if self.count >= self.limits.max_header_count {
                                return Err(Error::too_long(
                                    LimitKind::HeaderCount,
                                    self.limits.max_header_count,
                                ));
                            }
                            self.count += 1;
                            self.ctx.transition(HeaderState::Name);
                        }
                    }
                }
                HeaderState::Name => {
                    let budget = self.budget();
                    let scanned = self
                        .ctx
                        .accumulate(input, budget, |b| !is_token_char(b))
                        .map_err(|_| self.size_error())?;
                    self.size += scanned.consumed;
                    match scanned.delimiter {
                        Some(b':') => {
                            self.name = self.ctx.take_text();
                            self.ctx.skip = true;
                            self.ctx.folded = false;
                            self.ctx.state = HeaderState::Value;
                        }
                        Some(b) => return Err(Error::illegal(b, "header name")),
                        None => break,
                    }
                }
                HeaderState::Value => {
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
                        .accumulate(input, budget, |b| b == b'\r' || b == b'\n')
                        .map_err(|_| self.size_error())?;
                    self.size += scanned.consumed;
                    match scanned.delimiter {
                        // 値の中の CR は捨てる
                        Some(b'\r') => {}
                        Some(_) => {
                            self.pending = true;
                            self.ctx.state = HeaderState::Next;
                        }
                        None => break,
                    }
                }
                HeaderState::BlockEnd => {
                    let Some(b) = next_byte(input) else {
                        break;
                    };
                    if b != b'\n' {
                        return Err(Error::illegal(b, "header block end"));
                    }
                    self.charge(1)?;
                    self.finish();
                }
                HeaderState::Complete => self.ctx.done = true,
            }
        }
        Ok(self.ctx.done)
    }

    /// 入力の終端を通知し、最後の行のヘッダーを確定する
    pub fn close<L: HeaderListener + ?Sized>(&mut self, listener: &mut L) -> Result<(), Error> {
        if self.ctx.done {
            return Ok(());
        }
        match self.ctx.state {
            HeaderState::Name => {
                return Err(Error::bad_request("header block ends inside a header name"));
            }
            HeaderState::Value => {
                self.pending = true;
                self.emit(listener);
            }
            HeaderState::Next => {
                if self.pending {
                    self.emit(listener);
                }
            }
            HeaderState::BlockEnd | HeaderState::Complete => {}
        }
        self.finish();
        Ok(())
    }

    /// デコーダーをリセット
    pub fn reset(&mut self) {
        self.ctx.reset(HeaderState::Next);
        self.name.clear();
        self.pending = false;
        self.size = 0;
        self.count = 0;
    }

    fn emit<L: HeaderListener + ?Sized>(&mut self, listener: &mut L) {
        let value = bytes_to_string(trim_whitespace(&self.ctx.token));
        listener.on_header(&self.name, &value);
        self.ctx.clear_token();
        self.ctx.folded = false;
        self.name.clear();
        self.pending = false;
    }

    fn finish(&mut self) {
        self.ctx.state = HeaderState::Complete;
        self.ctx.done = true;
    }

    fn budget(&self) -> usize {
        self.limits.max_header_size - self.size
    }

    fn charge(&mut self, n: usize) -> Result<(), Error> {
        if n > self.budget() {
            return Err(self.size_error());
        }
        self.size += n;
        Ok(())
    }

    fn size_error(&self) -> Error {
        Error::too_long(LimitKind::HeaderSize, self.limits.max_header_size)
    }
}

fn trim_whitespace_end(bytes: &[u8]) -> usize {
    bytes
        .iter()
        .rposition(|&b| !is_whitespace(b))
        .map_or(0, |p| p + 1)
}
