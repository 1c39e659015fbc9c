//! クエリ文字列 / application/x-www-form-urlencoded デコーダー
//!
//! ## 使い方
//!
//! ```rust
//! use shiguredo_wire_decoder::{Parameters, QueryStringDecoder};
//!
//! let mut decoder = QueryStringDecoder::new();
//! let mut params = Parameters::new();
//!
//! let mut input: &[u8] = b"name=John+Doe&lang=%E6%97%A5";
//! decoder.decode(&mut input, &mut params).unwrap();
//! decoder.close(&mut params).unwrap();
//!
//! assert_eq!(params.get("name"), Some("John Doe"));
//! assert_eq!(params.get("lang"), Some("日"));
//! ```

use crate::error::{Error, LimitKind};
use crate::limits::DecoderLimits;
use crate::percent::{Plus, percent_decode};
use crate::scan::DecodeContext;

/// `name=value` 形式のパラメータを受け取るリスナー
pub trait ParameterListener {
    /// パラメータが確定した
    fn on_parameter(&mut self, name: &str, value: &str);
}

impl<F: FnMut(&str, &str)> ParameterListener for F {
    fn on_parameter(&mut self, name: &str, value: &str) {
        self(name, value)
    }
}

/// パラメータを出現順に保持する
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Parameters {
    entries: Vec<(String, String)>,
}

impl Parameters {
    /// 空のパラメータ一覧を作成
    pub fn new() -> Self {
        Self::default()
    }

    /// 最初に現れた値を取得
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// 指定した名前の値をすべて取得
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// 出現順のパラメータ一覧
    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ParameterListener for Parameters {
    fn on_parameter(&mut self, name: &str, value: &str) {
        self.entries.push((name.to_string(), value.to_string()));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QueryState {
    Name,
    Value,
}

/// クエリ文字列デコーダー
///
/// `&` 区切りの `name=value` をストリーミングでデコードする。
/// パラメータは区切りの `&` を読んだ時点で emit され、最後のパラメータは [`close`](Self::close) で確定する。
/// 名前と値のパーセント / `+` デコードは、トークンが閉じた時点で、
/// かつトークン内に `%` / `+` / 0x80 以上のバイトがあった場合にだけ行う。
#[derive(Debug, Clone)]
pub struct QueryStringDecoder {
    ctx: DecodeContext<QueryState>,
    /// デコード済みの名前 (値の終端待ち)
    name: String,
    count: usize,
    limits: DecoderLimits,
}

impl Default for QueryStringDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryStringDecoder {
    /// 新しいデコーダーを作成
    pub fn new() -> Self {
        Self::with_limits(DecoderLimits::default())
    }

    /// 制限付きでデコーダーを作成
    pub fn with_limits(limits: DecoderLimits) -> Self {
        Self {
            ctx: DecodeContext::new(QueryState::Name),
            name: String::new(),
            count: 0,
            limits,
        }
    }

    /// 制限設定を取得
    pub fn limits(&self) -> &DecoderLimits {
        &self.limits
    }

    /// 入力を読めるだけ読む
    ///
    /// 終端を持たない文法なので、[`close`](Self::close) を呼ぶまで `Ok(false)` を返す。
    pub fn decode<L: ParameterListener + ?Sized>(
        &mut self,
        input: &mut &[u8],
        listener: &mut L,
    ) -> Result<bool, Error> {
        if self.ctx.done {
            return Ok(true);
        }
        while !input.is_empty() {
            match self.ctx.state {
                QueryState::Name => {
                    let scanned = self.ctx.accumulate_all(input, |b| b == b'=' || b == b'&');
                    self.ctx.note_decode_triggers(scanned.start);
                    match scanned.delimiter {
                        Some(b'=') => {
                            self.name = self.decode_token();
                            self.ctx.state = QueryState::Value;
                        }
                        Some(_) => {
                            let name = self.decode_token();
                            self.emit(name, String::new(), listener)?;
                        }
                        None => {}
                    }
                }
                QueryState::Value => {
                    let scanned = self.ctx.accumulate_all(input, |b| b == b'&');
                    self.ctx.note_decode_triggers(scanned.start);
                    if scanned.delimiter.is_some() {
                        let name = std::mem::take(&mut self.name);
                        let value = self.decode_token();
                        self.emit(name, value, listener)?;
                        self.ctx.state = QueryState::Name;
                    }
                }
            }
        }
        Ok(false)
    }

    /// 入力の終端を通知し、最後のパラメータを確定する
    pub fn close<L: ParameterListener + ?Sized>(&mut self, listener: &mut L) -> Result<(), Error> {
        if self.ctx.done {
            return Ok(());
        }
        match self.ctx.state {
            QueryState::Name => {
                if !self.ctx.token.is_empty() {
                    let name = self.decode_token();
                    self.emit(name, String::new(), listener)?;
                }
            }
            QueryState::Value => {
                let name = std::mem::take(&mut self.name);
                let value = self.decode_token();
                self.emit(name, value, listener)?;
            }
        }
        self.ctx.state = QueryState::Name;
        self.ctx.done = true;
        Ok(())
    }

    /// デコーダーをリセット
    pub fn reset(&mut self) {
        self.ctx.reset(QueryState::Name);
        self.name.clear();
        self.count = 0;
    }

    /// 確定したパラメータ数
    pub fn count(&self) -> usize {
        self.count
    }

    fn decode_token(&mut self) -> String {
        if self.ctx.needs_decode {
            let decoded = percent_decode(&self.ctx.token, Plus::AsSpace);
            self.ctx.clear_token();
            decoded
        } else {
            self.ctx.take_text()
        }
    }

    fn emit<L: ParameterListener + ?Sized>(
        &mut self,
        name: String,
        value: String,
        listener: &mut L,
    ) -> Result<(), Error> {
        if name.is_empty() {
            if !value.is_empty() {
                crate::log::debug!("ignore query parameter with empty name");
            }
            return Ok(());
        }
        if self.count >= self.limits.max_parameter_count {
            return Err(Error::too_long(
                LimitKind::ParameterCount,
                self.limits.max_parameter_count,
            ));
        }
        self.count += 1;
        listener.on_parameter(&name, &value);
        Ok(())
    }
}
