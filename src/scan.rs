//! インクリメンタルスキャンの共通部品
//!
//! 全てのテキスト系デコーダーは、入力カーソル `&mut &[u8]` から読めるだけ読み、
//! 区切りバイトを見つけるか入力を使い切った時点で制御を返す。
//! 途中まで読んだトークンと状態は [`DecodeContext`] に残るため、
//! 入力が 1 バイトずつ届いても結果は変わらない。

/// 上限超過の目印
///
/// どの上限かは呼び出し側のデコーダーが知っているので、ここでは区別しない。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Overflow;

/// デコーダーごとの作業領域
///
/// トークンバッファはトークンを emit するたびにその場でクリアされ、
/// 再確保はされない。
#[derive(Debug, Clone)]
pub(crate) struct DecodeContext<S> {
    /// 現在のサブ状態
    pub(crate) state: S,
    /// 読み取り途中のトークン
    pub(crate) token: Vec<u8>,
    /// デコード完了
    pub(crate) done: bool,
    /// トークン前の空白を読み飛ばし中
    pub(crate) skip: bool,
    /// 折り返し行の継続中
    pub(crate) folded: bool,
    /// トークン内に `%` / `+` / 0x80 以上のバイトが現れた
    pub(crate) needs_decode: bool,
}

impl<S: Copy> DecodeContext<S> {
    pub(crate) fn new(state: S) -> Self {
        Self {
            state,
            token: Vec::new(),
            done: false,
            skip: false,
            folded: false,
            needs_decode: false,
        }
    }

    /// 初期状態に戻す (バッファの容量は維持)
    pub(crate) fn reset(&mut self, state: S) {
        self.state = state;
        self.token.clear();
        self.done = false;
        self.skip = false;
        self.folded = false;
        self.needs_decode = false;
    }

    /// 状態を遷移し、次のトークンの準備をする
    pub(crate) fn transition(&mut self, state: S) {
        self.state = state;
        self.clear_token();
    }

    /// トークンと、トークン単位のフラグをクリア
    pub(crate) fn clear_token(&mut self) {
        self.token.clear();
        self.needs_decode = false;
    }

    /// 区切りバイトの直前までをトークンに蓄積する
    ///
    /// `budget` はこの呼び出しで消費してよい残りバイト数 (区切りを含む)。
    /// 超える場合は何も消費せずに [`Overflow`] を返す。
    pub(crate) fn accumulate(
        &mut self,
        input: &mut &[u8],
        budget: usize,
        is_delimiter: impl Fn(u8) -> bool,
    ) -> Result<Scanned, Overflow> {
        let scanned = self.scan(*input, is_delimiter);
        if scanned.consumed > budget {
            return Err(Overflow);
        }
        self.commit(input, scanned);
        Ok(scanned)
    }

    /// 上限なしで区切りバイトの直前までをトークンに蓄積する
    pub(crate) fn accumulate_all(
        &mut self,
        input: &mut &[u8],
        is_delimiter: impl Fn(u8) -> bool,
    ) -> Scanned {
        let scanned = self.scan(*input, is_delimiter);
        self.commit(input, scanned);
        scanned
    }

    fn scan(&self, data: &[u8], is_delimiter: impl Fn(u8) -> bool) -> Scanned {
        match data.iter().position(|&b| is_delimiter(b)) {
            Some(pos) => Scanned {
                start: self.token.len(),
                consumed: pos + 1,
                delimiter: Some(data[pos]),
            },
            None => Scanned {
                start: self.token.len(),
                consumed: data.len(),
                delimiter: None,
            },
        }
    }

    fn commit(&mut self, input: &mut &[u8], scanned: Scanned) {
        let data = *input;
        let body_len = scanned.consumed - usize::from(scanned.delimiter.is_some());
        self.token.extend_from_slice(&data[..body_len]);
        *input = &data[scanned.consumed..];
    }

    /// 直前に蓄積した部分にデコードが必要なバイトがあればフラグを立てる
    pub(crate) fn note_decode_triggers(&mut self, start: usize) {
        if !self.needs_decode {
            self.needs_decode = self.token[start..].iter().copied().any(is_decode_trigger);
        }
    }

    /// トークンを文字列として取り出し、トークンをクリアする
    pub(crate) fn take_text(&mut self) -> String {
        let text = bytes_to_string(&self.token);
        self.clear_token();
        text
    }
}

/// [`DecodeContext::accumulate`] の結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Scanned {
    /// 今回蓄積した部分のトークン内の開始位置
    pub(crate) start: usize,
    /// 消費したバイト数 (区切りを含む)
    pub(crate) consumed: usize,
    /// 見つかった区切り。入力を使い切った場合は `None`
    pub(crate) delimiter: Option<u8>,
}

/// 条件を満たすバイトを読み飛ばし、読み飛ばしたバイト数を返す
pub(crate) fn skip_while(input: &mut &[u8], pred: impl Fn(u8) -> bool) -> usize {
    let data = *input;
    let n = data.iter().position(|&b| !pred(b)).unwrap_or(data.len());
    *input = &data[n..];
    n
}

/// 先頭の 1 バイトを取り出す
pub(crate) fn next_byte(input: &mut &[u8]) -> Option<u8> {
    let (&b, rest) = input.split_first()?;
    *input = rest;
    Some(b)
}

/// 先頭の 1 バイトを覗く
pub(crate) fn peek_byte(input: &[u8]) -> Option<u8> {
    input.first().copied()
}

/// SP または HTAB
pub(crate) fn is_whitespace(b: u8) -> bool {
    b == b' ' || b == b'\t'
}

/// CR または LF
pub(crate) fn is_line_end(b: u8) -> bool {
    b == b'\r' || b == b'\n'
}

/// パーセントデコードの契機になるバイトか
pub(crate) fn is_decode_trigger(b: u8) -> bool {
    b == b'%' || b == b'+' || b >= 0x80
}

/// トークン文字か確認 (RFC 9110 Section 5.6.2)
pub(crate) fn is_token_char(b: u8) -> bool {
    matches!(
        b,
        b'!' | b'#' | b'$' | b'%' | b'&' | b'\'' | b'*' | b'+' | b'-' | b'.' |
        b'0'..=b'9' | b'A'..=b'Z' | b'^' | b'_' | b'`' | b'a'..=b'z' | b'|' | b'~'
    )
}

/// バイト列を文字列に変換
///
/// UTF-8 として正しければそのまま、そうでなければ ISO-8859-1 として 1 バイト 1 文字で変換する。
pub(crate) fn bytes_to_string(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| char::from(b)).collect(),
    }
}

/// 前後の SP / HTAB を取り除く
pub(crate) fn trim_whitespace(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|&b| !is_whitespace(b))
        .unwrap_or(bytes.len());
    let end = bytes
        .iter()
        .rposition(|&b| !is_whitespace(b))
        .map_or(start, |p| p + 1);
    &bytes[start..end]
}
