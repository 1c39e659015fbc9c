//! multipart の境界探索
//!
//! 区切り `"\r\n--" boundary` を Knuth-Morris-Pratt 法で探す。
//! 部分一致の途中で入力が尽きた場合は一致長だけを覚えておき、
//! 次の入力で同じ位置から照合を続ける。
//! 一致していた部分は区切りの接頭辞と同じバイト列なので、
//! 一致が崩れたときは区切りから切り出してボディとして出力する。

use crate::error::Error;
use crate::scan::next_byte;

/// 区切りの前置部分 (CRLF と 2 つのハイフン)
const DELIMITER_PREFIX: &[u8] = b"\r\n--";

/// 境界文字列の最大長 (RFC 2046 Section 5.1.1)
pub const MAX_BOUNDARY_LEN: usize = 70;

/// 境界と KMP の失敗関数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Boundary {
    /// `"\r\n--" boundary`
    delimiter: Vec<u8>,
    /// `failure[i]` は `delimiter[..=i]` の真の接頭辞かつ接尾辞である最長の長さ
    failure: Vec<usize>,
}

impl Boundary {
    /// 境界を作成
    pub fn new(boundary: &[u8]) -> Result<Self, Error> {
        if boundary.is_empty() {
            return Err(Error::bad_request("empty multipart boundary"));
        }
        if boundary.len() > MAX_BOUNDARY_LEN {
            return Err(Error::bad_request(format!(
                "multipart boundary longer than {MAX_BOUNDARY_LEN} bytes"
            )));
        }
        if let Some(&b) = boundary.iter().find(|&&b| b == b'\r' || b == b'\n') {
            return Err(Error::illegal(b, "multipart boundary"));
        }
        let mut delimiter = Vec::with_capacity(DELIMITER_PREFIX.len() + boundary.len());
        delimiter.extend_from_slice(DELIMITER_PREFIX);
        delimiter.extend_from_slice(boundary);
        let failure = failure_table(&delimiter);
        Ok(Self { delimiter, failure })
    }

    /// 境界文字列
    pub fn as_bytes(&self) -> &[u8] {
        &self.delimiter[DELIMITER_PREFIX.len()..]
    }

    /// 探索する区切り全体
    pub fn delimiter(&self) -> &[u8] {
        &self.delimiter
    }

    /// KMP の失敗関数
    pub fn failure_table(&self) -> &[usize] {
        &self.failure
    }

    /// 一致長 `matched` の状態で `b` を読んだ後の一致長
    fn advance(&self, mut matched: usize, b: u8) -> usize {
        while matched > 0 && self.delimiter[matched] != b {
            matched = self.failure[matched - 1];
        }
        if self.delimiter[matched] == b {
            matched + 1
        } else {
            0
        }
    }
}

fn failure_table(pattern: &[u8]) -> Vec<usize> {
    let mut failure = vec![0; pattern.len()];
    let mut k = 0;
    for i in 1..pattern.len() {
        while k > 0 && pattern[i] != pattern[k] {
            k = failure[k - 1];
        }
        if pattern[i] == pattern[k] {
            k += 1;
        }
        failure[i] = k;
    }
    failure
}

/// 入れ子の multipart の外側の境界を保持するスタック
#[derive(Debug, Clone, Default)]
pub struct BoundaryStack {
    stack: Vec<Boundary>,
}

impl BoundaryStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, boundary: Boundary) {
        self.stack.push(boundary);
    }

    pub fn pop(&mut self) -> Option<Boundary> {
        self.stack.pop()
    }

    /// 入れ子の深さ
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    pub fn clear(&mut self) {
        self.stack.clear();
    }
}

/// 境界の種類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryKind {
    /// 次のパートが続く (`CRLF` または `LF`)
    Section,
    /// 最後の境界 (`--CRLF` または `--LF`)
    Final,
}

/// 境界の直後のバイトの判定状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ending {
    Start,
    Cr,
    Dash,
    DashDash,
    DashDashCr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    /// 照合中 (保留しているバイトなし)
    Boundary,
    /// 前回の入力の末尾が区切りの接頭辞と一致している
    BoundaryPartial,
    /// 区切りに一致した後、境界の種類を判定中
    BoundaryEnding(Ending),
}

/// ストリーミング境界スキャナー
///
/// 区切りに一致しないバイトはその場でシンクに渡し、保留するのは区切りの長さ未満の部分一致だけ。
#[derive(Debug, Clone)]
pub struct BoundaryScanner {
    state: ScanState,
    /// 保留している部分一致の長さ (保留バイトは区切りの先頭 `matched` バイトと等しい)
    matched: usize,
}

impl Default for BoundaryScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl BoundaryScanner {
    pub fn new() -> Self {
        Self {
            state: ScanState::Boundary,
            matched: 0,
        }
    }

    /// 初期状態に戻す
    pub fn reset(&mut self) {
        self.state = ScanState::Boundary;
        self.matched = 0;
    }

    /// 行頭から探索を始める
    ///
    /// 区切りの CRLF は読み終えたものとして扱い、`"--" boundary` から始まる入力にも一致させる。
    /// 仮想の CRLF は一致が崩れるとシンクに渡されるため、読み捨てる区間でだけ使う。
    pub fn seed_line_start(&mut self) {
        self.state = ScanState::BoundaryPartial;
        self.matched = 2;
    }

    /// 保留している部分一致の長さ
    pub fn pending(&self) -> usize {
        self.matched
    }

    /// 入力を区切りまで読み、区切りより前のバイトを `sink` に渡す
    ///
    /// 区切りと境界の種類まで読み終えると `Some` を返す。
    /// 区切りより後ろのバイトはカーソルに残す。
    pub fn scan<F: FnMut(&[u8])>(
        &mut self,
        boundary: &Boundary,
        input: &mut &[u8],
        mut sink: F,
    ) -> Result<Option<BoundaryKind>, Error> {
        loop {
            match self.state {
                ScanState::Boundary | ScanState::BoundaryPartial => {
                    if input.is_empty() {
                        return Ok(None);
                    }
                    if !self.match_delimiter(boundary, input, &mut sink) {
                        return Ok(None);
                    }
                    self.state = ScanState::BoundaryEnding(Ending::Start);
                }
                ScanState::BoundaryEnding(ending) => {
                    let Some(b) = next_byte(input) else {
                        return Ok(None);
                    };
                    let next = match (ending, b) {
                        (Ending::Start, b'\r') => Ending::Cr,
                        (Ending::Start, b'-') => Ending::Dash,
                        (Ending::Dash, b'-') => Ending::DashDash,
                        (Ending::DashDash, b'\r') => Ending::DashDashCr,
                        (Ending::Start | Ending::Cr, b'\n') => {
                            self.reset();
                            return Ok(Some(BoundaryKind::Section));
                        }
                        (Ending::DashDash | Ending::DashDashCr, b'\n') => {
                            self.reset();
                            return Ok(Some(BoundaryKind::Final));
                        }
                        _ => return Err(Error::illegal(b, "multipart boundary line")),
                    };
                    self.state = ScanState::BoundaryEnding(next);
                }
            }
        }
    }

    /// 入力の終端で境界が確定するか
    ///
    /// 最後の境界 `--` の後に改行がないまま入力が終わった場合に `Final` を返す。
    pub fn finish(&self) -> Option<BoundaryKind> {
        match self.state {
            ScanState::BoundaryEnding(Ending::DashDash | Ending::DashDashCr) => {
                Some(BoundaryKind::Final)
            }
            _ => None,
        }
    }

    /// 区切り全体に一致したら `true` を返し、区切りの直後までカーソルを進める
    fn match_delimiter<F: FnMut(&[u8])>(
        &mut self,
        boundary: &Boundary,
        input: &mut &[u8],
        sink: &mut F,
    ) -> bool {
        let data = *input;
        let pattern = boundary.delimiter();
        // 前回から保留している区切りの接頭辞 pattern[carry_start..carry_end]
        let mut carry_start = 0;
        let carry_end = self.matched;
        // data[..released] は出力が確定したバイト
        let mut released = 0;
        let mut matched = self.matched;

        for (i, &b) in data.iter().enumerate() {
            matched = boundary.advance(matched, b);
            let held_carry = carry_end - carry_start;
            let held = held_carry + (i + 1 - released);
            let mut release = held - matched;
            if release > 0 && held_carry > 0 {
                let n = release.min(held_carry);
                sink(&pattern[carry_start..carry_start + n]);
                carry_start += n;
                release -= n;
            }
            released += release;

            if matched == pattern.len() {
                if released > 0 {
                    sink(&data[..released]);
                }
                self.matched = 0;
                *input = &data[i + 1..];
                return true;
            }
        }

        if released > 0 {
            sink(&data[..released]);
        }
        self.matched = matched;
        self.state = if matched > 0 {
            ScanState::BoundaryPartial
        } else {
            ScanState::Boundary
        };
        *input = &[];
        false
    }
}
