//! PBT テスト共通ユーティリティ

use proptest::prelude::*;

// ========================================
// 入力の分割
// ========================================

/// 分割サイズの列 (1-16 バイト)
pub fn split_sizes() -> impl Strategy<Value = Vec<usize>> {
    proptest::collection::vec(1usize..=16, 1..=8)
}

/// `sizes` を繰り返し使って入力を分割する
pub fn split_by_sizes<'a>(data: &'a [u8], sizes: &[usize]) -> Vec<&'a [u8]> {
    let mut chunks = Vec::new();
    let mut rest = data;
    let mut sizes = sizes.iter().cycle();
    while !rest.is_empty() {
        let size = sizes.next().copied().unwrap_or(1).max(1).min(rest.len());
        let (head, tail) = rest.split_at(size);
        chunks.push(head);
        rest = tail;
    }
    chunks
}

// ========================================
// トークン生成
// ========================================

/// RFC 9110 token
pub fn token(max_len: usize) -> impl Strategy<Value = String> {
    proptest::collection::vec(
        prop_oneof![
            prop::char::range('a', 'z'),
            prop::char::range('A', 'Z'),
            prop::char::range('0', '9'),
            Just('-'),
            Just('_'),
            Just('.'),
            Just('!'),
        ],
        1..=max_len,
    )
    .prop_map(|chars| chars.into_iter().collect())
}

/// ヘッダー値 (前後の空白なし、制御文字なし)
pub fn header_value() -> impl Strategy<Value = String> {
    "[!-~]([ -~]{0,30}[!-~])?".prop_map(|s| s)
}

/// パス (`/` 始まり、パーセントエンコード不要な文字のみ)
pub fn path() -> impl Strategy<Value = String> {
    "(/[a-zA-Z0-9._~-]{1,12}){1,4}".prop_map(|s| s)
}

// ========================================
// エンコード
// ========================================

/// application/x-www-form-urlencoded の値としてエンコード
pub fn form_urlencode(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for b in input.bytes() {
        match b {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(b as char)
            }
            b' ' => out.push('+'),
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}

/// AJP の長さ付き文字列
pub fn ajp_string(buf: &mut Vec<u8>, value: &str) {
    buf.extend_from_slice(&(value.len() as u16).to_be_bytes());
    buf.extend_from_slice(value.as_bytes());
    buf.push(0);
}
