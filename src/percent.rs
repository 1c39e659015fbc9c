//! パーセントデコーディング
//!
//! トークンが閉じた後、かつスキャン中に `%` / `+` / 0x80 以上のバイトを見た場合にだけ呼ばれる。
//! 不正なパーセントエンコーディング (`%` の後に 16 進数 2 桁がない) はそのまま残す。

/// `+` の扱い
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Plus {
    /// `+` を空白にする (application/x-www-form-urlencoded)
    AsSpace,
    /// `+` をそのまま残す (パス)
    Literal,
}

/// パーセントデコード (バイト列として)
pub(crate) fn percent_decode_bytes(input: &[u8], plus: Plus) -> Vec<u8> {
    let mut result = Vec::with_capacity(input.len());
    let mut i = 0;
    while i < input.len() {
        let b = input[i];
        if b == b'%' && i + 2 < input.len() {
            if let (Some(high), Some(low)) =
                (from_hex_char(input[i + 1]), from_hex_char(input[i + 2]))
            {
                result.push((high << 4) | low);
                i += 3;
                continue;
            }
        }
        if b == b'+' && plus == Plus::AsSpace {
            result.push(b' ');
        } else {
            result.push(b);
        }
        i += 1;
    }
    result
}

/// パーセントデコードして UTF-8 文字列にする
///
/// UTF-8 として不正なバイト列は U+FFFD に置き換える。
pub(crate) fn percent_decode(input: &[u8], plus: Plus) -> String {
    String::from_utf8_lossy(&percent_decode_bytes(input, plus)).into_owned()
}

fn from_hex_char(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'A'..=b'F' => Some(c - b'A' + 10),
        b'a'..=b'f' => Some(c - b'a' + 10),
        _ => None,
    }
}
