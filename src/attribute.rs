//! ヘッダー値の属性デコーダー
//!
//! `multipart/form-data; boundary=xyz` や `form-data; name="a"; filename="b;c.txt"` のような
//! 複合ヘッダー値から `name=value` の組を取り出す。
//! ヘッダー値はトークン単位でストリーミングされることはないため、
//! 入力は常にバッファ済みの文字列として受け取る。
//!
//! ## 使い方
//!
//! ```rust
//! use shiguredo_wire_decoder::attribute;
//!
//! let value = "multipart/form-data; boundary=\"----abc;def\"";
//! assert_eq!(attribute::attribute(value, ';', "boundary").as_deref(), Some("----abc;def"));
//! ```

use crate::query::ParameterListener;

/// 属性デコーダー
///
/// `separator` 区切りで `name=value` を分割する。
/// 二重引用符の中では区切り文字と `=` は特別扱いされず、引用符の状態はエスケープされていない `"` で切り替わる。
/// 名前と値の前後の空白は Unicode の空白として取り除く。
/// `=` を持たない要素 (メディアタイプ等) は値が空の属性として渡される。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeDecoder {
    separator: char,
}

impl AttributeDecoder {
    /// 区切り文字を指定して作成
    pub fn new(separator: char) -> Self {
        Self { separator }
    }

    /// `;` 区切り (Content-Type, Content-Disposition 等)
    pub fn semicolon() -> Self {
        Self::new(';')
    }

    /// `,` 区切り (Accept 系等のリスト)
    pub fn comma() -> Self {
        Self::new(',')
    }

    /// 区切り文字
    pub fn separator(&self) -> char {
        self.separator
    }

    /// ヘッダー値全体をデコードし、属性を出現順にリスナーへ渡す
    pub fn decode<L: ParameterListener + ?Sized>(&self, input: &str, listener: &mut L) {
        for segment in self.split(input) {
            let (name, value) = match find_unquoted(segment, '=') {
                Some(eq) => (segment[..eq].trim(), unquote(segment[eq + 1..].trim())),
                None => (segment.trim(), String::new()),
            };
            if name.is_empty() {
                continue;
            }
            listener.on_parameter(name, &value);
        }
    }

    /// 引用符の外にある区切り文字で分割する
    pub fn split<'a>(&self, input: &'a str) -> Vec<&'a str> {
        let mut segments = Vec::new();
        let mut start = 0;
        let mut in_quote = false;
        let mut escaped = false;

        for (i, c) in input.char_indices() {
            if escaped {
                escaped = false;
                continue;
            }
            if in_quote {
                match c {
                    '\\' => escaped = true,
                    '"' => in_quote = false,
                    _ => {}
                }
                continue;
            }
            if c == '"' {
                in_quote = true;
            } else if c == self.separator {
                segments.push(&input[start..i]);
                start = i + c.len_utf8();
            }
        }
        segments.push(&input[start..]);
        segments
    }
}

/// 属性を出現順に取得
pub fn attributes(input: &str, separator: char) -> Vec<(String, String)> {
    let mut result = Vec::new();
    AttributeDecoder::new(separator).decode(input, &mut |name: &str, value: &str| {
        result.push((name.to_string(), value.to_string()));
    });
    result
}

/// 名前 (大文字小文字を区別しない) で最初の属性値を取得
pub fn attribute(input: &str, separator: char, name: &str) -> Option<String> {
    attributes(input, separator)
        .into_iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, v)| v)
}

/// 引用符の外にある最初の `target` の位置
fn find_unquoted(input: &str, target: char) -> Option<usize> {
    let mut in_quote = false;
    let mut escaped = false;
    for (i, c) in input.char_indices() {
        if escaped {
            escaped = false;
        } else if in_quote {
            match c {
                '\\' => escaped = true,
                '"' => in_quote = false,
                _ => {}
            }
        } else if c == '"' {
            in_quote = true;
        } else if c == target {
            return Some(i);
        }
    }
    None
}

/// 引用符を外し、引用符内のエスケープを解除する
///
/// 閉じられていない引用符は入力の終わりまでを値とする。
fn unquote(input: &str) -> String {
    if !input.contains('"') {
        return input.to_string();
    }
    let mut result = String::with_capacity(input.len());
    let mut in_quote = false;
    let mut escaped = false;
    for c in input.chars() {
        if escaped {
            result.push(c);
            escaped = false;
        } else if in_quote && c == '\\' {
            escaped = true;
        } else if c == '"' {
            in_quote = !in_quote;
        } else {
            result.push(c);
        }
    }
    result
}
