//! Accept 系ヘッダーの品質リスト (RFC 9110 Section 12.4, 12.5)
//!
//! Accept / Accept-Charset / Accept-Encoding / Accept-Language の値を
//! [`AttributeDecoder`] で `,` と `;` に分割し、q 値の降順に並べる。
//! q 値がパースできない要素はヘッダー全体を失敗させずに捨てる。
//!
//! ## 使い方
//!
//! ```rust
//! use shiguredo_wire_decoder::accept::parse_quality_list;
//!
//! let items = parse_quality_list("text/html;q=0.5, application/json, */*;q=0.1");
//! assert_eq!(items[0].value(), "application/json");
//! assert_eq!(items[1].value(), "text/html");
//! assert_eq!(items[2].q().value(), 100);
//! ```

use core::fmt;

use crate::attribute::AttributeDecoder;

/// q 値 (0.000 - 1.000)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QValue(u16);

impl QValue {
    /// 最大の q 値
    pub const MAX: QValue = QValue(1000);

    /// q 値をパース
    ///
    /// `qvalue = ( "0" [ "." 0*3DIGIT ] ) / ( "1" [ "." 0*3("0") ] )`
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        if input == "1" {
            return Some(Self::MAX);
        }
        if let Some(rest) = input.strip_prefix("1.") {
            if rest.len() > 3 || !rest.bytes().all(|b| b == b'0') {
                return None;
            }
            return Some(Self::MAX);
        }
        if input == "0" {
            return Some(QValue(0));
        }
        let rest = input.strip_prefix("0.")?;
        if rest.len() > 3 || !rest.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let mut value = 0u16;
        for (idx, b) in rest.bytes().enumerate() {
            value += u16::from(b - b'0') * 10u16.pow(2 - idx as u32);
        }
        Some(QValue(value))
    }

    /// ミリ単位の q 値 (0-1000)
    pub fn value(&self) -> u16 {
        self.0
    }

    /// f32 に変換
    pub fn as_f32(&self) -> f32 {
        f32::from(self.0) / 1000.0
    }
}

impl Default for QValue {
    fn default() -> Self {
        Self::MAX
    }
}

impl fmt::Display for QValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            1000 => write!(f, "1"),
            0 => write!(f, "0"),
            v => {
                let mut frac = format!("{:03}", v);
                while frac.ends_with('0') {
                    frac.pop();
                }
                write!(f, "0.{}", frac)
            }
        }
    }
}

/// 品質リストの要素
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualityItem {
    value: String,
    parameters: Vec<(String, String)>,
    q: QValue,
}

impl QualityItem {
    /// 値 (メディアレンジ、文字セット、コーディング、言語タグ)
    pub fn value(&self) -> &str {
        &self.value
    }

    /// `q` 以外のパラメータ
    pub fn parameters(&self) -> &[(String, String)] {
        &self.parameters
    }

    /// パラメータを名前 (大文字小文字を区別しない) で取得
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// q 値 (省略時は 1)
    pub fn q(&self) -> QValue {
        self.q
    }
}

/// Accept 系ヘッダーの値をパースし、q 値の降順 (同じ q 値は出現順) で返す
pub fn parse_quality_list(input: &str) -> Vec<QualityItem> {
    let items = AttributeDecoder::comma();
    let params = AttributeDecoder::semicolon();

    let mut result = Vec::new();
    for element in items.split(input) {
        let mut attrs = Vec::new();
        params.decode(element, &mut |name: &str, value: &str| {
            attrs.push((name.to_string(), value.to_string()));
        });
        let mut attrs = attrs.into_iter();
        let Some((value, _)) = attrs.next() else {
            continue;
        };

        let mut q = QValue::MAX;
        let mut parameters = Vec::new();
        let mut valid = true;
        for (name, v) in attrs {
            if name.eq_ignore_ascii_case("q") {
                match QValue::parse(&v) {
                    Some(parsed) => q = parsed,
                    None => {
                        crate::log::debug!("drop {:?}: invalid qvalue {:?}", value, v);
                        valid = false;
                        break;
                    }
                }
            } else {
                parameters.push((name, v));
            }
        }
        if valid {
            result.push(QualityItem {
                value,
                parameters,
                q,
            });
        }
    }
    result.sort_by(|a, b| b.q.cmp(&a.q));
    result
}
