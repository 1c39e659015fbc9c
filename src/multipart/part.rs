//! multipart のパート

use crate::attribute::attribute;
use crate::decoder::HeaderListener;

/// パートのヘッダー
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartHeaders {
    headers: Vec<(String, String)>,
}

impl PartHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    /// ヘッダーを名前 (大文字小文字を区別しない) で取得
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// 出現順のヘッダー一覧
    pub fn entries(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Content-Type ヘッダーの値
    pub fn content_type(&self) -> Option<&str> {
        self.get("Content-Type")
    }

    /// Content-Type のメディアタイプ (パラメータを除き小文字化したもの)
    pub fn media_type(&self) -> Option<String> {
        let content_type = self.content_type()?;
        let media_type = content_type.split(';').next().unwrap_or_default().trim();
        Some(media_type.to_ascii_lowercase())
    }

    /// Content-Disposition の `name`
    pub fn name(&self) -> Option<String> {
        attribute(self.get("Content-Disposition")?, ';', "name")
    }

    /// Content-Disposition の `filename`
    pub fn filename(&self) -> Option<String> {
        attribute(self.get("Content-Disposition")?, ';', "filename")
    }

    /// ファイルパートかどうか
    pub fn is_file(&self) -> bool {
        self.filename().is_some()
    }

    /// Content-Type の `boundary`
    pub fn boundary(&self) -> Option<String> {
        attribute(self.content_type()?, ';', "boundary")
    }

    /// Content-Type の `charset`
    pub fn charset(&self) -> Option<String> {
        attribute(self.content_type()?, ';', "charset")
    }

    /// 入れ子の multipart の境界 (`multipart/*` で `boundary` があるとき)
    pub fn nested_boundary(&self) -> Option<String> {
        if !self.media_type()?.starts_with("multipart/") {
            return None;
        }
        self.boundary()
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    pub fn clear(&mut self) {
        self.headers.clear();
    }
}

impl HeaderListener for PartHeaders {
    fn on_header(&mut self, name: &str, value: &str) {
        self.headers.push((name.to_string(), value.to_string()));
    }
}

/// パートの組み立て先
///
/// ヘッダーがそろうと [`begin_part`](Self::begin_part) が呼ばれ、
/// ボディはバッファされずに [`part_data`](Self::part_data) へ順に渡される。
/// 入れ子の multipart はそれ自体がパートとしては渡されず、
/// [`begin_nested`](Self::begin_nested) と [`end_nested`](Self::end_nested) の間に葉のパートが並ぶ。
pub trait PartBuilder {
    fn begin_part(&mut self, headers: PartHeaders);

    fn part_data(&mut self, data: &[u8]);

    fn end_part(&mut self);

    fn begin_nested(&mut self, headers: &PartHeaders) {
        let _ = headers;
    }

    fn end_nested(&mut self) {}
}

/// ボディをメモリに保持したパート
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Part {
    pub headers: PartHeaders,
    pub body: Vec<u8>,
    /// 入れ子の深さ (最上位は 0)
    pub depth: usize,
}

impl Part {
    /// Content-Disposition の `name`
    pub fn name(&self) -> Option<String> {
        self.headers.name()
    }

    /// Content-Disposition の `filename`
    pub fn filename(&self) -> Option<String> {
        self.headers.filename()
    }

    /// ボディ
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// ボディを文字列として取得
    pub fn body_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }
}

/// パートを文書順に集める [`PartBuilder`]
#[derive(Debug, Clone, Default)]
pub struct PartCollector {
    parts: Vec<Part>,
    current: Option<Part>,
    depth: usize,
}

impl PartCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// 完了したパート
    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    pub fn into_parts(self) -> Vec<Part> {
        self.parts
    }
}

impl PartBuilder for PartCollector {
    fn begin_part(&mut self, headers: PartHeaders) {
        self.current = Some(Part {
            headers,
            body: Vec::new(),
            depth: self.depth,
        });
    }

    fn part_data(&mut self, data: &[u8]) {
        if let Some(part) = self.current.as_mut() {
            part.body.extend_from_slice(data);
        }
    }

    fn end_part(&mut self) {
        if let Some(part) = self.current.take() {
            self.parts.push(part);
        }
    }

    fn begin_nested(&mut self, _headers: &PartHeaders) {
        self.depth += 1;
    }

    fn end_nested(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }
}
