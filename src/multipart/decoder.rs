//! multipart/form-data デコーダー

use crate::attribute::attribute;
use crate::decoder::HeaderBlockDecoder;
use crate::error::{Error, LimitKind};
use crate::limits::DecoderLimits;

use super::boundary::{Boundary, BoundaryKind, BoundaryScanner, BoundaryStack};
use super::part::{PartBuilder, PartHeaders};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MultipartPhase {
    /// 最初の境界まで (入れ子の後の外側の境界までも) 読み捨てる
    Preamble,
    /// パートのヘッダー
    Header,
    /// パートのボディ
    Body,
    Complete,
}

/// multipart/form-data デコーダー
///
/// パートのヘッダーがそろった時点で [`PartBuilder::begin_part`] を呼び、
/// ボディは区切りに一致しなかったバイトから順に [`PartBuilder::part_data`] へ渡す。
/// `Content-Type: multipart/*` のパートは入れ子の multipart として、
/// 外側の境界をスタックに積んでから中身をデコードする。
#[derive(Debug, Clone)]
pub struct MultipartDecoder {
    phase: MultipartPhase,
    /// 最上位の境界 (リセット用)
    root: Boundary,
    /// 現在の境界
    boundary: Boundary,
    stack: BoundaryStack,
    scanner: BoundaryScanner,
    headers: HeaderBlockDecoder,
    part: PartHeaders,
    limits: DecoderLimits,
}

impl MultipartDecoder {
    /// 境界を指定してデコーダーを作成
    pub fn new(boundary: &str) -> Result<Self, Error> {
        Self::with_limits(boundary, DecoderLimits::default())
    }

    /// 境界と制限を指定してデコーダーを作成
    pub fn with_limits(boundary: &str, limits: DecoderLimits) -> Result<Self, Error> {
        let root = Boundary::new(boundary.as_bytes())?;
        let mut scanner = BoundaryScanner::new();
        scanner.seed_line_start();
        Ok(Self {
            phase: MultipartPhase::Preamble,
            boundary: root.clone(),
            root,
            stack: BoundaryStack::new(),
            scanner,
            headers: HeaderBlockDecoder::with_limits(limits.clone()),
            part: PartHeaders::new(),
            limits,
        })
    }

    /// Content-Type ヘッダーの値からデコーダーを作成
    ///
    /// メディアタイプが `multipart/*` でない場合や `boundary` がない場合は `BadRequest`。
    pub fn from_content_type(content_type: &str) -> Result<Self, Error> {
        Self::from_content_type_with_limits(content_type, DecoderLimits::default())
    }

    /// Content-Type ヘッダーの値と制限を指定してデコーダーを作成
    pub fn from_content_type_with_limits(
        content_type: &str,
        limits: DecoderLimits,
    ) -> Result<Self, Error> {
        let media_type = content_type.split(';').next().unwrap_or_default().trim();
        if !media_type.to_ascii_lowercase().starts_with("multipart/") {
            return Err(Error::bad_request(format!(
                "not a multipart content type: {media_type}"
            )));
        }
        let boundary = attribute(content_type, ';', "boundary")
            .ok_or_else(|| Error::bad_request("missing multipart boundary"))?;
        Self::with_limits(&boundary, limits)
    }

    /// 制限設定を取得
    pub fn limits(&self) -> &DecoderLimits {
        &self.limits
    }

    /// 現在の境界
    pub fn boundary(&self) -> &Boundary {
        &self.boundary
    }

    /// 現在の入れ子の深さ (最上位は 0)
    pub fn depth(&self) -> usize {
        self.stack.depth()
    }

    /// 入力を読めるだけ読む
    ///
    /// 最上位の最後の境界まで読むと `Ok(true)` を返し、エピローグはカーソルに残す。
    pub fn decode<B: PartBuilder + ?Sized>(
        &mut self,
        input: &mut &[u8],
        builder: &mut B,
    ) -> Result<bool, Error> {
        loop {
            match self.phase {
                MultipartPhase::Preamble => {
                    match self.scanner.scan(&self.boundary, input, |_| {})? {
                        Some(BoundaryKind::Section) => self.begin_headers(),
                        Some(BoundaryKind::Final) => self.end_set(builder),
                        None => return Ok(false),
                    }
                }
                MultipartPhase::Header => {
                    if !self.headers.decode(input, &mut self.part)? {
                        return Ok(false);
                    }
                    self.end_headers(builder)?;
                }
                MultipartPhase::Body => {
                    let kind = self
                        .scanner
                        .scan(&self.boundary, input, |data| builder.part_data(data))?;
                    let Some(kind) = kind else {
                        return Ok(false);
                    };
                    builder.end_part();
                    match kind {
                        BoundaryKind::Section => self.begin_headers(),
                        BoundaryKind::Final => self.end_set(builder),
                    }
                }
                MultipartPhase::Complete => return Ok(true),
            }
        }
    }

    /// 入力の終端を通知する
    ///
    /// 最後の境界の `--` の後の改行は省略できる。
    /// それ以外で最上位の最後の境界まで読めていない場合は `BadRequest` になる。
    pub fn close<B: PartBuilder + ?Sized>(&mut self, builder: &mut B) -> Result<(), Error> {
        if self.phase == MultipartPhase::Complete {
            return Ok(());
        }
        if self.scanner.finish() == Some(BoundaryKind::Final) {
            match self.phase {
                MultipartPhase::Body => {
                    builder.end_part();
                    self.end_set(builder);
                }
                MultipartPhase::Preamble => self.end_set(builder),
                MultipartPhase::Header | MultipartPhase::Complete => {}
            }
            self.scanner.reset();
        }
        if self.phase == MultipartPhase::Complete {
            return Ok(());
        }
        Err(Error::bad_request(
            "multipart body ends before the final boundary",
        ))
    }

    /// デコーダーをリセット (境界は最初に指定したものに戻る)
    pub fn reset(&mut self) {
        self.phase = MultipartPhase::Preamble;
        self.boundary = self.root.clone();
        self.stack.clear();
        self.scanner.reset();
        self.scanner.seed_line_start();
        self.headers.reset();
        self.part.clear();
    }

    fn begin_headers(&mut self) {
        self.headers.reset();
        self.part.clear();
        self.phase = MultipartPhase::Header;
    }

    fn end_headers<B: PartBuilder + ?Sized>(&mut self, builder: &mut B) -> Result<(), Error> {
        if let Some(nested) = self.part.nested_boundary() {
            if self.stack.depth() >= self.limits.max_multipart_depth {
                return Err(Error::too_long(
                    LimitKind::MultipartDepth,
                    self.limits.max_multipart_depth,
                ));
            }
            let nested = Boundary::new(nested.as_bytes())?;
            let parent = std::mem::replace(&mut self.boundary, nested);
            self.stack.push(parent);
            crate::log::debug!(
                "enter nested multipart (depth {}): {}",
                self.stack.depth(),
                String::from_utf8_lossy(self.boundary.as_bytes())
            );
            builder.begin_nested(&self.part);
            self.scanner.seed_line_start();
            self.phase = MultipartPhase::Preamble;
        } else {
            builder.begin_part(std::mem::take(&mut self.part));
            self.scanner.reset();
            self.phase = MultipartPhase::Body;
        }
        Ok(())
    }

    /// 最後の境界を読んだ
    fn end_set<B: PartBuilder + ?Sized>(&mut self, builder: &mut B) {
        match self.stack.pop() {
            Some(parent) => {
                crate::log::debug!(
                    "leave nested multipart: {}",
                    String::from_utf8_lossy(self.boundary.as_bytes())
                );
                self.boundary = parent;
                builder.end_nested();
                // 入れ子のエピローグを外側の区切りまで読み捨てる
                self.scanner.seed_line_start();
                self.phase = MultipartPhase::Preamble;
            }
            None => {
                crate::log::trace!("multipart body complete");
                self.phase = MultipartPhase::Complete;
            }
        }
    }
}
