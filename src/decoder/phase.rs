//! デコード状態の定義

/// ボディの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    /// Content-Length で指定された固定長
    ContentLength(u64),
    /// Transfer-Encoding: chunked
    Chunked,
    /// ボディなし
    None,
}

/// リクエストのデコード状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DecodePhase {
    /// リクエスト行待ち
    RequestLine,
    /// ヘッダー待ち
    Headers,
    /// ボディ読み取り中 (Content-Length)
    BodyContentLength { remaining: u64 },
    /// ボディ読み取り中 (Chunked)
    BodyChunked,
    /// 完了
    Complete,
}
