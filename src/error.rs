use std::fmt;

/// デコードエラー
///
/// いずれも致命的で、検出した `decode()` / `close()` から同期的に返る。
/// エラーになったトークンがリスナーに渡されることはない。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// 文法違反 (許可されていないヘッダー名 / URI のバイト、チャンク後の不正な CRLF 等)
    #[error("illegal character 0x{byte:02X} in {context}")]
    IllegalCharacter { byte: u8, context: &'static str },
    /// 設定された上限を超過
    #[error("{kind} too long: limit {limit}")]
    TooLong { kind: LimitKind, limit: usize },
    /// 構造的に不完全な入力 (URI のないリクエスト行、途中で終わったボディ等)
    #[error("bad request: {0}")]
    BadRequest(String),
}

impl Error {
    pub(crate) fn illegal(byte: u8, context: &'static str) -> Self {
        Error::IllegalCharacter { byte, context }
    }

    pub(crate) fn too_long(kind: LimitKind, limit: usize) -> Self {
        crate::log::warning!("{} exceeded limit {}", kind, limit);
        Error::TooLong { kind, limit }
    }

    pub(crate) fn bad_request(msg: impl Into<String>) -> Self {
        Error::BadRequest(msg.into())
    }
}

/// 超過した上限の種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LimitKind {
    /// リクエスト行のバイト数
    RequestLine,
    /// ヘッダーブロックの総バイト数
    HeaderSize,
    /// ヘッダー数
    HeaderCount,
    /// パラメータ数
    ParameterCount,
    /// チャンクサイズ行のバイト数
    ChunkLine,
    /// multipart の入れ子の深さ
    MultipartDepth,
}

impl fmt::Display for LimitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LimitKind::RequestLine => "request line",
            LimitKind::HeaderSize => "header block",
            LimitKind::HeaderCount => "header count",
            LimitKind::ParameterCount => "parameter count",
            LimitKind::ChunkLine => "chunk size line",
            LimitKind::MultipartDepth => "multipart nesting",
        };
        f.write_str(name)
    }
}
