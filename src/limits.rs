/// デコーダーの制限設定
///
/// 各上限は `usize::MAX` で無制限になる。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoderLimits {
    /// 最大リクエスト行長 (デフォルト: 8KB)
    pub max_request_line_size: usize,
    /// ヘッダーブロックの最大バイト数 (デフォルト: 64KB)
    ///
    /// 折り返し行や終端の空行も含めた、1 つのヘッダーブロック全体のバイト数。
    pub max_header_size: usize,
    /// 最大ヘッダー数 (デフォルト: 100)
    pub max_header_count: usize,
    /// 最大パラメータ数 (デフォルト: 1000)
    ///
    /// クエリ文字列と application/x-www-form-urlencoded のパラメータに適用される。
    pub max_parameter_count: usize,
    /// 最大チャンクサイズ行長 (デフォルト: 64バイト)
    ///
    /// chunk-ext と行末の CRLF を含む。チャンクサイズは 16 進数なので通常は非常に短い。
    pub max_chunk_line_size: usize,
    /// multipart の最大入れ子数 (デフォルト: 8)
    pub max_multipart_depth: usize,
}

impl Default for DecoderLimits {
    fn default() -> Self {
        Self {
            max_request_line_size: 8 * 1024, // 8KB
            max_header_size: 64 * 1024,      // 64KB
            max_header_count: 100,
            max_parameter_count: 1000,
            max_chunk_line_size: 64, // 64 bytes
            max_multipart_depth: 8,
        }
    }
}

impl DecoderLimits {
    /// 制限なしの設定を作成
    pub fn unlimited() -> Self {
        Self {
            max_request_line_size: usize::MAX,
            max_header_size: usize::MAX,
            max_header_count: usize::MAX,
            max_parameter_count: usize::MAX,
            max_chunk_line_size: usize::MAX,
            max_multipart_depth: usize::MAX,
        }
    }
}
