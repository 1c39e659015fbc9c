//! AJP13 のコード表 (AJP/1.3 Protocol Reference)

/// web サーバーからコンテナへのパケットのマジック
pub const SERVER_MAGIC: u16 = 0x1234;

/// メソッドコード 0xFF: メソッド名は `stored_method` 属性で渡される
pub const STORED_METHOD: u8 = 0xFF;

/// 属性の終端
pub const ATTRIBUTE_TERMINATOR: u8 = 0xFF;

/// ヘッダーコードの下限 (これ未満はヘッダー名の文字列長)
pub const HEADER_CODE_MIN: u16 = 0xA000;

/// web サーバーからコンテナへのパケットの種類 (プレフィックスコード)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AjpPacketKind {
    ForwardRequest = 0x02,
    Shutdown = 0x07,
    Ping = 0x08,
    CPing = 0x0A,
}

impl AjpPacketKind {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x02 => Some(Self::ForwardRequest),
            0x07 => Some(Self::Shutdown),
            0x08 => Some(Self::Ping),
            0x0A => Some(Self::CPing),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }
}

/// メソッドコードからメソッド名を取得
pub fn method_name(code: u8) -> Option<&'static str> {
    let name = match code {
        1 => "OPTIONS",
        2 => "GET",
        3 => "HEAD",
        4 => "POST",
        5 => "PUT",
        6 => "DELETE",
        7 => "TRACE",
        8 => "PROPFIND",
        9 => "PROPPATCH",
        10 => "MKCOL",
        11 => "COPY",
        12 => "MOVE",
        13 => "LOCK",
        14 => "UNLOCK",
        15 => "ACL",
        16 => "REPORT",
        17 => "VERSION-CONTROL",
        18 => "CHECKIN",
        19 => "CHECKOUT",
        20 => "UNCHECKOUT",
        21 => "SEARCH",
        22 => "MKWORKSPACE",
        23 => "UPDATE",
        24 => "LABEL",
        25 => "MERGE",
        26 => "BASELINE-CONTROL",
        27 => "MKACTIVITY",
        _ => return None,
    };
    Some(name)
}

/// メソッド名からメソッドコードを取得
pub fn method_code(name: &str) -> Option<u8> {
    (1..=27).find(|&code| method_name(code) == Some(name))
}

/// ヘッダーコードからヘッダー名を取得
pub fn header_name(code: u16) -> Option<&'static str> {
    let name = match code {
        0xA001 => "accept",
        0xA002 => "accept-charset",
        0xA003 => "accept-encoding",
        0xA004 => "accept-language",
        0xA005 => "authorization",
        0xA006 => "connection",
        0xA007 => "content-type",
        0xA008 => "content-length",
        0xA009 => "cookie",
        0xA00A => "cookie2",
        0xA00B => "host",
        0xA00C => "pragma",
        0xA00D => "referer",
        0xA00E => "user-agent",
        _ => return None,
    };
    Some(name)
}

/// ヘッダー名 (大文字小文字を区別しない) からヘッダーコードを取得
pub fn header_code(name: &str) -> Option<u16> {
    (0xA001..=0xA00E).find(|&code| header_name(code).is_some_and(|n| n.eq_ignore_ascii_case(name)))
}

/// 属性コード
pub mod attribute {
    pub const CONTEXT: u8 = 0x01;
    pub const SERVLET_PATH: u8 = 0x02;
    pub const REMOTE_USER: u8 = 0x03;
    pub const AUTH_TYPE: u8 = 0x04;
    pub const QUERY_STRING: u8 = 0x05;
    pub const JVM_ROUTE: u8 = 0x06;
    pub const SSL_CERT: u8 = 0x07;
    pub const SSL_CIPHER: u8 = 0x08;
    pub const SSL_SESSION: u8 = 0x09;
    pub const REQ_ATTRIBUTE: u8 = 0x0A;
    pub const SSL_KEY_SIZE: u8 = 0x0B;
    pub const SECRET: u8 = 0x0C;
    pub const STORED_METHOD: u8 = 0x0D;
}

/// 属性コードから属性名を取得
///
/// `req_attribute` (0x0A) は名前を値と一緒に運ぶ。
pub fn attribute_name(code: u8) -> Option<&'static str> {
    let name = match code {
        attribute::CONTEXT => "context",
        attribute::SERVLET_PATH => "servlet_path",
        attribute::REMOTE_USER => "remote_user",
        attribute::AUTH_TYPE => "auth_type",
        attribute::QUERY_STRING => "query_string",
        attribute::JVM_ROUTE => "jvm_route",
        attribute::SSL_CERT => "ssl_cert",
        attribute::SSL_CIPHER => "ssl_cipher",
        attribute::SSL_SESSION => "ssl_session",
        attribute::REQ_ATTRIBUTE => "req_attribute",
        attribute::SSL_KEY_SIZE => "ssl_key_size",
        attribute::SECRET => "secret",
        attribute::STORED_METHOD => "stored_method",
        _ => return None,
    };
    Some(name)
}
