//! AJP13 データパケット
//!
//! magic (2) → パケット長 (2) → データ長 (2) → データ
//!
//! パケット長 0 のパケットは空のボディ終端パケットとして扱う。

use crate::error::Error;

use super::code::SERVER_MAGIC;
use super::field::IntReader;

/// データパケットのデータの受け取り先
pub trait AjpDataListener {
    fn on_data(&mut self, data: &[u8]);
}

impl AjpDataListener for Vec<u8> {
    fn on_data(&mut self, data: &[u8]) {
        self.extend_from_slice(data);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DataPhase {
    Magic,
    Size,
    DataSize,
    Data { remaining: usize },
    Skip { remaining: usize },
    Complete,
}

/// AJP13 データパケットデコーダー
///
/// データはバッファせず、届いた分から [`AjpDataListener::on_data`] に渡す。
#[derive(Debug, Clone)]
pub struct AjpDataDecoder {
    phase: DataPhase,
    int: IntReader,
    packet_size: usize,
    data_size: usize,
}

impl Default for AjpDataDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl AjpDataDecoder {
    pub fn new() -> Self {
        Self {
            phase: DataPhase::Magic,
            int: IntReader::new(),
            packet_size: 0,
            data_size: 0,
        }
    }

    /// 宣言されたパケット長 (パケット長を読むまでは 0)
    pub fn packet_size(&self) -> usize {
        self.packet_size
    }

    /// 宣言されたデータ長
    pub fn data_size(&self) -> usize {
        self.data_size
    }

    /// ボディ終端の空パケットだったかどうか
    pub fn is_end_of_body(&self) -> bool {
        self.phase == DataPhase::Complete && self.packet_size == 0
    }

    pub fn decode<L: AjpDataListener + ?Sized>(
        &mut self,
        input: &mut &[u8],
        listener: &mut L,
    ) -> Result<bool, Error> {
        loop {
            match self.phase {
                DataPhase::Complete => return Ok(true),
                DataPhase::Skip { remaining: 0 } => self.complete(),
                _ if input.is_empty() => return Ok(false),
                DataPhase::Magic => {
                    let Some(magic) = self.int.read_u16(input) else {
                        continue;
                    };
                    if magic != SERVER_MAGIC {
                        return Err(Error::bad_request(format!(
                            "invalid AJP magic {magic:#06x}"
                        )));
                    }
                    self.phase = DataPhase::Size;
                }
                DataPhase::Size => {
                    let Some(size) = self.int.read_u16(input) else {
                        continue;
                    };
                    self.packet_size = usize::from(size);
                    self.phase = match self.packet_size {
                        0 => DataPhase::Skip { remaining: 0 },
                        1 => {
                            return Err(Error::bad_request(
                                "AJP data packet too short for data length",
                            ));
                        }
                        _ => DataPhase::DataSize,
                    };
                }
                DataPhase::DataSize => {
                    let Some(size) = self.int.read_u16(input) else {
                        continue;
                    };
                    self.data_size = usize::from(size);
                    let payload = self.packet_size - 2;
                    if self.data_size > payload {
                        return Err(Error::bad_request(format!(
                            "AJP data length {} exceeds packet size {}",
                            self.data_size, self.packet_size
                        )));
                    }
                    self.phase = match self.data_size {
                        0 => DataPhase::Skip { remaining: payload },
                        remaining => DataPhase::Data { remaining },
                    };
                }
                DataPhase::Data { remaining } => {
                    let n = remaining.min(input.len());
                    if n > 0 {
                        listener.on_data(&input[..n]);
                        *input = &input[n..];
                    }
                    self.phase = if remaining == n {
                        DataPhase::Skip {
                            remaining: self.packet_size - 2 - self.data_size,
                        }
                    } else {
                        DataPhase::Data {
                            remaining: remaining - n,
                        }
                    };
                }
                DataPhase::Skip { remaining } => {
                    let n = remaining.min(input.len());
                    *input = &input[n..];
                    self.phase = DataPhase::Skip {
                        remaining: remaining - n,
                    };
                }
            }
        }
    }

    /// 入力の終端を通知する
    pub fn close(&mut self) -> Result<(), Error> {
        if let DataPhase::Skip { remaining: 0 } = self.phase {
            self.complete();
        }
        if self.phase != DataPhase::Complete {
            return Err(Error::bad_request("incomplete AJP data packet"));
        }
        Ok(())
    }

    pub fn reset(&mut self) {
        self.phase = DataPhase::Magic;
        self.int.reset();
        self.packet_size = 0;
        self.data_size = 0;
    }

    fn complete(&mut self) {
        crate::log::trace!("AJP data packet complete: {} bytes", self.data_size);
        self.phase = DataPhase::Complete;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PACKET: &[u8] = &[
        0x12, 0x34, 0x00, 0x07, 0x00, 0x03, b'a', b'b', b'c', 0x00, 0x00,
    ];

    #[test]
    fn test_data_packet() {
        let mut decoder = AjpDataDecoder::new();
        let mut data = Vec::new();
        let input = [PACKET, &b"next"[..]].concat();
        let mut cursor: &[u8] = &input;
        assert!(decoder.decode(&mut cursor, &mut data).unwrap());
        assert_eq!(data, b"abc");
        assert_eq!(cursor, b"next");
        assert_eq!(decoder.packet_size(), 7);
        assert_eq!(decoder.data_size(), 3);
        assert!(!decoder.is_end_of_body());
        decoder.close().unwrap();

        // 完了後は何も読まない
        assert!(decoder.decode(&mut cursor, &mut data).unwrap());
        assert_eq!(cursor, b"next");
    }

    #[test]
    fn test_empty_data() {
        let mut decoder = AjpDataDecoder::new();
        let mut data = Vec::new();
        let mut input: &[u8] = &[0x12, 0x34, 0x00, 0x02, 0x00, 0x00];
        assert!(decoder.decode(&mut input, &mut data).unwrap());
        assert!(data.is_empty());
        assert!(!decoder.is_end_of_body());
    }

    #[test]
    fn test_one_byte_at_a_time() {
        let mut decoder = AjpDataDecoder::new();
        let mut data = Vec::new();
        let mut complete = false;
        for b in PACKET {
            let mut input: &[u8] = std::slice::from_ref(b);
            complete = decoder.decode(&mut input, &mut data).unwrap();
            assert!(input.is_empty());
        }
        assert!(complete);
        assert_eq!(data, b"abc");
    }

    #[test]
    fn test_end_of_body_packet() {
        let mut decoder = AjpDataDecoder::new();
        let mut data = Vec::new();
        let mut input: &[u8] = &[0x12, 0x34, 0x00, 0x00];
        assert!(decoder.decode(&mut input, &mut data).unwrap());
        assert!(decoder.is_end_of_body());
        assert!(data.is_empty());
    }

    #[test]
    fn test_invalid_packets() {
        let mut data = Vec::new();

        let mut input: &[u8] = &[0x41, 0x42, 0x00, 0x00];
        assert!(matches!(
            AjpDataDecoder::new().decode(&mut input, &mut data),
            Err(Error::BadRequest(_))
        ));

        let mut input: &[u8] = &[0x12, 0x34, 0x00, 0x03, 0x00, 0x02, b'a'];
        assert!(matches!(
            AjpDataDecoder::new().decode(&mut input, &mut data),
            Err(Error::BadRequest(_))
        ));

        let mut input: &[u8] = &[0x12, 0x34, 0x00, 0x01, 0x00];
        assert!(matches!(
            AjpDataDecoder::new().decode(&mut input, &mut data),
            Err(Error::BadRequest(_))
        ));
    }

    #[test]
    fn test_close_incomplete() {
        let mut decoder = AjpDataDecoder::new();
        let mut data = Vec::new();
        let mut input = &PACKET[..7];
        assert!(!decoder.decode(&mut input, &mut data).unwrap());
        assert_eq!(data, b"a");
        assert!(matches!(decoder.close(), Err(Error::BadRequest(_))));

        decoder.reset();
        data.clear();
        let mut input = PACKET;
        assert!(decoder.decode(&mut input, &mut data).unwrap());
        assert_eq!(data, b"abc");
    }
}
