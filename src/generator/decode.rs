//! Streamed event-block decoding
//!
//! The text backend streams newline-delimited event blocks: a fixed
//! `data:` prefix, a JSON object with a `text` field, and a blank-line
//! terminator. Network chunks do not align with block boundaries (a block
//! may span several reads, and one read may carry several blocks), so the
//! decoder buffers raw bytes and re-splits them into logical events.
//! Decoding is byte-based until a complete block is isolated: a chunk
//! split inside a multi-byte UTF-8 sequence must not fail.

use crate::{Error, Result};
use crate::types::TokenEvent;

/// Fixed literal prefix of every event block
const BLOCK_PREFIX: &str = "data:";

/// Blank-line delimiter between event blocks
const BLOCK_DELIMITER: &[u8] = b"\n\n";

/// Incremental decoder reassembling event blocks from arbitrary chunk
/// splits.
#[derive(Debug, Default)]
pub struct EventBlockDecoder {
    buffer: Vec<u8>,
}

impl EventBlockDecoder {
    /// Create an empty decoder
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one network chunk and return the texts of every block it
    /// completed. A block that fails to decode is fatal for the stream.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<String>> {
        self.buffer.extend_from_slice(chunk);

        let mut texts = Vec::new();
        while let Some(pos) = find_delimiter(&self.buffer) {
            let rest = self.buffer.split_off(pos + BLOCK_DELIMITER.len());
            let mut block = std::mem::replace(&mut self.buffer, rest);
            block.truncate(pos);

            if block.is_empty() {
                continue;
            }
            texts.push(decode_block(&block)?);
        }

        Ok(texts)
    }

    /// Decode a final block left unterminated when the backend closed the
    /// connection. Trailing whitespace alone is not a block.
    pub fn finish(&mut self) -> Result<Option<String>> {
        let rest = std::mem::take(&mut self.buffer);
        if rest.iter().all(|b| b.is_ascii_whitespace()) {
            return Ok(None);
        }
        decode_block(&rest).map(Some)
    }
}

fn find_delimiter(buffer: &[u8]) -> Option<usize> {
    buffer
        .windows(BLOCK_DELIMITER.len())
        .position(|window| window == BLOCK_DELIMITER)
}

fn decode_block(block: &[u8]) -> Result<String> {
    let text = std::str::from_utf8(block)
        .map_err(|_| Error::connection("stream block is not valid UTF-8"))?;

    let payload = text.strip_prefix(BLOCK_PREFIX).ok_or_else(|| {
        Error::connection(format!("stream block missing '{}' prefix", BLOCK_PREFIX))
    })?;

    let event: TokenEvent = serde_json::from_str(payload)
        .map_err(|e| Error::connection(format!("stream block is not valid JSON: {}", e)))?;

    Ok(event.text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const WIRE: &[u8] = b"data: {\"text\":\"A\"}\n\ndata: {\"text\":\"B\"}\n\n";

    fn decode_with_split(wire: &[u8], split: usize) -> Vec<String> {
        let mut decoder = EventBlockDecoder::new();
        let mut texts = decoder.push(&wire[..split]).unwrap();
        texts.extend(decoder.push(&wire[split..]).unwrap());
        if let Some(last) = decoder.finish().unwrap() {
            texts.push(last);
        }
        texts
    }

    #[test]
    fn test_split_boundary_independence() {
        for split in 0..=WIRE.len() {
            assert_eq!(
                decode_with_split(WIRE, split),
                vec!["A".to_string(), "B".to_string()],
                "split at byte {} changed the decoded sequence",
                split
            );
        }
    }

    #[test]
    fn test_byte_at_a_time() {
        let mut decoder = EventBlockDecoder::new();
        let mut texts = Vec::new();
        for byte in WIRE {
            texts.extend(decoder.push(&[*byte]).unwrap());
        }
        assert_eq!(texts, vec!["A".to_string(), "B".to_string()]);
        assert_eq!(decoder.finish().unwrap(), None);
    }

    #[test]
    fn test_multibyte_utf8_across_chunks() {
        let wire = "data: {\"text\":\"héllo\"}\n\n".as_bytes();
        // Split inside the two-byte 'é' sequence
        let split = wire.iter().position(|b| *b >= 0x80).unwrap() + 1;

        let mut decoder = EventBlockDecoder::new();
        let mut texts = decoder.push(&wire[..split]).unwrap();
        texts.extend(decoder.push(&wire[split..]).unwrap());
        assert_eq!(texts, vec!["héllo".to_string()]);
    }

    #[test]
    fn test_unterminated_final_block() {
        let mut decoder = EventBlockDecoder::new();
        let texts = decoder.push(b"data: {\"text\":\"tail\"}").unwrap();
        assert!(texts.is_empty());
        assert_eq!(decoder.finish().unwrap(), Some("tail".to_string()));
    }

    #[test]
    fn test_missing_prefix_is_fatal() {
        let mut decoder = EventBlockDecoder::new();
        let err = decoder.push(b"{\"text\":\"A\"}\n\n").unwrap_err();
        assert!(matches!(err, Error::Connection(_)));
        assert!(err.to_string().contains("prefix"));
    }

    #[test]
    fn test_invalid_json_is_fatal() {
        let mut decoder = EventBlockDecoder::new();
        let err = decoder.push(b"data: not-json\n\n").unwrap_err();
        assert!(matches!(err, Error::Connection(_)));
    }

    #[test]
    fn test_extra_blank_lines_skipped() {
        let mut decoder = EventBlockDecoder::new();
        let texts = decoder
            .push(b"data: {\"text\":\"A\"}\n\n\n\ndata: {\"text\":\"B\"}\n\n")
            .unwrap();
        assert_eq!(texts, vec!["A".to_string(), "B".to_string()]);
    }

    #[test]
    fn test_finish_ignores_trailing_whitespace() {
        let mut decoder = EventBlockDecoder::new();
        decoder.push(b"data: {\"text\":\"A\"}\n\n\n").unwrap();
        assert_eq!(decoder.finish().unwrap(), None);
    }
}
