//! Newline-delimited JSON decoder for streamed chat answers.
//!
//! The body arrives as arbitrary byte reads: a read may end inside a UTF-8
//! sequence, inside a JSON line, or between lines. The decoder keeps two
//! carries across reads:
//!
//! 1. the undecoded tail of an incomplete UTF-8 sequence, and
//! 2. the decoded text after the last newline (an incomplete line).
//!
//! Every complete line is parsed as one [`ChatStreamEvent`]. Chunk events
//! are folded into a running accumulator and surface as
//! [`StreamUpdate::Content`] carrying the full text so far, so applying an
//! update twice never duplicates text. A malformed line is logged and
//! skipped without affecting the lines after it.

use std::borrow::Cow;

use codesense_types::error::ProtocolError;
use codesense_types::stream::{ChatStreamEvent, StreamUpdate};

/// Parse one protocol line into an event.
pub fn parse_line(line: &str) -> Result<ChatStreamEvent, ProtocolError> {
    serde_json::from_str(line).map_err(|e| ProtocolError {
        line: line.to_string(),
        reason: e.to_string(),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FirstToken {
    Pending,
    Raised,
    Taken,
}

/// Stateful decoder for one chat turn.
#[derive(Debug)]
pub struct StreamDecoder {
    /// Bytes of a UTF-8 sequence cut off by the end of the previous read.
    utf8_carry: Vec<u8>,
    /// Decoded text not yet terminated by a newline.
    buffer: String,
    accumulated: String,
    first_token: FirstToken,
    skipped_lines: usize,
}

impl Default for StreamDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self {
            utf8_carry: Vec::new(),
            buffer: String::new(),
            accumulated: String::new(),
            first_token: FirstToken::Pending,
            skipped_lines: 0,
        }
    }

    /// Consume one read of the response body.
    ///
    /// Returns the updates for every line completed by this read, in the
    /// order the lines appeared.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<StreamUpdate> {
        self.decode_utf8(bytes);

        let mut updates = Vec::new();
        let Some(last_newline) = self.buffer.rfind('\n') else {
            return updates;
        };

        let tail = self.buffer.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.buffer, tail);
        for line in complete.split('\n') {
            self.handle_line(line, &mut updates);
        }
        updates
    }

    /// Signal end of stream.
    ///
    /// A trailing line without a newline is emitted if it is a complete
    /// event, otherwise dropped.
    pub fn finish(&mut self) -> Vec<StreamUpdate> {
        if !self.utf8_carry.is_empty() {
            self.utf8_carry.clear();
            self.buffer.push(char::REPLACEMENT_CHARACTER);
        }

        let mut updates = Vec::new();
        let rest = std::mem::take(&mut self.buffer);
        let rest = rest.trim();
        if rest.is_empty() {
            return updates;
        }

        match parse_line(rest) {
            Ok(event) => self.apply_event(event, &mut updates),
            Err(err) => {
                tracing::debug!(error = %err, "discarding incomplete trailing stream data");
            }
        }
        updates
    }

    /// Returns `true` exactly once: on the first call after the first line
    /// of the turn parsed successfully.
    pub fn take_first_token(&mut self) -> bool {
        if self.first_token == FirstToken::Raised {
            self.first_token = FirstToken::Taken;
            true
        } else {
            false
        }
    }

    /// Answer text accumulated so far.
    pub fn content(&self) -> &str {
        &self.accumulated
    }

    /// Number of malformed lines skipped.
    pub fn skipped_lines(&self) -> usize {
        self.skipped_lines
    }

    pub fn into_content(self) -> String {
        self.accumulated
    }

    fn decode_utf8(&mut self, bytes: &[u8]) {
        let data: Cow<'_, [u8]> = if self.utf8_carry.is_empty() {
            Cow::Borrowed(bytes)
        } else {
            let mut joined = std::mem::take(&mut self.utf8_carry);
            joined.extend_from_slice(bytes);
            Cow::Owned(joined)
        };

        let mut rest: &[u8] = &data;
        loop {
            match std::str::from_utf8(rest) {
                Ok(text) => {
                    self.buffer.push_str(text);
                    return;
                }
                Err(err) => {
                    let (valid, after) = rest.split_at(err.valid_up_to());
                    if let Ok(text) = std::str::from_utf8(valid) {
                        self.buffer.push_str(text);
                    }
                    match err.error_len() {
                        Some(invalid_len) => {
                            self.buffer.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[invalid_len..];
                        }
                        None => {
                            // Sequence continues in the next read.
                            self.utf8_carry = after.to_vec();
                            return;
                        }
                    }
                }
            }
        }
    }

    fn handle_line(&mut self, line: &str, updates: &mut Vec<StreamUpdate>) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }

        match parse_line(line) {
            Ok(event) => self.apply_event(event, updates),
            Err(err) => {
                self.skipped_lines += 1;
                tracing::warn!(error = %err, line = %err.line, "skipping malformed stream line");
            }
        }
    }

    fn apply_event(&mut self, event: ChatStreamEvent, updates: &mut Vec<StreamUpdate>) {
        if self.first_token == FirstToken::Pending {
            self.first_token = FirstToken::Raised;
        }

        match event {
            ChatStreamEvent::Sources { data } => updates.push(StreamUpdate::Citations(data)),
            ChatStreamEvent::Chunk { content } => {
                self.accumulated.push_str(&content);
                updates.push(StreamUpdate::Content(self.accumulated.clone()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codesense_types::chat::Source;

    fn decode_all(reads: &[&[u8]]) -> (Vec<StreamUpdate>, StreamDecoder) {
        let mut decoder = StreamDecoder::new();
        let mut updates = Vec::new();
        for read in reads {
            updates.extend(decoder.feed(read));
        }
        updates.extend(decoder.finish());
        (updates, decoder)
    }

    #[test]
    fn test_two_chunk_example() {
        let (updates, decoder) = decode_all(&[
            br#"{"type":"chunk","content":"Hel"#.as_slice(),
            b"lo\"}\n{\"type\":\"sources\",\"data\":[]}\n".as_slice(),
        ]);
        assert_eq!(
            updates,
            vec![
                StreamUpdate::Content("Hello".to_string()),
                StreamUpdate::Citations(Vec::new()),
            ]
        );
        assert_eq!(decoder.content(), "Hello");
    }

    #[test]
    fn test_every_split_of_a_line_yields_one_identical_event() {
        let line = "{\"type\":\"chunk\",\"content\":\"caf\u{e9} \u{1f980} ok\"}\n".as_bytes();
        let (expected, _) = decode_all(&[line]);
        assert_eq!(expected.len(), 1);

        // Two reads, every split point (including inside multi-byte chars).
        for i in 0..=line.len() {
            let (updates, _) = decode_all(&[&line[..i], &line[i..]]);
            assert_eq!(updates, expected, "split at {i}");
        }

        // Three reads.
        for i in 0..=line.len() {
            for j in i..=line.len() {
                let (updates, _) = decode_all(&[&line[..i], &line[i..j], &line[j..]]);
                assert_eq!(updates, expected, "split at {i}/{j}");
            }
        }

        // One byte per read.
        let bytes: Vec<&[u8]> = line.chunks(1).collect();
        let (updates, _) = decode_all(&bytes);
        assert_eq!(updates, expected);
    }

    #[test]
    fn test_malformed_line_is_skipped() {
        let body = concat!(
            "{\"type\":\"chunk\",\"content\":\"a\"}\n",
            "{\"type\":\"chunk\",\"content\":\n",
            "{\"type\":\"chunk\",\"content\":\"b\"}\n",
        );
        let (updates, decoder) = decode_all(&[body.as_bytes()]);
        assert_eq!(
            updates,
            vec![
                StreamUpdate::Content("a".to_string()),
                StreamUpdate::Content("ab".to_string()),
            ]
        );
        assert_eq!(decoder.skipped_lines(), 1);
    }

    #[test]
    fn test_unknown_event_type_is_skipped() {
        let body = "{\"type\":\"done\"}\n{\"type\":\"chunk\",\"content\":\"x\"}\n";
        let (updates, decoder) = decode_all(&[body.as_bytes()]);
        assert_eq!(updates, vec![StreamUpdate::Content("x".to_string())]);
        assert_eq!(decoder.skipped_lines(), 1);
    }

    #[test]
    fn test_content_updates_carry_full_text() {
        let body = concat!(
            "{\"type\":\"chunk\",\"content\":\"The \"}\n",
            "{\"type\":\"chunk\",\"content\":\"answer\"}\n",
        );
        let (updates, decoder) = decode_all(&[body.as_bytes()]);
        assert_eq!(
            updates,
            vec![
                StreamUpdate::Content("The ".to_string()),
                StreamUpdate::Content("The answer".to_string()),
            ]
        );
        assert_eq!(decoder.into_content(), "The answer");
    }

    #[test]
    fn test_sources_parse_into_citations() {
        let body = r#"{"type":"sources","data":[{"file":"src/lib.rs","code":"pub fn f() {}","start_line":10,"end_line":12,"repo_id":"R1"}]}
"#;
        let (updates, _) = decode_all(&[body.as_bytes()]);
        assert_eq!(
            updates,
            vec![StreamUpdate::Citations(vec![Source {
                file: "src/lib.rs".to_string(),
                code: "pub fn f() {}".to_string(),
                start_line: 10,
                end_line: Some(12),
                repo_id: Some("R1".to_string()),
            }])]
        );
    }

    #[test]
    fn test_trailing_complete_line_emitted_on_finish() {
        let mut decoder = StreamDecoder::new();
        assert!(decoder.feed(br#"{"type":"chunk","content":"end"}"#).is_empty());
        assert_eq!(
            decoder.finish(),
            vec![StreamUpdate::Content("end".to_string())]
        );
    }

    #[test]
    fn test_trailing_partial_line_discarded_on_finish() {
        let mut decoder = StreamDecoder::new();
        let updates = decoder.feed(b"{\"type\":\"chunk\",\"content\":\"a\"}\n{\"type\":\"chu");
        assert_eq!(updates.len(), 1);
        assert!(decoder.finish().is_empty());
        assert_eq!(decoder.content(), "a");
    }

    #[test]
    fn test_blank_and_crlf_lines() {
        let body = "\r\n{\"type\":\"chunk\",\"content\":\"a\"}\r\n\n";
        let (updates, decoder) = decode_all(&[body.as_bytes()]);
        assert_eq!(updates, vec![StreamUpdate::Content("a".to_string())]);
        assert_eq!(decoder.skipped_lines(), 0);
    }

    #[test]
    fn test_first_token_is_one_shot() {
        let mut decoder = StreamDecoder::new();
        assert!(!decoder.take_first_token());

        decoder.feed(b"not json\n");
        assert!(!decoder.take_first_token());

        decoder.feed(b"{\"type\":\"sources\",\"data\":[]}\n");
        assert!(decoder.take_first_token());
        assert!(!decoder.take_first_token());

        decoder.feed(b"{\"type\":\"chunk\",\"content\":\"x\"}\n");
        assert!(!decoder.take_first_token());
    }

    #[test]
    fn test_invalid_utf8_replaced_not_fatal() {
        let mut body = b"{\"type\":\"chunk\",\"content\":\"a".to_vec();
        body.push(0xff);
        body.extend_from_slice(b"b\"}\n");
        let (updates, _) = decode_all(&[body.as_slice()]);
        assert_eq!(
            updates,
            vec![StreamUpdate::Content("a\u{fffd}b".to_string())]
        );
    }
}
