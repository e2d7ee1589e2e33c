use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::stream::Stream;
use tracing::warn;

use flowline_core::error::{FlowError, Result};
use flowline_core::types::StreamRecord;

/// Split a raw byte stream into newline-delimited JSON records.
///
/// Bytes are buffered until a `\n` arrives, so a record split across chunks
/// (including inside a multi-byte character) is parsed once, whole. Lines
/// that are blank are ignored; lines that fail to parse are logged and
/// skipped without disturbing the records around them.
#[derive(Default)]
pub struct NdjsonParser {
    buffer: Vec<u8>,
}

impl NdjsonParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes into the parser and extract complete records.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<StreamRecord> {
        self.buffer.extend_from_slice(chunk);
        let mut records = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(record) = parse_line(&line[..line.len() - 1]) {
                records.push(record);
            }
        }

        records
    }

    /// Parse whatever is left once the stream has ended (a last record with
    /// no trailing newline).
    pub fn finish(&mut self) -> Option<StreamRecord> {
        let rest = std::mem::take(&mut self.buffer);
        parse_line(&rest)
    }

    /// Bytes held back waiting for a newline.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}

fn parse_line(raw: &[u8]) -> Option<StreamRecord> {
    let line = match std::str::from_utf8(raw) {
        Ok(s) => s.trim(),
        Err(e) => {
            warn!(error = %e, "Skipping streamed line with invalid UTF-8");
            return None;
        }
    };
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str(line) {
        Ok(record) => Some(record),
        Err(e) => {
            warn!(line = %line, error = %e, "Failed to parse streamed line");
            None
        }
    }
}

/// A stream of records decoded from raw NDJSON bytes.
///
/// A transport error from the inner stream is yielded once and ends the stream.
pub struct NdjsonStream<S> {
    inner: S,
    parser: NdjsonParser,
    pending: VecDeque<StreamRecord>,
    done: bool,
}

impl<S> NdjsonStream<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            parser: NdjsonParser::new(),
            pending: VecDeque::new(),
            done: false,
        }
    }
}

impl<S, E> Stream for NdjsonStream<S>
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Unpin,
    E: std::fmt::Display,
{
    type Item = Result<StreamRecord>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            if let Some(record) = this.pending.pop_front() {
                return Poll::Ready(Some(Ok(record)));
            }
            if this.done {
                return Poll::Ready(None);
            }

            match Pin::new(&mut this.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => {
                    this.pending.extend(this.parser.feed(&bytes));
                }
                Poll::Ready(Some(Err(e))) => {
                    this.done = true;
                    return Poll::Ready(Some(Err(FlowError::Stream(e.to_string()))));
                }
                Poll::Ready(None) => {
                    this.done = true;
                    this.pending.extend(this.parser.finish());
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn node_ids(records: &[StreamRecord]) -> Vec<String> {
        records
            .iter()
            .map(|r| r.results.as_ref().unwrap().node_id.clone())
            .collect()
    }

    #[test]
    fn test_parser_basic() {
        let mut parser = NdjsonParser::new();
        let records = parser.feed(b"{\"results\":{\"node_id\":\"a\",\"node_result\":\"x\"}}\n");
        assert_eq!(node_ids(&records), vec!["a"]);
        assert_eq!(parser.buffered(), 0);
    }

    #[test]
    fn test_parser_record_split_across_chunks() {
        let mut parser = NdjsonParser::new();
        let first = parser.feed(b"{\"results\":{\"node_id\":\"a\",");
        assert!(first.is_empty());
        let second = parser.feed(b"\"node_result\":\"x\"}}\n");
        assert_eq!(node_ids(&second), vec!["a"]);
    }

    #[test]
    fn test_parser_split_inside_multibyte_char() {
        let line = "{\"results\":{\"node_id\":\"a\",\"node_result\":\"Zürich\"}}\n".as_bytes();
        let cut = line.iter().position(|b| *b == 0xC3).unwrap() + 1;
        let mut parser = NdjsonParser::new();
        assert!(parser.feed(&line[..cut]).is_empty());
        let records = parser.feed(&line[cut..]);
        assert_eq!(
            records[0].results.as_ref().unwrap().node_result,
            serde_json::json!("Zürich")
        );
    }

    #[test]
    fn test_parser_skips_malformed_line() {
        let mut parser = NdjsonParser::new();
        let records = parser.feed(
            b"{\"results\":{\"node_id\":\"a\",\"node_result\":1}}\nnot json at all\n\n{\"results\":{\"node_id\":\"b\",\"node_result\":2}}\n",
        );
        assert_eq!(node_ids(&records), vec!["a", "b"]);
    }

    #[test]
    fn test_parser_keeps_additional_input() {
        let mut parser = NdjsonParser::new();
        let records = parser.feed(
            b"{\"results\":{\"node_id\":\"a\",\"node_result\":1},\"additional_input\":[{\"node_id\":\"a\",\"node_input\":\"v\"}]}\n",
        );
        assert_eq!(records[0].additional_input[0].node_input, "v");
    }

    #[test]
    fn test_parser_tolerates_loose_additional_input() {
        let mut parser = NdjsonParser::new();
        let records = parser.feed(
            b"{\"results\":{\"node_id\":\"a\",\"node_result\":1},\"additional_input\":null}\n{\"results\":{\"node_id\":\"b\",\"node_result\":2},\"additional_input\":[{\"node_id\":\"b\",\"node_input\":{\"input\":\"x\"}}]}\n",
        );
        assert_eq!(node_ids(&records), vec!["a", "b"]);
        assert!(records[0].additional_input.is_empty());
        assert_eq!(records[1].additional_input[0].node_input, "{\"input\":\"x\"}");
    }

    #[test]
    fn test_finish_parses_trailing_line() {
        let mut parser = NdjsonParser::new();
        assert!(parser
            .feed(b"{\"results\":{\"node_id\":\"z\",\"node_result\":0}}")
            .is_empty());
        assert!(parser.finish().is_some());
        assert!(parser.finish().is_none());
    }

    #[tokio::test]
    async fn test_stream_over_chunks() {
        let chunks: Vec<std::result::Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from_static(b"{\"results\":{\"node_id\":\"a\",\"node_re")),
            Ok(Bytes::from_static(b"sult\":1}}\n{bad}\n{\"results\":{\"node_id\":\"b\",")),
            Ok(Bytes::from_static(b"\"node_result\":2}}")),
        ];
        let stream = NdjsonStream::new(futures::stream::iter(chunks));
        let items: Vec<_> = stream.collect().await;
        let records: Vec<_> = items.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(node_ids(&records), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_stream_transport_error_ends_stream() {
        let chunks: Vec<std::result::Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from_static(b"{\"results\":{\"node_id\":\"a\",\"node_result\":1}}\n")),
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset")),
            Ok(Bytes::from_static(b"{\"results\":{\"node_id\":\"b\",\"node_result\":2}}\n")),
        ];
        let mut stream = NdjsonStream::new(futures::stream::iter(chunks));
        assert!(stream.next().await.unwrap().is_ok());
        assert!(matches!(stream.next().await, Some(Err(FlowError::Stream(_)))));
        assert!(stream.next().await.is_none());
    }
}
