use bytes::{Bytes, BytesMut};
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use tracing::debug;

use super::stream_event::StreamRecord;
use crate::repositories::ApiError;

const DATA_PREFIX: &[u8] = b"data: ";

/// Records decoded from one chat response, ending with the transport error if one occurs.
pub type RecordStream = BoxStream<'static, Result<StreamRecord, ApiError>>;

/// Incremental decoder for newline-delimited `data: <json>` records.
///
/// Chunks may split a line anywhere (including inside a multi-byte character),
/// so bytes are buffered until a full line is available.
#[derive(Debug, Default)]
pub struct SseLineDecoder {
    buf: BytesMut,
}

impl SseLineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one transport chunk and return every record completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamRecord> {
        self.buf.extend_from_slice(chunk);
        let mut records = Vec::new();
        while let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
            let line = self.buf.split_to(pos + 1);
            if let Some(record) = decode_line(&line[..pos]) {
                records.push(record);
            }
        }
        records
    }

    /// Flush a trailing line that was never newline-terminated.
    pub fn finish(&mut self) -> Option<StreamRecord> {
        if self.buf.is_empty() {
            return None;
        }
        let line = self.buf.split();
        decode_line(&line)
    }
}

fn decode_line(line: &[u8]) -> Option<StreamRecord> {
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    let payload = line.strip_prefix(DATA_PREFIX)?;
    let text = match std::str::from_utf8(payload) {
        Ok(text) => text,
        Err(e) => {
            debug!(error = ?e, "Skipping record with invalid UTF-8");
            return None;
        }
    };
    match StreamRecord::from_json(text) {
        Ok(record) => Some(record),
        Err(e) => {
            debug!(error = %e, payload = %text, "Skipping malformed stream record");
            None
        }
    }
}

/// Adapt a raw byte stream into a stream of records.
///
/// A transport error is yielded once and ends the stream.
pub fn decode_byte_stream<S, E>(stream: S) -> RecordStream
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Into<ApiError> + Send + 'static,
{
    let mut stream = Box::pin(stream);
    let records = async_stream::stream! {
        let mut decoder = SseLineDecoder::new();
        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(bytes) => {
                    for record in decoder.push(&bytes) {
                        yield Ok(record);
                    }
                }
                Err(e) => {
                    yield Err(e.into());
                    return;
                }
            }
        }
        if let Some(record) = decoder.finish() {
            yield Ok(record);
        }
    };
    records.boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::stream_event::StreamEvent;

    #[test]
    fn test_decodes_complete_lines() {
        let mut decoder = SseLineDecoder::new();
        let records = decoder.push(
            b"data: {\"type\":\"text_delta\",\"content\":\"Hel\"}\ndata: {\"type\":\"text_delta\",\"content\":\"lo\"}\n",
        );
        assert_eq!(records.len(), 2);
        assert_eq!(
            records[1].event,
            StreamEvent::TextDelta {
                content: "lo".into()
            }
        );
    }

    #[test]
    fn test_line_split_across_chunks() {
        let mut decoder = SseLineDecoder::new();
        assert!(decoder.push(b"data: {\"type\":\"done\"").is_empty());
        let records = decoder.push(b",\"title\":\"X\"}\n");
        assert_eq!(records.len(), 1);
        assert_eq!(
            records[0].event,
            StreamEvent::Done {
                title: Some("X".into())
            }
        );
    }

    #[test]
    fn test_multibyte_character_split_across_chunks() {
        let line = "data: {\"type\":\"text_delta\",\"content\":\"café\"}\n".as_bytes();
        let split = line.iter().position(|b| *b == 0xC3).unwrap() + 1;
        let mut decoder = SseLineDecoder::new();
        assert!(decoder.push(&line[..split]).is_empty());
        let records = decoder.push(&line[split..]);
        assert_eq!(
            records[0].event,
            StreamEvent::TextDelta {
                content: "café".into()
            }
        );
    }

    #[test]
    fn test_skips_noise_and_malformed_records() {
        let mut decoder = SseLineDecoder::new();
        let records = decoder.push(
            b"\n: keep-alive\nevent: message\ndata: {broken\ndata: {\"type\":\"done\"}\r\n",
        );
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].event, StreamEvent::Done { title: None });
    }

    #[test]
    fn test_finish_flushes_unterminated_line() {
        let mut decoder = SseLineDecoder::new();
        assert!(decoder.push(b"data: {\"type\":\"done\"}").is_empty());
        assert_eq!(
            decoder.finish().map(|r| r.event),
            Some(StreamEvent::Done { title: None })
        );
        assert!(decoder.finish().is_none());
    }

    #[tokio::test]
    async fn test_byte_stream_yields_records_then_error() {
        let chunks: Vec<Result<Bytes, ApiError>> = vec![
            Ok(Bytes::from_static(b"data: {\"type\":\"text_delta\",")),
            Ok(Bytes::from_static(b"\"content\":\"a\"}\n")),
            Err(ApiError::unavailable("connection reset")),
            Ok(Bytes::from_static(b"data: {\"type\":\"done\"}\n")),
        ];
        let results: Vec<_> = decode_byte_stream(futures::stream::iter(chunks))
            .collect()
            .await;
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(ApiError::Unavailable { .. })));
    }
}
