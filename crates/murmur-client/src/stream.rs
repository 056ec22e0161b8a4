//! Lazy record stream for one streaming generation call

use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use futures::stream::{self, Stream, StreamExt};

use crate::context::ConversationContext;
use crate::decode::decode_record;
use crate::error::{ClientError, DecodeError, Result};
use crate::lines::LineReassembler;
use crate::transport::ChunkStream;
use crate::types::ResponseRecord;

/// Progress of a streaming call
///
/// A stream is handed out once response headers arrive, so it starts in
/// `Requesting` and never returns to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamPhase {
    /// Headers received, no body yet
    Requesting,
    /// At least one body chunk received
    Streaming,
    /// Final record seen or body ended cleanly
    Completed,
    /// Transport failed
    Failed,
}

impl StreamPhase {
    /// Whether no further records can be produced
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Records decoded from an NDJSON response body
///
/// Ends after a record with `done = true` or when the body ends, whichever
/// comes first. A transport failure is yielded once as `Err` and ends the
/// stream; lines that fail to decode are logged and skipped. Every decoded
/// record updates the client's conversation context before it is yielded.
///
/// Dropping the stream closes the connection.
pub struct GenerationStream {
    chunks: ChunkStream,
    reassembler: LineReassembler,
    context: ConversationContext,
    phase: StreamPhase,
}

impl GenerationStream {
    /// Build a stream over raw body chunks
    pub fn new(chunks: ChunkStream, context: ConversationContext) -> Self {
        Self {
            chunks,
            reassembler: LineReassembler::new(),
            context,
            phase: StreamPhase::Requesting,
        }
    }

    /// Current phase of the call
    pub const fn phase(&self) -> StreamPhase {
        self.phase
    }

    /// Drain the stream, concatenating every text fragment
    ///
    /// # Errors
    ///
    /// Returns the transport error that ended the stream, if any
    pub async fn into_text(mut self) -> Result<String> {
        let mut text = String::new();
        while let Some(record) = self.next().await {
            text.push_str(&record?.response);
        }
        Ok(text)
    }

    /// Decode a line, updating context; malformed lines yield `None`
    fn accept(&mut self, line: std::result::Result<String, DecodeError>) -> Option<ResponseRecord> {
        match line.and_then(|line| decode_record(&line)) {
            Ok(record) => {
                self.context.observe(&record);
                if record.done {
                    self.finish(StreamPhase::Completed);
                }
                Some(record)
            }
            Err(e) => {
                tracing::warn!(error = %e, "skipping undecodable response line");
                None
            }
        }
    }

    /// Enter a terminal phase, releasing the connection and buffered bytes
    fn finish(&mut self, phase: StreamPhase) {
        self.phase = phase;
        self.chunks = Box::pin(stream::empty());
        self.reassembler.clear();
        tracing::debug!(?phase, "generation stream finished");
    }
}

impl Stream for GenerationStream {
    type Item = Result<ResponseRecord>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            if this.phase.is_terminal() {
                return Poll::Ready(None);
            }

            if let Some(line) = this.reassembler.next_line() {
                if let Some(record) = this.accept(line) {
                    return Poll::Ready(Some(Ok(record)));
                }
                continue;
            }

            match ready!(this.chunks.poll_next_unpin(cx)) {
                Some(Ok(chunk)) => {
                    this.phase = StreamPhase::Streaming;
                    this.reassembler.push(&chunk);
                }
                Some(Err(e)) => {
                    this.finish(StreamPhase::Failed);
                    return Poll::Ready(Some(Err(ClientError::Transport(e))));
                }
                None => {
                    let tail = this.reassembler.finish();
                    let record = tail.and_then(|line| this.accept(line));
                    if this.phase != StreamPhase::Completed {
                        this.finish(StreamPhase::Completed);
                    }
                    return Poll::Ready(record.map(Ok));
                }
            }
        }
    }
}

impl fmt::Debug for GenerationStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationStream")
            .field("phase", &self.phase)
            .field("buffered", &self.reassembler.buffered())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bytes::Bytes;

    use super::*;
    use crate::error::TransportError;
    use crate::types::ContinuationToken;

    fn chunked(parts: &[&str]) -> ChunkStream {
        let items: Vec<std::result::Result<Bytes, TransportError>> =
            parts.iter().map(|p| Ok(Bytes::copy_from_slice(p.as_bytes()))).collect();
        Box::pin(stream::iter(items))
    }

    #[tokio::test]
    async fn two_records_across_chunk_boundaries() {
        let context = ConversationContext::new();
        let mut stream = GenerationStream::new(
            chunked(&[
                "{\"response\":\"Hi\",\"do",
                "ne\":false}\n{\"response\":\" there\",\"done\":tr",
                "ue,\"context\":[1,2]}",
            ]),
            context.clone(),
        );
        assert_eq!(stream.phase(), StreamPhase::Requesting);

        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first.response, "Hi");
        assert!(!first.done);
        assert_eq!(stream.phase(), StreamPhase::Streaming);

        let second = stream.next().await.unwrap().unwrap();
        assert_eq!(second.response, " there");
        assert!(second.done);
        assert_eq!(stream.phase(), StreamPhase::Completed);

        assert!(stream.next().await.is_none());
        assert_eq!(context.current(), Some(ContinuationToken::new(vec![1, 2])));
    }

    #[tokio::test]
    async fn malformed_line_is_skipped() {
        let mut stream = GenerationStream::new(
            chunked(&[
                "{\"response\":\"a\",\"done\":false}\n",
                "{not json}\n",
                "{\"response\":\"b\",\"done\":false}\n{\"error\":\"hiccup\"}\n",
                "{\"response\":\"c\",\"done\":true}\n",
            ]),
            ConversationContext::new(),
        );

        let mut fragments = Vec::new();
        while let Some(record) = stream.next().await {
            fragments.push(record.unwrap().response);
        }
        assert_eq!(fragments, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn nothing_after_final_record() {
        let context = ConversationContext::new();
        let stream = GenerationStream::new(
            chunked(&[
                "{\"response\":\"end\",\"done\":true,\"context\":[1]}\n",
                "{\"response\":\"late\",\"done\":false,\"context\":[2]}\n",
            ]),
            context.clone(),
        );

        let records: Vec<_> = stream.collect().await;
        assert_eq!(records.len(), 1);
        assert_eq!(context.current(), Some(ContinuationToken::new(vec![1])));
    }

    #[tokio::test]
    async fn end_of_body_without_final_flag_completes() {
        let mut stream = GenerationStream::new(
            chunked(&["{\"response\":\"x\"}\n{\"response\":\"y\"}"]),
            ConversationContext::new(),
        );

        assert_eq!(stream.next().await.unwrap().unwrap().response, "x");
        assert_eq!(stream.next().await.unwrap().unwrap().response, "y");
        assert!(stream.next().await.is_none());
        assert_eq!(stream.phase(), StreamPhase::Completed);
    }

    #[tokio::test]
    async fn empty_body_completes_without_records() {
        let mut stream = GenerationStream::new(chunked(&[]), ConversationContext::new());
        assert!(stream.next().await.is_none());
        assert_eq!(stream.phase(), StreamPhase::Completed);
    }

    #[tokio::test]
    async fn transport_failure_keeps_earlier_records() {
        let items: Vec<std::result::Result<Bytes, TransportError>> = vec![
            Ok(Bytes::from_static(b"{\"response\":\"kept\",\"done\":false,\"context\":[4]}\n{\"resp")),
            Err(TransportError::Timeout(Duration::from_secs(3))),
            Ok(Bytes::from_static(b"onse\":\"never\"}\n")),
        ];
        let context = ConversationContext::new();
        let mut stream = GenerationStream::new(Box::pin(stream::iter(items)), context.clone());

        assert_eq!(stream.next().await.unwrap().unwrap().response, "kept");
        let err = stream.next().await.unwrap().unwrap_err();
        assert!(matches!(err, ClientError::Transport(TransportError::Timeout(_))));
        assert_eq!(stream.phase(), StreamPhase::Failed);
        assert!(stream.next().await.is_none());
        assert_eq!(context.current(), Some(ContinuationToken::new(vec![4])));
    }

    #[tokio::test]
    async fn into_text_concatenates_fragments() {
        let stream = GenerationStream::new(
            chunked(&[
                "{\"response\":\"The sky \",\"done\":false}\n",
                "{\"response\":\"is blue.\",\"done\":false}\n{\"response\":\"\",\"done\":true}\n",
            ]),
            ConversationContext::new(),
        );
        assert_eq!(stream.into_text().await.unwrap(), "The sky is blue.");
    }

    #[tokio::test]
    async fn dropping_early_only_applies_decoded_records() {
        let context = ConversationContext::new();
        let mut stream = GenerationStream::new(
            chunked(&[
                "{\"response\":\"a\",\"done\":false,\"context\":[1]}\n",
                "{\"response\":\"b\",\"done\":true,\"context\":[2]}\n",
            ]),
            context.clone(),
        );

        stream.next().await.unwrap().unwrap();
        drop(stream);
        assert_eq!(context.current(), Some(ContinuationToken::new(vec![1])));
    }
}
