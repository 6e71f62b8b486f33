use bytes::BytesMut;
use futures::stream::{Stream, StreamExt};
use std::time::Instant;
use tracing::{debug, trace};

use crate::models::openai::ChatCompletionChunk;

// ==================================================================================================
// Constants
// ==================================================================================================

/// Blank line terminating one server-sent event record.
pub const EVENT_DELIMITER: &[u8] = b"\n\n";

/// Prefix carried by every record with a JSON payload.
pub const EVENT_PREFIX: &[u8] = b"data: ";

// ==================================================================================================
// Data Structures
// ==================================================================================================

/// Text delta extracted from one event record.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamEventFragment {
    /// Content delta carried by the record
    pub text: String,
    /// Whether this is the first non-empty delta of the response
    pub is_first: bool,
    /// When the record was completed by an incoming chunk
    pub received_at: Instant,
}

/// Result of a stream that produced at least one content delta.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamOutcome {
    pub first_token_at: Instant,
    pub finished_at: Instant,
    pub text: String,
}

// ==================================================================================================
// SSE Parsing
// ==================================================================================================

/// Incremental parser for a streamed chat-completion body.
///
/// Bytes are appended as they arrive; every complete record (terminated by the
/// delimiter) is cut from the front of the buffer and reduced, while an incomplete tail
/// stays buffered for the next chunk. Records without the `data: ` prefix and records
/// whose payload is not valid JSON are dropped silently: providers interleave heartbeat
/// and control frames (`: ping`, `data: [DONE]`) with content.
///
/// The parser is a plain value. Cloning it checkpoints the full state, and
/// [`reset`](Self::reset) makes it reusable for another response.
#[derive(Debug, Clone)]
pub struct StreamingResponseParser {
    buffer: BytesMut,
    delimiter: Vec<u8>,
    text: String,
    first_token_at: Option<Instant>,
    records: usize,
    skipped: usize,
}

impl Default for StreamingResponseParser {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamingResponseParser {
    pub fn new() -> Self {
        Self::with_delimiter(EVENT_DELIMITER)
    }

    /// Parser splitting records on a custom delimiter (e.g. `\r\n\r\n`).
    /// An empty delimiter falls back to the default blank line.
    pub fn with_delimiter(delimiter: impl Into<Vec<u8>>) -> Self {
        let mut delimiter = delimiter.into();
        if delimiter.is_empty() {
            delimiter = EVENT_DELIMITER.to_vec();
        }

        Self {
            buffer: BytesMut::new(),
            delimiter,
            text: String::new(),
            first_token_at: None,
            records: 0,
            skipped: 0,
        }
    }

    /// Feed one network chunk and return the fragments it completed.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<StreamEventFragment> {
        self.feed_at(chunk, Instant::now())
    }

    /// Same as [`feed`](Self::feed) with an explicit arrival instant.
    pub fn feed_at(&mut self, chunk: &[u8], now: Instant) -> Vec<StreamEventFragment> {
        // A delimiter may straddle the previous tail and the new chunk
        let mut search_from = self
            .buffer
            .len()
            .saturating_sub(self.delimiter.len() - 1);
        self.buffer.extend_from_slice(chunk);

        let mut fragments = Vec::new();

        while let Some(pos) = find_subslice(&self.buffer[search_from..], &self.delimiter) {
            let end = search_from + pos;
            let record = self.buffer.split_to(end + self.delimiter.len());
            search_from = 0;

            if let Some(fragment) = self.reduce_record(&record[..end], now) {
                fragments.push(fragment);
            }
        }

        fragments
    }

    fn reduce_record(&mut self, record: &[u8], now: Instant) -> Option<StreamEventFragment> {
        self.records += 1;

        let Some(payload) = record.strip_prefix(EVENT_PREFIX) else {
            self.skipped += 1;
            trace!(len = record.len(), "Skipping record without data prefix");
            return None;
        };

        let chunk: ChatCompletionChunk = match serde_json::from_slice(payload) {
            Ok(chunk) => chunk,
            Err(e) => {
                self.skipped += 1;
                trace!(
                    error = %e,
                    payload = %String::from_utf8_lossy(&payload[..payload.len().min(100)]),
                    "Skipping record with non-JSON payload"
                );
                return None;
            }
        };

        let delta = chunk.first_delta().filter(|d| !d.is_empty())?;

        self.text.push_str(delta);
        let is_first = self.first_token_at.is_none();
        if is_first {
            self.first_token_at = Some(now);
        }

        Some(StreamEventFragment {
            text: delta.to_string(),
            is_first,
            received_at: now,
        })
    }

    /// Close the stream. Returns `None` when no content delta was ever seen.
    pub fn finish(&mut self) -> Option<StreamOutcome> {
        self.finish_at(Instant::now())
    }

    /// Same as [`finish`](Self::finish) with an explicit end instant.
    pub fn finish_at(&mut self, finished_at: Instant) -> Option<StreamOutcome> {
        if !self.buffer.is_empty() {
            debug!(
                pending = self.buffer.len(),
                "Discarding incomplete trailing record"
            );
            self.buffer.clear();
        }

        debug!(
            records = self.records,
            skipped = self.skipped,
            chars = self.text.chars().count(),
            "Stream finished"
        );

        let first_token_at = self.first_token_at.take()?;
        Some(StreamOutcome {
            first_token_at,
            finished_at,
            text: std::mem::take(&mut self.text),
        })
    }

    /// Clear all state so the parser can be reused for another response.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.text.clear();
        self.first_token_at = None;
        self.records = 0;
        self.skipped = 0;
    }

    /// Text accumulated so far.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn first_token_at(&self) -> Option<Instant> {
        self.first_token_at
    }

    /// Bytes of an incomplete record waiting for more data.
    pub fn pending_bytes(&self) -> usize {
        self.buffer.len()
    }

    /// Records dropped for a missing prefix or an unparsable payload.
    pub fn skipped_records(&self) -> usize {
        self.skipped
    }
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Drive a body stream through a parser until it closes.
///
/// Read errors are returned as-is; the caller decides how to report them.
pub async fn collect_stream<S, B, E>(
    stream: S,
    mut parser: StreamingResponseParser,
) -> Result<Option<StreamOutcome>, E>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
{
    futures::pin_mut!(stream);
    while let Some(chunk) = stream.next().await {
        parser.feed(chunk?.as_ref());
    }

    Ok(parser.finish())
}
