//! NDJSON decoding for `/api/generate` streams
//!
//! Network chunks do not respect line boundaries, so bytes are buffered until
//! a full line is available. Decoding stops after the `done` marker or the
//! first error.

use std::{collections::VecDeque, fmt::Display, pin::Pin};

use futures::{Stream, StreamExt, stream};
use reqwest::Response;
use serde::Deserialize;
use tracing::{trace, warn};

use crate::{
    error::InferenceError,
    ports::{StreamingChunk, StreamingResponse},
};

/// One line of a streamed generation
#[derive(Debug, Deserialize)]
struct OllamaStreamLine {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Create a chunk stream from an HTTP response
pub fn create_stream(response: Response) -> StreamingResponse {
    decode_ndjson(response.bytes_stream())
}

/// Decode an NDJSON byte stream into chunks
pub fn decode_ndjson<S, B, E>(body: S) -> StreamingResponse
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    let decoder = LineDecoder {
        body: Box::pin(body),
        buffer: Vec::new(),
        pending: VecDeque::new(),
        finished: false,
    };

    Box::pin(stream::unfold(decoder, |mut decoder| async move {
        loop {
            if let Some(item) = decoder.pending.pop_front() {
                return Some((item, decoder));
            }
            if decoder.finished {
                return None;
            }
            match decoder.body.next().await {
                Some(Ok(bytes)) => {
                    decoder.buffer.extend_from_slice(bytes.as_ref());
                    decoder.drain_lines();
                },
                Some(Err(e)) => {
                    decoder
                        .pending
                        .push_back(Err(InferenceError::StreamError(e.to_string())));
                    decoder.finished = true;
                },
                None => {
                    let rest = std::mem::take(&mut decoder.buffer);
                    decoder.push_line(&rest);
                    decoder.finished = true;
                },
            }
        }
    }))
}

struct LineDecoder<S> {
    body: Pin<Box<S>>,
    buffer: Vec<u8>,
    pending: VecDeque<Result<StreamingChunk, InferenceError>>,
    finished: bool,
}

impl<S> LineDecoder<S> {
    fn drain_lines(&mut self) {
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            self.push_line(&line[..pos]);
        }
    }

    fn push_line(&mut self, raw: &[u8]) {
        if self.finished {
            return;
        }
        let line = String::from_utf8_lossy(raw);
        match parse_line(&line) {
            Some(Ok(chunk)) => {
                self.finished = chunk.done;
                self.pending.push_back(Ok(chunk));
            },
            Some(Err(e)) => {
                self.pending.push_back(Err(e));
                self.finished = true;
            },
            None => {},
        }
    }
}

/// Parse one NDJSON line.
///
/// Blank and malformed lines yield `None`; a server `error` field becomes an
/// error.
fn parse_line(line: &str) -> Option<Result<StreamingChunk, InferenceError>> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    trace!(line = %line, "Parsing stream line");

    match serde_json::from_str::<OllamaStreamLine>(line) {
        Ok(OllamaStreamLine {
            error: Some(message),
            ..
        }) => Some(Err(InferenceError::Generation(message))),
        Ok(parsed) => Some(Ok(StreamingChunk {
            content: parsed.response,
            done: parsed.done,
        })),
        Err(e) => {
            warn!(error = %e, line = %line, "Skipping malformed stream line");
            None
        },
    }
}
