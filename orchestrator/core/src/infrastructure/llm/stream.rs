// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Line-oriented stream decoding shared by the provider adapters
//
// SSE (OpenAI, Anthropic) and NDJSON (Ollama) are both line protocols. The
// byte stream is split on '\n' and each complete line goes through a
// provider-specific decoder. A line that fails to parse is logged and
// dropped; the stream keeps going.

use crate::domain::llm::{ChunkStream, LLMError, StreamChunk};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use tracing::warn;

/// Provider-specific translation of one protocol line
pub trait LineDecoder: Send + 'static {
    fn provider(&self) -> &'static str;

    /// `Ok(None)` for lines that carry no content (comments, keep-alives,
    /// role-only deltas). `Err(LLMError::MalformedFragment)` is skipped;
    /// any other error terminates the stream.
    fn decode_line(&mut self, line: &str) -> Result<Option<StreamChunk>, LLMError>;
}

/// Reassembles lines across arbitrary chunk boundaries
#[derive(Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    /// Append bytes and return every line completed by them
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw[..raw.len() - 1]);
            lines.push(line.trim_end_matches('\r').to_string());
        }
        lines
    }

    /// Whatever is left once the transport closes
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let raw = std::mem::take(&mut self.pending);
        let line = String::from_utf8_lossy(&raw).trim_end_matches('\r').to_string();
        (!line.is_empty()).then_some(line)
    }
}

enum Step {
    Emit(StreamChunk),
    Finish,
    Skip,
    Fail(LLMError),
}

fn step<D: LineDecoder>(decoder: &mut D, line: &str) -> Step {
    match decoder.decode_line(line) {
        Ok(Some(StreamChunk::Done)) => Step::Finish,
        Ok(Some(StreamChunk::Delta(text))) if text.is_empty() => Step::Skip,
        Ok(Some(chunk)) => Step::Emit(chunk),
        Ok(None) => Step::Skip,
        Err(LLMError::MalformedFragment(reason)) => {
            warn!(provider = decoder.provider(), %reason, "Skipping malformed stream fragment");
            Step::Skip
        }
        Err(e) => Step::Fail(e),
    }
}

/// Turn a raw byte stream into provider-agnostic chunks.
///
/// The output ends right after `StreamChunk::Done`, or after the first fatal
/// error. If the transport closes first, it simply ends without `Done`.
pub fn decode_lines<S, D>(bytes: S, mut decoder: D) -> ChunkStream
where
    S: Stream<Item = Result<Bytes, LLMError>> + Send + 'static,
    D: LineDecoder,
{
    Box::pin(async_stream::stream! {
        let mut bytes = Box::pin(bytes);
        let mut buffer = LineBuffer::default();

        while let Some(next) = bytes.next().await {
            let chunk = match next {
                Ok(chunk) => chunk,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };

            for line in buffer.push(&chunk) {
                match step(&mut decoder, &line) {
                    Step::Emit(chunk) => yield Ok(chunk),
                    Step::Finish => {
                        yield Ok(StreamChunk::Done);
                        return;
                    }
                    Step::Skip => {}
                    Step::Fail(e) => {
                        yield Err(e);
                        return;
                    }
                }
            }
        }

        if let Some(line) = buffer.finish() {
            match step(&mut decoder, &line) {
                Step::Emit(chunk) => yield Ok(chunk),
                Step::Finish => yield Ok(StreamChunk::Done),
                Step::Skip => {}
                Step::Fail(e) => yield Err(e),
            }
        }
    })
}

/// Payload of an SSE `data:` line, `None` for every other field
pub fn sse_data(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim_start)
}
