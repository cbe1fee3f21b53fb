use futures_util::StreamExt;
use memchr::memchr;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::api::{ChatMessage, ChatRequest, ChatResponse};
use crate::utils::url::construct_api_url;

/// Termination marker line sent by the endpoint after the last frame.
pub const STREAM_DONE_SENTINEL: &str = "[DONE]";

const FRAME_PREFIX: &str = "data:";

/// Events delivered to the session owner, tagged with the request id so
/// events from a superseded stream can be discarded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamEvent {
    Chunk(String),
    Error(String),
    Done,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeStep {
    Delta(String),
    Done,
}

/// Incremental frame decoder. Bytes are accumulated across chunks and lines
/// are only cut at `\n`, so a frame split at any byte offset (including
/// mid-UTF-8) reassembles identically on the next chunk.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
    finished: bool,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one chunk of response bytes, returning the decoded steps for
    /// every complete line it contained. The trailing partial line stays
    /// buffered for the next chunk.
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Vec<DecodeStep> {
        let mut steps = Vec::new();
        if self.finished {
            return steps;
        }
        self.buf.extend_from_slice(chunk);

        while let Some(newline_pos) = memchr(b'\n', &self.buf) {
            let line: Vec<u8> = self.buf[..newline_pos].to_vec();
            self.buf.drain(..=newline_pos);
            if let Some(step) = decode_line(&line) {
                let done = step == DecodeStep::Done;
                steps.push(step);
                if done {
                    self.finished = true;
                    break;
                }
            }
        }
        steps
    }

    /// Flushes the trailing unterminated line at end-of-data.
    pub fn finish(&mut self) -> Vec<DecodeStep> {
        if self.finished || self.buf.is_empty() {
            return Vec::new();
        }
        let line = std::mem::take(&mut self.buf);
        self.finished = true;
        decode_line(&line).into_iter().collect()
    }
}

/// Decodes a single wire line. Blank lines, lines without the frame prefix,
/// undecodable JSON, and frames carrying no text delta all decode to `None`;
/// none of them abort the stream.
fn decode_line(bytes: &[u8]) -> Option<DecodeStep> {
    let line = match std::str::from_utf8(bytes) {
        Ok(s) => s.trim(),
        Err(e) => {
            warn!("invalid UTF-8 in stream line: {e}");
            return None;
        }
    };
    let payload = line.strip_prefix(FRAME_PREFIX).map(str::trim_start)?;
    if payload == STREAM_DONE_SENTINEL {
        return Some(DecodeStep::Done);
    }
    match serde_json::from_str::<ChatResponse>(payload) {
        Ok(response) => response
            .choices
            .first()
            .and_then(|choice| choice.delta.content.clone())
            .map(DecodeStep::Delta),
        Err(e) => {
            debug!("dropping undecodable frame: {e}");
            None
        }
    }
}

fn extract_error_summary(value: &serde_json::Value) -> Option<String> {
    value
        .pointer("/error/message")
        .and_then(|v| v.as_str())
        .or_else(|| value.get("error").and_then(|v| v.as_str()))
        .or_else(|| value.get("message").and_then(|v| v.as_str()))
        .map(|text| text.split_whitespace().collect::<Vec<_>>().join(" "))
}

/// Renders an endpoint error body as a single human-readable message.
pub fn format_api_error(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "API error: <empty response>".to_string();
    }
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        if let Some(summary) = extract_error_summary(&value) {
            if !summary.is_empty() {
                return format!("API error: {summary}");
            }
        }
        if let Ok(pretty) = serde_json::to_string_pretty(&value) {
            return format!("API error:\n{pretty}");
        }
    }
    format!("API error: {trimmed}")
}

/// Everything one streaming request needs, passed explicitly per session.
/// The bearer credential travels here rather than in ambient state.
pub struct StreamParams {
    pub client: reqwest::Client,
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub api_messages: Vec<ChatMessage>,
    pub cancel_token: tokio_util::sync::CancellationToken,
    pub request_id: u64,
}

/// Spawns streaming completion requests and fans their events out over a
/// single unbounded channel. Clone-cheap; the receiver side is handed to the
/// session owner once at construction.
#[derive(Clone)]
pub struct CompletionService {
    tx: mpsc::UnboundedSender<(StreamEvent, u64)>,
}

impl CompletionService {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<(StreamEvent, u64)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn spawn_stream(&self, params: StreamParams) {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let cancel_token = params.cancel_token.clone();
            let request_id = params.request_id;
            tokio::select! {
                _ = run_stream(params, &tx) => {}
                _ = cancel_token.cancelled() => {
                    let _ = tx.send((StreamEvent::Cancelled, request_id));
                }
            }
        });
    }

    #[cfg(test)]
    pub fn send_for_test(&self, event: StreamEvent, request_id: u64) {
        let _ = self.tx.send((event, request_id));
    }
}

async fn run_stream(params: StreamParams, tx: &mpsc::UnboundedSender<(StreamEvent, u64)>) {
    let StreamParams {
        client,
        base_url,
        api_key,
        model,
        api_messages,
        cancel_token,
        request_id,
    } = params;

    let request = ChatRequest {
        model,
        messages: api_messages,
        stream: true,
    };
    let chat_url = construct_api_url(&base_url, "chat/completions");

    let response = match client
        .post(chat_url)
        .header("Content-Type", "application/json")
        .bearer_auth(&api_key)
        .json(&request)
        .send()
        .await
    {
        Ok(response) => response,
        Err(e) => {
            let _ = tx.send((StreamEvent::Error(format_api_error(&e.to_string())), request_id));
            let _ = tx.send((StreamEvent::Done, request_id));
            return;
        }
    };

    if !response.status().is_success() {
        // The body of a non-success response is an error object, never a
        // frame stream.
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<no body>".to_string());
        let _ = tx.send((StreamEvent::Error(format_api_error(&body)), request_id));
        let _ = tx.send((StreamEvent::Done, request_id));
        return;
    }

    let mut stream = response.bytes_stream();
    let mut decoder = FrameDecoder::new();

    while let Some(chunk) = stream.next().await {
        if cancel_token.is_cancelled() {
            let _ = tx.send((StreamEvent::Cancelled, request_id));
            return;
        }
        let bytes = match chunk {
            Ok(bytes) => bytes,
            Err(e) => {
                let _ = tx.send((StreamEvent::Error(format_api_error(&e.to_string())), request_id));
                let _ = tx.send((StreamEvent::Done, request_id));
                return;
            }
        };
        for step in decoder.push_chunk(&bytes) {
            match step {
                DecodeStep::Delta(delta) => {
                    let _ = tx.send((StreamEvent::Chunk(delta), request_id));
                }
                DecodeStep::Done => {
                    let _ = tx.send((StreamEvent::Done, request_id));
                    return;
                }
            }
        }
    }

    // End-of-data without the sentinel still completes the session with
    // whatever was accumulated.
    for step in decoder.finish() {
        if let DecodeStep::Delta(delta) = step {
            let _ = tx.send((StreamEvent::Chunk(delta), request_id));
        }
    }
    let _ = tx.send((StreamEvent::Done, request_id));
}
