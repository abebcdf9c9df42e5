//! Gemini REST transport.
//!
//! Each text input becomes one `streamGenerateContent` request that carries
//! the conversation so far, the freshest screen frame and any buffered audio.
//! Streamed chunks are accumulated and forwarded as cumulative deltas.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use futures::StreamExt;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tokio::sync::mpsc;

use crate::capture::audio::{AudioChunk, WAV_MIME};
use crate::capture::frame::ImageFrame;
use crate::error::{Result, StealthError};
use crate::session::model::SessionRequest;
use crate::session::transport::{
    connection_pair, Connection, ConnectionEnd, InboundEvent, InputPayload, Outbound,
    StreamingDelta, Transport,
};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Roughly thirty seconds of 16 kHz mono PCM.
const MAX_AUDIO_BYTES: usize = 16_000 * 2 * 30;

pub struct GeminiTransport {
    client: Client,
    base_url: String,
    model: String,
}

impl Default for GeminiTransport {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL, DEFAULT_MODEL)
    }
}

impl GeminiTransport {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
        }
    }

    fn model_url(&self) -> String {
        format!("{}/{}", self.base_url, self.model)
    }

    async fn handshake(&self, api_key: &str) -> Result<()> {
        let response = self
            .client
            .get(self.model_url())
            .header("x-goog-api-key", api_key)
            .timeout(Duration::from_secs(15))
            .send()
            .await
            .map_err(|e| StealthError::Transport(format!("Backend unreachable: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(classify_status(status, &body, true))
    }
}

/// During the handshake the only input is the key, so a 400 means the key
/// was rejected. Once a session is up a 400 is a bad request body.
fn classify_status(status: StatusCode, body: &str, handshake: bool) -> StealthError {
    let message = format!("Gemini API error ({}): {}", status, body.trim());
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StealthError::Auth(message),
        StatusCode::BAD_REQUEST if handshake => StealthError::Auth(message),
        _ => StealthError::Transport(message),
    }
}

#[async_trait]
impl Transport for GeminiTransport {
    async fn connect(&self, request: &SessionRequest) -> Result<Connection> {
        self.handshake(&request.api_key).await?;

        let (connection, end) = connection_pair();
        let worker = GeminiStream {
            client: self.client.clone(),
            url: format!("{}:streamGenerateContent?alt=sse", self.model_url()),
            api_key: request.api_key.clone(),
            system_instruction: request.system_instruction(),
            google_search: request.enable_google_search,
            contents: Vec::new(),
            latest_frame: None,
            audio: Vec::new(),
            next_response: 0,
        };
        tokio::spawn(worker.run(end));
        Ok(connection)
    }
}

struct GeminiStream {
    client: Client,
    url: String,
    api_key: String,
    system_instruction: String,
    google_search: bool,
    contents: Vec<Value>,
    latest_frame: Option<ImageFrame>,
    audio: Vec<u8>,
    next_response: u64,
}

/// The controller hung up; stop the worker.
struct Detached;

impl GeminiStream {
    async fn run(mut self, mut end: ConnectionEnd) {
        loop {
            tokio::select! {
                text = end.text_rx.recv() => match text {
                    Some(outbound) => {
                        if self.submit(outbound, &end.inbound_tx).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                },
                Some(frame) = end.frame_rx.recv() => self.buffer(frame),
            }
        }
        log::debug!("Gemini stream worker stopped");
    }

    fn buffer(&mut self, outbound: Outbound) {
        match outbound.payload {
            InputPayload::Image(frame) => self.latest_frame = Some(frame),
            InputPayload::Audio(chunk) => {
                self.audio.extend_from_slice(&chunk.data);
                if self.audio.len() > MAX_AUDIO_BYTES {
                    let excess = self.audio.len() - MAX_AUDIO_BYTES;
                    self.audio.drain(..excess);
                }
            }
            InputPayload::Text(_) => {}
        }
    }

    fn user_content(&mut self, text: &str) -> Value {
        let engine = base64::engine::general_purpose::STANDARD;
        let mut parts = vec![json!({ "text": text })];
        if let Some(frame) = self.latest_frame.take() {
            parts.push(json!({
                "inlineData": { "mimeType": frame.mime_type, "data": engine.encode(&frame.data) }
            }));
        }
        if !self.audio.is_empty() {
            let chunk = AudioChunk::pcm16(std::mem::take(&mut self.audio));
            log::debug!("Attaching {} ms of buffered audio", chunk.duration_ms());
            parts.push(json!({
                "inlineData": { "mimeType": WAV_MIME, "data": engine.encode(chunk.to_wav()) }
            }));
        }
        json!({ "role": "user", "parts": parts })
    }

    fn request_body(&self) -> Value {
        let mut body = json!({
            "systemInstruction": { "parts": [{ "text": self.system_instruction }] },
            "contents": self.contents,
        });
        if self.google_search {
            body["tools"] = json!([{ "google_search": {} }]);
        }
        body
    }

    async fn submit(
        &mut self,
        outbound: Outbound,
        inbound: &mpsc::Sender<InboundEvent>,
    ) -> std::result::Result<(), Detached> {
        let InputPayload::Text(text) = outbound.payload else {
            return Ok(());
        };
        let content = self.user_content(&text);
        self.contents.push(content);

        let sent = self
            .client
            .post(&self.url)
            .header("x-goog-api-key", &self.api_key)
            .json(&self.request_body())
            .send()
            .await;

        let response = match sent {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                self.contents.pop();
                return report(
                    inbound,
                    InboundEvent::SendFailed {
                        id: outbound.id,
                        message: classify_status(status, &body, false).to_string(),
                    },
                )
                .await;
            }
            Err(e) => {
                self.contents.pop();
                return report(
                    inbound,
                    InboundEvent::SendFailed {
                        id: outbound.id,
                        message: format!("Backend unreachable: {}", e),
                    },
                )
                .await;
            }
        };
        report(inbound, InboundEvent::Acknowledged(outbound.id)).await?;

        self.next_response += 1;
        let response_id = self.next_response;
        let mut accumulated = String::new();
        let mut lines = SseLines::default();
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let bytes = match chunk {
                Ok(bytes) => bytes,
                Err(e) => {
                    return report(inbound, InboundEvent::Error(format!("Stream interrupted: {}", e)))
                        .await;
                }
            };
            let mut grew = false;
            for line in lines.push(&bytes) {
                if let Some(piece) = text_from_sse_line(&line) {
                    accumulated.push_str(&piece);
                    grew = true;
                }
            }
            if grew {
                let delta = StreamingDelta {
                    response_id,
                    text: accumulated.clone(),
                    is_complete: false,
                };
                report(inbound, InboundEvent::Delta(delta)).await?;
            }
        }

        if let Some(line) = lines.finish() {
            if let Some(piece) = text_from_sse_line(&line) {
                accumulated.push_str(&piece);
            }
        }
        self.contents
            .push(json!({ "role": "model", "parts": [{ "text": accumulated }] }));
        let delta = StreamingDelta {
            response_id,
            text: accumulated,
            is_complete: true,
        };
        report(inbound, InboundEvent::Delta(delta)).await
    }
}

async fn report(
    inbound: &mpsc::Sender<InboundEvent>,
    event: InboundEvent,
) -> std::result::Result<(), Detached> {
    inbound.send(event).await.map_err(|_| Detached)
}

/// Splits a byte stream into complete lines. Bytes are held raw until a
/// newline arrives so a character split across chunks decodes intact.
#[derive(Debug, Default)]
struct SseLines {
    pending: Vec<u8>,
}

impl SseLines {
    fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            lines.push(decode_line(&line));
        }
        lines
    }

    fn finish(&mut self) -> Option<String> {
        let rest = decode_line(&std::mem::take(&mut self.pending));
        (!rest.trim().is_empty()).then_some(rest)
    }
}

fn decode_line(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_end_matches(['\r', '\n'])
        .to_string()
}

/// Text carried by one `data:` line of a streamGenerateContent response.
fn text_from_sse_line(line: &str) -> Option<String> {
    let payload = line.strip_prefix("data:")?.trim();
    let value: Value = serde_json::from_str(payload).ok()?;
    let parts = value
        .pointer("/candidates/0/content/parts")?
        .as_array()?;
    let text: String = parts
        .iter()
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect();
    (!text.is_empty()).then_some(text)
}
