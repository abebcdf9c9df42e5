use base64::Engine;

use crate::capture::audio::{pcm16_from_f32, AudioChunk};
use crate::capture::config::CapturePlan;
use crate::capture::frame::ImageFrame;
use crate::error::{Result, StealthError};
use crate::session::controller::SessionSnapshot;
use crate::session::history::SessionSummary;
use crate::session::model::{Session, Turn};
use crate::session::runtime::Dispatch;
use crate::session::transport::InputPayload;
use crate::state::app_state::{lock, AppState};

fn decode(field: &str, data: &str) -> Result<Vec<u8>> {
    base64::engine::general_purpose::STANDARD
        .decode(data)
        .map_err(|e| StealthError::config(field, e.to_string(), &["<base64>"]))
}

#[tauri::command]
pub async fn initialize_session(
    api_key: String,
    profile: String,
    language: String,
    custom_instructions: Option<String>,
    state: tauri::State<'_, AppState>,
) -> Result<Session> {
    let google_search = lock(&state.config).current().enable_google_search;
    state
        .session
        .initialize_session(
            &api_key,
            &profile,
            &language,
            custom_instructions.as_deref().unwrap_or_default(),
            google_search,
        )
        .await
}

#[tauri::command]
pub async fn send_text(text: String, state: tauri::State<'_, AppState>) -> Result<Dispatch> {
    state.session.send_input(InputPayload::Text(text)).await
}

/// `data` is base64 16-bit PCM at 16 kHz.
#[tauri::command]
pub async fn send_audio(data: String, state: tauri::State<'_, AppState>) -> Result<Dispatch> {
    let chunk = AudioChunk::pcm16(decode("audio", &data)?);
    state.session.send_input(InputPayload::Audio(chunk)).await
}

/// Raw float samples in [-1, 1] at 16 kHz, as an audio worklet produces them.
#[tauri::command]
pub async fn send_audio_samples(samples: Vec<f32>, state: tauri::State<'_, AppState>) -> Result<Dispatch> {
    let chunk = pcm16_from_f32(&samples);
    state.session.send_input(InputPayload::Audio(chunk)).await
}

#[tauri::command]
pub fn get_capture_plan(state: tauri::State<'_, AppState>) -> CapturePlan {
    CapturePlan::from_config(lock(&state.config).current())
}

/// `data` is a base64 RGBA screen grab; it is scaled and JPEG-encoded at the
/// configured image quality before it is queued.
#[tauri::command]
pub async fn send_frame(
    width: u32,
    height: u32,
    data: String,
    state: tauri::State<'_, AppState>,
) -> Result<Dispatch> {
    let plan = CapturePlan::from_config(lock(&state.config).current());
    let frame = plan.encode(width, height, decode("frame", &data)?)?;
    state.session.send_input(InputPayload::Image(frame)).await
}

/// `data` is a base64 image already encoded by the capture side.
#[tauri::command]
pub async fn send_image(
    data: String,
    mime_type: Option<String>,
    state: tauri::State<'_, AppState>,
) -> Result<Dispatch> {
    let frame = ImageFrame::encoded(
        mime_type.unwrap_or_else(|| "image/jpeg".to_string()),
        decode("image", &data)?,
    );
    state.session.send_input(InputPayload::Image(frame)).await
}

#[tauri::command]
pub async fn get_history(session_id: String, state: tauri::State<'_, AppState>) -> Result<Vec<Turn>> {
    state.session.get_history(&session_id).await
}

#[tauri::command]
pub async fn list_sessions(state: tauri::State<'_, AppState>) -> Result<Vec<SessionSummary>> {
    state.session.list_sessions().await
}

#[tauri::command]
pub async fn get_session_snapshot(state: tauri::State<'_, AppState>) -> Result<SessionSnapshot> {
    state.session.snapshot().await
}

#[tauri::command]
pub async fn navigate_response(direction: i32, state: tauri::State<'_, AppState>) -> Result<Option<Turn>> {
    state.session.navigate(direction).await
}

#[tauri::command]
pub async fn toggle_saved(timestamp: i64, state: tauri::State<'_, AppState>) -> Result<bool> {
    state.session.toggle_saved(timestamp).await
}

#[tauri::command]
pub async fn end_session(reason: Option<String>, state: tauri::State<'_, AppState>) -> Result<bool> {
    state
        .session
        .end_session(reason.as_deref().unwrap_or("closed by user"))
        .await
}
