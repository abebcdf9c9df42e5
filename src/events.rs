/// Event name constants for Tauri backend -> frontend communication
pub const SESSION_STARTED: &str = "session:started";
pub const STREAMING_DELTA: &str = "session:streaming-delta";
pub const STREAMING_ERROR: &str = "session:streaming-error";
pub const SESSION_ENDED: &str = "session:ended";
pub const SESSION_ERASED: &str = "session:erased";
pub const WINDOW_STATE_CHANGED: &str = "window:state-changed";
pub const SHORTCUT_TRIGGERED: &str = "shortcut:triggered";
pub const RESPONSE_NAVIGATED: &str = "session:response-navigated";
