use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::model::ConfigEnum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    Interview,
    Sales,
    Meeting,
    Presentation,
    Negotiation,
    Exam,
}

impl Profile {
    pub fn system_prompt(&self) -> &'static str {
        match self {
            Profile::Interview => {
                "You are helping the user through a job interview. Give concise, confident answers \
                 they can say out loud. Lead with the answer, then one or two supporting points."
            }
            Profile::Sales => {
                "You are helping the user on a sales call. Suggest short responses that address \
                 objections, highlight value and move the conversation towards next steps."
            }
            Profile::Meeting => {
                "You are helping the user in a meeting. Summarise what was asked and suggest a \
                 clear, professional reply."
            }
            Profile::Presentation => {
                "You are helping the user during a presentation. Suggest crisp answers to audience \
                 questions and recover gracefully from interruptions."
            }
            Profile::Negotiation => {
                "You are helping the user in a negotiation. Suggest responses that protect their \
                 position, surface trade-offs and keep options open."
            }
            Profile::Exam => {
                "You are helping the user work through exam-style questions. Give the answer first, \
                 then a brief explanation of the reasoning."
            }
        }
    }
}

impl ConfigEnum for Profile {
    const ALLOWED: &'static [&'static str] = &[
        "interview",
        "sales",
        "meeting",
        "presentation",
        "negotiation",
        "exam",
    ];

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "interview" | "job-interview" | "coding-interview" => Some(Profile::Interview),
            "sales" => Some(Profile::Sales),
            "meeting" | "general-assistant" => Some(Profile::Meeting),
            "presentation" => Some(Profile::Presentation),
            "negotiation" => Some(Profile::Negotiation),
            "exam" | "exam-helper" => Some(Profile::Exam),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpeechLanguage {
    #[serde(rename = "en-US")]
    EnUs,
    #[serde(rename = "en-GB")]
    EnGb,
    #[serde(rename = "es-ES")]
    EsEs,
    #[serde(rename = "fr-FR")]
    FrFr,
    #[serde(rename = "de-DE")]
    DeDe,
    #[serde(rename = "ja-JP")]
    JaJp,
    #[serde(rename = "zh-CN")]
    ZhCn,
}

impl SpeechLanguage {
    pub fn code(&self) -> &'static str {
        match self {
            SpeechLanguage::EnUs => "en-US",
            SpeechLanguage::EnGb => "en-GB",
            SpeechLanguage::EsEs => "es-ES",
            SpeechLanguage::FrFr => "fr-FR",
            SpeechLanguage::DeDe => "de-DE",
            SpeechLanguage::JaJp => "ja-JP",
            SpeechLanguage::ZhCn => "zh-CN",
        }
    }
}

impl ConfigEnum for SpeechLanguage {
    const ALLOWED: &'static [&'static str] =
        &["en-US", "en-GB", "es-ES", "fr-FR", "de-DE", "ja-JP", "zh-CN"];

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "en-US" => Some(SpeechLanguage::EnUs),
            "en-GB" => Some(SpeechLanguage::EnGb),
            "es-ES" => Some(SpeechLanguage::EsEs),
            "fr-FR" => Some(SpeechLanguage::FrFr),
            "de-DE" => Some(SpeechLanguage::DeDe),
            "ja-JP" => Some(SpeechLanguage::JaJp),
            "zh-CN" => Some(SpeechLanguage::ZhCn),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Initializing,
    Active,
    Ended,
}

/// Fingerprint of the credential a session was opened with. The key itself
/// only lives inside the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApiKeyRef(String);

impl ApiKeyRef {
    pub fn from_key(api_key: &str) -> Self {
        let digest = Sha256::digest(api_key.as_bytes());
        let short: String = digest.iter().take(6).map(|b| format!("{b:02x}")).collect();
        ApiKeyRef(format!("key-{short}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Validated parameters for opening a session.
#[derive(Debug, Clone)]
pub struct SessionRequest {
    pub api_key: String,
    pub profile: Profile,
    pub language: SpeechLanguage,
    pub custom_instructions: String,
    pub enable_google_search: bool,
}

impl SessionRequest {
    /// Parses the enumerated fields; rejects values outside their sets.
    pub fn parse(
        api_key: &str,
        profile: &str,
        language: &str,
        custom_instructions: &str,
    ) -> crate::error::Result<Self> {
        Ok(Self {
            api_key: api_key.to_string(),
            profile: Profile::parse("profile", profile)?,
            language: SpeechLanguage::parse("language", language)?,
            custom_instructions: custom_instructions.to_string(),
            enable_google_search: true,
        })
    }

    pub fn with_google_search(mut self, enabled: bool) -> Self {
        self.enable_google_search = enabled;
        self
    }

    pub fn system_instruction(&self) -> String {
        let mut instruction = format!(
            "{}\n\nRespond in the language matching {}.",
            self.profile.system_prompt(),
            self.language.code()
        );
        let custom = self.custom_instructions.trim();
        if !custom.is_empty() {
            instruction.push_str("\n\nAdditional context from the user:\n");
            instruction.push_str(custom);
        }
        instruction
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub api_key_ref: ApiKeyRef,
    pub profile: Profile,
    pub language: SpeechLanguage,
    pub custom_instructions: String,
    pub state: SessionState,
    pub streaming_busy: bool,
}

impl Session {
    pub fn new(request: &SessionRequest) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            api_key_ref: ApiKeyRef::from_key(&request.api_key),
            profile: request.profile,
            language: request.language,
            custom_instructions: request.custom_instructions.clone(),
            state: SessionState::Initializing,
            streaming_busy: false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.state == SessionState::Active
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Turn {
    pub role: Role,
    pub text: String,
    /// Unix milliseconds; unique within the process and used as the turn id.
    pub timestamp: i64,
    pub is_complete: bool,
    #[serde(default)]
    pub is_error: bool,
}

impl Turn {
    pub fn user(text: impl Into<String>, timestamp: i64) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
            timestamp,
            is_complete: true,
            is_error: false,
        }
    }

    pub fn assistant(text: impl Into<String>, is_complete: bool, timestamp: i64) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
            timestamp,
            is_complete,
            is_error: false,
        }
    }

    pub fn error(text: impl Into<String>, timestamp: i64) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
            timestamp,
            is_complete: true,
            is_error: true,
        }
    }

    pub fn is_assistant(&self) -> bool {
        self.role == Role::Assistant
    }

    /// The only turn shape the delta merge may overwrite.
    pub fn is_open_response(&self) -> bool {
        self.is_assistant() && !self.is_complete && !self.is_error
    }
}

/// Hands out strictly increasing millisecond timestamps.
#[derive(Debug, Default)]
pub struct TurnClock {
    last: i64,
}

impl TurnClock {
    pub fn next(&mut self) -> i64 {
        let now = chrono::Utc::now().timestamp_millis();
        self.last = now.max(self.last + 1);
        self.last
    }
}
