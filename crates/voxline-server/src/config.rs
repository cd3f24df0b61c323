//! Server configuration loading from file and environment variables.

use serde::Deserialize;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use thiserror::Error;
use voxline_chat::CohereConfig;
use crate::handlers::CallSettings;
use voxline_finetune::{PollPolicy, ProvisionSettings};
use voxline_types::GatherPolicy;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server network settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Hosted chat service settings.
    #[serde(default)]
    pub chat: ChatConfig,

    /// Telephony provider account settings.
    #[serde(default)]
    pub telephony: TelephonyConfig,

    /// What callers hear.
    #[serde(default)]
    pub call: CallConfig,

    /// Optional fine-tuning before the server starts.
    #[serde(default)]
    pub finetune: FinetuneConfig,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "voxline_server=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

/// Hosted chat service configuration.
#[derive(Clone, Deserialize)]
pub struct ChatConfig {
    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_chat_base_url")]
    pub base_url: String,

    /// Per-request timeout for chat calls, in seconds.
    #[serde(default = "default_chat_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Base model to target. The service default is used when unset.
    #[serde(default)]
    pub model: Option<String>,

    /// Text placed verbatim in front of every caller utterance.
    #[serde(default)]
    pub seed_message: Option<String>,

    /// Consume replies as a fragment stream.
    #[serde(default)]
    pub streaming: bool,
}

/// Telephony provider account configuration.
#[derive(Clone, Deserialize)]
pub struct TelephonyConfig {
    #[serde(default)]
    pub account_sid: String,

    /// Also the key for webhook signatures.
    #[serde(default)]
    pub auth_token: String,

    /// The number calls are placed from and answered on.
    #[serde(default)]
    pub phone_number: String,

    /// Externally reachable base URL the provider posts webhooks to.
    #[serde(default = "default_public_url")]
    pub public_url: String,

    /// Reject webhooks whose `X-Twilio-Signature` does not verify.
    #[serde(default)]
    pub validate_signatures: bool,
}

/// Call flow configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CallConfig {
    /// Used in the default greeting.
    #[serde(default)]
    pub company_name: String,

    /// Replaces the default greeting when set.
    #[serde(default)]
    pub greeting: Option<String>,

    /// Spoken when the chat service cannot answer.
    #[serde(default = "default_apology")]
    pub apology: String,

    #[serde(default)]
    pub gather: GatherPolicy,

    #[serde(default = "default_language")]
    pub language: String,

    #[serde(default = "default_speech_timeout_seconds")]
    pub speech_timeout_seconds: u32,

    /// Provider voice for spoken text.
    #[serde(default)]
    pub voice: Option<String>,

    /// End speak-only calls explicitly after the reply.
    #[serde(default)]
    pub hangup_after_reply: bool,
}

/// Fine-tuning configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FinetuneConfig {
    /// Provision a fine-tuned model at startup and answer calls with it.
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub provision: ProvisionSettings,

    /// Asked of the new model by `voxline-provision` once it is ready.
    #[serde(default)]
    pub test_question: Option<String>,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_chat_base_url() -> String {
    "https://api.cohere.com".to_string()
}

fn default_chat_timeout_seconds() -> u64 {
    30
}

fn default_public_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_apology() -> String {
    "Sorry, I could not come up with an answer just now. Please try again.".to_string()
}

fn default_language() -> String {
    "en-US".to_string()
}

fn default_speech_timeout_seconds() -> u32 {
    1
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_chat_base_url(),
            timeout_seconds: default_chat_timeout_seconds(),
            model: None,
            seed_message: None,
            streaming: false,
        }
    }
}

impl Default for TelephonyConfig {
    fn default() -> Self {
        Self {
            account_sid: String::new(),
            auth_token: String::new(),
            phone_number: String::new(),
            public_url: default_public_url(),
            validate_signatures: false,
        }
    }
}

impl Default for CallConfig {
    fn default() -> Self {
        Self {
            company_name: String::new(),
            greeting: None,
            apology: default_apology(),
            gather: GatherPolicy::default(),
            language: default_language(),
            speech_timeout_seconds: default_speech_timeout_seconds(),
            voice: None,
            hangup_after_reply: false,
        }
    }
}

impl fmt::Debug for ChatConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatConfig")
            .field("api_key", &redacted(&self.api_key))
            .field("base_url", &self.base_url)
            .field("timeout_seconds", &self.timeout_seconds)
            .field("model", &self.model)
            .field("seed_message", &self.seed_message)
            .field("streaming", &self.streaming)
            .finish()
    }
}

impl fmt::Debug for TelephonyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelephonyConfig")
            .field("account_sid", &self.account_sid)
            .field("auth_token", &redacted(&self.auth_token))
            .field("phone_number", &self.phone_number)
            .field("public_url", &self.public_url)
            .field("validate_signatures", &self.validate_signatures)
            .finish()
    }
}

fn redacted(secret: &str) -> &'static str {
    if secret.is_empty() {
        "<unset>"
    } else {
        "[REDACTED]"
    }
}

impl ChatConfig {
    /// Connection settings for the hosted API clients.
    pub fn cohere(&self) -> CohereConfig {
        CohereConfig {
            base_url: self.base_url.clone(),
            api_key: self.api_key.clone(),
            timeout_seconds: self.timeout_seconds,
        }
    }
}

impl CallConfig {
    /// The configured greeting, or the default one for `company_name`.
    pub fn greeting_text(&self) -> String {
        match self.greeting.as_deref().map(str::trim) {
            Some(greeting) if !greeting.is_empty() => greeting.to_string(),
            _ => format!(
                "Welcome to {}! This is a test call. Ask me a question and I will try to answer it.",
                self.company_name.trim()
            ),
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// A required value is absent from both the file and the environment.
    #[error("missing required setting {key} (set {env} or add it to the config file)")]
    Missing {
        key: &'static str,
        env: &'static str,
    },

    /// A value is present but unusable.
    #[error("invalid setting {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl Config {
    /// Checks what every binary needs: a chat API key.
    pub fn check_chat(&self) -> Result<(), ConfigError> {
        require("chat.api_key", "COHERE_API_KEY", &self.chat.api_key)
    }

    /// Checks everything the webhook server needs before it starts.
    pub fn check_server(&self) -> Result<(), ConfigError> {
        self.check_chat()?;
        require(
            "telephony.account_sid",
            "TWILIO_ACCOUNT_SID",
            &self.telephony.account_sid,
        )?;
        require(
            "telephony.auth_token",
            "TWILIO_AUTH_TOKEN",
            &self.telephony.auth_token,
        )?;
        require(
            "telephony.phone_number",
            "TWILIO_PHONE_NUMBER",
            &self.telephony.phone_number,
        )?;
        require("call.company_name", "COMPANY_NAME", &self.call.company_name)?;

        if self.telephony.validate_signatures
            && url::Url::parse(&self.telephony.public_url).is_err()
        {
            return Err(ConfigError::Invalid {
                key: "telephony.public_url",
                reason: format!("{:?} is not an absolute URL", self.telephony.public_url),
            });
        }
        if self.call.speech_timeout_seconds == 0 {
            return Err(ConfigError::Invalid {
                key: "call.speech_timeout_seconds",
                reason: "must be at least 1".to_string(),
            });
        }
        let call = CallSettings::from_config(&self.call);
        call.greeting_document()
            .and_then(|_| call.reply_document(&call.apology, self.call.gather))
            .map_err(|e| ConfigError::Invalid {
                key: "call",
                reason: e.to_string(),
            })?;
        if let Some(model) = &self.chat.model {
            if model.trim().is_empty() {
                return Err(ConfigError::Invalid {
                    key: "chat.model",
                    reason: "must not be blank".to_string(),
                });
            }
        }
        if self.finetune.enabled {
            self.check_finetune()?;
        }
        Ok(())
    }

    /// Checks the polling bounds used while provisioning.
    pub fn check_finetune(&self) -> Result<(), ConfigError> {
        check_poll(
            "finetune.provision.validation",
            &self.finetune.provision.validation,
        )?;
        check_poll("finetune.provision.training", &self.finetune.provision.training)
    }
}

fn check_poll(key: &'static str, policy: &PollPolicy) -> Result<(), ConfigError> {
    policy.check().map_err(|reason| ConfigError::Invalid {
        key,
        reason: reason.to_string(),
    })
}

fn require(key: &'static str, env: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Missing { key, env });
    }
    Ok(())
}

/// Loads configuration from a TOML file, falling back to defaults, then
/// applies environment overrides.
///
/// Nothing is checked here; call [`Config::check_server`] or
/// [`Config::check_chat`] depending on what the caller runs.
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    apply_overrides(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

/// Applies overrides looked up by environment variable name.
///
/// - `COHERE_API_KEY`, `COHERE_BASE_URL`, `VOXLINE_CHAT_MODEL`, `SEED_MESSAGE`
/// - `TWILIO_ACCOUNT_SID`, `TWILIO_AUTH_TOKEN`, `TWILIO_PHONE_NUMBER`,
///   `VOXLINE_PUBLIC_URL`
/// - `COMPANY_NAME`
/// - `VOXLINE_HOST`, `VOXLINE_PORT`, `VOXLINE_LOG_LEVEL`, `VOXLINE_LOG_JSON`
///   (set to "true" to enable)
pub fn apply_overrides(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(host) = lookup("VOXLINE_HOST") {
        if let Ok(parsed) = host.parse() {
            config.server.host = parsed;
        }
    }
    if let Some(port) = lookup("VOXLINE_PORT") {
        if let Ok(parsed) = port.parse() {
            config.server.port = parsed;
        }
    }
    if let Some(level) = lookup("VOXLINE_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = lookup("VOXLINE_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }

    if let Some(key) = lookup("COHERE_API_KEY") {
        config.chat.api_key = key;
    }
    if let Some(url) = lookup("COHERE_BASE_URL") {
        config.chat.base_url = url;
    }
    if let Some(model) = lookup("VOXLINE_CHAT_MODEL") {
        config.chat.model = Some(model);
    }
    if let Some(seed) = lookup("SEED_MESSAGE") {
        config.chat.seed_message = Some(seed);
    }

    if let Some(sid) = lookup("TWILIO_ACCOUNT_SID") {
        config.telephony.account_sid = sid;
    }
    if let Some(token) = lookup("TWILIO_AUTH_TOKEN") {
        config.telephony.auth_token = token;
    }
    if let Some(number) = lookup("TWILIO_PHONE_NUMBER") {
        config.telephony.phone_number = number;
    }
    if let Some(url) = lookup("VOXLINE_PUBLIC_URL") {
        config.telephony.public_url = url;
    }

    if let Some(name) = lookup("COMPANY_NAME") {
        config.call.company_name = name;
    }
}
