//! Telephony provider client and voice-response document builder.
//!
//! The provider is Twilio-shaped: outbound calls are placed through a REST
//! API, and webhook replies are XML documents instructing the provider to
//! speak text and gather speech/DTMF from the caller.

use crate::error::VoiceError;
use serde::Deserialize;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

/// Timeout for provider REST calls.
const PROVIDER_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Settings for the telephony provider REST API.
#[derive(Debug, Clone, Default)]
pub struct TelephonyConfig {
    /// Base URL of the provider API (e.g. `https://api.twilio.com/2010-04-01`).
    pub api_url: String,
    pub account_sid: String,
    pub auth_token: String,
    /// Caller id for outbound calls.
    pub from_number: String,
    /// Publicly reachable webhook URL the provider calls back into.
    pub webhook_url: String,
}

#[derive(Debug, Deserialize)]
struct CallCreatedResponse {
    sid: Option<String>,
}

/// Thin client for placing outbound calls via the provider REST API.
#[derive(Debug)]
pub struct TelephonyClient {
    config: TelephonyConfig,
    client: reqwest::Client,
}

impl TelephonyClient {
    pub fn new(config: TelephonyConfig) -> Result<Self, VoiceError> {
        let client = reqwest::Client::builder()
            .timeout(PROVIDER_REQUEST_TIMEOUT)
            .build()
            .map_err(|e| VoiceError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { config, client })
    }

    pub fn is_enabled(&self) -> bool {
        !self.config.api_url.is_empty()
    }

    /// Places an outbound call to `to`, returning the provider call id.
    ///
    /// The provider is told to fetch call instructions from the configured
    /// webhook URL once the callee answers. When the provider response omits
    /// a call sid, a local UUID stands in so the caller always gets an id.
    pub async fn place_call(&self, to: &str) -> Result<String, VoiceError> {
        if !self.is_enabled() {
            return Err(VoiceError::Config(
                "telephony provider is not configured".to_string(),
            ));
        }

        let url = format!(
            "{}/Accounts/{}/Calls.json",
            self.config.api_url.trim_end_matches('/'),
            self.config.account_sid
        );
        let params = [
            ("To", to),
            ("From", self.config.from_number.as_str()),
            ("Url", self.config.webhook_url.as_str()),
        ];

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&params)
            .send()
            .await
            .map_err(|e| VoiceError::Telephony(format!("call placement request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(VoiceError::Telephony(format!(
                "provider returned {status}: {body}"
            )));
        }

        let created: CallCreatedResponse = response
            .json()
            .await
            .map_err(|e| VoiceError::Telephony(format!("malformed provider response: {e}")))?;

        let call_id = created.sid.unwrap_or_else(|| Uuid::new_v4().to_string());
        info!(to, call_id, "placed outbound call");
        Ok(call_id)
    }
}

/// Builder for the provider voice-response XML document.
#[derive(Debug, Default)]
pub struct VoiceResponse {
    verbs: Vec<String>,
}

impl VoiceResponse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Speaks `text` to the caller.
    pub fn say(mut self, text: &str) -> Self {
        self.verbs.push(format!("<Say>{}</Say>", escape_xml(text)));
        self
    }

    /// Gathers speech and DTMF from the caller, POSTing the result to
    /// `action`. `prompt` is spoken inside the gather so the caller can
    /// barge in.
    pub fn gather(mut self, action: &str, prompt: Option<&str>) -> Self {
        let inner = prompt
            .map(|p| format!("<Say>{}</Say>", escape_xml(p)))
            .unwrap_or_default();
        self.verbs.push(format!(
            "<Gather input=\"speech dtmf\" action=\"{}\" method=\"POST\">{}</Gather>",
            escape_xml(action),
            inner
        ));
        self
    }

    /// Ends the call.
    pub fn hangup(mut self) -> Self {
        self.verbs.push("<Hangup/>".to_string());
        self
    }

    /// Renders the final document.
    pub fn to_xml(&self) -> String {
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response>{}</Response>",
            self.verbs.concat()
        )
    }
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    out
}
