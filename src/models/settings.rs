//! Settings Models
//!
//! Dialer configuration stored in config.json.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Dialer configuration stored in config.json
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialerConfig {
    /// Base URL of the CRM backend exposing /token, /call, /status, /call-logs
    pub backend_url: String,
    /// CRM user placing calls, forwarded to POST /call
    #[serde(default)]
    pub user_id: Option<i64>,
    /// Script URL of the vendor telephony SDK
    pub sdk_script_url: String,
    /// Page globals the SDK may publish itself under, tried in order
    #[serde(default = "default_sdk_global_names")]
    pub sdk_global_names: Vec<String>,
    /// Hosted web dialer used for client-side deep links
    pub web_dialer_url: String,
    /// Bootstrap attempts before the session settles in Error
    #[serde(default = "default_max_bootstrap_attempts")]
    pub max_bootstrap_attempts: u32,
    /// Base delay of the exponential retry backoff
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    #[serde(default = "default_step_timeout_secs")]
    pub sdk_load_timeout_secs: u64,
    #[serde(default = "default_step_timeout_secs")]
    pub token_timeout_secs: u64,
    /// Timeout of every other backend request
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// How long a popup call may wait for SDK events before it is released
    #[serde(default = "default_dial_timeout_secs")]
    pub dial_timeout_secs: u64,
    /// Longest a connected popup call may go without `callEnd`
    #[serde(default = "default_max_call_secs")]
    pub max_call_secs: u64,
}

fn default_sdk_global_names() -> Vec<String> {
    vec!["MightyCall".to_string(), "MightyCallWebPhone".to_string()]
}

fn default_max_bootstrap_attempts() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    1000
}

fn default_step_timeout_secs() -> u64 {
    15
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_dial_timeout_secs() -> u64 {
    120
}

fn default_max_call_secs() -> u64 {
    4 * 60 * 60
}

impl Default for DialerConfig {
    fn default() -> Self {
        Self {
            backend_url: "http://localhost:3001/api/dialer".to_string(),
            user_id: None,
            sdk_script_url: "https://api.mightycall.com/v4/webphone/JavaScriptSDK/mcwebphonesdk.js"
                .to_string(),
            sdk_global_names: default_sdk_global_names(),
            web_dialer_url: "https://panel.mightycall.com/MightyCallWebPhone/dial".to_string(),
            max_bootstrap_attempts: default_max_bootstrap_attempts(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            sdk_load_timeout_secs: default_step_timeout_secs(),
            token_timeout_secs: default_step_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            dial_timeout_secs: default_dial_timeout_secs(),
            max_call_secs: default_max_call_secs(),
        }
    }
}

/// Partial configuration update
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DialerConfigUpdate {
    pub backend_url: Option<String>,
    pub user_id: Option<i64>,
    pub sdk_script_url: Option<String>,
    pub sdk_global_names: Option<Vec<String>>,
    pub web_dialer_url: Option<String>,
    pub max_bootstrap_attempts: Option<u32>,
    pub retry_base_delay_ms: Option<u64>,
    pub sdk_load_timeout_secs: Option<u64>,
    pub token_timeout_secs: Option<u64>,
    pub request_timeout_secs: Option<u64>,
    pub dial_timeout_secs: Option<u64>,
    pub max_call_secs: Option<u64>,
}

impl DialerConfig {
    /// Apply a partial update to the configuration
    pub fn apply_update(&mut self, update: DialerConfigUpdate) {
        if let Some(url) = update.backend_url {
            self.backend_url = url;
        }
        if let Some(user_id) = update.user_id {
            self.user_id = Some(user_id);
        }
        if let Some(url) = update.sdk_script_url {
            self.sdk_script_url = url;
        }
        if let Some(names) = update.sdk_global_names {
            self.sdk_global_names = names;
        }
        if let Some(url) = update.web_dialer_url {
            self.web_dialer_url = url;
        }
        if let Some(attempts) = update.max_bootstrap_attempts {
            self.max_bootstrap_attempts = attempts;
        }
        if let Some(delay) = update.retry_base_delay_ms {
            self.retry_base_delay_ms = delay;
        }
        if let Some(secs) = update.sdk_load_timeout_secs {
            self.sdk_load_timeout_secs = secs;
        }
        if let Some(secs) = update.token_timeout_secs {
            self.token_timeout_secs = secs;
        }
        if let Some(secs) = update.request_timeout_secs {
            self.request_timeout_secs = secs;
        }
        if let Some(secs) = update.dial_timeout_secs {
            self.dial_timeout_secs = secs;
        }
        if let Some(secs) = update.max_call_secs {
            self.max_call_secs = secs;
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        for (field, value) in [
            ("backend_url", &self.backend_url),
            ("sdk_script_url", &self.sdk_script_url),
            ("web_dialer_url", &self.web_dialer_url),
        ] {
            match url::Url::parse(value) {
                Ok(parsed) if parsed.scheme() == "http" || parsed.scheme() == "https" => {}
                Ok(parsed) => {
                    return Err(format!("{} must be http(s), got scheme '{}'", field, parsed.scheme()))
                }
                Err(e) => return Err(format!("Invalid {}: {} ({})", field, value, e)),
            }
        }

        if self.sdk_global_names.iter().all(|n| n.trim().is_empty()) {
            return Err("sdk_global_names must contain at least one name".to_string());
        }

        if !(1..=10).contains(&self.max_bootstrap_attempts) {
            return Err("max_bootstrap_attempts must be between 1 and 10".to_string());
        }

        if self.sdk_load_timeout_secs == 0
            || self.token_timeout_secs == 0
            || self.request_timeout_secs == 0
            || self.dial_timeout_secs == 0
        {
            return Err("timeouts must be at least 1 second".to_string());
        }

        if self.max_call_secs < self.dial_timeout_secs {
            return Err("max_call_secs must not be shorter than dial_timeout_secs".to_string());
        }

        Ok(())
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn sdk_load_timeout(&self) -> Duration {
        Duration::from_secs(self.sdk_load_timeout_secs)
    }

    pub fn token_timeout(&self) -> Duration {
        Duration::from_secs(self.token_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn dial_timeout(&self) -> Duration {
        Duration::from_secs(self.dial_timeout_secs)
    }

    pub fn max_call_duration(&self) -> Duration {
        Duration::from_secs(self.max_call_secs)
    }
}
