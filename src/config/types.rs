use std::time::Duration;

use serde::Deserialize;

use crate::args::{HttpMethod, parse_duration_arg};
use crate::error::ValidationError;

/// On-disk configuration. Every key mirrors a CLI flag; flags given on the
/// command line win.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub url: Option<String>,
    pub requests: Option<u64>,
    pub concurrency: Option<usize>,
    pub method: Option<HttpMethod>,
    /// `"Key: Value"` entries, same format as `-H`.
    pub headers: Option<Vec<String>>,
    pub data: Option<String>,
    #[serde(alias = "proxy_url")]
    pub proxy: Option<String>,
    pub timeout: Option<DurationValue>,
    pub connect_timeout: Option<DurationValue>,
}

/// Either whole seconds (`30`) or a unit string (`"500ms"`, `"2m"`).
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum DurationValue {
    Seconds(u64),
    Text(String),
}

impl DurationValue {
    pub(crate) fn to_duration(&self) -> Result<Duration, ValidationError> {
        match self {
            DurationValue::Seconds(secs) => {
                if *secs == 0 {
                    Err(ValidationError::DurationZero)
                } else {
                    Ok(Duration::from_secs(*secs))
                }
            }
            DurationValue::Text(text) => parse_duration_arg(text),
        }
    }
}
