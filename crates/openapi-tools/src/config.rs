use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Base URL used when neither the configuration nor the description names one.
///
/// The bridge serves arbitrary descriptions, so there is no real upstream to default to; this
/// reserved `example.com` host keeps startup working and makes the misconfiguration visible in
/// every failed call. Set `baseUrl` (or `--base-url`) or give the description a `servers` entry.
pub const DEFAULT_BASE_URL: &str = "https://api.example.com";

/// Description path used when none is configured.
pub const DEFAULT_SPEC_PATH: &str = "openapi.json";

/// Configuration for an OpenAPI-based tool source.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiServerConfig {
    /// `OpenAPI` description path (YAML or JSON).
    #[serde(default = "default_spec_path")]
    pub spec: String,

    /// Optional spec hash (`sha256:<hex>`) for version detection.
    #[serde(default)]
    pub spec_hash: Option<String>,

    /// Hash policy: warn, fail, or ignore.
    #[serde(default)]
    pub spec_hash_policy: HashPolicy,

    /// Override the base URL from the description.
    #[serde(default)]
    pub base_url: Option<String>,

    /// Bearer credential attached to every outbound call.
    #[serde(default)]
    pub bearer_token: Option<String>,

    /// Which operations become tools.
    #[serde(default)]
    pub auto_discover: AutoDiscoverConfig,

    /// Static headers sent with every outbound call.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

fn default_spec_path() -> String {
    DEFAULT_SPEC_PATH.to_string()
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            spec: default_spec_path(),
            spec_hash: None,
            spec_hash_policy: HashPolicy::default(),
            base_url: None,
            bearer_token: None,
            auto_discover: AutoDiscoverConfig::default(),
            headers: BTreeMap::new(),
        }
    }
}

/// Hash verification policy.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HashPolicy {
    /// Log warning if hash doesn't match.
    #[default]
    Warn,
    /// Fail startup if hash doesn't match.
    Fail,
    /// Ignore hash verification.
    Ignore,
}

/// Auto-discovery configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum AutoDiscoverConfig {
    /// Simple boolean: true = every operation, false = none.
    Enabled(bool),
    /// `"<METHOD> <path>"` glob patterns; exclude wins over include.
    Detailed {
        #[serde(default)]
        include: Vec<String>,
        #[serde(default)]
        exclude: Vec<String>,
    },
}

impl Default for AutoDiscoverConfig {
    fn default() -> Self {
        AutoDiscoverConfig::Enabled(true)
    }
}

impl AutoDiscoverConfig {
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        match self {
            AutoDiscoverConfig::Enabled(b) => *b,
            AutoDiscoverConfig::Detailed { .. } => true,
        }
    }

    #[must_use]
    pub fn include_patterns(&self) -> &[String] {
        match self {
            AutoDiscoverConfig::Enabled(_) => &[],
            AutoDiscoverConfig::Detailed { include, .. } => include,
        }
    }

    #[must_use]
    pub fn exclude_patterns(&self) -> &[String] {
        match self {
            AutoDiscoverConfig::Enabled(_) => &[],
            AutoDiscoverConfig::Detailed { exclude, .. } => exclude,
        }
    }

    /// Whether the operation `"<METHOD> <path>"` should become a tool.
    #[must_use]
    pub fn allows(&self, method: &str, path: &str) -> bool {
        if !self.is_enabled() {
            return false;
        }

        let operation = format!("{} {}", method.to_uppercase(), path);

        if self
            .exclude_patterns()
            .iter()
            .any(|p| glob_match(p, &operation))
        {
            return false;
        }

        let include = self.include_patterns();
        include.is_empty() || include.iter().any(|p| glob_match(p, &operation))
    }
}

/// Byte-wise glob: `*` matches any run, `?` a single byte, everything else literally.
fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern_bytes = pattern.as_bytes();
    let text_bytes = text.as_bytes();

    let mut pattern_index = 0usize;
    let mut text_index = 0usize;

    let mut star_index: Option<usize> = None;
    let mut star_text_index: usize = 0;

    while text_index < text_bytes.len() {
        match pattern_bytes.get(pattern_index) {
            Some(b'*') => {
                star_index = Some(pattern_index);
                pattern_index += 1;
                star_text_index = text_index;
            }
            Some(b'?') => {
                pattern_index += 1;
                text_index += 1;
            }
            Some(&b) if b == text_bytes[text_index] => {
                pattern_index += 1;
                text_index += 1;
            }
            _ => {
                let Some(si) = star_index else {
                    return false;
                };

                pattern_index = si + 1;
                star_text_index += 1;
                text_index = star_text_index;
            }
        }
    }

    while matches!(pattern_bytes.get(pattern_index), Some(b'*')) {
        pattern_index += 1;
    }

    pattern_index == pattern_bytes.len()
}
