//! Advisory checks. Problems become warnings; the config is still usable.

use std::fmt;

use super::types::SnapsolveConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvisoryWarning {
    /// Machine-readable code.
    pub code: &'static str,
    /// Dotted path of the offending field.
    pub path: &'static str,
    pub message: String,
}

impl fmt::Display for AdvisoryWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.code, self.path, self.message)
    }
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

pub fn validate(cfg: &SnapsolveConfig) -> Vec<AdvisoryWarning> {
    let mut warnings = vec![];
    let mut warn = |code, path, message: String| {
        warnings.push(AdvisoryWarning {
            code,
            path,
            message,
        });
    };

    let url = &cfg.service.base_url;
    if !url.starts_with("http://") && !url.starts_with("https://") {
        warn(
            "service.base_url.invalid",
            "service.base_url",
            format!("Expected an http(s) URL, got: '{url}'"),
        );
    }

    if cfg.service.api_keys.is_empty() {
        warn(
            "service.api_keys.empty",
            "service.api_keys",
            "No API keys configured; set GEMINI_API_KEYS or GEMINI_API_KEY".into(),
        );
    }

    for (path, model) in [
        ("models.ocr", &cfg.models.ocr),
        ("models.solve", &cfg.models.solve),
        ("models.turbo", &cfg.models.turbo),
        ("models.title", &cfg.models.title),
    ] {
        if model.trim().is_empty() {
            warn("models.empty", path, "Model name cannot be empty".into());
        }
    }

    if cfg.timeouts.request_secs == 0 {
        warn(
            "timeouts.zero",
            "timeouts.request_secs",
            "A zero timeout fails every request".into(),
        );
    }
    if cfg.timeouts.call_secs == 0 {
        warn(
            "timeouts.zero",
            "timeouts.call_secs",
            "A zero timeout fails every call".into(),
        );
    }
    if cfg.timeouts.call_secs < cfg.timeouts.request_secs {
        warn(
            "timeouts.call_shorter_than_request",
            "timeouts.call_secs",
            format!(
                "call_secs ({}) is shorter than request_secs ({}); only the first key gets a full attempt",
                cfg.timeouts.call_secs, cfg.timeouts.request_secs
            ),
        );
    }

    if !LOG_LEVELS.contains(&cfg.logging.level.to_lowercase().as_str()) {
        warn(
            "logging.level.invalid",
            "logging.level",
            format!(
                "Unknown log level '{}'. Expected one of: {}",
                cfg.logging.level,
                LOG_LEVELS.join(", ")
            ),
        );
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    fn keyed() -> SnapsolveConfig {
        let mut cfg = SnapsolveConfig::default();
        cfg.service.api_keys = vec![SecretString::from("k".to_string())];
        cfg
    }

    fn codes(cfg: &SnapsolveConfig) -> Vec<&'static str> {
        validate(cfg).into_iter().map(|w| w.code).collect()
    }

    #[test]
    fn keyed_defaults_are_clean() {
        assert!(validate(&keyed()).is_empty());
    }

    #[test]
    fn missing_keys_warn() {
        assert_eq!(codes(&SnapsolveConfig::default()), vec!["service.api_keys.empty"]);
    }

    #[test]
    fn timeout_checks() {
        let mut cfg = keyed();
        cfg.timeouts.request_secs = 30;
        cfg.timeouts.call_secs = 10;
        assert_eq!(codes(&cfg), vec!["timeouts.call_shorter_than_request"]);

        cfg.timeouts.call_secs = 0;
        assert!(codes(&cfg).contains(&"timeouts.zero"));
    }

    #[test]
    fn bad_url_model_and_level() {
        let mut cfg = keyed();
        cfg.service.base_url = "generativelanguage".into();
        cfg.models.turbo = " ".into();
        cfg.logging.level = "loud".into();
        let warnings = validate(&cfg);
        assert_eq!(warnings.len(), 3);
        assert!(warnings.iter().any(|w| w.path == "models.turbo"));
        assert_eq!(
            warnings[0].to_string(),
            "[service.base_url.invalid] service.base_url: Expected an http(s) URL, got: 'generativelanguage'"
        );
    }
}
