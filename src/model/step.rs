use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::error::StepflowError;
use crate::utils::ids;

/// The browser actions a step can perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    Navigate,
    Click,
    Input,
    Wait,
    Verify,
    Refresh,
}

impl StepKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepKind::Navigate => "navigate",
            StepKind::Click => "click",
            StepKind::Input => "input",
            StepKind::Wait => "wait",
            StepKind::Verify => "verify",
            StepKind::Refresh => "refresh",
        }
    }
}

/// One atomic browser action with its configuration.
///
/// Steps arrive as editor JSON, so the configuration is a loose map with
/// typed accessors rather than per-kind structs. `validate` enforces the
/// shape each kind requires before anything touches a browser.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    #[serde(default = "ids::new_id")]
    pub id: String,

    #[serde(rename = "type")]
    pub kind: StepKind,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub config: HashMap<String, Value>,
}

impl Step {
    pub fn new(kind: StepKind, name: impl Into<String>) -> Self {
        Self {
            id: ids::new_id(),
            kind,
            name: name.into(),
            config: HashMap::new(),
        }
    }

    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }

    fn config_str(&self, key: &str) -> Option<&str> {
        self.config.get(key).and_then(|v| v.as_str()).filter(|s| !s.is_empty())
    }

    fn config_u64(&self, key: &str) -> Option<u64> {
        match self.config.get(key) {
            Some(Value::Number(n)) => n.as_u64(),
            Some(Value::String(s)) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn url(&self) -> Option<&str> {
        self.config_str("url")
    }

    pub fn selector(&self) -> Option<&str> {
        self.config_str("selector")
    }

    pub fn text(&self) -> Option<&str> {
        self.config_str("text")
    }

    /// Wait duration in milliseconds
    pub fn duration_ms(&self) -> Option<u64> {
        self.config_u64("duration")
    }

    /// Per-step override of the verify timeout (ms)
    pub fn timeout_ms(&self) -> Option<u64> {
        self.config_u64("timeout")
    }

    /// Check the configuration shape required by this step's kind.
    pub fn validate(&self) -> Result<(), StepflowError> {
        let missing = |what: &str| {
            Err(StepflowError::validation(format!(
                "step \"{}\": {} requires {}",
                self.display_name(),
                self.kind.as_str(),
                what
            )))
        };

        match self.kind {
            StepKind::Navigate => {
                if self.url().is_none() {
                    return missing("a url");
                }
            }
            StepKind::Click | StepKind::Verify => {
                if self.selector().is_none() {
                    return missing("a selector");
                }
            }
            StepKind::Input => {
                if self.selector().is_none() {
                    return missing("a selector");
                }
                if self.text().is_none() {
                    return missing("a text value");
                }
            }
            StepKind::Wait => {
                if self.duration_ms().is_none() {
                    return missing("a duration in milliseconds");
                }
            }
            StepKind::Refresh => {}
        }
        Ok(())
    }

    /// Get a display name for the step
    pub fn display_name(&self) -> String {
        if !self.name.is_empty() {
            return self.name.clone();
        }
        match self.kind {
            StepKind::Navigate => match self.url() {
                Some(url) => format!("navigate(\"{}\")", url),
                None => "navigate".to_string(),
            },
            StepKind::Click => match self.selector() {
                Some(sel) => format!("click(\"{}\")", sel),
                None => "click".to_string(),
            },
            StepKind::Input => match self.selector() {
                Some(sel) => format!("input(\"{}\")", sel),
                None => "input".to_string(),
            },
            StepKind::Wait => match self.duration_ms() {
                Some(ms) => format!("wait({}ms)", ms),
                None => "wait".to_string(),
            },
            StepKind::Verify => match self.selector() {
                Some(sel) => format!("verify(\"{}\")", sel),
                None => "verify".to_string(),
            },
            StepKind::Refresh => "refresh".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_navigate_requires_url() {
        let step = Step::new(StepKind::Navigate, "open home");
        assert!(step.validate().is_err());

        let step = step.with_config("url", "https://example.com");
        assert!(step.validate().is_ok());
        assert_eq!(step.url(), Some("https://example.com"));
    }

    #[test]
    fn test_click_and_verify_require_selector() {
        for kind in [StepKind::Click, StepKind::Verify] {
            let step = Step::new(kind, "");
            assert!(step.validate().is_err());
            assert!(step
                .with_config("selector", "#submit")
                .validate()
                .is_ok());
        }
    }

    #[test]
    fn test_input_requires_selector_and_text() {
        let step = Step::new(StepKind::Input, "type email");
        assert!(step.validate().is_err());

        let step = step.with_config("selector", "#email");
        assert!(step.validate().is_err());

        let step = step.with_config("text", "user@example.com");
        assert!(step.validate().is_ok());
    }

    #[test]
    fn test_wait_requires_duration() {
        let step = Step::new(StepKind::Wait, "");
        assert!(step.validate().is_err());

        let step = step.with_config("duration", 1500);
        assert_eq!(step.duration_ms(), Some(1500));
        assert!(step.validate().is_ok());
    }

    #[test]
    fn test_wait_accepts_numeric_string_duration() {
        let step = Step::new(StepKind::Wait, "").with_config("duration", "750");
        assert_eq!(step.duration_ms(), Some(750));
        assert!(step.validate().is_ok());
    }

    #[test]
    fn test_refresh_needs_no_config() {
        assert!(Step::new(StepKind::Refresh, "").validate().is_ok());
    }

    #[test]
    fn test_display_name_falls_back_to_kind() {
        let step = Step::new(StepKind::Wait, "").with_config("duration", 200);
        assert_eq!(step.display_name(), "wait(200ms)");

        let named = Step::new(StepKind::Click, "press login");
        assert_eq!(named.display_name(), "press login");
    }

    #[test]
    fn test_step_deserializes_editor_json() {
        let step: Step = serde_json::from_str(
            r##"{"type":"input","name":"fill email","config":{"selector":"#email","text":"a@b.c"}}"##,
        )
        .unwrap();
        assert_eq!(step.kind, StepKind::Input);
        assert!(!step.id.is_empty());
        assert_eq!(step.selector(), Some("#email"));
    }
}
