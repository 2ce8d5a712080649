//! Registry-wide drag configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::navigation::{SameOriginNavigation, TransitionEventPolicy};

/// Tunables shared by every session a registry creates.
///
/// All fields have defaults, so a TOML document only needs the keys it
/// overrides:
///
/// ```
/// use dnd_core::{DragConfig, SameOriginNavigation};
///
/// let config = DragConfig::from_toml_str(r#"
///     handler_timeout_ms = 250
///     same_origin_navigation = "require_consent"
/// "#).unwrap();
/// assert_eq!(config.same_origin_navigation, SameOriginNavigation::RequireConsent);
/// assert!(config.require_content);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DragConfig {
    /// How long a scripting collaborator may take before its silence is
    /// treated as "no opinion".
    pub handler_timeout_ms: u64,
    pub same_origin_navigation: SameOriginNavigation,
    pub transition_events: TransitionEventPolicy,
    /// Item tags whose drop would make the target navigate.
    pub navigation_mime_types: Vec<String>,
    /// Reject empty payloads for gestures that carry content.
    pub require_content: bool,
}

impl Default for DragConfig {
    fn default() -> Self {
        Self {
            handler_timeout_ms: 1000,
            same_origin_navigation: SameOriginNavigation::default(),
            transition_events: TransitionEventPolicy::default(),
            navigation_mime_types: vec!["text/uri-list".to_owned(), "text/x-moz-url".to_owned()],
            require_content: true,
        }
    }
}

impl DragConfig {
    pub fn handler_timeout(&self) -> Duration {
        Duration::from_millis(self.handler_timeout_ms)
    }

    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    pub(crate) fn is_navigation_type(&self, mime: &str) -> bool {
        self.navigation_mime_types
            .iter()
            .any(|t| t.eq_ignore_ascii_case(mime))
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid drag config: {0}")]
    Parse(#[from] toml::de::Error),
}
