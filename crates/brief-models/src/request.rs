//! Generation requests submitted to the synthesis provider.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

/// Upper bound on script length, in characters.
pub const MAX_SCRIPT_CHARS: usize = 5000;

/// Whether a briefing is a one-off explainer or part of a recurring digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BriefingKind {
    #[default]
    OneOff,
    Digest,
}

impl BriefingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BriefingKind::OneOff => "one_off",
            BriefingKind::Digest => "digest",
        }
    }
}

/// Free-form metadata carried alongside a request.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BriefingMetadata {
    /// Identifier of the bill the briefing explains
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bill_id: Option<String>,
    /// Briefing classification
    #[serde(default)]
    pub kind: BriefingKind,
    /// Anything else the caller wants echoed back
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

/// A request to render a briefing video. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// User who owns the resulting job
    pub requester_id: String,
    /// Persona / voice identifier understood by the provider
    pub persona_id: String,
    /// Narration script
    pub script: String,
    /// Human-readable title
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub metadata: BriefingMetadata,
}

impl GenerationRequest {
    /// Create a new request with default metadata.
    pub fn new(
        requester_id: impl Into<String>,
        persona_id: impl Into<String>,
        script: impl Into<String>,
    ) -> Self {
        Self {
            requester_id: requester_id.into(),
            persona_id: persona_id.into(),
            script: script.into(),
            name: None,
            metadata: BriefingMetadata::default(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_bill(mut self, bill_id: impl Into<String>, kind: BriefingKind) -> Self {
        self.metadata.bill_id = Some(bill_id.into());
        self.metadata.kind = kind;
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.extra.insert(key.into(), value.into());
        self
    }

    /// Check the request before it is sent anywhere.
    pub fn validate(&self) -> ModelResult<()> {
        let script = self.script.trim();
        if script.is_empty() {
            return Err(ModelError::validation("script must not be empty"));
        }
        let chars = script.chars().count();
        if chars > MAX_SCRIPT_CHARS {
            return Err(ModelError::validation(format!(
                "script is {} characters, limit is {}",
                chars, MAX_SCRIPT_CHARS
            )));
        }
        if self.persona_id.trim().is_empty() {
            return Err(ModelError::validation("persona_id must not be empty"));
        }
        if self.requester_id.trim().is_empty() {
            return Err(ModelError::validation("requester_id must not be empty"));
        }
        Ok(())
    }

    /// Title sent to the provider.
    ///
    /// Falls back to a name built from the bill id and briefing kind.
    pub fn display_name(&self) -> String {
        if let Some(name) = self.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            return name.to_string();
        }
        match (&self.metadata.bill_id, self.metadata.kind) {
            (Some(bill), BriefingKind::OneOff) => format!("Briefing: {}", bill),
            (Some(bill), BriefingKind::Digest) => format!("Digest: {}", bill),
            (None, BriefingKind::Digest) => "Legislative digest".to_string(),
            (None, BriefingKind::OneOff) => "Legislative briefing".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whitespace_script_rejected() {
        let req = GenerationRequest::new("user-1", "p1", "   \n\t ");
        assert!(matches!(req.validate(), Err(ModelError::Validation(_))));
    }

    #[test]
    fn test_oversized_script_rejected() {
        let req = GenerationRequest::new("user-1", "p1", "a".repeat(MAX_SCRIPT_CHARS + 1));
        assert!(req.validate().is_err());

        let req = GenerationRequest::new("user-1", "p1", "a".repeat(MAX_SCRIPT_CHARS));
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_missing_persona_rejected() {
        let req = GenerationRequest::new("user-1", " ", "Hello");
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_display_name_fallbacks() {
        let req = GenerationRequest::new("user-1", "p1", "Hello").with_bill("hr-42", BriefingKind::OneOff);
        assert_eq!(req.display_name(), "Briefing: hr-42");

        let req = GenerationRequest::new("user-1", "p1", "Hello").with_bill("s-7", BriefingKind::Digest);
        assert_eq!(req.display_name(), "Digest: s-7");

        let req = GenerationRequest::new("user-1", "p1", "Hello").with_name("  My title ");
        assert_eq!(req.display_name(), "My title");
    }
}
