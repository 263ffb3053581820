use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ActionType {
    #[serde(rename = "PUBLISH", alias = "ACTIVATE")]
    Publish,
    #[serde(rename = "UNPUBLISH", alias = "DEACTIVATE", alias = "DELETE")]
    Unpublish,
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionType::Publish => write!(f, "PUBLISH"),
            ActionType::Unpublish => write!(f, "UNPUBLISH"),
        }
    }
}

impl TryFrom<String> for ActionType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.to_uppercase().as_str() {
            "PUBLISH" | "ACTIVATE" => Ok(ActionType::Publish),
            "UNPUBLISH" | "DEACTIVATE" | "DELETE" => Ok(ActionType::Unpublish),
            _ => Err(format!("Invalid action type: {}", value)),
        }
    }
}

/// Asset content carried by a PUBLISH record
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Payload {
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub mimetype: Option<String>,
    /// `data` is base64 encoded binary content
    #[serde(default)]
    pub base64: bool,
}

impl Payload {
    pub fn text(data: impl Into<String>, mimetype: impl Into<String>) -> Self {
        Self {
            data: Some(data.into()),
            mimetype: Some(mimetype.into()),
            base64: false,
        }
    }

    pub fn binary(encoded: impl Into<String>, mimetype: impl Into<String>) -> Self {
        Self {
            data: Some(encoded.into()),
            mimetype: Some(mimetype.into()),
            base64: true,
        }
    }

    /// Content type, if present and not blank
    pub fn content_type(&self) -> Option<&str> {
        self.mimetype.as_deref().map(str::trim).filter(|m| !m.is_empty())
    }
}

/// One logical content push or removal against a WebDAV share
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryRecord {
    pub share: String,
    pub path: String,
    #[serde(default)]
    pub payload: Option<Payload>,
    pub action_type: ActionType,
}

impl DeliveryRecord {
    pub fn publish(share: impl Into<String>, path: impl Into<String>, payload: Payload) -> Self {
        Self {
            share: share.into(),
            path: path.into(),
            payload: Some(payload),
            action_type: ActionType::Publish,
        }
    }

    pub fn unpublish(share: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            share: share.into(),
            path: path.into(),
            payload: None,
            action_type: ActionType::Unpublish,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    MissingPayload,
    EmptyPayload,
    MissingContentType,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::MissingPayload => write!(f, "no payload"),
            SkipReason::EmptyPayload => write!(f, "empty payload"),
            SkipReason::MissingContentType => write!(f, "no content type"),
        }
    }
}

/// Outcome of a delivery that did not raise an error
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DeliveryResult {
    /// Folders ensured and the asset uploaded
    Published { target_uri: String, folders_created: usize },
    /// Remote resource deleted
    Unpublished { target_uri: String },
    /// Remote resource did not exist, which counts as a successful delete
    AlreadyAbsent { target_uri: String },
    /// Nothing was sent; the record is reported as unsuccessful
    Skipped { target_uri: String, reason: SkipReason },
}

impl DeliveryResult {
    pub fn is_success(&self) -> bool {
        !matches!(self, DeliveryResult::Skipped { .. })
    }

    pub fn target_uri(&self) -> &str {
        match self {
            DeliveryResult::Published { target_uri, .. }
            | DeliveryResult::Unpublished { target_uri }
            | DeliveryResult::AlreadyAbsent { target_uri }
            | DeliveryResult::Skipped { target_uri, .. } => target_uri,
        }
    }
}
