use serde::{Deserialize, Serialize};

/// Kind of a streamed fragment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FragmentKind {
    /// Incremental generated text
    Delta,
    /// Normal end of the stream
    Completion,
    /// Terminal failure
    Error,
}

/// One unit of a streamed reply, shaped exactly like the client wire JSON.
///
/// Control fragments (`completion`, `error`) carry an empty `content`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamFragment {
    #[serde(rename = "type")]
    pub kind: FragmentKind,
    #[serde(default)]
    pub content: String,
    pub thread_id: String,
    pub session_id: String,
    #[serde(default)]
    pub has_artifact: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl StreamFragment {
    pub fn delta(
        content: impl Into<String>,
        thread_id: impl Into<String>,
        session_id: impl Into<String>,
        has_artifact: bool,
    ) -> Self {
        Self {
            kind: FragmentKind::Delta,
            content: content.into(),
            thread_id: thread_id.into(),
            session_id: session_id.into(),
            has_artifact,
            error_message: None,
        }
    }

    pub fn completion(
        thread_id: impl Into<String>,
        session_id: impl Into<String>,
        has_artifact: bool,
    ) -> Self {
        Self {
            kind: FragmentKind::Completion,
            content: String::new(),
            thread_id: thread_id.into(),
            session_id: session_id.into(),
            has_artifact,
            error_message: None,
        }
    }

    pub fn error(
        thread_id: impl Into<String>,
        session_id: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            kind: FragmentKind::Error,
            content: String::new(),
            thread_id: thread_id.into(),
            session_id: session_id.into(),
            has_artifact: false,
            error_message: Some(detail.into()),
        }
    }

    /// Generated text, if this is a non-empty delta
    pub fn text(&self) -> Option<&str> {
        match self.kind {
            FragmentKind::Delta if !self.content.is_empty() => Some(&self.content),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.kind, FragmentKind::Completion | FragmentKind::Error)
    }
}
