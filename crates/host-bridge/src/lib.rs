//! Browser extension-host abstraction for banktap.
//!
//! The host owns the real browser surface: tab lookup, debugger attach and
//! detach, network monitoring, response-body retrieval, and the debugger
//! event stream. Everything above it programs against [`DebuggerHost`], so
//! the interception pipeline can run against a live host binding, the
//! replay host, or the scripted [`mock::MockHost`] without changes.

pub mod mock;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::broadcast;

use banktap_core_types::{RequestId, TabId};

/// Errors surfaced by host calls.
#[derive(Clone, Debug, Error)]
pub enum HostError {
    #[error("tab {0} not found")]
    TabNotFound(TabId),
    #[error("debugger not attached to tab {0}")]
    NotAttached(TabId),
    #[error("response body unavailable for request {0}")]
    BodyUnavailable(RequestId),
    #[error("host i/o failure: {0}")]
    Io(String),
}

/// One debugger event as delivered by the host: owning tab, CDP-style
/// method name, and the raw params payload.
#[derive(Clone, Debug)]
pub struct DebuggerEvent {
    pub tab: TabId,
    pub method: String,
    pub params: Value,
}

/// Tab snapshot as reported by the host at lookup time.
#[derive(Clone, Debug)]
pub struct TabInfo {
    pub id: TabId,
    pub url: Option<String>,
    /// Whether the tab has finished loading.
    pub complete: bool,
}

/// Payload returned by a `Network.getResponseBody` call.
#[derive(Clone, Debug)]
pub struct ResponseBody {
    pub body: String,
    pub base64_encoded: bool,
}

impl ResponseBody {
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            base64_encoded: false,
        }
    }

    /// Decode to text, unwrapping base64 transport encoding when present.
    pub fn into_text(self) -> Result<String, HostError> {
        if !self.base64_encoded {
            return Ok(self.body);
        }
        let bytes = STANDARD
            .decode(self.body.as_bytes())
            .map_err(|err| HostError::Io(err.to_string()))?;
        String::from_utf8(bytes).map_err(|err| HostError::Io(err.to_string()))
    }
}

/// The capability surface the interception pipeline needs from the browser
/// host. All calls are keyed by tab; the event stream is shared and carries
/// the owning tab on every event.
#[async_trait]
pub trait DebuggerHost: Send + Sync {
    async fn tab_info(&self, tab: TabId) -> Result<TabInfo, HostError>;
    async fn attach(&self, tab: TabId) -> Result<(), HostError>;
    async fn detach(&self, tab: TabId) -> Result<(), HostError>;
    async fn enable_network(&self, tab: TabId) -> Result<(), HostError>;
    async fn response_body(&self, tab: TabId, request: &RequestId)
        -> Result<ResponseBody, HostError>;
    fn events(&self) -> broadcast::Receiver<DebuggerEvent>;
}

/// Host that never produces events and refuses every command. Used when no
/// real browser binding is wired in.
pub struct NoopHost {
    events: broadcast::Sender<DebuggerEvent>,
}

impl NoopHost {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(1);
        Self { events }
    }
}

impl Default for NoopHost {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DebuggerHost for NoopHost {
    async fn tab_info(&self, tab: TabId) -> Result<TabInfo, HostError> {
        Err(HostError::TabNotFound(tab))
    }

    async fn attach(&self, tab: TabId) -> Result<(), HostError> {
        Err(HostError::Io(format!("no host available to attach tab {tab}")))
    }

    async fn detach(&self, _tab: TabId) -> Result<(), HostError> {
        Ok(())
    }

    async fn enable_network(&self, tab: TabId) -> Result<(), HostError> {
        Err(HostError::NotAttached(tab))
    }

    async fn response_body(
        &self,
        _tab: TabId,
        request: &RequestId,
    ) -> Result<ResponseBody, HostError> {
        Err(HostError::BodyUnavailable(request.clone()))
    }

    fn events(&self) -> broadcast::Receiver<DebuggerEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_body_passes_through() {
        let body = ResponseBody::text(r#"{"ok":true}"#);
        assert_eq!(body.into_text().unwrap(), r#"{"ok":true}"#);
    }

    #[test]
    fn base64_body_is_decoded() {
        let body = ResponseBody {
            body: STANDARD.encode(r#"{"transactions":[]}"#),
            base64_encoded: true,
        };
        assert_eq!(body.into_text().unwrap(), r#"{"transactions":[]}"#);
    }

    #[test]
    fn invalid_base64_is_an_io_error() {
        let body = ResponseBody {
            body: "not base64!!".into(),
            base64_encoded: true,
        };
        assert!(matches!(body.into_text(), Err(HostError::Io(_))));
    }
}
