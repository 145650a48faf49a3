//! Replay a recorded capture file through the full pipeline.
//!
//! A capture file is a JSON snapshot of one browsing session: the tabs that
//! existed, the debugger events in delivery order, and the response bodies
//! the host would have returned. [`ReplayHost`] serves it behind
//! [`DebuggerHost`], so the session, registry, orchestrator, and storage all
//! run exactly as they would against a live browser.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::time::timeout;
use tracing::debug;

use banktap_core_types::{RequestId, TabId};
use host_bridge::{DebuggerEvent, DebuggerHost, HostError, ResponseBody, TabInfo};
use intercept_session::InterceptSession;
use storage_bridge::{MemoryStore, StorageBridge};

use crate::config::Settings;
use crate::orchestrator::Orchestrator;

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("cannot read capture file: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot parse capture file: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CaptureTab {
    pub id: i64,
    pub url: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CaptureEvent {
    pub tab: i64,
    pub method: String,
    pub params: serde_json::Value,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CaptureBody {
    pub tab: i64,
    pub request: String,
    pub body: String,
    #[serde(default)]
    pub base64_encoded: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CaptureFile {
    pub tabs: Vec<CaptureTab>,
    pub events: Vec<CaptureEvent>,
    pub bodies: Vec<CaptureBody>,
}

impl CaptureFile {
    pub fn load(path: &Path) -> Result<Self, ReplayError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

/// Host that serves a capture file. Tabs are always fully loaded; attach,
/// detach, and enable-network always succeed.
pub struct ReplayHost {
    tabs: HashMap<TabId, String>,
    bodies: HashMap<(TabId, RequestId), ResponseBody>,
    script: Mutex<Vec<DebuggerEvent>>,
    events: broadcast::Sender<DebuggerEvent>,
}

impl ReplayHost {
    pub fn new(capture: &CaptureFile) -> Self {
        let (events, _) = broadcast::channel(256);
        let tabs = capture
            .tabs
            .iter()
            .map(|tab| (TabId(tab.id), tab.url.clone()))
            .collect();
        let bodies = capture
            .bodies
            .iter()
            .map(|entry| {
                (
                    (TabId(entry.tab), RequestId::new(entry.request.clone())),
                    ResponseBody {
                        body: entry.body.clone(),
                        base64_encoded: entry.base64_encoded,
                    },
                )
            })
            .collect();
        let script = capture
            .events
            .iter()
            .map(|event| DebuggerEvent {
                tab: TabId(event.tab),
                method: event.method.clone(),
                params: event.params.clone(),
            })
            .collect();
        Self {
            tabs,
            bodies,
            script: Mutex::new(script),
            events,
        }
    }

    /// Deliver the recorded event sequence to whoever is subscribed.
    pub fn play(&self) {
        for event in self.script.lock().drain(..) {
            debug!(target: "replay", method = %event.method, tab = %event.tab, "replaying event");
            let _ = self.events.send(event);
        }
    }
}

#[async_trait]
impl DebuggerHost for ReplayHost {
    async fn tab_info(&self, tab: TabId) -> Result<TabInfo, HostError> {
        let url = self
            .tabs
            .get(&tab)
            .cloned()
            .ok_or(HostError::TabNotFound(tab))?;
        Ok(TabInfo {
            id: tab,
            url: Some(url),
            complete: true,
        })
    }

    async fn attach(&self, _tab: TabId) -> Result<(), HostError> {
        Ok(())
    }

    async fn detach(&self, _tab: TabId) -> Result<(), HostError> {
        Ok(())
    }

    async fn enable_network(&self, _tab: TabId) -> Result<(), HostError> {
        Ok(())
    }

    async fn response_body(
        &self,
        tab: TabId,
        request: &RequestId,
    ) -> Result<ResponseBody, HostError> {
        self.bodies
            .get(&(tab, request.clone()))
            .cloned()
            .ok_or_else(|| HostError::BodyUnavailable(request.clone()))
    }

    fn events(&self) -> broadcast::Receiver<DebuggerEvent> {
        self.events.subscribe()
    }
}

/// Run one capture through the whole pipeline and return the store holding
/// the normalized result.
pub async fn run_capture(
    capture: &CaptureFile,
    settings: &Settings,
) -> Result<Arc<MemoryStore>, ReplayError> {
    let host = Arc::new(ReplayHost::new(capture));
    let store = Arc::new(MemoryStore::new());
    let session = InterceptSession::new(host.clone(), settings.session_config());
    let registry = Arc::new(crate::build_registry(settings));

    let orchestrator = Arc::new(Orchestrator::new(
        session,
        registry,
        store.clone() as Arc<dyn StorageBridge>,
    ));
    orchestrator.announce_plugins().await;
    orchestrator.panel_opened();

    let runner = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move { orchestrator.run().await })
    };

    let mut changes = store.changes();
    for tab in &capture.tabs {
        orchestrator.handle_tab_event(TabId(tab.id), &tab.url).await;
    }
    host.play();

    // Quiescence: the pipeline is done when storage stops changing.
    while let Ok(Ok(_)) = timeout(Duration::from_millis(300), changes.recv()).await {}

    orchestrator.shutdown_token().cancel();
    let _ = runner.await;
    Ok(store)
}
