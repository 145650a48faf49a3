//! Scripted in-memory host for exercising the interception pipeline in
//! tests: seed tabs and bodies, emit debugger events, inspect the calls the
//! pipeline made.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{broadcast, Semaphore};

use banktap_core_types::{RequestId, TabId};

use crate::{DebuggerEvent, DebuggerHost, HostError, ResponseBody, TabInfo};

/// Host calls recorded in invocation order.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum HostCall {
    Attach(TabId),
    Detach(TabId),
    EnableNetwork(TabId),
    FetchBody(TabId, RequestId),
}

pub struct MockHost {
    events: broadcast::Sender<DebuggerEvent>,
    tabs: Mutex<HashMap<TabId, TabInfo>>,
    bodies: Mutex<HashMap<(TabId, RequestId), ResponseBody>>,
    calls: Mutex<Vec<HostCall>>,
    body_gate: Mutex<Option<Arc<Semaphore>>>,
}

impl MockHost {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            events,
            tabs: Mutex::new(HashMap::new()),
            bodies: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            body_gate: Mutex::new(None),
        }
    }

    pub fn insert_tab(&self, tab: TabId, url: impl Into<String>, complete: bool) {
        self.tabs.lock().insert(
            tab,
            TabInfo {
                id: tab,
                url: Some(url.into()),
                complete,
            },
        );
    }

    pub fn remove_tab(&self, tab: TabId) {
        self.tabs.lock().remove(&tab);
    }

    pub fn insert_body(&self, tab: TabId, request: RequestId, body: ResponseBody) {
        self.bodies.lock().insert((tab, request), body);
    }

    pub fn emit(&self, tab: TabId, method: impl Into<String>, params: serde_json::Value) {
        let _ = self.events.send(DebuggerEvent {
            tab,
            method: method.into(),
            params,
        });
    }

    pub fn calls(&self) -> Vec<HostCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self, call: &HostCall) -> usize {
        self.calls.lock().iter().filter(|c| *c == call).count()
    }

    /// Make every subsequent `response_body` call block until
    /// [`release_bodies`](Self::release_bodies) runs. Lets tests detach the
    /// session while a body fetch is in flight.
    pub fn hold_bodies(&self) {
        *self.body_gate.lock() = Some(Arc::new(Semaphore::new(0)));
    }

    pub fn release_bodies(&self) {
        if let Some(gate) = self.body_gate.lock().take() {
            gate.add_permits(Semaphore::MAX_PERMITS);
        }
    }
}

impl Default for MockHost {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DebuggerHost for MockHost {
    async fn tab_info(&self, tab: TabId) -> Result<TabInfo, HostError> {
        self.tabs
            .lock()
            .get(&tab)
            .cloned()
            .ok_or(HostError::TabNotFound(tab))
    }

    async fn attach(&self, tab: TabId) -> Result<(), HostError> {
        self.calls.lock().push(HostCall::Attach(tab));
        Ok(())
    }

    async fn detach(&self, tab: TabId) -> Result<(), HostError> {
        self.calls.lock().push(HostCall::Detach(tab));
        Ok(())
    }

    async fn enable_network(&self, tab: TabId) -> Result<(), HostError> {
        self.calls.lock().push(HostCall::EnableNetwork(tab));
        Ok(())
    }

    async fn response_body(
        &self,
        tab: TabId,
        request: &RequestId,
    ) -> Result<ResponseBody, HostError> {
        self.calls
            .lock()
            .push(HostCall::FetchBody(tab, request.clone()));
        let gate = self.body_gate.lock().clone();
        if let Some(gate) = gate {
            // Permit is never returned; the gate only delays resolution.
            let permit = gate
                .acquire()
                .await
                .map_err(|err| HostError::Io(err.to_string()))?;
            permit.forget();
        }
        self.bodies
            .lock()
            .get(&(tab, request.clone()))
            .cloned()
            .ok_or_else(|| HostError::BodyUnavailable(request.clone()))
    }

    fn events(&self) -> broadcast::Receiver<DebuggerEvent> {
        self.events.subscribe()
    }
}
