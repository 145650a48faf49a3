//! Single-tab network interception session.
//!
//! The session attaches debugger-level network instrumentation to exactly
//! one tab at a time and reconstructs completed response bodies from the
//! three lifecycle events the host delivers:
//!
//! - `Network.responseReceived` carries the request id and final URL; the
//!   pair is recorded in the pending index.
//! - `Network.loadingFinished` carries only the request id; a tracked entry
//!   triggers an asynchronous body fetch.
//! - `Network.loadingFailed` discards any tracked entry.
//!
//! Events for the two halves of one request never arrive back to back;
//! arbitrary events for other requests interleave between them. Detach is
//! the sole cancellation primitive: it synchronously stops event delivery,
//! clears the pending index, and bumps a generation counter so body fetches
//! still in flight are discarded when they resolve.

pub mod config;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use banktap_core_types::{RequestId, TabId};
use host_bridge::{DebuggerEvent, DebuggerHost, HostError, ResponseBody};

pub use crate::config::SessionConfig;

/// URL schemes the host will never let a debugger attach to.
const RESTRICTED_PREFIXES: &[&str] = &[
    "chrome://",
    "chrome-extension://",
    "about:",
    "moz-extension://",
    "edge://",
    "opera://",
    "devtools://",
];

pub fn is_restricted_url(url: &str) -> bool {
    RESTRICTED_PREFIXES
        .iter()
        .any(|prefix| url.starts_with(prefix))
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("cannot attach to restricted url {0}")]
    RestrictedUrl(String),
    #[error("tab {0} did not finish loading within {1:?}")]
    TabLoadTimeout(TabId, Duration),
    #[error("tab {0} is gone or has no url")]
    TabGone(TabId),
    #[error(transparent)]
    Host(#[from] HostError),
}

/// Completed response captured for the attached tab.
#[derive(Clone, Debug)]
pub struct CapturedResponse {
    pub tab: TabId,
    pub request: RequestId,
    pub url: String,
    pub body: ResponseBody,
}

struct SessionState {
    attached: Option<TabId>,
    /// Bumped on every detach; in-flight body fetches compare against it at
    /// resolution time and discard stale results.
    generation: u64,
    pending: HashMap<RequestId, String>,
    pump: Option<(CancellationToken, JoinHandle<()>)>,
}

struct Inner {
    host: Arc<dyn DebuggerHost>,
    cfg: SessionConfig,
    out: broadcast::Sender<CapturedResponse>,
    state: Mutex<SessionState>,
}

/// At most one tab is attached at any time; the orchestrator is the sole
/// caller of [`attach`](InterceptSession::attach) and
/// [`detach`](InterceptSession::detach).
pub struct InterceptSession {
    inner: Arc<Inner>,
}

impl InterceptSession {
    pub fn new(host: Arc<dyn DebuggerHost>, cfg: SessionConfig) -> Self {
        let (out, _) = broadcast::channel(cfg.capture_buffer.max(1));
        Self {
            inner: Arc::new(Inner {
                host,
                cfg,
                out,
                state: Mutex::new(SessionState {
                    attached: None,
                    generation: 0,
                    pending: HashMap::new(),
                    pump: None,
                }),
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CapturedResponse> {
        self.inner.out.subscribe()
    }

    pub fn attached_tab(&self) -> Option<TabId> {
        self.inner.state.lock().attached
    }

    pub fn is_attached(&self) -> bool {
        self.attached_tab().is_some()
    }

    /// Number of requests currently awaiting completion.
    pub fn pending_requests(&self) -> usize {
        self.inner.state.lock().pending.len()
    }

    /// Attach to `tab`. Attaching to the already-attached tab is a cheap
    /// no-op; attaching while another tab is attached detaches first. On
    /// failure the session stays detached; the caller retries naturally on
    /// the next navigation event.
    pub async fn attach(&self, tab: TabId) -> Result<(), SessionError> {
        match self.attached_tab() {
            Some(current) if current == tab => {
                debug!(target: "intercept-session", %tab, "already attached; ignoring");
                return Ok(());
            }
            Some(current) => {
                debug!(target: "intercept-session", from = %current, to = %tab, "reattaching");
                self.detach().await;
            }
            None => {}
        }

        let info = match self.inner.host.tab_info(tab).await {
            Ok(info) => info,
            Err(HostError::TabNotFound(_)) => return Err(SessionError::TabGone(tab)),
            Err(err) => return Err(err.into()),
        };
        let url = info.url.ok_or(SessionError::TabGone(tab))?;
        if is_restricted_url(&url) {
            return Err(SessionError::RestrictedUrl(url));
        }

        self.wait_for_tab_complete(tab).await?;

        self.inner.host.attach(tab).await?;
        if let Err(err) = self.inner.host.enable_network(tab).await {
            // Never leave a half-attached tab behind.
            if let Err(detach_err) = self.inner.host.detach(tab).await {
                warn!(target: "intercept-session", %tab, ?detach_err, "detach after failed enable also failed");
            }
            return Err(err.into());
        }

        // Subscribe before the pump task runs so no event emitted after
        // attach returns can be missed.
        let events = self.inner.host.events();
        let cancel = CancellationToken::new();
        let pump = tokio::spawn(Self::pump_events(
            Arc::clone(&self.inner),
            tab,
            events,
            cancel.clone(),
        ));

        let mut state = self.inner.state.lock();
        state.attached = Some(tab);
        state.pump = Some((cancel, pump));
        drop(state);

        debug!(target: "intercept-session", %tab, "attached");
        Ok(())
    }

    /// Detach and discard all pending correlation state. Idempotent:
    /// detaching a detached session is a no-op.
    pub async fn detach(&self) {
        let (tab, pump) = {
            let mut state = self.inner.state.lock();
            let Some(tab) = state.attached.take() else {
                return;
            };
            state.pending.clear();
            state.generation += 1;
            (tab, state.pump.take())
        };

        if let Some((cancel, task)) = pump {
            cancel.cancel();
            let _ = task.await;
        }

        if let Err(err) = self.inner.host.detach(tab).await {
            warn!(target: "intercept-session", %tab, ?err, "host detach failed");
        }
        debug!(target: "intercept-session", %tab, "detached");
    }

    async fn wait_for_tab_complete(&self, tab: TabId) -> Result<(), SessionError> {
        let deadline = Instant::now() + self.inner.cfg.tab_load_timeout;
        loop {
            let info = match self.inner.host.tab_info(tab).await {
                Ok(info) => info,
                Err(HostError::TabNotFound(_)) => return Err(SessionError::TabGone(tab)),
                Err(err) => return Err(err.into()),
            };
            if info.complete {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(SessionError::TabLoadTimeout(
                    tab,
                    self.inner.cfg.tab_load_timeout,
                ));
            }
            sleep(self.inner.cfg.load_poll_interval).await;
        }
    }

    async fn pump_events(
        inner: Arc<Inner>,
        tab: TabId,
        mut events: broadcast::Receiver<DebuggerEvent>,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                event = events.recv() => match event {
                    Ok(event) => Self::handle_event(&inner, tab, event),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(target: "intercept-session", skipped, "debugger event stream lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }
    }

    fn handle_event(inner: &Arc<Inner>, tab: TabId, event: DebuggerEvent) {
        if event.tab != tab {
            // Indicates an upstream dispatch inconsistency; must never
            // crash the session.
            warn!(
                target: "intercept-session",
                expected = %tab,
                got = %event.tab,
                method = %event.method,
                "debugger event for a tab we are not attached to; dropping"
            );
            return;
        }

        let Some(request) = extract_request_id(&event.params) else {
            debug!(
                target: "intercept-session",
                method = %event.method,
                "debugger event without requestId; ignoring"
            );
            return;
        };

        match event.method.as_str() {
            "Network.responseReceived" => {
                let Some(url) = extract_response_url(&event.params) else {
                    warn!(
                        target: "intercept-session",
                        %request,
                        "responseReceived without a url; ignoring"
                    );
                    return;
                };
                let mut state = inner.state.lock();
                // A queued event can still be delivered while detach is in
                // progress; never repopulate a cleared index.
                if state.attached == Some(tab) {
                    state.pending.insert(request, url);
                }
            }
            "Network.loadingFinished" => {
                let tracked = {
                    let mut state = inner.state.lock();
                    state
                        .pending
                        .remove(&request)
                        .map(|url| (url, state.generation))
                };
                // Absent means the request predates attach or was never
                // tracked; not ours to fetch.
                if let Some((url, generation)) = tracked {
                    Self::spawn_body_fetch(Arc::clone(inner), tab, request, url, generation);
                }
            }
            "Network.loadingFailed" => {
                if inner.state.lock().pending.remove(&request).is_some() {
                    debug!(target: "intercept-session", %request, "request failed before completion");
                }
            }
            _ => {}
        }
    }

    fn spawn_body_fetch(
        inner: Arc<Inner>,
        tab: TabId,
        request: RequestId,
        url: String,
        generation: u64,
    ) {
        tokio::spawn(async move {
            let body = match inner.host.response_body(tab, &request).await {
                Ok(body) => body,
                Err(err) => {
                    // Bodies are best-effort once a tab navigates away.
                    debug!(target: "intercept-session", %request, ?err, "body fetch failed; dropping");
                    return;
                }
            };

            let stale = {
                let state = inner.state.lock();
                state.attached != Some(tab) || state.generation != generation
            };
            if stale {
                debug!(
                    target: "intercept-session",
                    %request,
                    "session detached before body resolved; discarding"
                );
                return;
            }

            let _ = inner.out.send(CapturedResponse {
                tab,
                request,
                url,
                body,
            });
        });
    }
}

fn extract_request_id(params: &Value) -> Option<RequestId> {
    params
        .get("requestId")
        .and_then(Value::as_str)
        .map(RequestId::new)
}

fn extract_response_url(params: &Value) -> Option<String> {
    params
        .get("response")
        .and_then(|response| response.get("url"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restricted_prefixes_cover_browser_internal_schemes() {
        assert!(is_restricted_url("chrome://extensions"));
        assert!(is_restricted_url("about:blank"));
        assert!(is_restricted_url("edge://settings"));
        assert!(!is_restricted_url("https://secure.scotiabank.com/"));
    }

    #[test]
    fn request_id_and_url_extraction_tolerate_odd_shapes() {
        let params = serde_json::json!({
            "requestId": "7",
            "response": { "url": "https://api.bank.example/txns" }
        });
        assert_eq!(extract_request_id(&params), Some(RequestId::new("7")));
        assert_eq!(
            extract_response_url(&params),
            Some("https://api.bank.example/txns".to_string())
        );

        let odd = serde_json::json!({ "requestId": 7, "response": {} });
        assert_eq!(extract_request_id(&odd), None);
        assert_eq!(extract_response_url(&odd), None);
    }
}
