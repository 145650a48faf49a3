//! Wires tab events, the interception session, the plugin registry, and the
//! storage bridge together.
//!
//! Policy lives here and nowhere else: interception runs only while the
//! panel is open, the base-URL match decides attach versus detach on every
//! tab event, and a completed body reaches storage only when a plugin claims
//! its request URL and parses it cleanly.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use banktap_core_types::TabId;
use intercept_session::{CapturedResponse, InterceptSession};
use plugin_registry::PluginRegistry;
use storage_bridge::StorageBridge;

pub struct Orchestrator {
    session: InterceptSession,
    registry: Arc<PluginRegistry>,
    storage: Arc<dyn StorageBridge>,
    panel_open: AtomicBool,
    shutdown: CancellationToken,
    /// Taken by [`run`](Self::run). Subscribed at construction so no
    /// response captured before the drain task starts is lost.
    captured: Mutex<Option<broadcast::Receiver<CapturedResponse>>>,
}

impl Orchestrator {
    pub fn new(
        session: InterceptSession,
        registry: Arc<PluginRegistry>,
        storage: Arc<dyn StorageBridge>,
    ) -> Self {
        let captured = Mutex::new(Some(session.subscribe()));
        Self {
            session,
            registry,
            storage,
            panel_open: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
            captured,
        }
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Publish the registration list so UI surfaces can render it.
    pub async fn announce_plugins(&self) {
        if let Err(err) = self
            .storage
            .store_registered(self.registry.descriptors())
            .await
        {
            warn!(target: "orchestrator", ?err, "failed to store plugin registrations");
        }
    }

    pub fn panel_opened(&self) {
        self.panel_open.store(true, Ordering::SeqCst);
    }

    /// Closing the panel ends interception immediately.
    pub async fn panel_closed(&self) {
        self.panel_open.store(false, Ordering::SeqCst);
        self.session.detach().await;
    }

    pub fn is_panel_open(&self) -> bool {
        self.panel_open.load(Ordering::SeqCst)
    }

    /// React to a navigation or activation event for `tab` at `url`.
    ///
    /// The active-plugin indicator tracks every event; attach and detach are
    /// gated on the panel being open. Attach failures are logged and left
    /// alone: the next tab event retries naturally.
    pub async fn handle_tab_event(&self, tab: TabId, url: &str) {
        let matched = self.registry.find_by_base_url(url);
        let descriptor = matched.as_ref().map(|plugin| plugin.descriptor());
        if let Err(err) = self.storage.set_active_plugin(descriptor).await {
            warn!(target: "orchestrator", ?err, "failed to update active plugin");
        }

        if !self.is_panel_open() {
            self.session.detach().await;
            return;
        }

        match matched {
            Some(plugin) => {
                debug!(
                    target: "orchestrator",
                    %tab,
                    plugin = %plugin.descriptor().display_name,
                    "page matched; attaching"
                );
                match self.session.attach(tab).await {
                    Ok(()) => {}
                    // The tab closed between the event and the lookup;
                    // nothing to do, the session stayed detached.
                    Err(err @ intercept_session::SessionError::TabGone(_)) => {
                        debug!(target: "orchestrator", %tab, %err, "tab vanished before attach");
                    }
                    Err(err) => {
                        warn!(target: "orchestrator", %tab, %err, "attach failed");
                    }
                }
            }
            None => self.session.detach().await,
        }
    }

    /// Drain captured responses until shutdown. Run once, from one task.
    pub async fn run(&self) {
        let Some(mut captured) = self.captured.lock().take() else {
            warn!(target: "orchestrator", "run called twice; ignoring");
            return;
        };
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                next = captured.recv() => match next {
                    Ok(response) => self.handle_captured(response).await,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(target: "orchestrator", skipped, "captured-response stream lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }
        self.session.detach().await;
    }

    async fn handle_captured(&self, response: CapturedResponse) {
        // Most requests on a bank page are not the transaction endpoint.
        let Some(plugin) = self.registry.find_by_api_url(&response.url) else {
            return;
        };

        let text = match response.body.into_text() {
            Ok(text) => text,
            Err(err) => {
                warn!(target: "orchestrator", url = %response.url, ?err, "undecodable body; dropping");
                return;
            }
        };
        let payload: serde_json::Value = match serde_json::from_str(&text) {
            Ok(payload) => payload,
            Err(err) => {
                debug!(target: "orchestrator", url = %response.url, %err, "non-JSON body; dropping");
                return;
            }
        };

        let descriptor = plugin.descriptor();
        match plugin.parse(&payload) {
            Ok(records) => {
                info!(
                    target: "orchestrator",
                    plugin = %descriptor.display_name,
                    count = records.len(),
                    "captured transaction batch"
                );
                if let Err(err) = self.storage.replace_transactions(&descriptor, records).await {
                    warn!(target: "orchestrator", ?err, "storage replace failed");
                }
            }
            Err(err) => {
                // The whole batch is dropped; partial data never reaches
                // storage.
                warn!(
                    target: "orchestrator",
                    plugin = %descriptor.display_name,
                    %err,
                    "parse failed; dropping batch"
                );
            }
        }
    }
}
