//! Banktap: a debugger-driven bank transaction capture pipeline.
//!
//! The library wires the workspace crates into a runnable pipeline: the
//! interception session watches one tab's network traffic through a
//! [`host_bridge::DebuggerHost`], the registry maps pages and requests to
//! site plugins, and parsed batches land in the storage bridge. The binary
//! adds a replay surface over recorded capture files.

pub mod config;
pub mod export;
pub mod orchestrator;
pub mod replay;

use std::sync::Arc;

use plugin_registry::PluginRegistry;
use site_plugins::{Rbc, RogersBank, ScotiabankChequing, ScotiabankCredit};

use crate::config::Settings;

/// Build the production registry: every supported bank, registered once, in
/// a fixed order.
pub fn build_registry(settings: &Settings) -> PluginRegistry {
    let accounts = &settings.accounts;
    let mut registry = PluginRegistry::new();
    registry.register(Arc::new(Rbc::new(accounts.rbc.clone())));
    registry.register(Arc::new(ScotiabankCredit::new(
        accounts.scotiabank_credit.clone(),
    )));
    registry.register(Arc::new(ScotiabankChequing::new(
        accounts.scotiabank_chequing.clone(),
    )));
    registry.register(Arc::new(RogersBank::new(accounts.rogers_bank.clone())));
    registry
}
