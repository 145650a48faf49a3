//! Persistence boundary between the capture pipeline and whatever actually
//! stores transactions.
//!
//! Each successful parse replaces the whole batch for its plugin/account
//! pairing. Replacement is not blind: user category edits survive because
//! [`MemoryStore`] carries `original_category_name` forward by `external_id`
//! before overwriting. Writers announce every mutation on a broadcast
//! channel so UI surfaces can refresh without polling.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::debug;

use banktap_core_types::{PluginDescriptor, TransactionRecord};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
    #[error("no transactions stored for account {0}")]
    UnknownAccount(String),
}

/// What changed, keyed the way readers look things up.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum StorageChanged {
    /// The transaction set for this account key was replaced.
    Transactions(String),
    ActivePlugin,
    RegisteredPlugins,
}

/// Mutation surface the orchestrator drives. Reads go through the concrete
/// store; only writes need to be host-agnostic.
#[async_trait]
pub trait StorageBridge: Send + Sync {
    /// Replace the stored batch for the descriptor's account, preserving
    /// user edits from the previous batch where records match by
    /// `external_id`.
    async fn replace_transactions(
        &self,
        descriptor: &PluginDescriptor,
        records: Vec<TransactionRecord>,
    ) -> Result<(), StorageError>;

    /// Record which plugin matches the active tab, or clear it.
    async fn set_active_plugin(
        &self,
        descriptor: Option<PluginDescriptor>,
    ) -> Result<(), StorageError>;

    /// Publish the full registration list, replacing any previous one.
    async fn store_registered(
        &self,
        descriptors: Vec<PluginDescriptor>,
    ) -> Result<(), StorageError>;

    fn changes(&self) -> broadcast::Receiver<StorageChanged>;
}

/// In-memory store backing both the replay pipeline and the tests.
pub struct MemoryStore {
    transactions: DashMap<String, Vec<TransactionRecord>>,
    active: Mutex<Option<PluginDescriptor>>,
    registered: Mutex<Vec<PluginDescriptor>>,
    changes: broadcast::Sender<StorageChanged>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(32);
        Self {
            transactions: DashMap::new(),
            active: Mutex::new(None),
            registered: Mutex::new(Vec::new()),
            changes,
        }
    }

    pub fn transactions_for(&self, account_key: &str) -> Vec<TransactionRecord> {
        self.transactions
            .get(account_key)
            .map(|entry| entry.clone())
            .unwrap_or_default()
    }

    pub fn all_transactions(&self) -> Vec<(String, Vec<TransactionRecord>)> {
        self.transactions
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    pub fn active_plugin(&self) -> Option<PluginDescriptor> {
        self.active.lock().clone()
    }

    pub fn registered_plugins(&self) -> Vec<PluginDescriptor> {
        self.registered.lock().clone()
    }

    /// Apply a user category edit to one stored record. The first edit seeds
    /// `original_category_name` from the pre-edit value; later edits keep
    /// the original untouched so the edit can always be reverted.
    pub fn update_category(
        &self,
        account_key: &str,
        external_id: &str,
        category: impl Into<String>,
    ) -> Result<(), StorageError> {
        let mut entry = self
            .transactions
            .get_mut(account_key)
            .ok_or_else(|| StorageError::UnknownAccount(account_key.to_string()))?;
        let record = entry
            .iter_mut()
            .find(|record| !external_id.is_empty() && record.external_id == external_id)
            .ok_or_else(|| StorageError::UnknownAccount(account_key.to_string()))?;
        if record.original_category_name.is_none() {
            record.original_category_name = Some(record.category_name.clone());
        }
        record.category_name = category.into();
        drop(entry);
        let _ = self
            .changes
            .send(StorageChanged::Transactions(account_key.to_string()));
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Carry `original_category_name` from `previous` into `incoming` where
/// records match by a non-empty `external_id`. Unmatched incoming records
/// seed it from their own parsed category.
fn merge_original_categories(
    previous: &[TransactionRecord],
    incoming: &mut [TransactionRecord],
) {
    for record in incoming.iter_mut() {
        let carried = (!record.external_id.is_empty())
            .then(|| {
                previous
                    .iter()
                    .find(|old| old.external_id == record.external_id)
                    .and_then(|old| old.original_category_name.clone())
            })
            .flatten();
        record.original_category_name =
            Some(carried.unwrap_or_else(|| record.category_name.clone()));
    }
}

#[async_trait]
impl StorageBridge for MemoryStore {
    async fn replace_transactions(
        &self,
        descriptor: &PluginDescriptor,
        mut records: Vec<TransactionRecord>,
    ) -> Result<(), StorageError> {
        let key = descriptor.account_key();
        {
            let previous = self
                .transactions
                .get(&key)
                .map(|entry| entry.clone())
                .unwrap_or_default();
            merge_original_categories(&previous, &mut records);
        }
        debug!(
            target: "storage-bridge",
            account = %key,
            count = records.len(),
            "replacing stored batch"
        );
        self.transactions.insert(key.clone(), records);
        let _ = self.changes.send(StorageChanged::Transactions(key));
        Ok(())
    }

    async fn set_active_plugin(
        &self,
        descriptor: Option<PluginDescriptor>,
    ) -> Result<(), StorageError> {
        *self.active.lock() = descriptor;
        let _ = self.changes.send(StorageChanged::ActivePlugin);
        Ok(())
    }

    async fn store_registered(
        &self,
        descriptors: Vec<PluginDescriptor>,
    ) -> Result<(), StorageError> {
        *self.registered.lock() = descriptors;
        let _ = self.changes.send(StorageChanged::RegisteredPlugins);
        Ok(())
    }

    fn changes(&self) -> broadcast::Receiver<StorageChanged> {
        self.changes.subscribe()
    }
}

/// Convenience alias used by the orchestrator.
pub type SharedStorage = Arc<dyn StorageBridge>;

#[cfg(test)]
mod tests {
    use super::*;
    use banktap_core_types::{TxnKind, TxnStatus};
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    fn descriptor() -> PluginDescriptor {
        PluginDescriptor {
            display_name: "RBC".into(),
            icon_url: "icons/rbc.png".into(),
            account_display_name: "RBC Chequing".into(),
            base_url_pattern: "royalbank".into(),
            api_url_pattern: "royalbank".into(),
        }
    }

    fn record(external_id: &str, category: &str) -> TransactionRecord {
        TransactionRecord::new(
            TxnKind::Withdrawal,
            "COFFEE SHOP",
            Decimal::new(450, 2),
            NaiveDate::from_ymd_opt(2025, 11, 3).unwrap(),
            external_id,
        )
        .with_category(category)
    }

    #[tokio::test]
    async fn first_write_seeds_original_category_from_parse() {
        let store = MemoryStore::new();
        store
            .replace_transactions(&descriptor(), vec![record("t1", "Dining")])
            .await
            .unwrap();

        let stored = store.transactions_for(&descriptor().account_key());
        assert_eq!(stored[0].category_name, "Dining");
        assert_eq!(stored[0].original_category_name.as_deref(), Some("Dining"));
    }

    #[tokio::test]
    async fn replacement_carries_user_edits_forward_by_external_id() {
        let store = MemoryStore::new();
        let key = descriptor().account_key();
        store
            .replace_transactions(&descriptor(), vec![record("t1", "Dining")])
            .await
            .unwrap();
        store.update_category(&key, "t1", "Coffee").unwrap();

        // Recapture delivers the same upstream record again.
        store
            .replace_transactions(&descriptor(), vec![record("t1", "Dining")])
            .await
            .unwrap();

        let stored = store.transactions_for(&key);
        assert_eq!(stored[0].original_category_name.as_deref(), Some("Dining"));
    }

    #[tokio::test]
    async fn empty_external_ids_never_match_across_batches() {
        let store = MemoryStore::new();
        let mut old = record("", "Old");
        old.original_category_name = Some("Edited".into());
        store
            .replace_transactions(&descriptor(), vec![old])
            .await
            .unwrap();

        store
            .replace_transactions(&descriptor(), vec![record("", "New")])
            .await
            .unwrap();

        let stored = store.transactions_for(&descriptor().account_key());
        assert_eq!(stored[0].original_category_name.as_deref(), Some("New"));
    }

    #[test]
    fn update_category_seeds_only_on_first_edit() {
        let store = MemoryStore::new();
        let key = descriptor().account_key();
        store
            .transactions
            .insert(key.clone(), vec![record("t1", "Dining")]);

        store.update_category(&key, "t1", "Coffee").unwrap();
        store.update_category(&key, "t1", "Takeout").unwrap();

        let stored = store.transactions_for(&key);
        assert_eq!(stored[0].category_name, "Takeout");
        assert_eq!(stored[0].original_category_name.as_deref(), Some("Dining"));
    }

    #[test]
    fn update_category_on_unknown_account_errors() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.update_category("nope", "t1", "Coffee"),
            Err(StorageError::UnknownAccount(_))
        ));
    }

    #[tokio::test]
    async fn every_mutation_announces_a_change() {
        let store = MemoryStore::new();
        let mut changes = store.changes();

        store
            .replace_transactions(&descriptor(), vec![record("t1", "Dining")])
            .await
            .unwrap();
        store.set_active_plugin(Some(descriptor())).await.unwrap();
        store.store_registered(vec![descriptor()]).await.unwrap();

        assert_eq!(
            changes.recv().await.unwrap(),
            StorageChanged::Transactions(descriptor().account_key())
        );
        assert_eq!(changes.recv().await.unwrap(), StorageChanged::ActivePlugin);
        assert_eq!(
            changes.recv().await.unwrap(),
            StorageChanged::RegisteredPlugins
        );
    }

    #[test]
    fn status_round_trips_through_replacement_untouched() {
        let mut incoming = vec![record("t1", "Dining")];
        incoming[0].status = Some(TxnStatus::Pending);
        merge_original_categories(&[], &mut incoming);
        assert_eq!(incoming[0].status, Some(TxnStatus::Pending));
    }
}
