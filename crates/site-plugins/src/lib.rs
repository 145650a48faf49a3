//! Bank site integrations.
//!
//! Each plugin implements [`plugin_registry::SitePlugin`] for one bank
//! endpoint and nothing more: the dispatch logic lives in the registry, the
//! session knows nothing about banks. Plugins are constructed with the
//! account display name they should stamp on the money-flow side of each
//! record.

pub mod amounts;
pub mod dates;

mod rbc;
mod rogers_bank;
mod scotiabank;

pub use rbc::Rbc;
pub use rogers_bank::RogersBank;
pub use scotiabank::{ScotiabankChequing, ScotiabankCredit};
