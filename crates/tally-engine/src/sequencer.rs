//! # Invoice Sequencer
//!
//! Proposes the next sale number for a tenant and day.
//!
//! ## Allocation vs Uniqueness
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Checkout A                         Checkout B                          │
//! │  last = INV-20261016-041            last = INV-20261016-041             │
//! │  propose  ...-042                   propose  ...-042                    │
//! │  INSERT sale ...-042  ✓             INSERT sale ...-042  ✗ UNIQUE       │
//! │                                     rollback, ask again                 │
//! │                                     last = ...-042, propose ...-043 ✓   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The sequencer never reserves anything. The store's unique index on
//! `(tenant_id, sale_number)` decides, and [`SaleService`](crate::SaleService)
//! retries a bounded number of times.

use chrono::{DateTime, NaiveDate, Utc};
use tally_core::invoice::{day_prefix, next_sale_number};
use tally_core::{InventoryStore, StoreResult};
use tracing::debug;

use crate::config::EngineConfig;

/// Computes candidate sale numbers from the latest committed one.
#[derive(Debug, Clone)]
pub struct InvoiceSequencer {
    config: EngineConfig,
}

impl InvoiceSequencer {
    /// Creates a sequencer using the prefix and day offset of `config`.
    pub fn new(config: &EngineConfig) -> Self {
        InvoiceSequencer {
            config: config.clone(),
        }
    }

    /// The calendar day a sale made at `at` is numbered under.
    pub fn business_date(&self, at: DateTime<Utc>) -> NaiveDate {
        self.config.business_date(at)
    }

    /// Next candidate number for `tenant_id` on `date`: one past the greatest
    /// existing number of that day, or `…-001`.
    pub async fn next_sale_number<S>(
        &self,
        store: &S,
        tenant_id: &str,
        date: NaiveDate,
    ) -> StoreResult<String>
    where
        S: InventoryStore + ?Sized,
    {
        let prefix = day_prefix(&self.config.invoice_prefix, date);
        let last = store.last_sale_number(tenant_id, &prefix).await?;
        let next = next_sale_number(&self.config.invoice_prefix, date, last.as_deref());

        debug!(tenant_id = %tenant_id, last = ?last, next = %next, "Sale number proposed");
        Ok(next)
    }
}
