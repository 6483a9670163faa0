//! Bank list for payout and checkout forms.
//!
//! Paystack's list changes rarely, so it is memoised in-process for
//! `OJA_BANK_CACHE_TTL_SECS`. When Paystack is unreachable or unconfigured the
//! handler serves a built-in list of the major Nigerian banks.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{extract::State, Extension, Json};
use serde::Serialize;
use tokio::sync::RwLock;

use oja_paystack::Bank;

use crate::middleware::RequestId;

use super::{ApiError, ApiResponse, AppState, ResponseMeta};

const FALLBACK_BANKS: &[(&str, &str)] = &[
    ("Access Bank", "044"),
    ("Citibank Nigeria", "023"),
    ("Ecobank Nigeria", "050"),
    ("Fidelity Bank", "070"),
    ("First Bank of Nigeria", "011"),
    ("First City Monument Bank", "214"),
    ("Guaranty Trust Bank", "058"),
    ("Keystone Bank", "082"),
    ("Kuda Bank", "50211"),
    ("Moniepoint MFB", "50515"),
    ("OPay Digital Services Limited (OPay)", "999992"),
    ("PalmPay", "999991"),
    ("Polaris Bank", "076"),
    ("Providus Bank", "101"),
    ("Stanbic IBTC Bank", "221"),
    ("Sterling Bank", "232"),
    ("Union Bank of Nigeria", "032"),
    ("United Bank For Africa", "033"),
    ("Unity Bank", "215"),
    ("Wema Bank", "035"),
    ("Zenith Bank", "057"),
];

#[derive(Debug)]
struct CachedBanks {
    fetched_at: Instant,
    banks: Vec<BankItem>,
}

/// TTL memo of the Paystack bank list, shared across requests.
#[derive(Debug, Clone)]
pub struct BankCache {
    ttl: Duration,
    inner: Arc<RwLock<Option<CachedBanks>>>,
}

impl BankCache {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            inner: Arc::new(RwLock::new(None)),
        }
    }

    async fn fresh(&self) -> Option<Vec<BankItem>> {
        let guard = self.inner.read().await;
        guard
            .as_ref()
            .filter(|cached| cached.fetched_at.elapsed() < self.ttl)
            .map(|cached| cached.banks.clone())
    }

    async fn store(&self, banks: Vec<BankItem>) {
        *self.inner.write().await = Some(CachedBanks {
            fetched_at: Instant::now(),
            banks,
        });
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub(super) struct BankItem {
    name: String,
    code: String,
    slug: Option<String>,
}

impl From<Bank> for BankItem {
    fn from(bank: Bank) -> Self {
        Self {
            name: bank.name,
            code: bank.code,
            slug: bank.slug,
        }
    }
}

fn fallback_banks() -> Vec<BankItem> {
    FALLBACK_BANKS
        .iter()
        .map(|(name, code)| BankItem {
            name: (*name).to_owned(),
            code: (*code).to_owned(),
            slug: Some(oja_core::slugify(name)),
        })
        .collect()
}

pub(super) async fn list_banks(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<Vec<BankItem>>>, ApiError> {
    if let Some(banks) = state.banks.fresh().await {
        return Ok(Json(ApiResponse {
            data: banks,
            meta: ResponseMeta::new(req_id.0),
        }));
    }

    let Some(paystack) = state.paystack.as_ref() else {
        return Ok(Json(ApiResponse {
            data: fallback_banks(),
            meta: ResponseMeta::new(req_id.0),
        }));
    };

    let data = match paystack.list_banks("nigeria").await {
        Ok(banks) => {
            let mut items: Vec<BankItem> = banks
                .into_iter()
                .filter(|b| b.active)
                .map(BankItem::from)
                .collect();
            items.sort_by(|a, b| a.name.cmp(&b.name));
            if items.is_empty() {
                fallback_banks()
            } else {
                state.banks.store(items.clone()).await;
                items
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "bank list unavailable; serving fallback list");
            fallback_banks()
        }
    };

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_list_has_unique_codes() {
        let banks = fallback_banks();
        let mut codes: Vec<&str> = banks.iter().map(|b| b.code.as_str()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), banks.len());
        assert!(banks.iter().any(|b| b.code == "058"));
    }

    #[tokio::test]
    async fn cache_expires_after_ttl() {
        let cache = BankCache::new(Duration::from_millis(20));
        assert!(cache.fresh().await.is_none());

        cache.store(fallback_banks()).await;
        assert_eq!(cache.fresh().await.map(|b| b.len()), Some(FALLBACK_BANKS.len()));

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(cache.fresh().await.is_none());
    }
}
