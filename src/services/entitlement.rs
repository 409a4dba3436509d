use std::sync::Arc;

use crate::{
    errors::{AppError, Result},
    models::Entitlement,
    services::quota_tracker::{QuotaReservation, QuotaTracker},
    storage::Store,
};

/// Outcome of a successful admission check.
pub enum Admission {
    /// Premium account; the quota tracker is not touched.
    Unmetered,
    /// Free account holding one unit of today's allowance.
    Metered(QuotaReservation),
}

impl Admission {
    pub fn entitlement(&self) -> Entitlement {
        match self {
            Admission::Unmetered => Entitlement::Premium,
            Admission::Metered(_) => Entitlement::Free,
        }
    }

    /// Makes the admission permanent. Returns the new daily count for free
    /// accounts.
    pub async fn commit(self) -> Result<Option<u32>> {
        match self {
            Admission::Unmetered => Ok(None),
            Admission::Metered(reservation) => reservation.commit().await.map(Some),
        }
    }
}

/// Single authorization checkpoint before a completion call. Reads the
/// account on every call; entitlement may change between turns.
#[derive(Clone)]
pub struct EntitlementGate {
    store: Arc<dyn Store>,
    quota: QuotaTracker,
}

impl EntitlementGate {
    pub fn new(store: Arc<dyn Store>, quota: QuotaTracker) -> Self {
        Self { store, quota }
    }

    pub async fn admit(&self, identity: &str) -> Result<Admission> {
        let account = self
            .store
            .find_account(identity)
            .await?
            .ok_or_else(|| AppError::NotFound(identity.to_string()))?;

        match Entitlement::from(&account) {
            Entitlement::Premium => Ok(Admission::Unmetered),
            Entitlement::Free => Ok(Admission::Metered(self.quota.reserve(identity).await?)),
        }
    }

    /// Allows or denies one chat turn, consuming quota for free accounts.
    pub async fn can_chat(&self, identity: &str) -> Result<Entitlement> {
        let admission = self.admit(identity).await?;
        let entitlement = admission.entitlement();
        admission.commit().await?;
        Ok(entitlement)
    }
}
