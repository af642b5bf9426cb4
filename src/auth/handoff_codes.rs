use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::handoff::HandoffParcel;

struct PendingHandoff {
    parcel: HandoffParcel,
    expires_at: DateTime<Utc>,
}

/// Single-use, short-lived codes that stand in for a (token, role) parcel
/// during a cross-origin redirect.
pub struct HandoffCodes {
    ttl: Duration,
    pending: Mutex<HashMap<String, PendingHandoff>>,
}

impl HandoffCodes {
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            ttl: Duration::seconds(ttl_secs as i64),
            pending: Mutex::new(HashMap::new()),
        }
    }

    pub fn issue(&self, parcel: HandoffParcel) -> (String, DateTime<Utc>) {
        self.issue_at(parcel, Utc::now())
    }

    fn issue_at(&self, parcel: HandoffParcel, now: DateTime<Utc>) -> (String, DateTime<Utc>) {
        let code = Uuid::new_v4().simple().to_string();
        let expires_at = now + self.ttl;

        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        pending.retain(|_, p| p.expires_at > now);
        pending.insert(code.clone(), PendingHandoff { parcel, expires_at });

        (code, expires_at)
    }

    /// Consume `code`. Unknown, expired and already-used codes all yield `None`.
    pub fn redeem(&self, code: &str) -> Option<HandoffParcel> {
        self.redeem_at(code, Utc::now())
    }

    fn redeem_at(&self, code: &str, now: DateTime<Utc>) -> Option<HandoffParcel> {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        let entry = pending.remove(code)?;
        (entry.expires_at > now).then_some(entry.parcel)
    }

    pub fn pending(&self) -> usize {
        self.pending.lock().map(|p| p.len()).unwrap_or(0)
    }
}
