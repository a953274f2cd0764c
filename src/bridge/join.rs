//! Join coordination: serializes "join auction" attempts per
//! (invite-code, user) pair so a double-submitting client cannot create a
//! duplicate team while its first attempt is still in flight.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::types::{AuctionId, UserId};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    pub invite_code: String,
    pub team_name: String,
    pub user_id: UserId,
    pub user_email: String,
}

/// Structured join result. Domain-rule failures (bad code, full auction,
/// taken name) land here with `success == false`; store failures and
/// timeouts are errors instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinOutcome {
    pub success: bool,
    pub message: String,
    #[serde(default)]
    pub auction_id: Option<AuctionId>,
}

impl JoinOutcome {
    pub fn failure(message: impl Into<String>) -> Self {
        JoinOutcome {
            success: false,
            message: message.into(),
            auction_id: None,
        }
    }

    pub fn success(message: impl Into<String>, auction_id: AuctionId) -> Self {
        JoinOutcome {
            success: true,
            message: message.into(),
            auction_id: Some(auction_id),
        }
    }

    pub fn busy() -> Self {
        Self::failure("Iscrizione già in corso, riprova tra qualche istante")
    }
}

/// Process-wide set of in-flight join attempts, keyed `code-userId`.
///
/// This only guards against same-client double submission; cross-client races
/// are handled by the authoritative re-reads inside the join flow itself.
#[derive(Default)]
pub struct JoinLocks {
    in_flight: Mutex<HashSet<String>>,
}

impl JoinLocks {
    pub fn new() -> Arc<Self> {
        Arc::new(JoinLocks::default())
    }

    /// Try to mark `code-user` as in flight. Returns `None` while another
    /// attempt for the same pair is still running.
    pub fn acquire(self: &Arc<Self>, invite_code: &str, user_id: &str) -> Option<JoinGuard> {
        let key = format!("{}-{}", invite_code, user_id);
        let mut in_flight = self.in_flight.lock().expect("join lock poisoned");
        if !in_flight.insert(key.clone()) {
            return None;
        }
        Some(JoinGuard {
            locks: Arc::clone(self),
            key,
        })
    }

    fn release(&self, key: &str) {
        self.in_flight
            .lock()
            .expect("join lock poisoned")
            .remove(key);
    }
}

/// Releases the in-flight marker on every exit path, including timeouts that
/// drop the join future mid-flight.
pub struct JoinGuard {
    locks: Arc<JoinLocks>,
    key: String,
}

impl Drop for JoinGuard {
    fn drop(&mut self) {
        self.locks.release(&self.key);
    }
}

/// Characters for the random team-key suffix
const TEAM_KEY_CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Collision-resistant team key: millisecond timestamp plus a short random
/// suffix, generated synchronously (no store round trip).
pub fn generate_team_key() -> String {
    use rand::Rng;
    let millis = chrono::Utc::now().timestamp_millis();
    let mut rng = rand::rng();
    let suffix: String = (0..4)
        .map(|_| TEAM_KEY_CHARS[rng.random_range(0..TEAM_KEY_CHARS.len())] as char)
        .collect();
    format!("team_{}_{}", millis, suffix)
}
