//! # Admission registry: the only state shared between players.
//!
//! ```text
//! SessionController #1 ─┐
//! SessionController #2 ─┼──► Arc<AdmissionRegistry> ──► Mutex<Slots>
//! SessionController #N ─┘                                (token → {tag, run})
//!
//! reserve(tag)        → live < max ?  insert token        : denied
//! confirm(token, run) → live(token) && confirmed < max ? attach run : denied
//! release(token)      → remove token (no-op when unknown)
//! ```
//!
//! All three operations take the same lock, so no caller ever observes a
//! partial update.

use std::collections::HashMap;

use parking_lot::Mutex;

use super::token::SlotToken;

/// Outcome of [`AdmissionRegistry::reserve`] and [`AdmissionRegistry::confirm`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Admission {
    /// Whether the request was admitted.
    pub allowed: bool,
    /// The token the outcome refers to (`None` when a reservation was refused).
    pub token: Option<SlotToken>,
    /// Live tokens after the operation.
    pub active_count: usize,
}

#[derive(Debug)]
struct SlotEntry {
    client_tag: String,
    run_id: Option<String>,
}

#[derive(Debug)]
struct Slots {
    max: usize,
    live: HashMap<SlotToken, SlotEntry>,
}

impl Slots {
    fn confirmed(&self) -> usize {
        self.live.values().filter(|e| e.run_id.is_some()).count()
    }
}

/// Mutex-guarded table of reserved runtime slots.
///
/// Create one per process and share it (`Arc`) between players; tests create
/// independent registries per case.
#[derive(Debug)]
pub struct AdmissionRegistry {
    slots: Mutex<Slots>,
}

impl AdmissionRegistry {
    /// Creates a registry admitting at most `max` concurrent slots (clamped to at least 1).
    pub fn new(max: usize) -> Self {
        Self {
            slots: Mutex::new(Slots {
                max: max.max(1),
                live: HashMap::new(),
            }),
        }
    }

    /// Reserves a slot for `client_tag` if the cap allows it.
    pub fn reserve(&self, client_tag: &str) -> Admission {
        let mut slots = self.slots.lock();
        if slots.live.len() >= slots.max {
            tracing::debug!(client_tag, active = slots.live.len(), max = slots.max, "slot reservation denied");
            return Admission {
                allowed: false,
                token: None,
                active_count: slots.live.len(),
            };
        }

        let token = SlotToken::fresh();
        slots.live.insert(
            token,
            SlotEntry {
                client_tag: client_tag.to_string(),
                run_id: None,
            },
        );
        Admission {
            allowed: true,
            token: Some(token),
            active_count: slots.live.len(),
        }
    }

    /// Associates a live token with the run the backend just established.
    ///
    /// Fails when the token is no longer live, or when confirming it would put
    /// more confirmed runs than the cap allows. On failure the caller must
    /// release the token and abort the run.
    pub fn confirm(&self, token: SlotToken, run_id: &str) -> Admission {
        let mut slots = self.slots.lock();
        let active_count = slots.live.len();
        let already = slots
            .live
            .get(&token)
            .map(|e| e.run_id.is_some());

        let allowed = match already {
            None => false,
            Some(true) => true,
            Some(false) => slots.confirmed() < slots.max,
        };

        if allowed {
            if let Some(entry) = slots.live.get_mut(&token) {
                entry.run_id = Some(run_id.to_string());
            }
        } else {
            tracing::debug!(%token, run_id, active = active_count, "slot confirmation denied");
        }

        Admission {
            allowed,
            token: Some(token),
            active_count,
        }
    }

    /// Releases a token. Unknown or already released tokens are ignored.
    ///
    /// Returns `true` if the token was live.
    pub fn release(&self, token: SlotToken) -> bool {
        let mut slots = self.slots.lock();
        match slots.live.remove(&token) {
            Some(entry) => {
                tracing::debug!(%token, client_tag = %entry.client_tag, run_id = ?entry.run_id, "slot released");
                true
            }
            None => false,
        }
    }

    /// Number of live tokens.
    pub fn active_count(&self) -> usize {
        self.slots.lock().live.len()
    }

    /// Current cap.
    pub fn max_concurrent(&self) -> usize {
        self.slots.lock().max
    }

    /// Changes the cap. Existing tokens are kept; a lowered cap refuses new
    /// reservations and confirmations until enough slots are released.
    pub fn set_max_concurrent(&self, max: usize) {
        self.slots.lock().max = max.max(1);
    }
}
