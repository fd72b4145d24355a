use std::fmt;

use uuid::Uuid;

/// Opaque admission ticket handed out by [`AdmissionRegistry::reserve`](super::AdmissionRegistry::reserve).
///
/// Tokens are unique per reservation and never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SlotToken(Uuid);

impl SlotToken {
    pub(super) fn fresh() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SlotToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot-{}", self.0.simple())
    }
}
