//! Node-Verzeichnis – Zuordnung User -> Node
//!
//! Wird von vielen Sendevorgaengen gleichzeitig gelesen und nur bei
//! Attach/Detach geschrieben (Viel-Leser/Selten-Schreiber-Disziplin,
//! daher DashMap).

use dashmap::DashMap;
use klangnetz_core::types::{NodeId, UserId};

/// Externes Verzeichnis: welcher Node haelt welchen User?
pub trait NodeVerzeichnis: Send + Sync {
    /// Loest den Node auf der den User gerade haelt (None = unbekannt)
    fn node_aufloesen(&self, user: &UserId) -> Option<NodeId>;

    /// Meldet einen User an einem Node an
    fn angemeldet(&self, user: UserId, node: NodeId);

    /// Meldet einen User ab (Disconnect oder Node-Wechsel)
    fn abgemeldet(&self, user: &UserId);
}

/// In-Memory-Verzeichnis auf DashMap-Basis
///
/// Fuer Einzelprozess-Betrieb und Tests. In einem echten Cluster steht
/// hier eine extern gespeiste Implementierung.
#[derive(Default)]
pub struct SpeicherVerzeichnis {
    eintraege: DashMap<UserId, NodeId>,
}

impl SpeicherVerzeichnis {
    /// Erstellt ein neues leeres Verzeichnis
    pub fn neu() -> Self {
        Self::default()
    }

    /// Anzahl der bekannten User
    pub fn anzahl(&self) -> usize {
        self.eintraege.len()
    }
}

impl NodeVerzeichnis for SpeicherVerzeichnis {
    fn node_aufloesen(&self, user: &UserId) -> Option<NodeId> {
        self.eintraege.get(user).map(|e| *e.value())
    }

    fn angemeldet(&self, user: UserId, node: NodeId) {
        self.eintraege.insert(user, node);
        tracing::debug!(user = %user, node = %node, "User im Verzeichnis angemeldet");
    }

    fn abgemeldet(&self, user: &UserId) {
        self.eintraege.remove(user);
        tracing::debug!(user = %user, "User aus Verzeichnis abgemeldet");
    }
}
