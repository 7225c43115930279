//! Verbindungs-Register – Alle lebenden Verbindungen dieses Nodes
//!
//! Attach und Detach pflegen gleichzeitig das Node-Verzeichnis des
//! Relays, damit andere Nodes den User hierher aufloesen koennen.
//! Die Verbindungen selbst werden nur vom Tick-Thread mutiert; das
//! Register wird daneben vom Empfangspfad gelesen (DashMap).

use dashmap::DashMap;
use klangnetz_core::types::{NodeId, UserId};
use klangnetz_relay::verzeichnis::NodeVerzeichnis;
use parking_lot::Mutex;
use std::sync::Arc;

use crate::verbindung::Verbindung;

/// Register aller Verbindungen die dieser Node haelt
///
/// Thread-safe und `Clone`-faehig (innerer Arc).
#[derive(Clone)]
pub struct VerbindungsRegister {
    inner: Arc<RegisterInnen>,
}

struct RegisterInnen {
    node_id: NodeId,
    verzeichnis: Arc<dyn NodeVerzeichnis>,
    verbindungen: DashMap<UserId, Arc<Mutex<Verbindung>>>,
}

impl VerbindungsRegister {
    /// Erstellt ein neues leeres Register
    pub fn neu(node_id: NodeId, verzeichnis: Arc<dyn NodeVerzeichnis>) -> Self {
        Self {
            inner: Arc::new(RegisterInnen {
                node_id,
                verzeichnis,
                verbindungen: DashMap::new(),
            }),
        }
    }

    /// Meldet einen User an diesem Node an
    ///
    /// Genau eine lebende Verbindung pro User pro Node: ein erneutes
    /// Anmelden ersetzt die alte Verbindung.
    pub fn anmelden(&self, user_id: UserId, auth_token: impl Into<String>) -> Arc<Mutex<Verbindung>> {
        let verbindung = Arc::new(Mutex::new(Verbindung::neu(user_id, auth_token)));
        if self
            .inner
            .verbindungen
            .insert(user_id, Arc::clone(&verbindung))
            .is_some()
        {
            tracing::warn!(user = %user_id, "Bestehende Verbindung beim Anmelden ersetzt");
        }
        self.inner.verzeichnis.angemeldet(user_id, self.inner.node_id);
        tracing::info!(user = %user_id, node = %self.inner.node_id, "User angemeldet");
        verbindung
    }

    /// Meldet einen User ab und gibt seine Verbindung zurueck
    pub fn abmelden(&self, user_id: &UserId) -> Option<Arc<Mutex<Verbindung>>> {
        let entfernt = self.inner.verbindungen.remove(user_id).map(|(_, v)| v);
        if entfernt.is_some() {
            self.inner.verzeichnis.abgemeldet(user_id);
            tracing::info!(user = %user_id, "User abgemeldet");
        }
        entfernt
    }

    /// Gibt die Verbindung eines Users zurueck (falls lokal gehalten)
    pub fn holen(&self, user_id: &UserId) -> Option<Arc<Mutex<Verbindung>>> {
        self.inner.verbindungen.get(user_id).map(|e| Arc::clone(e.value()))
    }

    /// Gibt alle lebenden Verbindungen zurueck (fuer den Tick-Durchlauf)
    pub fn alle(&self) -> Vec<Arc<Mutex<Verbindung>>> {
        self.inner
            .verbindungen
            .iter()
            .map(|e| Arc::clone(e.value()))
            .collect()
    }

    /// Anzahl der lebenden Verbindungen
    pub fn anzahl(&self) -> usize {
        self.inner.verbindungen.len()
    }
}
