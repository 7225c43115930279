//! Node-Relay – Versand und Empfang adressierter Umschlaege
//!
//! `an_user_senden` loest den Ziel-Node ueber das Verzeichnis auf und
//! veroeffentlicht den Umschlag auf dem Bus; nur der Node der den User
//! haelt verarbeitet ihn. `rundruf` erreicht jeden abonnierten Node.
//!
//! Eingehende Umschlaege werden zuerst ueber den Header-Peek geprueft:
//! an-andere-adressierte Umschlaege werden verworfen ohne die Payload
//! zu deserialisieren.

use bytes::Bytes;
use klangnetz_core::types::{NodeId, UserId};
use klangnetz_core::{KlangnetzFehler, Result};
use klangnetz_protocol::pakete::PaketPayload;
use klangnetz_protocol::register::HandlerRegister;
use klangnetz_protocol::senke::PaketSenke;
use klangnetz_protocol::wire::{self, PaketUmschlag};
use std::sync::Arc;

use crate::bus::{BusKanal, NachrichtenBus};
use crate::verzeichnis::NodeVerzeichnis;

/// Relay eines einzelnen Nodes
///
/// Thread-safe und `Clone`-faehig (innere Arcs).
#[derive(Clone)]
pub struct NodeRelay {
    node_id: NodeId,
    verzeichnis: Arc<dyn NodeVerzeichnis>,
    bus: Arc<dyn NachrichtenBus>,
}

impl NodeRelay {
    /// Erstellt ein neues Relay fuer diesen Node
    pub fn neu(
        node_id: NodeId,
        verzeichnis: Arc<dyn NodeVerzeichnis>,
        bus: Arc<dyn NachrichtenBus>,
    ) -> Self {
        Self {
            node_id,
            verzeichnis,
            bus,
        }
    }

    /// Gibt die NodeId dieses Relays zurueck
    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    /// Welcher Bus-Kanal traegt diese Payload-Klasse?
    fn kanal_fuer(payload: &PaketPayload) -> BusKanal {
        if payload.ist_state_sync() {
            BusKanal::StateSync
        } else {
            BusKanal::Steuerung
        }
    }

    /// Sendet eine Payload an einen bestimmten User
    ///
    /// # Fehler
    /// `EmpfaengerUnbekannt` wenn das Verzeichnis den User nicht kennt.
    /// In dem Fall wird nichts veroeffentlicht und nicht automatisch
    /// wiederholt – der Aufrufer entscheidet ueber Verwerfen oder Queuen.
    pub fn an_user_senden(&self, ziel: UserId, payload: &PaketPayload) -> Result<()> {
        if self.verzeichnis.node_aufloesen(&ziel).is_none() {
            return Err(KlangnetzFehler::EmpfaengerUnbekannt(ziel));
        }

        let umschlag = PaketUmschlag::neu(self.node_id, Some(ziel), payload)?;
        self.veroeffentlichen(Self::kanal_fuer(payload), umschlag)
    }

    /// Sendet eine Payload unadressiert an alle Nodes
    pub fn rundruf(&self, payload: &PaketPayload) -> Result<()> {
        let umschlag = PaketUmschlag::neu(self.node_id, None, payload)?;
        self.veroeffentlichen(Self::kanal_fuer(payload), umschlag)
    }

    fn veroeffentlichen(&self, kanal: BusKanal, umschlag: PaketUmschlag) -> Result<()> {
        let bytes = umschlag.kodieren();
        tracing::trace!(
            typ = ?umschlag.typ,
            ziel = ?umschlag.ziel.map(|z| z.to_string()),
            kanal = kanal.name(),
            groesse = bytes.len(),
            "Umschlag veroeffentlicht"
        );
        self.bus.veroeffentlichen(kanal, bytes)
    }

    /// Prueft eingehende Bus-Bytes und dekodiert sie wenn dieser Node
    /// zustaendig ist
    ///
    /// Gibt `None` zurueck wenn der Umschlag an einen User adressiert ist
    /// den ein anderer Node haelt – dafuer wird nur der Header gelesen.
    /// Dekodierfehler gibt der Aufrufer als "verwerfen und weiter" auf.
    pub fn eingang_pruefen(&self, bytes: &Bytes) -> Result<Option<PaketUmschlag>> {
        if let Some(ziel) = wire::ziel_spaehen(bytes)? {
            if self.verzeichnis.node_aufloesen(&ziel) != Some(self.node_id) {
                return Ok(None);
            }
        }
        PaketUmschlag::dekodieren(bytes).map(Some)
    }

    /// Verarbeitet eingehende Bus-Bytes direkt ueber die Registry
    ///
    /// Gibt `true` zurueck wenn der Umschlag fuer diesen Node war und
    /// dispatcht wurde. Convenience-Pfad fuer Tests; im Serverbetrieb
    /// laeuft der Dispatch ueber die Tick-Warteschlange.
    pub fn empfangen(&self, bytes: &Bytes, register: &HandlerRegister) -> Result<bool> {
        match self.eingang_pruefen(bytes)? {
            Some(umschlag) => {
                register.dispatch(&umschlag)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl PaketSenke for NodeRelay {
    fn senden(&self, ziel: UserId, payload: PaketPayload) -> Result<()> {
        self.an_user_senden(ziel, &payload)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
