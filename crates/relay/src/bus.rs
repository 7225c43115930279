//! Nachrichten-Bus – Opaker Pub/Sub-Transport zwischen Nodes
//!
//! Der Bus traegt fertig kodierte Umschlag-Bytes. Zwei logische Kanaele
//! trennen die Nachrichtenklassen, damit State-Sync und Steuerkommandos
//! sich nicht gegenseitig umsortieren koennen.

use bytes::Bytes;
use klangnetz_core::Result;
use tokio::sync::broadcast;

/// Kapazitaet pro Bus-Kanal (Umschlaege)
const KANAL_KAPAZITAET: usize = 256;

/// Logische Bus-Kanaele, je einer pro Nachrichtenklasse
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BusKanal {
    /// Zustandssynchronisation (ClientState-Resyncs)
    StateSync,
    /// Steuerkommandos (Medien, UI, Hinweise)
    Steuerung,
}

impl BusKanal {
    /// Kanalname auf dem Transport-Substrat
    pub fn name(&self) -> &'static str {
        match self {
            Self::StateSync => "klangnetz.state",
            Self::Steuerung => "klangnetz.steuerung",
        }
    }
}

/// Opaker Pub/Sub-Bus zwischen allen Nodes
///
/// Die Implementierung (Redis, NATS, in-memory) ist austauschbar. Die
/// einzige Annahme: Publish-Reihenfolge bleibt pro Kanal erhalten.
pub trait NachrichtenBus: Send + Sync {
    /// Veroeffentlicht Umschlag-Bytes auf einem Kanal (best-effort)
    fn veroeffentlichen(&self, kanal: BusKanal, bytes: Bytes) -> Result<()>;

    /// Abonniert einen Kanal
    fn abonnieren(&self, kanal: BusKanal) -> broadcast::Receiver<Bytes>;
}

/// In-Memory-Bus fuer Einzelprozess-Betrieb und Tests
///
/// Tokio-Broadcast pro Kanal; langsame Abonnenten verlieren Nachrichten
/// (Lag), was der best-effort-Semantik eines echten Busses entspricht.
pub struct SpeicherBus {
    state_sync: broadcast::Sender<Bytes>,
    steuerung: broadcast::Sender<Bytes>,
}

impl SpeicherBus {
    /// Erstellt einen neuen Bus mit Standard-Kapazitaet
    pub fn neu() -> Self {
        let (state_sync, _) = broadcast::channel(KANAL_KAPAZITAET);
        let (steuerung, _) = broadcast::channel(KANAL_KAPAZITAET);
        Self {
            state_sync,
            steuerung,
        }
    }

    fn sender(&self, kanal: BusKanal) -> &broadcast::Sender<Bytes> {
        match kanal {
            BusKanal::StateSync => &self.state_sync,
            BusKanal::Steuerung => &self.steuerung,
        }
    }
}

impl Default for SpeicherBus {
    fn default() -> Self {
        Self::neu()
    }
}

impl NachrichtenBus for SpeicherBus {
    fn veroeffentlichen(&self, kanal: BusKanal, bytes: Bytes) -> Result<()> {
        // Kein Abonnent ist kein Fehler – best-effort Zustellung
        if self.sender(kanal).send(bytes).is_err() {
            tracing::trace!(kanal = kanal.name(), "Keine Abonnenten – Umschlag verfaellt");
        }
        Ok(())
    }

    fn abonnieren(&self, kanal: BusKanal) -> broadcast::Receiver<Bytes> {
        self.sender(kanal).subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn veroeffentlichen_erreicht_alle_abonnenten() {
        let bus = SpeicherBus::neu();
        let mut rx1 = bus.abonnieren(BusKanal::Steuerung);
        let mut rx2 = bus.abonnieren(BusKanal::Steuerung);

        bus.veroeffentlichen(BusKanal::Steuerung, Bytes::from_static(b"paket"))
            .unwrap();

        assert_eq!(rx1.try_recv().unwrap(), Bytes::from_static(b"paket"));
        assert_eq!(rx2.try_recv().unwrap(), Bytes::from_static(b"paket"));
    }

    #[test]
    fn kanaele_sind_getrennt() {
        let bus = SpeicherBus::neu();
        let mut state_rx = bus.abonnieren(BusKanal::StateSync);
        let mut steuer_rx = bus.abonnieren(BusKanal::Steuerung);

        bus.veroeffentlichen(BusKanal::StateSync, Bytes::from_static(b"s"))
            .unwrap();

        assert!(state_rx.try_recv().is_ok());
        assert!(steuer_rx.try_recv().is_err(), "falscher Kanal");
    }

    #[test]
    fn ohne_abonnenten_kein_fehler() {
        let bus = SpeicherBus::neu();
        assert!(bus
            .veroeffentlichen(BusKanal::Steuerung, Bytes::from_static(b"x"))
            .is_ok());
    }

    #[test]
    fn reihenfolge_pro_kanal_bleibt_erhalten() {
        let bus = SpeicherBus::neu();
        let mut rx = bus.abonnieren(BusKanal::Steuerung);

        for i in 0u8..5 {
            bus.veroeffentlichen(BusKanal::Steuerung, Bytes::copy_from_slice(&[i]))
                .unwrap();
        }
        for i in 0u8..5 {
            assert_eq!(rx.try_recv().unwrap()[0], i);
        }
    }
}
