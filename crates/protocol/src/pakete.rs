//! Paket-Payloads des Klangnetz-Protokolls
//!
//! Jede Payload-Variante hat einen stabilen numerischen `PaketTyp` fuer
//! die Dispatch-Tabelle und den Umschlag-Header. Die Payload selbst wird
//! als JSON serialisiert (nicht zeitkritisch, Bus-Pfad).
//!
//! ## Design
//! - Tagged Enum fuer typsichere Payloads
//! - Explizite Typ-Tabelle statt Laufzeit-Typdispatch
//! - `ClientState` ist immer ein vollstaendiger Resync: der Empfaenger
//!   kann aus einem einzelnen Paket resynchronisieren, auch wenn
//!   Zwischenstaende verloren gingen

use klangnetz_core::types::UserId;
use klangnetz_core::{KlangnetzFehler, Result};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Pakettypen
// ---------------------------------------------------------------------------

/// Stabile numerische Kennungen aller Pakettypen
///
/// Die Nummern sind Teil des Wire-Formats und duerfen nicht umsortiert
/// werden.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum PaketTyp {
    /// Vollstaendiger Verbindungs-/RTC-Zustand eines Clients
    ClientState = 1,
    /// Voice-Blur-Umschalter im Client-UI
    VoiceBlurUi = 2,
    /// Medienwiedergabe starten
    MediaStart = 3,
    /// Parameter einer laufenden Wiedergabe aktualisieren (Takeover)
    MediaUpdate = 4,
    /// Medienwiedergabe mit Fade-Out beenden
    MediaStop = 5,
    /// Lokalisierter Hinweistext an den Benutzer
    Hinweis = 6,
    /// Voice-Peer in Hoerweite aufgetaucht
    VoicePeerHinzu = 7,
    /// Voice-Peer hat die Hoerweite verlassen
    VoicePeerWeg = 8,
}

impl TryFrom<u16> for PaketTyp {
    type Error = KlangnetzFehler;

    fn try_from(wert: u16) -> Result<Self> {
        match wert {
            1 => Ok(Self::ClientState),
            2 => Ok(Self::VoiceBlurUi),
            3 => Ok(Self::MediaStart),
            4 => Ok(Self::MediaUpdate),
            5 => Ok(Self::MediaStop),
            6 => Ok(Self::Hinweis),
            7 => Ok(Self::VoicePeerHinzu),
            8 => Ok(Self::VoicePeerWeg),
            andere => Err(KlangnetzFehler::UnbekannterTyp(andere)),
        }
    }
}

// ---------------------------------------------------------------------------
// Medien
// ---------------------------------------------------------------------------

/// Beschreibung eines Medienstreams einer Region
///
/// Regionen werden fuer das Diffing ueber `quelle` verglichen, nicht
/// ueber Objektidentitaet: zwei Regionen mit derselben Quelle sind
/// dieselbe Region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Medien {
    /// Eindeutige Medien-ID (Wiedergabe-Instanz beim Client)
    pub media_id: String,
    /// Quell-Identitaet (URL oder Stream-Name)
    pub quelle: String,
    /// Lautstaerke 0-100
    pub lautstaerke: u8,
    /// Fade-Dauer in Millisekunden (Ein- und Ausblenden)
    pub fade_ms: u32,
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// Vollstaendiger Verbindungs- und RTC-Zustand eines Clients
///
/// Wird bei jeder beobachtbaren Zustandsaenderung komplett neu aus den
/// aktuellen Feldern berechnet und gesendet – kein Diffing auf der
/// Wire-Ebene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientStatePayload {
    pub user_id: UserId,
    /// Opaker Voice-Channel-Token dieser Verbindung
    pub stream_key: String,
    /// Ist der Client mit Voice verbunden?
    pub verbunden: bool,
    /// Ist das Mikrofon aktiviert?
    pub mikrofon_aktiv: bool,
    /// Hat der Client sich selbst taub geschaltet?
    pub taub: bool,
    /// Opaker Auth-Token (wird unveraendert weitergereicht)
    pub auth_token: String,
    /// Lautstaerke 0-100
    pub lautstaerke: u8,
}

/// Alle Paket-Payloads des Klangnetz-Protokolls
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "typ", content = "daten", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaketPayload {
    /// Vollstaendiger Client-Zustand (Resync)
    ClientState(ClientStatePayload),
    /// Voice-UI verschwimmen lassen (true) oder freigeben (false)
    VoiceBlurUi { aktiv: bool },
    /// Medienwiedergabe starten
    MediaStart { medien: Medien },
    /// Laufende Wiedergabe uebernimmt die Parameter einer neuen Region
    MediaUpdate {
        media_id: String,
        lautstaerke: u8,
        fade_ms: u32,
    },
    /// Wiedergabe mit Fade-Out beenden
    MediaStop { media_id: String, fade_ms: u32 },
    /// Lokalisierter Hinweistext
    Hinweis { text: String },
    /// Neuer Voice-Peer in Hoerweite
    VoicePeerHinzu { user_id: UserId, stream_key: String },
    /// Voice-Peer hat die Hoerweite verlassen
    VoicePeerWeg { user_id: UserId },
}

impl PaketPayload {
    /// Gibt den Pakettyp dieser Payload zurueck
    pub fn typ(&self) -> PaketTyp {
        match self {
            Self::ClientState(_) => PaketTyp::ClientState,
            Self::VoiceBlurUi { .. } => PaketTyp::VoiceBlurUi,
            Self::MediaStart { .. } => PaketTyp::MediaStart,
            Self::MediaUpdate { .. } => PaketTyp::MediaUpdate,
            Self::MediaStop { .. } => PaketTyp::MediaStop,
            Self::Hinweis { .. } => PaketTyp::Hinweis,
            Self::VoicePeerHinzu { .. } => PaketTyp::VoicePeerHinzu,
            Self::VoicePeerWeg { .. } => PaketTyp::VoicePeerWeg,
        }
    }

    /// Zustandssynchronisation und Steuerkommandos laufen auf getrennten
    /// Bus-Kanaelen, damit sich die Nachrichtenklassen nicht gegenseitig
    /// umsortieren koennen. `true` = State-Sync-Klasse.
    pub fn ist_state_sync(&self) -> bool {
        matches!(self, Self::ClientState(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typ_tabelle_round_trip() {
        for nummer in 1u16..=8 {
            let typ = PaketTyp::try_from(nummer).expect("Typ muss bekannt sein");
            assert_eq!(typ as u16, nummer);
        }
    }

    #[test]
    fn unbekannter_typ_wird_abgelehnt() {
        let ergebnis = PaketTyp::try_from(999);
        assert!(matches!(
            ergebnis,
            Err(KlangnetzFehler::UnbekannterTyp(999))
        ));
    }

    #[test]
    fn payload_typ_zuordnung() {
        let p = PaketPayload::VoiceBlurUi { aktiv: true };
        assert_eq!(p.typ(), PaketTyp::VoiceBlurUi);

        let p = PaketPayload::MediaStop {
            media_id: "m1".into(),
            fade_ms: 500,
        };
        assert_eq!(p.typ(), PaketTyp::MediaStop);
    }

    #[test]
    fn client_state_serde_round_trip() {
        let payload = PaketPayload::ClientState(ClientStatePayload {
            user_id: UserId::new(),
            stream_key: "sk-42".into(),
            verbunden: true,
            mikrofon_aktiv: false,
            taub: false,
            auth_token: "token".into(),
            lautstaerke: 80,
        });
        let json = serde_json::to_string(&payload).unwrap();
        let zurueck: PaketPayload = serde_json::from_str(&json).unwrap();
        assert_eq!(payload, zurueck);
    }

    #[test]
    fn nachrichtenklassen_trennung() {
        let state = PaketPayload::ClientState(ClientStatePayload {
            user_id: UserId::new(),
            stream_key: String::new(),
            verbunden: false,
            mikrofon_aktiv: false,
            taub: false,
            auth_token: String::new(),
            lautstaerke: 100,
        });
        assert!(state.ist_state_sync());
        assert!(!PaketPayload::Hinweis { text: "hi".into() }.ist_state_sync());
    }
}
