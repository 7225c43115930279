//! Wire-Format fuer den Node-Bus
//!
//! Binaerer Umschlag-Header + JSON-Payload:
//!
//! ```text
//! +--------+--------+-------+----------------+----------------+--------+----...----+
//! | Typ (u16 BE)    | Flags | Quelle (16 B)  | Ziel (16 B)*   | Laenge | Payload   |
//! +--------+--------+-------+----------------+----------------+--------+----...----+
//! ```
//!
//! *Ziel nur vorhanden wenn Flag-Bit 0 gesetzt ist. Die Laenge (u32 BE)
//! gibt die Anzahl der Payload-Bytes an. Ein Node der nicht Empfaenger
//! eines adressierten Umschlags ist kann das ueber `ziel_spaehen`
//! erkennen ohne die Payload zu deserialisieren.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use klangnetz_core::types::{NodeId, UserId};
use klangnetz_core::{KlangnetzFehler, Result};
use uuid::Uuid;

use crate::pakete::{PaketPayload, PaketTyp};

// ---------------------------------------------------------------------------
// Konstanten
// ---------------------------------------------------------------------------

/// Maximale Payload-Groesse (1 MB)
pub const MAX_PAYLOAD_GROESSE: usize = 1024 * 1024;

/// Groesse des Headers ohne Ziel: Typ (2) + Flags (1) + Quelle (16) + Laenge (4)
const HEADER_OHNE_ZIEL: usize = 2 + 1 + 16 + 4;

/// Flag-Bit: Umschlag ist an einen bestimmten User adressiert
const FLAG_ZIEL: u8 = 0b0000_0001;

// ---------------------------------------------------------------------------
// PaketUmschlag
// ---------------------------------------------------------------------------

/// Ein typisierter, einmal konsumierter Umschlag auf dem Node-Bus
///
/// Unveraenderlich nach dem Erstellen: der Sender baut ihn, genau ein
/// Empfaenger-Dispatcher konsumiert ihn, danach wird er verworfen.
/// `quelle` ist reine Herkunftsangabe – Ziele sind immer User, nie Nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct PaketUmschlag {
    /// Pakettyp fuer die Dispatch-Tabelle
    pub typ: PaketTyp,
    /// Herkunfts-Node
    pub quelle: NodeId,
    /// Adressierter User (None = Rundruf an alle Nodes)
    pub ziel: Option<UserId>,
    /// Serialisierte Payload-Bytes
    pub payload: Bytes,
}

impl PaketUmschlag {
    /// Erstellt einen Umschlag aus einer Payload
    pub fn neu(quelle: NodeId, ziel: Option<UserId>, payload: &PaketPayload) -> Result<Self> {
        let bytes = serde_json::to_vec(payload)
            .map_err(|e| KlangnetzFehler::intern(format!("Payload-Serialisierung: {e}")))?;
        if bytes.len() > MAX_PAYLOAD_GROESSE {
            return Err(KlangnetzFehler::intern(format!(
                "Payload zu gross: {} Bytes (Maximum: {} Bytes)",
                bytes.len(),
                MAX_PAYLOAD_GROESSE
            )));
        }
        Ok(Self {
            typ: payload.typ(),
            quelle,
            ziel,
            payload: Bytes::from(bytes),
        })
    }

    /// Kodiert den Umschlag in das Wire-Format
    pub fn kodieren(&self) -> Bytes {
        let ziel_groesse = if self.ziel.is_some() { 16 } else { 0 };
        let mut buf = BytesMut::with_capacity(HEADER_OHNE_ZIEL + ziel_groesse + self.payload.len());

        buf.put_u16(self.typ as u16);
        buf.put_u8(if self.ziel.is_some() { FLAG_ZIEL } else { 0 });
        buf.put_slice(self.quelle.inner().as_bytes());
        if let Some(ziel) = &self.ziel {
            buf.put_slice(ziel.inner().as_bytes());
        }
        buf.put_u32(self.payload.len() as u32);
        buf.put_slice(&self.payload);

        buf.freeze()
    }

    /// Dekodiert einen Umschlag aus Wire-Bytes
    ///
    /// # Fehler
    /// `Dekodierfehler` bei zu kurzem Buffer oder falscher Laenge,
    /// `UnbekannterTyp` bei einer unbekannten Typ-Nummer. Beide sind
    /// fuer den Aufrufer "verwerfen und weitermachen", niemals fatal.
    pub fn dekodieren(bytes: &[u8]) -> Result<Self> {
        let mut buf = bytes;
        if buf.remaining() < 3 {
            return Err(KlangnetzFehler::Dekodierfehler(
                "Umschlag-Header zu kurz".into(),
            ));
        }

        let typ = PaketTyp::try_from(buf.get_u16())?;
        let flags = buf.get_u8();
        let ziel_vorhanden = flags & FLAG_ZIEL != 0;

        let erwartet = 16 + if ziel_vorhanden { 16 } else { 0 } + 4;
        if buf.remaining() < erwartet {
            return Err(KlangnetzFehler::Dekodierfehler(
                "Umschlag-Header unvollstaendig".into(),
            ));
        }

        let quelle = NodeId(uuid_lesen(&mut buf));
        let ziel = if ziel_vorhanden {
            Some(UserId(uuid_lesen(&mut buf)))
        } else {
            None
        };

        let laenge = buf.get_u32() as usize;
        if laenge > MAX_PAYLOAD_GROESSE {
            return Err(KlangnetzFehler::Dekodierfehler(format!(
                "Payload zu gross: {laenge} Bytes"
            )));
        }
        if buf.remaining() != laenge {
            return Err(KlangnetzFehler::Dekodierfehler(format!(
                "Payload-Laenge {laenge} passt nicht zu {} verbleibenden Bytes",
                buf.remaining()
            )));
        }

        Ok(Self {
            typ,
            quelle,
            ziel,
            payload: Bytes::copy_from_slice(buf),
        })
    }

    /// Deserialisiert die Payload und prueft die Typ-Konsistenz
    pub fn payload_dekodieren(&self) -> Result<PaketPayload> {
        let payload: PaketPayload = serde_json::from_slice(&self.payload)
            .map_err(|e| KlangnetzFehler::Dekodierfehler(format!("Payload-JSON: {e}")))?;
        if payload.typ() != self.typ {
            return Err(KlangnetzFehler::Dekodierfehler(format!(
                "Typ im Header ({:?}) widerspricht der Payload ({:?})",
                self.typ,
                payload.typ()
            )));
        }
        Ok(payload)
    }
}

/// Liest das Ziel eines Umschlags ohne die Payload zu deserialisieren
///
/// Billiger Pfad fuer Nodes die an-andere-adressierte Umschlaege
/// ignorieren muessen. `None` = Rundruf.
pub fn ziel_spaehen(bytes: &[u8]) -> Result<Option<UserId>> {
    let mut buf = bytes;
    if buf.remaining() < 3 + 16 {
        return Err(KlangnetzFehler::Dekodierfehler(
            "Umschlag-Header zu kurz".into(),
        ));
    }
    buf.advance(2); // Typ
    let flags = buf.get_u8();
    if flags & FLAG_ZIEL == 0 {
        return Ok(None);
    }
    buf.advance(16); // Quelle
    if buf.remaining() < 16 {
        return Err(KlangnetzFehler::Dekodierfehler(
            "Ziel-Feld unvollstaendig".into(),
        ));
    }
    Ok(Some(UserId(uuid_lesen(&mut buf))))
}

fn uuid_lesen(buf: &mut &[u8]) -> Uuid {
    let mut b = [0u8; 16];
    buf.copy_to_slice(&mut b);
    Uuid::from_bytes(b)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn test_payload() -> PaketPayload {
        PaketPayload::Hinweis {
            text: "Du hast eine stumme Region betreten".into(),
        }
    }

    #[test]
    fn umschlag_kodieren_dekodieren_round_trip() {
        let quelle = NodeId::new();
        let ziel = UserId::new();
        let original = PaketUmschlag::neu(quelle, Some(ziel), &test_payload()).unwrap();

        let bytes = original.kodieren();
        let dekodiert = PaketUmschlag::dekodieren(&bytes).unwrap();

        assert_eq!(dekodiert, original);
        assert_eq!(dekodiert.payload_dekodieren().unwrap(), test_payload());
    }

    #[test]
    fn rundruf_ohne_ziel() {
        let umschlag = PaketUmschlag::neu(NodeId::new(), None, &test_payload()).unwrap();
        let bytes = umschlag.kodieren();

        let dekodiert = PaketUmschlag::dekodieren(&bytes).unwrap();
        assert!(dekodiert.ziel.is_none());
        assert_eq!(ziel_spaehen(&bytes).unwrap(), None);
    }

    #[test]
    fn ziel_spaehen_liest_nur_den_header() {
        let ziel = UserId::new();
        let umschlag = PaketUmschlag::neu(NodeId::new(), Some(ziel), &test_payload()).unwrap();
        let mut bytes = umschlag.kodieren().to_vec();

        // Payload absichtlich zerstoeren – der Peek darf sie nicht anfassen
        let len = bytes.len();
        bytes[len - 1] = 0xFF;
        assert_eq!(ziel_spaehen(&bytes).unwrap(), Some(ziel));
    }

    #[test]
    fn zu_kurzer_buffer_wird_abgelehnt() {
        let ergebnis = PaketUmschlag::dekodieren(&[0x00, 0x01]);
        assert!(matches!(
            ergebnis,
            Err(KlangnetzFehler::Dekodierfehler(_))
        ));
    }

    #[test]
    fn unbekannter_typ_im_header() {
        let mut buf = BytesMut::new();
        buf.put_u16(4242);
        buf.put_u8(0);
        buf.put_slice(Uuid::nil().as_bytes());
        buf.put_u32(0);

        let ergebnis = PaketUmschlag::dekodieren(&buf);
        assert!(matches!(
            ergebnis,
            Err(KlangnetzFehler::UnbekannterTyp(4242))
        ));
    }

    #[test]
    fn falsche_payload_laenge_wird_abgelehnt() {
        let umschlag = PaketUmschlag::neu(NodeId::new(), None, &test_payload()).unwrap();
        let mut bytes = umschlag.kodieren().to_vec();
        bytes.pop(); // ein Payload-Byte abschneiden

        let ergebnis = PaketUmschlag::dekodieren(&bytes);
        assert!(matches!(
            ergebnis,
            Err(KlangnetzFehler::Dekodierfehler(_))
        ));
    }

    #[test]
    fn typ_header_muss_zur_payload_passen() {
        let umschlag = PaketUmschlag::neu(NodeId::new(), None, &test_payload()).unwrap();
        let mut manipuliert = umschlag.clone();
        manipuliert.typ = PaketTyp::MediaStart;

        let ergebnis = manipuliert.payload_dekodieren();
        assert!(matches!(
            ergebnis,
            Err(KlangnetzFehler::Dekodierfehler(_))
        ));
    }
}
