//! Paket-Senke – Ausgangsgrenze fuer Client-Pakete
//!
//! Session- und Regions-Logik senden UI- und Medienpakete ueber diese
//! Schnittstelle, ohne zu wissen ob der Empfaenger lokal haengt oder
//! ueber das Node-Relay erreicht wird.

use klangnetz_core::types::UserId;
use klangnetz_core::Result;
use parking_lot::Mutex;

use crate::pakete::PaketPayload;

/// Ausgangsgrenze: stellt eine Payload einem bestimmten User zu
pub trait PaketSenke: Send + Sync {
    /// Reiht eine Payload fuer den Zieluser ein
    fn senden(&self, ziel: UserId, payload: PaketPayload) -> Result<()>;
}

/// Sammelnde Senke fuer Tests – zeichnet alle Sendungen auf
#[derive(Default)]
pub struct SammelSenke {
    gesendet: Mutex<Vec<(UserId, PaketPayload)>>,
}

impl SammelSenke {
    /// Erstellt eine neue leere SammelSenke
    pub fn neu() -> Self {
        Self::default()
    }

    /// Gibt eine Kopie aller aufgezeichneten Sendungen zurueck
    pub fn gesendete(&self) -> Vec<(UserId, PaketPayload)> {
        self.gesendet.lock().clone()
    }

    /// Gibt nur die Payloads fuer einen bestimmten User zurueck
    pub fn gesendete_an(&self, user: &UserId) -> Vec<PaketPayload> {
        self.gesendet
            .lock()
            .iter()
            .filter(|(uid, _)| uid == user)
            .map(|(_, p)| p.clone())
            .collect()
    }

    /// Anzahl der aufgezeichneten Sendungen
    pub fn anzahl(&self) -> usize {
        self.gesendet.lock().len()
    }

    /// Verwirft alle aufgezeichneten Sendungen
    pub fn leeren(&self) {
        self.gesendet.lock().clear();
    }
}

impl PaketSenke for SammelSenke {
    fn senden(&self, ziel: UserId, payload: PaketPayload) -> Result<()> {
        self.gesendet.lock().push((ziel, payload));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sammel_senke_zeichnet_auf() {
        let senke = SammelSenke::neu();
        let user = UserId::new();

        senke
            .senden(user, PaketPayload::Hinweis { text: "a".into() })
            .unwrap();
        senke
            .senden(UserId::new(), PaketPayload::Hinweis { text: "b".into() })
            .unwrap();

        assert_eq!(senke.anzahl(), 2);
        assert_eq!(senke.gesendete_an(&user).len(), 1);

        senke.leeren();
        assert_eq!(senke.anzahl(), 0);
    }
}
