//! Region-Modell – Raeumliche Zone mit Medienstream und Voice-Policy
//!
//! Regionen werden fuer Takeover-Zwecke ueber die Quell-Identitaet ihrer
//! Medien verglichen, niemals ueber Objektidentitaet. Teilen zwei
//! Regionen in einem Tick dieselbe Quelle, ist genau eine autoritativ:
//! deterministisch die mit der kleinsten `media_id`.

use klangnetz_core::types::Position;
use klangnetz_protocol::pakete::Medien;
use serde::{Deserialize, Serialize};

/// Eine raeumliche Region mit Medien und Voice-Chat-Policy
///
/// Extern definiert (Repository-Kollaborateur), hier nur gelesen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    /// Medienstream dieser Region
    pub medien: Medien,
    /// Darf in dieser Region Voice-Chat stattfinden?
    pub erlaubt_voice_chat: bool,
}

impl Region {
    /// Erstellt eine neue Region
    pub fn neu(medien: Medien, erlaubt_voice_chat: bool) -> Self {
        Self {
            medien,
            erlaubt_voice_chat,
        }
    }

    /// Vergleich ueber die Medien-Quelle (Diffing-Identitaet)
    pub fn gleiche_quelle(&self, andere: &Region) -> bool {
        self.medien.quelle == andere.medien.quelle
    }
}

/// Prueft ob eine Liste eine Region mit derselben Quelle enthaelt
pub fn enthaelt_quelle(liste: &[Region], region: &Region) -> bool {
    liste.iter().any(|r| r.gleiche_quelle(region))
}

/// Prueft ob eine Liste eine Region mit derselben Medien-ID enthaelt
pub fn enthaelt_media_id(liste: &[Region], region: &Region) -> bool {
    liste.iter().any(|r| r.medien.media_id == region.medien.media_id)
}

/// Dedupliziert detektierte Regionen pro Quelle
///
/// Teilen mehrere Regionen eine Quelle, bleibt deterministisch die mit
/// der lexikographisch kleinsten `media_id` uebrig. Das Ergebnis ist
/// nach `media_id` sortiert, damit die Verarbeitungsreihenfolge nie von
/// der Iterationsreihenfolge der Quelle abhaengt.
pub fn dedup_nach_quelle(mut regionen: Vec<Region>) -> Vec<Region> {
    regionen.sort_by(|a, b| a.medien.media_id.cmp(&b.medien.media_id));
    let mut ergebnis: Vec<Region> = Vec::with_capacity(regionen.len());
    for region in regionen {
        if !enthaelt_quelle(&ergebnis, &region) {
            ergebnis.push(region);
        }
    }
    ergebnis
}

/// Externe Regionsquelle: welche Regionen ueberlappen eine Position?
///
/// Darf leer liefern wenn das Feature deaktiviert ist.
pub trait RegionQuelle: Send + Sync {
    /// Gibt alle Regionen zurueck die die Position ueberlappen
    fn regionen_an(&self, position: &Position) -> Vec<Region>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(media_id: &str, quelle: &str) -> Region {
        Region::neu(
            Medien {
                media_id: media_id.into(),
                quelle: quelle.into(),
                lautstaerke: 80,
                fade_ms: 500,
            },
            true,
        )
    }

    #[test]
    fn quellen_vergleich_ignoriert_restliche_felder() {
        let a = region("a", "ambient.mp3");
        let mut b = region("b", "ambient.mp3");
        b.medien.lautstaerke = 20;

        assert!(a.gleiche_quelle(&b));
        assert!(!a.gleiche_quelle(&region("c", "andere.mp3")));
    }

    #[test]
    fn dedup_behaelt_kleinste_media_id() {
        let eingabe = vec![
            region("zeta", "ambient.mp3"),
            region("alpha", "ambient.mp3"),
            region("mitte", "wind.mp3"),
        ];

        let ergebnis = dedup_nach_quelle(eingabe);
        assert_eq!(ergebnis.len(), 2);
        assert_eq!(ergebnis[0].medien.media_id, "alpha");
        assert_eq!(ergebnis[1].medien.media_id, "mitte");
    }

    #[test]
    fn dedup_ist_reihenfolge_unabhaengig() {
        let a = vec![region("zeta", "q"), region("alpha", "q")];
        let b = vec![region("alpha", "q"), region("zeta", "q")];
        assert_eq!(dedup_nach_quelle(a), dedup_nach_quelle(b));
    }
}
