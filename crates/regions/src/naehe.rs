//! Naehe-Verfolger – Voice-Peers in Hoerweite
//!
//! Diffed pro Tick die Menge der Teilnehmer-Paare in Hoerweite und
//! teilt beiden Seiten neue bzw. verlorene Peers mit. Paare sind
//! ungerichtet; die kanonische Form ist die mit der kleineren UserId
//! zuerst.

use std::collections::HashSet;
use std::sync::Arc;

use klangnetz_core::types::{Position, UserId};
use klangnetz_core::{KlangnetzFehler, Result};
use klangnetz_protocol::pakete::PaketPayload;
use klangnetz_protocol::senke::PaketSenke;

use crate::sicht::SichtOrakel;

/// Momentaufnahme eines Teilnehmers fuer die Naehe-Berechnung
#[derive(Debug, Clone)]
pub struct NaehenTeilnehmer {
    pub user_id: UserId,
    pub position: Position,
    /// Voice-Channel-Token, den der Peer zum Verbinden braucht
    pub stream_key: String,
    /// `false` unterdrueckt alle Paare mit diesem Teilnehmer
    pub voice_erlaubt: bool,
}

/// Tick-getriebener Verfolger der Peer-Paare in Hoerweite
pub struct NaehenVerfolger {
    /// Hoerradius in Bloecken
    radius: f64,
    /// Maximal tolerierte Hindernisse auf der Sichtlinie
    max_hindernisse: u32,
    orakel: Arc<dyn SichtOrakel>,
    /// Aktive Paare in kanonischer Form (kleinere UserId zuerst)
    paare: HashSet<(UserId, UserId)>,
}

fn kanonisch(a: UserId, b: UserId) -> (UserId, UserId) {
    if a.inner() <= b.inner() {
        (a, b)
    } else {
        (b, a)
    }
}

impl NaehenVerfolger {
    pub fn neu(radius: f64, max_hindernisse: u32, orakel: Arc<dyn SichtOrakel>) -> Self {
        Self {
            radius,
            max_hindernisse,
            orakel,
            paare: HashSet::new(),
        }
    }

    /// Aktive Paare (fuer Tests und Diagnose)
    pub fn paar_anzahl(&self) -> usize {
        self.paare.len()
    }

    fn in_hoerweite(&self, a: &NaehenTeilnehmer, b: &NaehenTeilnehmer) -> bool {
        a.voice_erlaubt
            && b.voice_erlaubt
            && a.position.abstand(&b.position) <= self.radius
            && self.orakel.hindernisse(&a.position, &b.position) <= self.max_hindernisse
    }

    /// Eine Peer-Meldung zustellen; verwerfbare Fehler beenden den Diff
    /// nicht (ein bereits abgemeldeter Empfaenger ist normal)
    fn zustellen(
        senke: &dyn PaketSenke,
        ziel: UserId,
        payload: PaketPayload,
        fehler: &mut Option<KlangnetzFehler>,
    ) {
        match senke.senden(ziel, payload) {
            Ok(()) => {}
            Err(e) if e.ist_verwerfbar() => {
                tracing::debug!(ziel = %ziel, fehler = %e, "Peer-Meldung verworfen");
            }
            Err(e) => {
                if fehler.is_none() {
                    *fehler = Some(e);
                }
            }
        }
    }

    /// Berechnet die Paare fuer diesen Tick und meldet Differenzen
    ///
    /// Jede Kante wird beiden Seiten gemeldet: `VoicePeerHinzu` traegt
    /// den stream_key des jeweils anderen, `VoicePeerWeg` nur die ID.
    /// Die neue Paarmenge wird immer uebernommen, auch wenn einzelne
    /// Zustellungen scheitern; sonst bliebe ein totes Paar fuer immer
    /// haengen und die Gegenseite bekaeme den Abschied mehrfach.
    pub fn tick(
        &mut self,
        teilnehmer: &[NaehenTeilnehmer],
        senke: &dyn PaketSenke,
    ) -> Result<()> {
        let mut aktuell: HashSet<(UserId, UserId)> = HashSet::new();
        for (i, a) in teilnehmer.iter().enumerate() {
            for b in &teilnehmer[i + 1..] {
                if self.in_hoerweite(a, b) {
                    aktuell.insert(kanonisch(a.user_id, b.user_id));
                }
            }
        }

        let nach_id = |id: UserId| teilnehmer.iter().find(|t| t.user_id == id);
        let mut fehler: Option<KlangnetzFehler> = None;

        for &(a, b) in aktuell.difference(&self.paare) {
            // Beide Seiten sind im aktuellen Snapshot, sonst gaebe es das Paar nicht
            if let (Some(ta), Some(tb)) = (nach_id(a), nach_id(b)) {
                Self::zustellen(
                    senke,
                    a,
                    PaketPayload::VoicePeerHinzu {
                        user_id: b,
                        stream_key: tb.stream_key.clone(),
                    },
                    &mut fehler,
                );
                Self::zustellen(
                    senke,
                    b,
                    PaketPayload::VoicePeerHinzu {
                        user_id: a,
                        stream_key: ta.stream_key.clone(),
                    },
                    &mut fehler,
                );
                tracing::trace!(a = %a, b = %b, "Voice-Peer-Paar verbunden");
            }
        }

        for &(a, b) in self.paare.difference(&aktuell) {
            Self::zustellen(senke, a, PaketPayload::VoicePeerWeg { user_id: b }, &mut fehler);
            Self::zustellen(senke, b, PaketPayload::VoicePeerWeg { user_id: a }, &mut fehler);
            tracing::trace!(a = %a, b = %b, "Voice-Peer-Paar getrennt");
        }

        self.paare = aktuell;
        match fehler {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Trennt alle Paare eines Teilnehmers (Disconnect)
    ///
    /// Die Gegenseiten bekommen sofort `VoicePeerWeg` statt erst auf dem
    /// naechsten Tick. Die Paare werden auch entfernt wenn die
    /// Zustellung an eine Gegenseite scheitert.
    pub fn entfernen(&mut self, user_id: UserId, senke: &dyn PaketSenke) -> Result<()> {
        let betroffen: Vec<(UserId, UserId)> = self
            .paare
            .iter()
            .filter(|(a, b)| *a == user_id || *b == user_id)
            .copied()
            .collect();
        let mut fehler: Option<KlangnetzFehler> = None;
        for paar in betroffen {
            self.paare.remove(&paar);
            let anderer = if paar.0 == user_id { paar.1 } else { paar.0 };
            Self::zustellen(senke, anderer, PaketPayload::VoicePeerWeg { user_id }, &mut fehler);
        }
        match fehler {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
