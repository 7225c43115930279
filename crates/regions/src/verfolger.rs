//! Region-Verfolger – Differenzrechnung ueber die Regionsmenge
//!
//! Wird einmal pro Tick pro Verbindung mit den aktuell detektierten
//! Regionen aufgerufen und leitet daraus Betreten/Verlassen-Ereignisse,
//! Medienpakete und die Voice-Blockade ab.
//!
//! ## Takeover
//! Betritt der User eine Region deren Quelle bereits spielt, wird der
//! laufende Stream nicht neu gestartet sondern uebernimmt per
//! `MediaUpdate` die Parameter der neuen Region. Takeovers werden vor
//! den Destroys berechnet, damit ein nur umgehaengter Stream niemals
//! hoerbar stoppt und neu anlaeuft.
//!
//! ## Identitaeten
//! Betreten/Verlassen diffen ueber die `media_id` (Wiedergabe-Instanz);
//! ob eine Quelle bereits spielt und ob ein Destroy entfaellt prueft
//! die Quell-Identitaet – niemals Objektidentitaet.

use klangnetz_core::Result;
use klangnetz_protocol::pakete::PaketPayload;
use klangnetz_protocol::senke::PaketSenke;
use klangnetz_session::rtc::BlockGrund;
use klangnetz_session::verbindung::Verbindung;

use crate::region::{dedup_nach_quelle, enthaelt_media_id, enthaelt_quelle, Region};

// ---------------------------------------------------------------------------
// Meldungen
// ---------------------------------------------------------------------------

/// Lokalisierte Hinweistexte fuer Voice-Gating
#[derive(Debug, Clone)]
pub struct RegionMeldungen {
    /// Hinweis beim Betreten einer stummen Region
    pub stumm_betreten: String,
    /// Hinweis beim Verlassen einer stummen Region
    pub stumm_verlassen: String,
}

impl Default for RegionMeldungen {
    fn default() -> Self {
        Self {
            stumm_betreten: "Du hast eine Region betreten in der Voice-Chat deaktiviert ist"
                .into(),
            stumm_verlassen: "Voice-Chat ist hier wieder verfuegbar".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// RegionVerfolger
// ---------------------------------------------------------------------------

/// Pro-Verbindung-Zustand der Region-Differenzrechnung
#[derive(Debug, Default)]
pub struct RegionVerfolger {
    /// Regionsmenge des letzten Ticks
    vorherige: Vec<Region>,
    meldungen: RegionMeldungen,
}

impl RegionVerfolger {
    /// Erstellt einen neuen Verfolger mit Standard-Meldungen
    pub fn neu() -> Self {
        Self::default()
    }

    /// Erstellt einen Verfolger mit eigenen Hinweistexten
    pub fn mit_meldungen(meldungen: RegionMeldungen) -> Self {
        Self {
            vorherige: Vec::new(),
            meldungen,
        }
    }

    /// Regionsmenge des letzten Ticks (fuer Tests und Diagnose)
    pub fn vorherige(&self) -> &[Region] {
        &self.vorherige
    }

    /// Verarbeitet die in diesem Tick detektierten Regionen
    pub fn tick(
        &mut self,
        detektiert: Vec<Region>,
        verbindung: &mut Verbindung,
        senke: &dyn PaketSenke,
    ) -> Result<()> {
        let detektiert = dedup_nach_quelle(detektiert);
        let user = verbindung.user_id;

        let betreten: Vec<&Region> = detektiert
            .iter()
            .filter(|r| !enthaelt_media_id(&self.vorherige, r))
            .collect();
        let verlassen: Vec<&Region> = self
            .vorherige
            .iter()
            .filter(|r| !enthaelt_media_id(&detektiert, r))
            .collect();

        // Takeovers vor den Destroys berechnen
        let mut takeover: Vec<Region> = Vec::new();
        for region in &betreten {
            if enthaelt_quelle(&self.vorherige, region) {
                takeover.push((*region).clone());
                // Parameter der neuen Region koennen abweichen
                senke.senden(
                    user,
                    PaketPayload::MediaUpdate {
                        media_id: region.medien.media_id.clone(),
                        lautstaerke: region.medien.lautstaerke,
                        fade_ms: region.medien.fade_ms,
                    },
                )?;
                tracing::trace!(user = %user, quelle = %region.medien.quelle, "Medien-Takeover");
            } else {
                senke.senden(
                    user,
                    PaketPayload::MediaStart {
                        medien: region.medien.clone(),
                    },
                )?;
                tracing::trace!(user = %user, quelle = %region.medien.quelle, "Medien gestartet");
            }
        }

        for region in &verlassen {
            if enthaelt_quelle(&takeover, region) {
                continue; // Stream wurde nur umgehaengt
            }
            senke.senden(
                user,
                PaketPayload::MediaStop {
                    media_id: region.medien.media_id.clone(),
                    fade_ms: region.medien.fade_ms,
                },
            )?;
            tracing::trace!(user = %user, quelle = %region.medien.quelle, "Medien beendet");
        }

        // Voice-Gating laeuft unabhaengig vom Medien-Diff: eine Region
        // kann Voice sperren ohne Medien zu tragen
        if verbindung.mit_voice_verbunden() {
            let stumm = detektiert.iter().any(|r| !r.erlaubt_voice_chat);
            if stumm {
                if !verbindung.rtc.hat_grund(BlockGrund::InDisabledRegion) {
                    verbindung.block_grund_hinzufuegen(BlockGrund::InDisabledRegion, senke)?;
                    senke.senden(
                        user,
                        PaketPayload::Hinweis {
                            text: self.meldungen.stumm_betreten.clone(),
                        },
                    )?;
                }
            } else if verbindung.rtc.hat_grund(BlockGrund::InDisabledRegion) {
                verbindung.block_grund_entfernen(BlockGrund::InDisabledRegion, senke)?;
                senke.senden(
                    user,
                    PaketPayload::Hinweis {
                        text: self.meldungen.stumm_verlassen.clone(),
                    },
                )?;
            }
        }

        self.vorherige = detektiert;
        Ok(())
    }

    /// Setzt den Verfolger zurueck (Disconnect oder Teleport)
    ///
    /// Beendet jede laufende Wiedergabe sofort und raeumt die
    /// Voice-Blockade still ab: der User verlaesst die Welt komplett,
    /// kein "stumme Region verlassen"-Hinweis.
    pub fn zuruecksetzen(
        &mut self,
        verbindung: &mut Verbindung,
        senke: &dyn PaketSenke,
    ) -> Result<()> {
        for region in &self.vorherige {
            senke.senden(
                verbindung.user_id,
                PaketPayload::MediaStop {
                    media_id: region.medien.media_id.clone(),
                    fade_ms: 0,
                },
            )?;
        }
        verbindung.block_grund_still_entfernen(BlockGrund::InDisabledRegion);
        self.vorherige.clear();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
