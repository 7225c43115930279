//! Verbindung – Zustandsmaschine eines einzelnen Users
//!
//! Zustaende, beobachtet ueber `mit_voice_verbunden` x Block-Gruende:
//! - Getrennt: `mit_voice_verbunden = false`
//! - Verbunden-Frei: verbunden, keine Block-Gruende – Voice aktiv
//! - Verbunden-Blockiert: verbunden, Block-Gruende vorhanden – Voice
//!   unterdrueckt, Sitzung bleibt bestehen (kein Re-Negotiate noetig)
//!
//! Jede fuer den Client beobachtbare Aenderung sendet genau ein Paket:
//! Kanten-Ueberquerungen der Block-Menge den Blur-Umschalter, alles
//! andere einen vollstaendigen `ClientState`-Resync. Der Resync wird
//! immer komplett aus den aktuellen Feldern berechnet, damit die
//! Gegenseite auch nach verpassten Zwischenstaenden aus einem einzigen
//! Paket resynchronisieren kann.

use klangnetz_core::types::{Position, UserId};
use klangnetz_core::Result;
use klangnetz_protocol::pakete::{ClientStatePayload, PaketPayload};
use klangnetz_protocol::senke::PaketSenke;

use crate::rtc::{BlockGrund, RtcSitzung};

/// Live-Zustand eines Users auf dem Node der ihn haelt
///
/// Wird beim Attach erstellt und beim Detach zerstoert; genau eine
/// lebende Verbindung pro User pro Node. Mutation nur vom Tick-Thread.
#[derive(Debug, Clone)]
pub struct Verbindung {
    /// Benutzer-ID
    pub user_id: UserId,
    /// Lautstaerke 0-100
    lautstaerke: u8,
    /// Ist der User mit Voice verbunden?
    mit_voice_verbunden: bool,
    /// Opaker Auth-Token (unveraendert weitergereicht)
    pub auth_token: String,
    /// Letzte bekannte Position
    pub position: Position,
    /// Zugehoerige RTC-Sitzung (gleiche Lebensdauer)
    pub rtc: RtcSitzung,
}

impl Verbindung {
    /// Erstellt eine neue Verbindung im Zustand Getrennt
    pub fn neu(user_id: UserId, auth_token: impl Into<String>) -> Self {
        Self {
            user_id,
            lautstaerke: 100,
            mit_voice_verbunden: false,
            auth_token: auth_token.into(),
            position: Position::default(),
            rtc: RtcSitzung::neu(),
        }
    }

    /// Ist der User mit Voice verbunden?
    pub fn mit_voice_verbunden(&self) -> bool {
        self.mit_voice_verbunden
    }

    /// Aktuelle Lautstaerke (0-100)
    pub fn lautstaerke(&self) -> u8 {
        self.lautstaerke
    }

    /// Voice-Audio ist erlaubt gdw. verbunden und keine Block-Gruende
    pub fn voice_erlaubt(&self) -> bool {
        self.mit_voice_verbunden && !self.rtc.ist_blockiert()
    }

    /// Berechnet den vollstaendigen Client-Zustand aus den aktuellen
    /// Feldern – kein Diffing auf der Wire-Ebene
    pub fn client_state(&self) -> ClientStatePayload {
        ClientStatePayload {
            user_id: self.user_id,
            stream_key: self.rtc.stream_key.clone(),
            verbunden: self.mit_voice_verbunden,
            mikrofon_aktiv: self.rtc.mikrofon_aktiv,
            taub: self.rtc.taub,
            auth_token: self.auth_token.clone(),
            lautstaerke: self.lautstaerke,
        }
    }

    fn resync(&self, senke: &dyn PaketSenke) -> Result<()> {
        senke.senden(self.user_id, PaketPayload::ClientState(self.client_state()))
    }

    /// Verbindet den User mit Voice (idempotent)
    pub fn voice_verbinden(&mut self, senke: &dyn PaketSenke) -> Result<()> {
        if self.mit_voice_verbunden {
            return Ok(());
        }
        self.mit_voice_verbunden = true;
        tracing::debug!(user = %self.user_id, "Voice verbunden");
        self.resync(senke)
    }

    /// Trennt den User von Voice (idempotent)
    pub fn voice_trennen(&mut self, senke: &dyn PaketSenke) -> Result<()> {
        if !self.mit_voice_verbunden {
            return Ok(());
        }
        self.mit_voice_verbunden = false;
        tracing::debug!(user = %self.user_id, "Voice getrennt");
        self.resync(senke)
    }

    /// Fuegt einen Block-Grund hinzu (idempotent)
    ///
    /// Die Kante leer -> nicht-leer sendet waehrend einer Voice-Verbindung
    /// genau ein Blur-Paket; weitere Gruende die die Menge nicht-leer
    /// halten senden nichts mehr.
    pub fn block_grund_hinzufuegen(
        &mut self,
        grund: BlockGrund,
        senke: &dyn PaketSenke,
    ) -> Result<()> {
        if !self.rtc.grund_hinzufuegen(grund) {
            return Ok(());
        }
        tracing::debug!(user = %self.user_id, ?grund, "Block-Grund hinzugefuegt");
        if self.rtc.grund_anzahl() == 1 && self.mit_voice_verbunden {
            senke.senden(self.user_id, PaketPayload::VoiceBlurUi { aktiv: true })?;
        }
        Ok(())
    }

    /// Entfernt einen Block-Grund (idempotent)
    ///
    /// Die Kante nicht-leer -> leer sendet waehrend einer Voice-Verbindung
    /// genau ein Blur-Paket.
    pub fn block_grund_entfernen(
        &mut self,
        grund: BlockGrund,
        senke: &dyn PaketSenke,
    ) -> Result<()> {
        if !self.rtc.grund_entfernen(grund) {
            return Ok(());
        }
        tracing::debug!(user = %self.user_id, ?grund, "Block-Grund entfernt");
        if !self.rtc.ist_blockiert() && self.mit_voice_verbunden {
            senke.senden(self.user_id, PaketPayload::VoiceBlurUi { aktiv: false })?;
        }
        Ok(())
    }

    /// Entfernt einen Block-Grund ohne Pakete zu senden
    ///
    /// Nur fuer Reset-Pfade: der User verlaesst die Welt komplett, nicht
    /// eine Region – Blur und Hinweise waeren irrefuehrend.
    pub fn block_grund_still_entfernen(&mut self, grund: BlockGrund) {
        self.rtc.grund_entfernen(grund);
    }

    /// Schaltet das Mikrofon um
    ///
    /// Sendet nur ein Paket; die Block-Gruende bleiben unberuehrt.
    pub fn mikrofon_umschalten(&mut self, senke: &dyn PaketSenke) -> Result<()> {
        self.rtc.mikrofon_aktiv = !self.rtc.mikrofon_aktiv;
        self.resync(senke)
    }

    /// Schaltet den Taub-Status um
    pub fn taub_umschalten(&mut self, senke: &dyn PaketSenke) -> Result<()> {
        self.rtc.taub = !self.rtc.taub;
        self.resync(senke)
    }

    /// Setzt die Lautstaerke (0-100, wird geklemmt)
    pub fn lautstaerke_setzen(&mut self, wert: u8, senke: &dyn PaketSenke) -> Result<()> {
        let wert = wert.min(100);
        if wert == self.lautstaerke {
            return Ok(());
        }
        self.lautstaerke = wert;
        self.resync(senke)
    }

    /// Aktualisiert die Position (kein Paket – der Region-Diff laeuft
    /// auf dem naechsten Tick)
    pub fn position_setzen(&mut self, position: Position) {
        self.position = position;
    }

    /// Uebernimmt einen empfangenen Resync ohne eigene Pakete
    ///
    /// Die Seiteneffekte sind auf dem Ursprungs-Node bereits passiert;
    /// hier wird nur die lokale Sicht angeglichen.
    pub fn uebernehmen(&mut self, state: &ClientStatePayload) {
        self.mit_voice_verbunden = state.verbunden;
        self.lautstaerke = state.lautstaerke.min(100);
        self.auth_token = state.auth_token.clone();
        self.rtc.stream_key = state.stream_key.clone();
        self.rtc.mikrofon_aktiv = state.mikrofon_aktiv;
        self.rtc.taub = state.taub;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use klangnetz_protocol::senke::SammelSenke;

    fn blur_pakete(senke: &SammelSenke) -> Vec<bool> {
        senke
            .gesendete()
            .into_iter()
            .filter_map(|(_, p)| match p {
                PaketPayload::VoiceBlurUi { aktiv } => Some(aktiv),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn verbinden_ist_idempotent() {
        let senke = SammelSenke::neu();
        let mut v = Verbindung::neu(UserId::new(), "token");

        v.voice_verbinden(&senke).unwrap();
        v.voice_verbinden(&senke).unwrap();

        assert!(v.mit_voice_verbunden());
        assert_eq!(senke.anzahl(), 1, "zweiter Aufruf darf nichts senden");
    }

    #[test]
    fn blur_feuert_genau_einmal_pro_kante() {
        let senke = SammelSenke::neu();
        let mut v = Verbindung::neu(UserId::new(), "token");
        v.voice_verbinden(&senke).unwrap();
        senke.leeren();

        // leer -> nicht-leer: genau ein Blur(true)
        v.block_grund_hinzufuegen(BlockGrund::InDisabledRegion, &senke)
            .unwrap();
        // weitere Gruende halten die Menge nicht-leer: kein weiteres Blur
        v.block_grund_hinzufuegen(BlockGrund::InDisabledRegion, &senke)
            .unwrap();
        v.block_grund_hinzufuegen(BlockGrund::ServerDisabled, &senke)
            .unwrap();

        assert_eq!(blur_pakete(&senke), vec![true]);

        // erst wenn der letzte Grund faellt: genau ein Blur(false)
        v.block_grund_entfernen(BlockGrund::InDisabledRegion, &senke)
            .unwrap();
        assert_eq!(blur_pakete(&senke), vec![true]);

        v.block_grund_entfernen(BlockGrund::ServerDisabled, &senke)
            .unwrap();
        v.block_grund_entfernen(BlockGrund::ServerDisabled, &senke)
            .unwrap();
        assert_eq!(blur_pakete(&senke), vec![true, false]);
    }

    #[test]
    fn kein_blur_ohne_voice_verbindung() {
        let senke = SammelSenke::neu();
        let mut v = Verbindung::neu(UserId::new(), "token");

        v.block_grund_hinzufuegen(BlockGrund::InDisabledRegion, &senke)
            .unwrap();
        assert!(blur_pakete(&senke).is_empty());
        assert!(v.rtc.ist_blockiert());
    }

    #[test]
    fn mikrofon_umschalten_laesst_gruende_unberuehrt() {
        let senke = SammelSenke::neu();
        let mut v = Verbindung::neu(UserId::new(), "token");
        v.block_grund_hinzufuegen(BlockGrund::ServerDisabled, &senke)
            .unwrap();

        let vorher = v.rtc.mikrofon_aktiv;
        v.mikrofon_umschalten(&senke).unwrap();

        assert_ne!(v.rtc.mikrofon_aktiv, vorher);
        assert!(v.rtc.hat_grund(BlockGrund::ServerDisabled));
    }

    #[test]
    fn stilles_entfernen_sendet_nichts() {
        let senke = SammelSenke::neu();
        let mut v = Verbindung::neu(UserId::new(), "token");
        v.voice_verbinden(&senke).unwrap();
        v.block_grund_hinzufuegen(BlockGrund::InDisabledRegion, &senke)
            .unwrap();
        senke.leeren();

        v.block_grund_still_entfernen(BlockGrund::InDisabledRegion);

        assert!(!v.rtc.ist_blockiert());
        assert_eq!(senke.anzahl(), 0);
    }

    #[test]
    fn voice_erlaubt_berechnung() {
        let senke = SammelSenke::neu();
        let mut v = Verbindung::neu(UserId::new(), "token");
        assert!(!v.voice_erlaubt(), "getrennt");

        v.voice_verbinden(&senke).unwrap();
        assert!(v.voice_erlaubt(), "verbunden, frei");

        v.block_grund_hinzufuegen(BlockGrund::Deafened, &senke)
            .unwrap();
        assert!(!v.voice_erlaubt(), "verbunden, blockiert");
    }

    #[test]
    fn resync_ist_vollstaendig() {
        let senke = SammelSenke::neu();
        let mut v = Verbindung::neu(UserId::new(), "token-7");
        v.lautstaerke_setzen(55, &senke).unwrap();

        let state = v.client_state();
        assert_eq!(state.lautstaerke, 55);
        assert_eq!(state.auth_token, "token-7");
        assert_eq!(state.stream_key, v.rtc.stream_key);
        assert!(!state.verbunden);
    }

    #[test]
    fn lautstaerke_wird_geklemmt() {
        let senke = SammelSenke::neu();
        let mut v = Verbindung::neu(UserId::new(), "t");
        v.lautstaerke_setzen(200, &senke).unwrap();
        assert_eq!(v.lautstaerke(), 100);
        // unveraendert: kein weiteres Paket
        let anzahl = senke.anzahl();
        v.lautstaerke_setzen(200, &senke).unwrap();
        assert_eq!(senke.anzahl(), anzahl);
    }
}
