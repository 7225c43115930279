//! klangnetz-server – Bibliotheks-Root
//!
//! Verdrahtet alle Subsysteme zu einem lauffaehigen Node: Relay und Bus,
//! Verbindungs-Register, Paket-Dispatch, Region- und Naehe-Ticks sowie
//! den Tick-Planer mit Waechter. Eingehende Umschlaege werden nie direkt
//! im Empfangs-Task verarbeitet sondern in den naechsten Tick gereicht;
//! Verbindungszustand mutiert ausschliesslich der Tick-Treiber.

pub mod config;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use anyhow::Result;
use parking_lot::Mutex;
use tokio::sync::broadcast;

use klangnetz_core::types::{NodeId, Position, UserId};
use klangnetz_protocol::pakete::PaketTyp;
use klangnetz_protocol::register::HandlerRegister;
use klangnetz_regions::naehe::{NaehenTeilnehmer, NaehenVerfolger};
use klangnetz_regions::region::{Region, RegionQuelle};
use klangnetz_regions::sicht::{NullOrakel, SichtOrakel};
use klangnetz_regions::verfolger::{RegionMeldungen, RegionVerfolger};
use klangnetz_relay::bus::{BusKanal, NachrichtenBus, SpeicherBus};
use klangnetz_relay::relay::NodeRelay;
use klangnetz_relay::verzeichnis::{NodeVerzeichnis, SpeicherVerzeichnis};
use klangnetz_scheduler::planer::TickPlaner;
use klangnetz_scheduler::waechter::Waechter;
use klangnetz_session::handler::ClientStateHandler;
use klangnetz_session::register::VerbindungsRegister;

use config::ServerConfig;

/// Regionsquelle ohne Welt: liefert nie Regionen
///
/// Standard solange kein Geometrie-Kollaborateur eingehaengt ist.
pub struct LeereRegionsquelle;

impl RegionQuelle for LeereRegionsquelle {
    fn regionen_an(&self, _position: &Position) -> Vec<Region> {
        Vec::new()
    }
}

/// Haelt den laufenden Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
    regionsquelle: Arc<dyn RegionQuelle>,
    orakel: Arc<dyn SichtOrakel>,
}

/// Verdrahtete Subsysteme eines laufenden Nodes
///
/// Wird von `aufbauen` zurueckgegeben; Integrationstests greifen hier
/// direkt auf Relay, Register und Planer zu.
pub struct ServerKern {
    pub node_id: NodeId,
    pub relay: NodeRelay,
    pub verbindungen: VerbindungsRegister,
    pub planer: TickPlaner,
    pub bus: Arc<SpeicherBus>,
    region_verfolger: Arc<Mutex<HashMap<UserId, RegionVerfolger>>>,
    naehe: Arc<Mutex<NaehenVerfolger>>,
}

impl ServerKern {
    /// Meldet einen User von diesem Node ab
    ///
    /// Der Abbau laeuft im naechsten Tick: erst der Region-Reset
    /// (MediaStop fuer alles Laufende, stilles Entsperren), dann die
    /// sofortige Peer-Trennung, zuletzt der Austrag aus Register und
    /// Verzeichnis. Solange der Reset laeuft ist der User noch
    /// aufloesbar, damit seine Abschiedspakete zustellbar bleiben.
    pub fn abmelden(&self, user_id: UserId) {
        let verbindungen = self.verbindungen.clone();
        let relay = self.relay.clone();
        let region_verfolger = Arc::clone(&self.region_verfolger);
        let naehe = Arc::clone(&self.naehe);
        self.planer.naechster_tick(move || {
            if let Some(eintrag) = verbindungen.holen(&user_id) {
                if let Some(mut verfolger) = region_verfolger.lock().remove(&user_id) {
                    let mut verbindung = eintrag.lock();
                    if let Err(e) = verfolger.zuruecksetzen(&mut verbindung, &relay) {
                        tracing::warn!(user = %user_id, fehler = %e, "Region-Reset beim Abmelden fehlgeschlagen");
                    }
                }
            }
            if let Err(e) = naehe.lock().entfernen(user_id, &relay) {
                tracing::warn!(user = %user_id, fehler = %e, "Peer-Trennung beim Abmelden fehlgeschlagen");
            }
            verbindungen.abmelden(&user_id);
        });
    }
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    pub fn neu(config: ServerConfig) -> Self {
        Self {
            config,
            regionsquelle: Arc::new(LeereRegionsquelle),
            orakel: Arc::new(NullOrakel),
        }
    }

    /// Haengt eine Regionsquelle ein (Weltgeometrie-Kollaborateur)
    pub fn mit_regionsquelle(mut self, quelle: Arc<dyn RegionQuelle>) -> Self {
        self.regionsquelle = quelle;
        self
    }

    /// Haengt ein Sicht-Orakel fuer die Naehe-Paarbildung ein
    pub fn mit_sicht_orakel(mut self, orakel: Arc<dyn SichtOrakel>) -> Self {
        self.orakel = orakel;
        self
    }

    fn node_id(&self) -> Result<NodeId> {
        match &self.config.node.id {
            Some(id) => {
                let uuid = uuid::Uuid::parse_str(id)
                    .map_err(|e| anyhow::anyhow!("Ungueltige Node-ID '{id}': {e}"))?;
                Ok(NodeId(uuid))
            }
            None => Ok(NodeId::new()),
        }
    }

    /// Verdrahtet alle Subsysteme und startet Treiber, Waechter und
    /// Empfangs-Tasks
    pub fn aufbauen(&self) -> Result<ServerKern> {
        let node_id = self.node_id()?;
        let verzeichnis = Arc::new(SpeicherVerzeichnis::neu());
        let bus = Arc::new(SpeicherBus::neu());

        let relay = NodeRelay::neu(
            node_id,
            Arc::clone(&verzeichnis) as Arc<dyn NodeVerzeichnis>,
            Arc::clone(&bus) as Arc<dyn NachrichtenBus>,
        );
        let verbindungen = VerbindungsRegister::neu(
            node_id,
            Arc::clone(&verzeichnis) as Arc<dyn NodeVerzeichnis>,
        );

        let register = HandlerRegister::neu();
        register.registrieren(
            PaketTyp::ClientState,
            Arc::new(ClientStateHandler::neu(verbindungen.clone())),
        );

        let planer = TickPlaner::mit_takt(
            self.config.takt(),
            self.config.scheduler.pro_sekunde_teiler,
        );

        for kanal in [BusKanal::StateSync, BusKanal::Steuerung] {
            Self::empfangs_task(kanal, &bus, relay.clone(), register.clone(), planer.clone());
        }

        let region_verfolger: Arc<Mutex<HashMap<UserId, RegionVerfolger>>> =
            Arc::new(Mutex::new(HashMap::new()));
        let naehe = Arc::new(Mutex::new(NaehenVerfolger::neu(
            self.config.voice.hoerradius,
            self.config.voice.max_hindernisse,
            Arc::clone(&self.orakel),
        )));

        if self.config.regionen.aktiviert {
            self.region_tick(
                &planer,
                relay.clone(),
                verbindungen.clone(),
                Arc::clone(&region_verfolger),
            );
        }
        if self.config.voice.aktiviert {
            self.naehe_tick(&planer, relay.clone(), verbindungen.clone(), Arc::clone(&naehe));
        }

        let statistik_verbindungen = verbindungen.clone();
        planer.pro_sekunde("statistik", move || {
            tracing::debug!(
                verbindungen = statistik_verbindungen.anzahl(),
                "Node-Statistik"
            );
        });

        Waechter::mit_schwelle(
            self.config.waechter_schwelle(),
            self.config.waechter_pruefabstand(),
        )
        .starten(planer.clone());
        planer.starten();

        tracing::info!(
            node = %node_id,
            name = %self.config.node.name,
            takt_ms = self.config.scheduler.takt_ms,
            "Node verdrahtet"
        );

        Ok(ServerKern {
            node_id,
            relay,
            verbindungen,
            planer,
            bus,
            region_verfolger,
            naehe,
        })
    }

    /// Pumpt einen Bus-Kanal in die Tick-Warteschlange
    ///
    /// Der Empfangs-Task prueft nur den Header; Dispatch und jede
    /// Zustandsmutation laufen im naechsten Tick.
    fn empfangs_task(
        kanal: BusKanal,
        bus: &Arc<SpeicherBus>,
        relay: NodeRelay,
        register: HandlerRegister,
        planer: TickPlaner,
    ) {
        let mut rx = bus.abonnieren(kanal);
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(bytes) => match relay.eingang_pruefen(&bytes) {
                        Ok(Some(umschlag)) => {
                            let register = register.clone();
                            planer.naechster_tick(move || {
                                if let Err(e) = register.dispatch(&umschlag) {
                                    tracing::warn!(fehler = %e, "Dispatch fehlgeschlagen");
                                }
                            });
                        }
                        Ok(None) => {}
                        Err(e) => {
                            tracing::debug!(
                                kanal = kanal.name(),
                                fehler = %e,
                                "Eingehender Umschlag verworfen"
                            );
                        }
                    },
                    Err(broadcast::error::RecvError::Lagged(verpasst)) => {
                        tracing::warn!(
                            kanal = kanal.name(),
                            verpasst,
                            "Bus-Abonnement hinkt hinterher"
                        );
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }

    fn region_tick(
        &self,
        planer: &TickPlaner,
        relay: NodeRelay,
        verbindungen: VerbindungsRegister,
        verfolger: Arc<Mutex<HashMap<UserId, RegionVerfolger>>>,
    ) {
        let quelle = Arc::clone(&self.regionsquelle);
        let meldungen = RegionMeldungen {
            stumm_betreten: self
                .config
                .regionen
                .meldung_stumm_betreten
                .clone()
                .unwrap_or_else(|| RegionMeldungen::default().stumm_betreten),
            stumm_verlassen: self
                .config
                .regionen
                .meldung_stumm_verlassen
                .clone()
                .unwrap_or_else(|| RegionMeldungen::default().stumm_verlassen),
        };

        planer.pro_tick("regionen", move || {
            let mut verfolger = verfolger.lock();
            let mut gesehen: HashSet<UserId> = HashSet::new();
            for eintrag in verbindungen.alle() {
                let mut verbindung = eintrag.lock();
                gesehen.insert(verbindung.user_id);
                let regionen = quelle.regionen_an(&verbindung.position);
                let v = verfolger
                    .entry(verbindung.user_id)
                    .or_insert_with(|| RegionVerfolger::mit_meldungen(meldungen.clone()));
                if let Err(e) = v.tick(regionen, &mut verbindung, &relay) {
                    tracing::warn!(user = %verbindung.user_id, fehler = %e, "Region-Tick fehlgeschlagen");
                }
            }
            // Verfolger von Usern die ohne Abmeldung verschwunden sind
            verfolger.retain(|user, _| gesehen.contains(user));
        });
    }

    fn naehe_tick(
        &self,
        planer: &TickPlaner,
        relay: NodeRelay,
        verbindungen: VerbindungsRegister,
        naehe: Arc<Mutex<NaehenVerfolger>>,
    ) {
        planer.pro_tick("naehe", move || {
            let teilnehmer: Vec<NaehenTeilnehmer> = verbindungen
                .alle()
                .iter()
                .map(|eintrag| {
                    let v = eintrag.lock();
                    NaehenTeilnehmer {
                        user_id: v.user_id,
                        position: v.position,
                        stream_key: v.rtc.stream_key.clone(),
                        voice_erlaubt: v.voice_erlaubt(),
                    }
                })
                .collect();
            if let Err(e) = naehe.lock().tick(&teilnehmer, &relay) {
                tracing::warn!(fehler = %e, "Naehe-Tick fehlgeschlagen");
            }
        });
    }

    /// Startet den Node und laeuft bis zum Shutdown-Signal
    pub async fn starten(self) -> Result<()> {
        let kern = self.aufbauen()?;

        tracing::info!("Node laeuft. Warte auf Shutdown-Signal (Ctrl-C)...");
        tokio::signal::ctrl_c().await?;
        tracing::info!("Shutdown-Signal empfangen, Node wird beendet");
        kern.planer.anhalten();

        Ok(())
    }
}
