//! Server-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass der Server ohne Konfigurationsdatei
//! lauffaehig ist.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Vollstaendige Server-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Node-Identitaet
    pub node: NodeEinstellungen,
    /// Tick-Scheduler-Einstellungen
    pub scheduler: SchedulerEinstellungen,
    /// Voice-Naehe-Einstellungen
    pub voice: VoiceEinstellungen,
    /// Region-Einstellungen
    pub regionen: RegionenEinstellungen,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
}

/// Node-Identitaet dieses Prozesses
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeEinstellungen {
    /// Anzeigename des Nodes
    pub name: String,
    /// Feste Node-ID (UUID); leer = zufaellig beim Prozessstart
    pub id: Option<String>,
}

impl Default for NodeEinstellungen {
    fn default() -> Self {
        Self {
            name: "Klangnetz Node".into(),
            id: None,
        }
    }
}

/// Tick-Scheduler-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerEinstellungen {
    /// Taktlaenge in Millisekunden
    pub takt_ms: u64,
    /// Pro-Sekunde-Callbacks laufen jeden N-ten Tick
    pub pro_sekunde_teiler: u64,
    /// Waechter-Schwelle in Sekunden bevor der Treiber als haengend gilt
    pub waechter_schwelle_s: u64,
    /// Pruefabstand des Waechters in Sekunden
    pub waechter_pruefabstand_s: u64,
}

impl Default for SchedulerEinstellungen {
    fn default() -> Self {
        Self {
            takt_ms: 50,
            pro_sekunde_teiler: 50,
            waechter_schwelle_s: 10,
            waechter_pruefabstand_s: 2,
        }
    }
}

/// Voice-Naehe-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceEinstellungen {
    /// Aktiviert die Naehe-Paarbildung
    pub aktiviert: bool,
    /// Hoerradius in Bloecken
    pub hoerradius: f64,
    /// Maximal tolerierte Hindernisse auf der Sichtlinie
    pub max_hindernisse: u32,
}

impl Default for VoiceEinstellungen {
    fn default() -> Self {
        Self {
            aktiviert: true,
            hoerradius: 35.0,
            max_hindernisse: 0,
        }
    }
}

/// Region-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionenEinstellungen {
    /// Aktiviert die Region-Differenzrechnung
    pub aktiviert: bool,
    /// Hinweis beim Betreten einer stummen Region (leer = Standardtext)
    pub meldung_stumm_betreten: Option<String>,
    /// Hinweis beim Verlassen einer stummen Region (leer = Standardtext)
    pub meldung_stumm_verlassen: Option<String>,
}

impl Default for RegionenEinstellungen {
    fn default() -> Self {
        Self {
            aktiviert: true,
            meldung_stumm_betreten: None,
            meldung_stumm_verlassen: None,
        }
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl ServerConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => {
                let config: Self = toml::from_str(&inhalt)
                    .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?;
                config.pruefen()?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!(
                "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
            )),
        }
    }

    /// Prueft die Logging-Felder; Tippfehler sollen beim Start auffallen
    /// statt still auf Standardwerte zu fallen
    pub fn pruefen(&self) -> anyhow::Result<()> {
        if !klangnetz_observability::log_level_gueltig(&self.logging.level) {
            anyhow::bail!("Unbekanntes Log-Level '{}'", self.logging.level);
        }
        if !klangnetz_observability::log_format_gueltig(&self.logging.format) {
            anyhow::bail!("Unbekanntes Log-Format '{}'", self.logging.format);
        }
        Ok(())
    }

    /// Taktlaenge des Schedulers
    pub fn takt(&self) -> Duration {
        Duration::from_millis(self.scheduler.takt_ms.max(1))
    }

    /// Waechter-Schwelle
    pub fn waechter_schwelle(&self) -> Duration {
        Duration::from_secs(self.scheduler.waechter_schwelle_s.max(1))
    }

    /// Pruefabstand des Waechters
    pub fn waechter_pruefabstand(&self) -> Duration {
        Duration::from_secs(self.scheduler.waechter_pruefabstand_s.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_config_ist_valide() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.scheduler.takt_ms, 50);
        assert_eq!(cfg.scheduler.pro_sekunde_teiler, 50);
        assert_eq!(cfg.voice.hoerradius, 35.0);
        assert_eq!(cfg.logging.level, "info");
        assert!(cfg.regionen.aktiviert);
    }

    #[test]
    fn config_aus_toml_string() {
        let toml = r#"
            [node]
            name = "Node Ost"

            [scheduler]
            takt_ms = 25

            [voice]
            hoerradius = 50.0
        "#;
        let cfg: ServerConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.node.name, "Node Ost");
        assert_eq!(cfg.scheduler.takt_ms, 25);
        assert_eq!(cfg.voice.hoerradius, 50.0);
        // Nicht angegebene Felder behalten Standardwerte
        assert_eq!(cfg.scheduler.pro_sekunde_teiler, 50);
        assert_eq!(cfg.logging.format, "text");
    }

    #[test]
    fn unbekanntes_log_level_wird_abgewiesen() {
        let cfg: ServerConfig = toml::from_str("[logging]\nlevel = \"verbose\"\n").unwrap();
        assert!(cfg.pruefen().is_err());
        assert!(ServerConfig::default().pruefen().is_ok());
    }

    #[test]
    fn takt_ist_nie_null() {
        let cfg: ServerConfig = toml::from_str("[scheduler]\ntakt_ms = 0\n").unwrap();
        assert_eq!(cfg.takt(), Duration::from_millis(1));
    }
}
