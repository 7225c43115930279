//! RTC-Sitzung – Voice-Zustand einer Verbindung
//!
//! Die Sitzung lebt 1:1 mit ihrer Verbindung. Voice-Audio ist genau dann
//! freigegeben wenn die Verbindung mit Voice verbunden ist und die Menge
//! der Block-Gruende leer ist. Block-Gruende werden idempotent gepflegt:
//! doppeltes Hinzufuegen oder Entfernen eines fehlenden Grundes ist ein
//! No-Op, niemals ein Fehler.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// Grund warum Voice-Audio eines Users gerade unterdrueckt ist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlockGrund {
    /// User steht in einer Region die Voice-Chat verbietet
    InDisabledRegion,
    /// Voice ist serverseitig abgeschaltet
    ServerDisabled,
    /// User hat sich selbst taub geschaltet
    Deafened,
}

/// Voice-Sitzungszustand einer Verbindung
#[derive(Debug, Clone)]
pub struct RtcSitzung {
    /// Opaker Voice-Channel-Token dieser Verbindung
    pub stream_key: String,
    /// Ist das Mikrofon aktiviert?
    pub mikrofon_aktiv: bool,
    /// Hat der User sich selbst taub geschaltet?
    pub taub: bool,
    /// Aktive Block-Gruende (leer = Voice frei)
    block_gruende: HashSet<BlockGrund>,
}

impl RtcSitzung {
    /// Erstellt eine neue Sitzung mit frischem Stream-Key
    pub fn neu() -> Self {
        Self {
            stream_key: format!("strm-{}", Uuid::new_v4().simple()),
            mikrofon_aktiv: true,
            taub: false,
            block_gruende: HashSet::new(),
        }
    }

    /// Fuegt einen Block-Grund hinzu
    ///
    /// Gibt `true` zurueck wenn der Grund neu war (idempotent).
    pub fn grund_hinzufuegen(&mut self, grund: BlockGrund) -> bool {
        self.block_gruende.insert(grund)
    }

    /// Entfernt einen Block-Grund
    ///
    /// Gibt `true` zurueck wenn der Grund vorhanden war (idempotent).
    pub fn grund_entfernen(&mut self, grund: BlockGrund) -> bool {
        self.block_gruende.remove(&grund)
    }

    /// Prueft ob ein bestimmter Grund aktiv ist
    pub fn hat_grund(&self, grund: BlockGrund) -> bool {
        self.block_gruende.contains(&grund)
    }

    /// Ist die Sitzung gerade blockiert?
    pub fn ist_blockiert(&self) -> bool {
        !self.block_gruende.is_empty()
    }

    /// Anzahl der aktiven Block-Gruende
    pub fn grund_anzahl(&self) -> usize {
        self.block_gruende.len()
    }
}

impl Default for RtcSitzung {
    fn default() -> Self {
        Self::neu()
    }
}
