//! Gemeinsame Identifikationstypen fuer Klangnetz
//!
//! Alle IDs verwenden das Newtype-Pattern um Verwechslungen zwischen
//! verschiedenen ID-Arten zur Compilezeit auszuschliessen. Wichtig:
//! Zustellungsziele sind immer UserIds, niemals NodeIds – das Relay
//! loest die Zuordnung User -> Node zur Laufzeit auf.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Eindeutige Benutzer-ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub Uuid);

impl UserId {
    /// Erstellt eine neue zufaellige UserId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Gibt die innere UUID zurueck
    pub fn inner(&self) -> Uuid {
        self.0
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "user:{}", self.0)
    }
}

/// Eindeutige Node-ID – identifiziert einen physischen Server-Prozess
///
/// Wird beim Prozessstart einmalig erzeugt und bleibt fuer die gesamte
/// Prozesslebensdauer unveraendert. Jeder ausgehende Umschlag traegt sie
/// als Herkunft, niemals als Ziel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub Uuid);

impl NodeId {
    /// Erstellt eine neue zufaellige NodeId (beim Prozessstart)
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Gibt die innere UUID zurueck
    pub fn inner(&self) -> Uuid {
        self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "node:{}", self.0)
    }
}

/// Raeumliche Position eines Benutzers in Weltkoordinaten
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    /// Erstellt eine neue Position
    pub fn neu(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euklidischer Abstand zu einer anderen Position
    pub fn abstand(&self, andere: &Position) -> f64 {
        let dx = self.x - andere.x;
        let dy = self.y - andere.y;
        let dz = self.z - andere.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.1}, {:.1}, {:.1})", self.x, self.y, self.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_id_eindeutig() {
        let a = UserId::new();
        let b = UserId::new();
        assert_ne!(a, b, "Zwei neue UserIds muessen verschieden sein");
    }

    #[test]
    fn node_id_display() {
        let id = NodeId(Uuid::nil());
        assert!(id.to_string().starts_with("node:"));
    }

    #[test]
    fn ids_sind_serde_kompatibel() {
        let uid = UserId::new();
        let json = serde_json::to_string(&uid).unwrap();
        let uid2: UserId = serde_json::from_str(&json).unwrap();
        assert_eq!(uid, uid2);
    }

    #[test]
    fn position_abstand() {
        let a = Position::neu(0.0, 0.0, 0.0);
        let b = Position::neu(3.0, 4.0, 0.0);
        assert!((a.abstand(&b) - 5.0).abs() < f64::EPSILON);
    }
}
