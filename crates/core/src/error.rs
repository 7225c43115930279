//! Fehlertypen fuer Klangnetz
//!
//! Zentraler Fehler-Enum der alle moeglichen Fehlerzustaende abdeckt.
//! Lokale Wiederherstellung hat ueberall Vorrang: Dekodierfehler und
//! unbekannte Empfaenger werden verworfen und geloggt, nur ein
//! blockierter Scheduler fuehrt zum Neustart der Tick-Schleife.

use thiserror::Error;

use crate::types::UserId;

/// Globaler Result-Alias fuer Klangnetz
pub type Result<T> = std::result::Result<T, KlangnetzFehler>;

/// Alle moeglichen Fehler im Klangnetz-System
#[derive(Debug, Error)]
pub enum KlangnetzFehler {
    // --- Protokoll ---
    #[error("Dekodierfehler: {0}")]
    Dekodierfehler(String),

    #[error("Unbekannter Pakettyp: {0}")]
    UnbekannterTyp(u16),

    // --- Relay ---
    #[error("Empfaenger unbekannt: {0}")]
    EmpfaengerUnbekannt(UserId),

    #[error("Versand fehlgeschlagen: {0}")]
    Versand(String),

    // --- Scheduler & Aufgaben ---
    #[error("Zeitlimit ueberschritten nach {sekunden} Sekunden")]
    Zeitueberschreitung { sekunden: u64 },

    #[error("Aufgabe fehlgeschlagen: {0}")]
    AufgabeFehlgeschlagen(String),

    #[error("Scheduler blockiert – Tick-Schleife wird neu gestartet")]
    SchedulerBlockiert,

    // --- Konfiguration ---
    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),

    // --- Intern ---
    #[error("Interner Fehler: {0}")]
    Intern(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl KlangnetzFehler {
    /// Erstellt einen internen Fehler aus einer beliebigen Nachricht
    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }

    /// Gibt true zurueck wenn der Fehler nur verworfen und geloggt wird
    /// (nicht-fatal fuer die laufende Verarbeitung)
    pub fn ist_verwerfbar(&self) -> bool {
        matches!(
            self,
            Self::Dekodierfehler(_)
                | Self::UnbekannterTyp(_)
                | Self::EmpfaengerUnbekannt(_)
                | Self::Versand(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fehler_anzeige() {
        let e = KlangnetzFehler::Dekodierfehler("Header zu kurz".into());
        assert_eq!(e.to_string(), "Dekodierfehler: Header zu kurz");
    }

    #[test]
    fn verwerfbar_erkennung() {
        let uid = UserId::new();
        assert!(KlangnetzFehler::EmpfaengerUnbekannt(uid).ist_verwerfbar());
        assert!(KlangnetzFehler::Dekodierfehler("x".into()).ist_verwerfbar());
        assert!(!KlangnetzFehler::SchedulerBlockiert.ist_verwerfbar());
        assert!(!KlangnetzFehler::Zeitueberschreitung { sekunden: 5 }.ist_verwerfbar());
    }

    #[test]
    fn zeitueberschreitung_enthaelt_dauer() {
        let e = KlangnetzFehler::Zeitueberschreitung { sekunden: 10 };
        assert!(e.to_string().contains("10 Sekunden"));
    }
}
