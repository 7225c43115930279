//! Waechter – Stillstands-Ueberwachung des Tick-Treibers
//!
//! Prueft in grobem Abstand ob der Planer noch tickt. Bleibt der letzte
//! Tick laenger als die Schwelle aus, gilt der Treiber als haengend und
//! wird abgeloest und neu gestartet. Der haengende Tick selbst laeuft
//! gegebenenfalls zu Ende; das Tick-Schloss serialisiert ihn gegen den
//! neuen Treiber.

use std::time::Duration;

use klangnetz_core::KlangnetzFehler;

use crate::planer::TickPlaner;

/// Stillstands-Schwelle: 10 Sekunden ohne Tick
const STANDARD_SCHWELLE: Duration = Duration::from_secs(10);

/// Pruefabstand des Waechters
const PRUEF_INTERVALL: Duration = Duration::from_secs(2);

/// Waechter ueber einen [`TickPlaner`]
pub struct Waechter {
    schwelle: Duration,
    pruef_intervall: Duration,
}

impl Waechter {
    /// Erstellt einen Waechter mit Standard-Schwelle (10 s)
    pub fn neu() -> Self {
        Self {
            schwelle: STANDARD_SCHWELLE,
            pruef_intervall: PRUEF_INTERVALL,
        }
    }

    /// Erstellt einen Waechter mit eigener Schwelle und Pruefabstand
    pub fn mit_schwelle(schwelle: Duration, pruef_intervall: Duration) -> Self {
        Self {
            schwelle,
            pruef_intervall,
        }
    }

    /// Startet die Ueberwachung als tokio-Task
    pub fn starten(self, planer: TickPlaner) {
        tokio::spawn(async move {
            let mut intervall = tokio::time::interval(self.pruef_intervall);
            // Erster Schuss feuert sofort; der interessiert uns nicht
            intervall.tick().await;
            loop {
                intervall.tick().await;
                let stillstand = planer.seit_letztem_tick();
                if stillstand > self.schwelle {
                    let fehler = KlangnetzFehler::SchedulerBlockiert;
                    tracing::error!(
                        stillstand_ms = stillstand.as_millis() as u64,
                        %fehler,
                        "Tick-Treiber wird neu gestartet"
                    );
                    planer.starten();
                }
            }
        });
    }
}

impl Default for Waechter {
    fn default() -> Self {
        Self::neu()
    }
}
