//! Aufgabe – Einmal beschreibbare Ergebnis-Zelle
//!
//! Verbindet asynchrone Arbeit (Bus-Antworten, externe Lookups) mit der
//! Tick-Welt. Die Zelle wird genau einmal besiedelt: der erste Ausgang
//! gewinnt, jeder weitere Versuch ist ein No-Op. Callbacks feuern genau
//! einmal, auch wenn sie erst nach dem Ausgang registriert werden.
//!
//! `warten_mit_timeout` blockiert den aufrufenden Thread und ist fuer
//! Setup-Pfade gedacht. Niemals aus einem Tick-Callback aufrufen: der
//! Waechter wuerde den Treiber als haengend abloesen.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use klangnetz_core::{KlangnetzFehler, Result};

/// Abfrage-Abstand beim blockierenden Warten
const POLL_ABSTAND: Duration = Duration::from_millis(100);

enum Zustand<T> {
    Offen,
    Fertig(T),
    Fehlgeschlagen(String),
}

struct AufgabeInnen<T> {
    zustand: Zustand<T>,
    bei_fertig: Vec<Box<dyn FnOnce(&T) + Send>>,
    bei_fehler: Vec<Box<dyn FnOnce(&str) + Send>>,
}

/// Einmal beschreibbare Ergebnis-Zelle
///
/// Klonbar; alle Klone teilen dieselbe Zelle.
pub struct Aufgabe<T> {
    innen: Arc<Mutex<AufgabeInnen<T>>>,
}

impl<T> Clone for Aufgabe<T> {
    fn clone(&self) -> Self {
        Self {
            innen: Arc::clone(&self.innen),
        }
    }
}

impl<T: Clone + Send + 'static> Aufgabe<T> {
    /// Erstellt eine offene Aufgabe
    pub fn neu() -> Self {
        Self {
            innen: Arc::new(Mutex::new(AufgabeInnen {
                zustand: Zustand::Offen,
                bei_fertig: Vec::new(),
                bei_fehler: Vec::new(),
            })),
        }
    }

    /// Ist die Aufgabe abgeschlossen (Erfolg oder Fehler)?
    pub fn ist_abgeschlossen(&self) -> bool {
        !matches!(self.innen.lock().zustand, Zustand::Offen)
    }

    /// Registriert einen Erfolgs-Callback
    ///
    /// Ist die Aufgabe bereits fertig, feuert er sofort im Aufrufer.
    pub fn bei_fertig(&self, callback: impl FnOnce(&T) + Send + 'static) {
        let mut innen = self.innen.lock();
        match &innen.zustand {
            Zustand::Fertig(wert) => {
                let wert = wert.clone();
                drop(innen);
                callback(&wert);
            }
            Zustand::Offen => innen.bei_fertig.push(Box::new(callback)),
            Zustand::Fehlgeschlagen(_) => {}
        }
    }

    /// Registriert einen Fehler-Callback
    pub fn bei_fehler(&self, callback: impl FnOnce(&str) + Send + 'static) {
        let mut innen = self.innen.lock();
        match &innen.zustand {
            Zustand::Fehlgeschlagen(grund) => {
                let grund = grund.clone();
                drop(innen);
                callback(&grund);
            }
            Zustand::Offen => innen.bei_fehler.push(Box::new(callback)),
            Zustand::Fertig(_) => {}
        }
    }

    /// Besiedelt die Zelle mit einem Ergebnis
    ///
    /// No-Op wenn bereits abgeschlossen; gibt zurueck ob dieser Aufruf
    /// gewonnen hat.
    pub fn fertigstellen(&self, wert: T) -> bool {
        let mut innen = self.innen.lock();
        if !matches!(innen.zustand, Zustand::Offen) {
            return false;
        }
        innen.zustand = Zustand::Fertig(wert.clone());
        let callbacks = std::mem::take(&mut innen.bei_fertig);
        innen.bei_fehler.clear();
        drop(innen);
        for callback in callbacks {
            callback(&wert);
        }
        true
    }

    /// Besiedelt die Zelle mit einem Fehler
    pub fn fehlschlagen(&self, grund: impl Into<String>) -> bool {
        let grund = grund.into();
        let mut innen = self.innen.lock();
        if !matches!(innen.zustand, Zustand::Offen) {
            return false;
        }
        innen.zustand = Zustand::Fehlgeschlagen(grund.clone());
        let callbacks = std::mem::take(&mut innen.bei_fehler);
        innen.bei_fertig.clear();
        drop(innen);
        for callback in callbacks {
            callback(&grund);
        }
        true
    }

    /// Blockiert den aufrufenden Thread bis zum Abschluss
    ///
    /// Niemals aus einem Tick-Callback aufrufen.
    pub fn warten_mit_timeout(&self, timeout: Duration) -> Result<T> {
        let frist = Instant::now() + timeout;
        loop {
            {
                let innen = self.innen.lock();
                match &innen.zustand {
                    Zustand::Fertig(wert) => return Ok(wert.clone()),
                    Zustand::Fehlgeschlagen(grund) => {
                        return Err(KlangnetzFehler::AufgabeFehlgeschlagen(grund.clone()))
                    }
                    Zustand::Offen => {}
                }
            }
            if Instant::now() >= frist {
                return Err(KlangnetzFehler::Zeitueberschreitung {
                    sekunden: timeout.as_secs().max(1),
                });
            }
            std::thread::sleep(POLL_ABSTAND.min(timeout));
        }
    }
}

impl<T: Clone + Send + 'static> Default for Aufgabe<T> {
    fn default() -> Self {
        Self::neu()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn erster_ausgang_gewinnt() {
        let aufgabe: Aufgabe<u32> = Aufgabe::neu();

        assert!(aufgabe.fertigstellen(1));
        assert!(!aufgabe.fertigstellen(2));
        assert!(!aufgabe.fehlschlagen("zu spaet"));

        assert_eq!(aufgabe.warten_mit_timeout(Duration::from_secs(1)).unwrap(), 1);
    }

    #[test]
    fn callbacks_feuern_genau_einmal() {
        let aufgabe: Aufgabe<&'static str> = Aufgabe::neu();
        let zaehler = Arc::new(AtomicUsize::new(0));

        let z = zaehler.clone();
        aufgabe.bei_fertig(move |_| {
            z.fetch_add(1, Ordering::SeqCst);
        });

        aufgabe.fertigstellen("ok");
        aufgabe.fertigstellen("nochmal");
        assert_eq!(zaehler.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn spaeter_callback_feuert_sofort() {
        let aufgabe: Aufgabe<u32> = Aufgabe::neu();
        aufgabe.fertigstellen(7);

        let gesehen = Arc::new(AtomicUsize::new(0));
        let g = gesehen.clone();
        aufgabe.bei_fertig(move |wert| {
            g.store(*wert as usize, Ordering::SeqCst);
        });
        assert_eq!(gesehen.load(Ordering::SeqCst), 7);
    }

    #[test]
    fn fehler_feuert_nur_fehler_callbacks() {
        let aufgabe: Aufgabe<u32> = Aufgabe::neu();
        let erfolge = Arc::new(AtomicUsize::new(0));
        let fehler = Arc::new(AtomicUsize::new(0));

        let e = erfolge.clone();
        aufgabe.bei_fertig(move |_| {
            e.fetch_add(1, Ordering::SeqCst);
        });
        let f = fehler.clone();
        aufgabe.bei_fehler(move |_| {
            f.fetch_add(1, Ordering::SeqCst);
        });

        aufgabe.fehlschlagen("kaputt");
        assert_eq!(erfolge.load(Ordering::SeqCst), 0);
        assert_eq!(fehler.load(Ordering::SeqCst), 1);

        let ergebnis = aufgabe.warten_mit_timeout(Duration::from_millis(10));
        assert!(matches!(
            ergebnis,
            Err(KlangnetzFehler::AufgabeFehlgeschlagen(grund)) if grund == "kaputt"
        ));
    }

    #[test]
    fn warten_laeuft_in_timeout() {
        let aufgabe: Aufgabe<u32> = Aufgabe::neu();
        let ergebnis = aufgabe.warten_mit_timeout(Duration::from_millis(50));
        assert!(matches!(
            ergebnis,
            Err(KlangnetzFehler::Zeitueberschreitung { .. })
        ));
    }

    #[test]
    fn warten_sieht_ergebnis_von_anderem_thread() {
        let aufgabe: Aufgabe<u32> = Aufgabe::neu();
        let schreiber = aufgabe.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(30));
            schreiber.fertigstellen(42);
        });

        let wert = aufgabe.warten_mit_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(wert, 42);
    }
}
