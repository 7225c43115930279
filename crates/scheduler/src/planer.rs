//! Tick-Planer – Serieller Herzschlag des Servers
//!
//! Pro Tick laufen der Reihe nach: die Pro-Tick-Callbacks, jeden N-ten
//! Tick die Pro-Sekunde-Callbacks, danach die aufgeschobenen Einmal-
//! Jobs. Waehrend des gesamten Ticks haelt der Treiber das Tick-Schloss;
//! wer es von aussen haelt, serialisiert sich damit gegen den Tick.
//!
//! ## Aufschub-Puffer
//! Einmal-Jobs landen in zwei Slots: `faellig` wird in diesem Tick
//! abgearbeitet, `eingang` sammelt alles was waehrend des Ticks neu
//! ankommt. Am Tick-Ende wandert `eingang` nach `faellig`. Ein Job der
//! sich selbst neu einreiht laeuft dadurch im naechsten Tick genau
//! einmal, nie zweimal im selben.
//!
//! ## Panik-Isolation
//! Jeder Callback laeuft unter `catch_unwind`; eine Panik wird geloggt
//! und der Tick laeuft weiter. Ein fehlerhafter Kollaborateur darf den
//! Herzschlag nicht anhalten.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Standard-Taktlaenge: 50 ms, 20 Ticks pro Sekunde
pub const STANDARD_TAKT: Duration = Duration::from_millis(50);

/// Pro-Sekunde-Callbacks laufen jeden N-ten Tick
const PRO_SEKUNDE_TEILER: u64 = 50;

type WiederholJob = Box<dyn FnMut() + Send>;
type EinmalJob = Box<dyn FnOnce() + Send>;

struct PlanerInnen {
    /// Haelt der Treiber ueber den gesamten Tick; externe Halter
    /// serialisieren sich gegen den Tick
    tick_schloss: Mutex<()>,
    pro_tick: Mutex<Vec<(&'static str, WiederholJob)>>,
    pro_sekunde: Mutex<Vec<(&'static str, WiederholJob)>>,
    /// Einmal-Jobs dieses Ticks
    faellig: Mutex<Vec<EinmalJob>>,
    /// Einmal-Jobs die waehrend eines Ticks ankommen
    eingang: Mutex<Vec<EinmalJob>>,
    im_tick: AtomicBool,
    tick_zaehler: AtomicU64,
    /// Teiler fuer die Pro-Sekunde-Schiene
    teiler: u64,
    takt: Duration,
    letzter_tick: Mutex<Instant>,
    /// Treiber-Generation; ein Treiber beendet sich sobald sie nicht
    /// mehr seine eigene ist
    generation: AtomicU64,
}

/// Kooperativer Tick-Planer
///
/// Klonbar; alle Klone teilen denselben Zustand.
#[derive(Clone)]
pub struct TickPlaner {
    innen: Arc<PlanerInnen>,
}

impl TickPlaner {
    /// Erstellt einen Planer mit Standard-Takt (50 ms)
    pub fn neu() -> Self {
        Self::mit_takt(STANDARD_TAKT, PRO_SEKUNDE_TEILER)
    }

    /// Erstellt einen Planer mit eigenem Takt und Sekunden-Teiler
    pub fn mit_takt(takt: Duration, teiler: u64) -> Self {
        Self {
            innen: Arc::new(PlanerInnen {
                tick_schloss: Mutex::new(()),
                pro_tick: Mutex::new(Vec::new()),
                pro_sekunde: Mutex::new(Vec::new()),
                faellig: Mutex::new(Vec::new()),
                eingang: Mutex::new(Vec::new()),
                im_tick: AtomicBool::new(false),
                tick_zaehler: AtomicU64::new(0),
                teiler: teiler.max(1),
                takt,
                letzter_tick: Mutex::new(Instant::now()),
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// Registriert einen Callback der jeden Tick laeuft
    pub fn pro_tick(&self, name: &'static str, job: impl FnMut() + Send + 'static) {
        self.innen.pro_tick.lock().push((name, Box::new(job)));
    }

    /// Registriert einen Callback der einmal pro Sekunde laeuft
    pub fn pro_sekunde(&self, name: &'static str, job: impl FnMut() + Send + 'static) {
        self.innen.pro_sekunde.lock().push((name, Box::new(job)));
    }

    /// Reiht einen Einmal-Job fuer den naechsten Tick ein
    ///
    /// Aus einem laufenden Tick heraus eingereihte Jobs laufen im
    /// naechsten Tick, nie noch im selben.
    pub fn naechster_tick(&self, job: impl FnOnce() + Send + 'static) {
        if self.innen.im_tick.load(Ordering::Acquire) {
            self.innen.eingang.lock().push(Box::new(job));
        } else {
            self.innen.faellig.lock().push(Box::new(job));
        }
    }

    /// Anzahl der bisher gelaufenen Ticks
    pub fn tick_zaehler(&self) -> u64 {
        self.innen.tick_zaehler.load(Ordering::Relaxed)
    }

    /// Zeit seit dem letzten abgeschlossenen Tick
    pub fn seit_letztem_tick(&self) -> Duration {
        self.innen.letzter_tick.lock().elapsed()
    }

    /// Konfigurierte Taktlaenge
    pub fn takt(&self) -> Duration {
        self.innen.takt
    }

    fn isoliert(name: &str, job: &mut WiederholJob) {
        if catch_unwind(AssertUnwindSafe(|| job())).is_err() {
            tracing::error!(callback = name, "Tick-Callback hat panisch abgebrochen");
        }
    }

    /// Fuehrt genau einen Tick aus
    ///
    /// Wird normalerweise vom Treiber aufgerufen; Tests rufen ihn
    /// direkt.
    pub fn tick(&self) {
        let innen = &self.innen;
        let _schloss = innen.tick_schloss.lock();
        innen.im_tick.store(true, Ordering::Release);

        let nummer = innen.tick_zaehler.fetch_add(1, Ordering::Relaxed) + 1;

        {
            let mut jobs = innen.pro_tick.lock();
            for (name, job) in jobs.iter_mut() {
                Self::isoliert(name, job);
            }
        }

        if nummer % innen.teiler == 0 {
            let mut jobs = innen.pro_sekunde.lock();
            for (name, job) in jobs.iter_mut() {
                Self::isoliert(name, job);
            }
        }

        let einmal: Vec<EinmalJob> = std::mem::take(&mut *innen.faellig.lock());
        for job in einmal {
            if catch_unwind(AssertUnwindSafe(job)).is_err() {
                tracing::error!("Einmal-Job hat panisch abgebrochen");
            }
        }

        // Waehrend des Ticks angekommene Jobs werden im naechsten faellig
        {
            let mut eingang = innen.eingang.lock();
            innen.faellig.lock().append(&mut eingang);
        }

        *innen.letzter_tick.lock() = Instant::now();
        innen.im_tick.store(false, Ordering::Release);
    }

    /// Startet den Tick-Treiber als tokio-Task
    ///
    /// Ein bereits laufender Treiber wird durch den Generationswechsel
    /// beendet; es laeuft immer hoechstens ein Treiber.
    pub fn starten(&self) {
        let meine_generation = self.innen.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let planer = self.clone();
        *self.innen.letzter_tick.lock() = Instant::now();

        tokio::spawn(async move {
            let mut intervall = tokio::time::interval(planer.innen.takt);
            intervall.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            tracing::info!(
                takt_ms = planer.innen.takt.as_millis() as u64,
                generation = meine_generation,
                "Tick-Treiber gestartet"
            );
            loop {
                intervall.tick().await;
                if planer.innen.generation.load(Ordering::SeqCst) != meine_generation {
                    tracing::debug!(generation = meine_generation, "Tick-Treiber abgeloest");
                    return;
                }
                let p = planer.clone();
                // Der Tick laeuft blockierend; ein haengender Callback
                // darf den tokio-Worker nicht festnageln
                let _ = tokio::task::spawn_blocking(move || p.tick()).await;
            }
        });
    }

    /// Haelt den aktuellen Treiber an (Generationswechsel)
    pub fn anhalten(&self) {
        self.innen.generation.fetch_add(1, Ordering::SeqCst);
    }
}

impl Default for TickPlaner {
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
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn pro_tick_laeuft_jeden_tick() {
        let planer = TickPlaner::mit_takt(Duration::from_millis(1), 50);
        let zaehler = Arc::new(AtomicUsize::new(0));
        let z = zaehler.clone();
        planer.pro_tick("test", move || {
            z.fetch_add(1, Ordering::SeqCst);
        });

        for _ in 0..5 {
            planer.tick();
        }
        assert_eq!(zaehler.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn pro_sekunde_laeuft_jeden_nten_tick() {
        let planer = TickPlaner::mit_takt(Duration::from_millis(1), 4);
        let zaehler = Arc::new(AtomicUsize::new(0));
        let z = zaehler.clone();
        planer.pro_sekunde("test", move || {
            z.fetch_add(1, Ordering::SeqCst);
        });

        for _ in 0..9 {
            planer.tick();
        }
        // Tick 4 und 8
        assert_eq!(zaehler.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn einmal_job_laeuft_genau_einmal() {
        let planer = TickPlaner::neu();
        let zaehler = Arc::new(AtomicUsize::new(0));
        let z = zaehler.clone();
        planer.naechster_tick(move || {
            z.fetch_add(1, Ordering::SeqCst);
        });

        planer.tick();
        planer.tick();
        assert_eq!(zaehler.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn selbst_einreihender_job_laeuft_erst_im_naechsten_tick() {
        let planer = TickPlaner::neu();
        let laeufe = Arc::new(AtomicUsize::new(0));

        let p = planer.clone();
        let l = laeufe.clone();
        planer.naechster_tick(move || {
            l.fetch_add(1, Ordering::SeqCst);
            let l2 = l.clone();
            p.naechster_tick(move || {
                l2.fetch_add(1, Ordering::SeqCst);
            });
        });

        planer.tick();
        assert_eq!(laeufe.load(Ordering::SeqCst), 1, "Nachzuegler nicht im selben Tick");
        planer.tick();
        assert_eq!(laeufe.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn panik_haelt_den_tick_nicht_an() {
        let planer = TickPlaner::neu();
        let zaehler = Arc::new(AtomicUsize::new(0));

        planer.pro_tick("panisch", || panic!("absichtlich"));
        let z = zaehler.clone();
        planer.pro_tick("brav", move || {
            z.fetch_add(1, Ordering::SeqCst);
        });

        planer.tick();
        planer.tick();
        assert_eq!(zaehler.load(Ordering::SeqCst), 2);
        assert_eq!(planer.tick_zaehler(), 2);
    }

    #[test]
    fn reihenfolge_pro_tick_vor_sekunde_vor_einmal() {
        let planer = TickPlaner::mit_takt(Duration::from_millis(1), 1);
        let protokoll = Arc::new(Mutex::new(Vec::new()));

        let p = protokoll.clone();
        planer.pro_tick("a", move || p.lock().push("tick"));
        let p = protokoll.clone();
        planer.pro_sekunde("b", move || p.lock().push("sekunde"));
        let p = protokoll.clone();
        planer.naechster_tick(move || p.lock().push("einmal"));

        planer.tick();
        assert_eq!(*protokoll.lock(), vec!["tick", "sekunde", "einmal"]);
    }

    #[tokio::test]
    async fn treiber_tickt_und_laesst_sich_abloesen() {
        let planer = TickPlaner::mit_takt(Duration::from_millis(5), 50);
        planer.starten();

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(planer.tick_zaehler() > 0, "Treiber muss getickt haben");

        planer.anhalten();
        tokio::time::sleep(Duration::from_millis(30)).await;
        let stand = planer.tick_zaehler();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(planer.tick_zaehler(), stand, "abgeloester Treiber tickt nicht weiter");
    }
}
