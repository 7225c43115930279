//! Klangnetz Scheduler – Kooperatives Tick-Herz des Servers
//!
//! Ein einzelner Tick-Treiber fuehrt alle registrierten Callbacks
//! seriell aus; Verbindungszustand wird nur von diesem Treiber mutiert.
//! Der Waechter ueberwacht den Treiber und startet ihn bei Stillstand
//! neu. `Aufgabe` verbindet asynchrone Ergebnisse mit der Tick-Welt.

pub mod aufgabe;
pub mod planer;
pub mod waechter;

pub use aufgabe::Aufgabe;
pub use planer::{TickPlaner, STANDARD_TAKT};
pub use waechter::Waechter;
