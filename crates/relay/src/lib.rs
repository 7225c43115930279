//! Klangnetz Relay – Adressierte Zustellung zwischen Nodes
//!
//! Das Relay stellt Pakete an einen bestimmten User zu, egal auf welchem
//! physischen Node der User gerade haengt. Der Absender kennt nur die
//! UserId – die Zuordnung User -> Node loest das Verzeichnis auf, den
//! Transport uebernimmt ein opaker Pub/Sub-Bus.
//!
//! ## Garantien
//! - Zustellung ist best-effort, hoechstens einmal aus Sicht dieser Schicht
//! - Reihenfolge pro Bus-Kanal, sofern der Bus die Publish-Reihenfolge haelt
//! - Verzeichnis-Miss schlaegt mit `EmpfaengerUnbekannt` fehl und
//!   veroeffentlicht nichts – kein automatischer Retry

pub mod bus;
pub mod relay;
pub mod verzeichnis;

pub use bus::{BusKanal, NachrichtenBus, SpeicherBus};
pub use relay::NodeRelay;
pub use verzeichnis::{NodeVerzeichnis, SpeicherVerzeichnis};
