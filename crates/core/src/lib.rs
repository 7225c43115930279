//! Klangnetz Core – Gemeinsame Typen und Fehler
//!
//! Enthaelt die Identifikationstypen, Positionsdaten und den zentralen
//! Fehler-Enum, die von allen anderen Crates verwendet werden.

pub mod error;
pub mod types;

pub use error::{KlangnetzFehler, Result};
pub use types::{NodeId, Position, UserId};
