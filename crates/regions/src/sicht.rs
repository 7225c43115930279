//! Sicht-Orakel – Hindernisse zwischen zwei Positionen
//!
//! Die eigentliche Weltgeometrie (Raytracing, Line-of-Sight) liegt bei
//! einem externen Kollaborateur. Ist das Feature deaktiviert, liefert
//! der `NullOrakel`-Stub immer null Hindernisse.

use klangnetz_core::types::Position;

/// Orakel fuer die Anzahl der Hindernisse auf der Sichtlinie a -> b
pub trait SichtOrakel: Send + Sync {
    /// Anzahl der Hindernisse zwischen zwei Positionen
    fn hindernisse(&self, a: &Position, b: &Position) -> u32;
}

/// Stub ohne Weltgeometrie: freie Sicht ueberall
#[derive(Debug, Clone, Copy, Default)]
pub struct NullOrakel;

impl SichtOrakel for NullOrakel {
    fn hindernisse(&self, _a: &Position, _b: &Position) -> u32 {
        0
    }
}
