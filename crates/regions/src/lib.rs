//! Klangnetz Regionen – Hoerbare Umgebung aus Positionsdaten
//!
//! Verwandelt rohe Positionsproben in Betreten/Verlassen-Ereignisse mit
//! Medien- und Voice-Seiteneffekten. Die Regionsdefinitionen selbst
//! liegen bei einem externen Repository-Kollaborateur; diese Crate
//! konsumiert nur die pro Tick detektierten Regionen.

pub mod naehe;
pub mod region;
pub mod sicht;
pub mod verfolger;

pub use naehe::{NaehenTeilnehmer, NaehenVerfolger};
pub use region::{Region, RegionQuelle};
pub use sicht::{NullOrakel, SichtOrakel};
pub use verfolger::{RegionMeldungen, RegionVerfolger};
