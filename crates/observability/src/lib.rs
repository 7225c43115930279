//! Klangnetz Observability – Structured Logging
//!
//! Logging laeuft ueber `tracing`; die Initialisierung liest Level und
//! Format aus der Konfiguration, Umgebungsvariablen haben Vorrang.

pub mod logging;

pub use logging::{log_format_gueltig, log_level_gueltig, logging_initialisieren};
