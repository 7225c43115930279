//! Structured Logging Setup via tracing-subscriber
//!
//! Umgebungsvariablen haben Vorrang vor der Konfigurationsdatei:
//! - `KN_LOG_LEVEL`: Log-Level bzw. EnvFilter-Direktive, Standard: info
//! - `KN_LOG_FORMAT`: Format (text/json), Standard: text

use tracing_subscriber::{fmt, EnvFilter};

/// Initialisiert das Logging-System.
///
/// `level` und `format` kommen aus der Konfigurationsdatei und gelten
/// nur wenn die jeweilige Umgebungsvariable nicht gesetzt ist. Ein
/// unbekanntes Format faellt auf `text` zurueck.
pub fn logging_initialisieren(level: &str, format: &str) {
    let filter = EnvFilter::try_from_env("KN_LOG_LEVEL")
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if wirksames_format(format) == "json" {
        fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(true)
            .with_current_span(true)
            .init();
    } else {
        fmt().with_env_filter(filter).with_target(true).init();
    }
}

/// Wirksames Log-Format: Umgebung vor Konfiguration, Unbekanntes wird text
fn wirksames_format(format: &str) -> String {
    let format = std::env::var("KN_LOG_FORMAT").unwrap_or_else(|_| format.to_string());
    if log_format_gueltig(&format) {
        format
    } else {
        "text".to_string()
    }
}

/// Validiert ob ein Log-Level-String gueltig ist.
pub fn log_level_gueltig(level: &str) -> bool {
    matches!(level, "trace" | "debug" | "info" | "warn" | "error")
}

/// Validiert ob ein Log-Format-String gueltig ist.
pub fn log_format_gueltig(format: &str) -> bool {
    matches!(format, "text" | "json")
}
