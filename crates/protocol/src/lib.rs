//! Klangnetz Protokoll – Typisiertes Wire-Format und Handler-Registry
//!
//! Definiert das Umschlag-Format fuer den Node-Bus, alle Paket-Payloads
//! und die synchrone Dispatch-Tabelle. Unbekannte Pakettypen duerfen
//! niemals ueber die Dispatch-Grenze werfen – ein Peer mit abweichender
//! Protokollversion darf Typen senden die dieser Prozess nicht kennt.

pub mod pakete;
pub mod register;
pub mod senke;
pub mod wire;

pub use pakete::{ClientStatePayload, Medien, PaketPayload, PaketTyp};
pub use register::{HandlerRegister, PaketHandler};
pub use senke::{PaketSenke, SammelSenke};
pub use wire::PaketUmschlag;
