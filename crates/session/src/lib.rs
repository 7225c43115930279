//! Klangnetz Session – Verbindungs- und RTC-Zustand pro User
//!
//! Jeder User hat genau eine lebende `Verbindung` auf dem Node der ihn
//! haelt. Der Zustand wird ausschliesslich vom Tick-Thread mutiert;
//! andere Nodes sehen ihn nur ueber relayte Resync-Pakete, niemals ueber
//! geteilten Speicher.

pub mod handler;
pub mod register;
pub mod rtc;
pub mod verbindung;

pub use handler::ClientStateHandler;
pub use register::VerbindungsRegister;
pub use rtc::{BlockGrund, RtcSitzung};
pub use verbindung::Verbindung;
