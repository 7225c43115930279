//! ClientState-Handler – Wendet empfangene Resyncs auf lokale
//! Verbindungen an
//!
//! Ein anderer Node hat den autoritativen Zustand eines Users geaendert
//! und einen vollstaendigen Resync relayt. Der Handler uebernimmt alle
//! Felder ohne eigene Pakete auszuloesen – die Seiteneffekte sind auf
//! dem Ursprungs-Node bereits passiert.

use klangnetz_core::types::NodeId;
use klangnetz_core::Result;
use klangnetz_protocol::pakete::PaketPayload;
use klangnetz_protocol::register::PaketHandler;

use crate::register::VerbindungsRegister;

/// Handler fuer eingehende `ClientState`-Pakete
pub struct ClientStateHandler {
    register: VerbindungsRegister,
}

impl ClientStateHandler {
    /// Erstellt einen neuen Handler ueber dem Verbindungs-Register
    pub fn neu(register: VerbindungsRegister) -> Self {
        Self { register }
    }
}

impl PaketHandler for ClientStateHandler {
    fn verarbeiten(&self, quelle: NodeId, payload: PaketPayload) -> Result<()> {
        let state = match payload {
            PaketPayload::ClientState(state) => state,
            andere => {
                tracing::debug!(typ = ?andere.typ(), "ClientStateHandler ignoriert fremden Typ");
                return Ok(());
            }
        };

        let verbindung = match self.register.holen(&state.user_id) {
            Some(v) => v,
            None => {
                tracing::debug!(
                    user = %state.user_id,
                    quelle = %quelle,
                    "Resync fuer nicht lokal gehaltenen User verworfen"
                );
                return Ok(());
            }
        };

        let mut v = verbindung.lock();
        v.uebernehmen(&state);
        tracing::trace!(user = %state.user_id, quelle = %quelle, "Client-Zustand uebernommen");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use klangnetz_core::types::UserId;
    use klangnetz_protocol::pakete::ClientStatePayload;
    use klangnetz_relay::verzeichnis::{NodeVerzeichnis, SpeicherVerzeichnis};
    use std::sync::Arc;

    fn resync(user_id: UserId) -> PaketPayload {
        PaketPayload::ClientState(ClientStatePayload {
            user_id,
            stream_key: "strm-fremd".into(),
            verbunden: true,
            mikrofon_aktiv: false,
            taub: true,
            auth_token: "neu".into(),
            lautstaerke: 42,
        })
    }

    fn register() -> VerbindungsRegister {
        let verzeichnis = Arc::new(SpeicherVerzeichnis::neu()) as Arc<dyn NodeVerzeichnis>;
        VerbindungsRegister::neu(NodeId::new(), verzeichnis)
    }

    #[test]
    fn resync_wird_uebernommen() {
        let register = register();
        let user = UserId::new();
        let verbindung = register.anmelden(user, "alt");

        let handler = ClientStateHandler::neu(register);
        handler.verarbeiten(NodeId::new(), resync(user)).unwrap();

        let v = verbindung.lock();
        assert!(v.mit_voice_verbunden());
        assert_eq!(v.lautstaerke(), 42);
        assert_eq!(v.auth_token, "neu");
        assert_eq!(v.rtc.stream_key, "strm-fremd");
        assert!(!v.rtc.mikrofon_aktiv);
        assert!(v.rtc.taub);
    }

    #[test]
    fn unbekannter_user_ist_no_op() {
        let handler = ClientStateHandler::neu(register());
        assert!(handler.verarbeiten(NodeId::new(), resync(UserId::new())).is_ok());
    }

    #[test]
    fn fremde_typen_werden_ignoriert() {
        let handler = ClientStateHandler::neu(register());
        let ergebnis =
            handler.verarbeiten(NodeId::new(), PaketPayload::Hinweis { text: "x".into() });
        assert!(ergebnis.is_ok());
    }
}
