//! Handler-Registry – Synchroner Dispatch nach Pakettyp
//!
//! Explizite Zuordnungstabelle PaketTyp -> Handler. Der Dispatch laeuft
//! synchron auf dem aufrufenden Thread bzw. Tick. Zwei Garantien:
//! - Ein unregistrierter Typ ist ein geloggter No-Op, niemals ein Fehler
//!   (Version-Skew zwischen Nodes).
//! - Handler-Fehler werden geloggt und eingedaemmt – sie duerfen die
//!   Dispatch-Grenze nicht ueberschreiten.

use dashmap::DashMap;
use klangnetz_core::types::NodeId;
use klangnetz_core::Result;
use std::sync::Arc;

use crate::pakete::{PaketPayload, PaketTyp};
use crate::wire::PaketUmschlag;

// ---------------------------------------------------------------------------
// PaketHandler
// ---------------------------------------------------------------------------

/// Handler fuer einen einzelnen Pakettyp
pub trait PaketHandler: Send + Sync {
    /// Verarbeitet eine dekodierte Payload
    fn verarbeiten(&self, quelle: NodeId, payload: PaketPayload) -> Result<()>;
}

/// Closure-Adapter fuer einfache Handler
struct FunktionsHandler<F>(F);

impl<F> PaketHandler for FunktionsHandler<F>
where
    F: Fn(NodeId, PaketPayload) -> Result<()> + Send + Sync,
{
    fn verarbeiten(&self, quelle: NodeId, payload: PaketPayload) -> Result<()> {
        (self.0)(quelle, payload)
    }
}

// ---------------------------------------------------------------------------
// HandlerRegister
// ---------------------------------------------------------------------------

/// Dispatch-Tabelle aller registrierten Paket-Handler
///
/// Thread-safe und `Clone`-faehig (innerer Arc).
#[derive(Clone, Default)]
pub struct HandlerRegister {
    handler: Arc<DashMap<PaketTyp, Arc<dyn PaketHandler>>>,
}

impl HandlerRegister {
    /// Erstellt eine neue leere Registry
    pub fn neu() -> Self {
        Self {
            handler: Arc::new(DashMap::new()),
        }
    }

    /// Registriert einen Handler fuer einen Pakettyp
    ///
    /// Ein bereits registrierter Handler fuer denselben Typ wird ersetzt.
    pub fn registrieren(&self, typ: PaketTyp, handler: Arc<dyn PaketHandler>) {
        self.handler.insert(typ, handler);
        tracing::debug!(?typ, "Paket-Handler registriert");
    }

    /// Registriert eine Closure als Handler
    pub fn registrieren_fn<F>(&self, typ: PaketTyp, f: F)
    where
        F: Fn(NodeId, PaketPayload) -> Result<()> + Send + Sync + 'static,
    {
        self.registrieren(typ, Arc::new(FunktionsHandler(f)));
    }

    /// Gibt alle registrierten Pakettypen zurueck
    pub fn registrierte_typen(&self) -> Vec<PaketTyp> {
        self.handler.iter().map(|e| *e.key()).collect()
    }

    /// Verarbeitet einen Umschlag synchron
    ///
    /// Gibt `Err` nur bei nicht dekodierbarer Payload zurueck (der
    /// Aufrufer verwirft und macht weiter). Ein unbekannter Typ und
    /// Handler-Fehler sind hier bereits eingedaemmt.
    pub fn dispatch(&self, umschlag: &PaketUmschlag) -> Result<()> {
        let handler = match self.handler.get(&umschlag.typ) {
            Some(eintrag) => Arc::clone(eintrag.value()),
            None => {
                tracing::debug!(
                    typ = ?umschlag.typ,
                    quelle = %umschlag.quelle,
                    "Kein Handler registriert – Umschlag verworfen"
                );
                return Ok(());
            }
        };

        let payload = umschlag.payload_dekodieren()?;

        if let Err(e) = handler.verarbeiten(umschlag.quelle, payload) {
            tracing::warn!(
                typ = ?umschlag.typ,
                quelle = %umschlag.quelle,
                fehler = %e,
                "Paket-Handler fehlgeschlagen"
            );
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
