//! Owner of the current session and its durable copy.

use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult};
use crate::model::{Role, Session, TaxProfile};
use crate::storage::KeyValueStore;

pub const SESSION_KEY: &str = "factufacil_sesion";

pub struct SessionStore {
    storage: Box<dyn KeyValueStore>,
    current: Option<Session>,
}

impl SessionStore {
    pub fn new(storage: Box<dyn KeyValueStore>) -> Self {
        Self {
            storage,
            current: None,
        }
    }

    pub fn current(&self) -> Option<&Session> {
        self.current.as_ref()
    }

    pub fn role(&self) -> Option<Role> {
        self.current.as_ref().map(Session::role)
    }

    /// Load the persisted session, if any.
    ///
    /// Missing, unreadable or corrupt data all mean "no session".
    pub fn restore(&mut self) -> Option<&Session> {
        self.current = match self.storage.get(SESSION_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<Session>(&raw) {
                Ok(session) => {
                    info!(role = ?session.role(), "Session restored");
                    Some(session)
                }
                Err(e) => {
                    warn!(error = %e, "Stored session is corrupt, ignoring it");
                    None
                }
            },
            Ok(None) => {
                debug!("No stored session");
                None
            }
            Err(e) => {
                warn!(error = %e, "Could not read stored session");
                None
            }
        };
        self.current.as_ref()
    }

    /// Replace the current session and persist it.
    ///
    /// Returns the profile list carried by the session, which the caller
    /// uses to refresh its working copy.
    pub fn save(&mut self, session: Session) -> AppResult<Option<&[TaxProfile]>> {
        let raw = serde_json::to_string(&session)?;
        self.storage.set(SESSION_KEY, &raw)?;
        debug!(role = ?session.role(), "Session saved");
        self.current = Some(session);
        Ok(self.tax_profiles())
    }

    /// Write a refreshed profile list into the customer session and persist.
    pub fn update_tax_profiles(&mut self, profiles: Vec<TaxProfile>) -> AppResult<()> {
        let Some(Session::Customer(customer)) = self.current.clone() else {
            return Err(AppError::NoSession);
        };
        let mut customer = customer;
        customer.usuario.razones = Some(profiles);
        self.save(Session::Customer(customer))?;
        Ok(())
    }

    /// Drop the session and erase its durable copy.
    pub fn clear(&mut self) -> AppResult<()> {
        self.current = None;
        self.storage.remove(SESSION_KEY)?;
        info!("Session cleared");
        Ok(())
    }

    fn tax_profiles(&self) -> Option<&[TaxProfile]> {
        self.current
            .as_ref()?
            .as_customer()?
            .usuario
            .razones
            .as_deref()
    }
}
