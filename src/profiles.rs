//! A customer's saved tax identities ("razones sociales").
//!
//! The manager keeps a working copy of the list and the selector built from
//! it. Mutations never patch that copy: each one is followed by a full
//! refetch from the API, which also rewrites the session's stored copy.

use tracing::{debug, info};

use crate::api::Backend;
use crate::catalog::SelectOption;
use crate::error::{AppError, AppResult};
use crate::feedback::Feedback;
use crate::form::RequestForm;
use crate::lookup::normalize_rfc;
use crate::model::{Id, TaxProfile, TaxProfileInput};
use crate::session::SessionStore;

/// Selector value meaning "type a new tax identity".
pub const NEW_PROFILE: &str = "__nueva__";

#[derive(Debug, Default)]
pub struct TaxProfileManager {
    profiles: Vec<TaxProfile>,
    options: Vec<SelectOption>,
    selected: Option<Id>,
}

impl TaxProfileManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn profiles(&self) -> &[TaxProfile] {
        &self.profiles
    }

    pub fn options(&self) -> &[SelectOption] {
        &self.options
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn get(&self, id: &str) -> Option<&TaxProfile> {
        self.profiles.iter().find(|p| p.id == id)
    }

    /// Overwrite the working copy (used when a session carrying profiles is
    /// saved).
    pub fn replace(&mut self, profiles: Vec<TaxProfile>) {
        self.profiles = profiles;
    }

    /// The last remaining profile cannot be deleted.
    pub fn can_delete(&self) -> bool {
        self.profiles.len() > 1
    }

    /// Profile menu entries. Editing needs a profile and deleting needs two.
    pub fn menu_actions(&self) -> Vec<&'static str> {
        let mut actions = vec!["Agregar razón social"];
        if !self.profiles.is_empty() {
            actions.extend(["Editar razón social", "Predeterminar razón social"]);
        }
        if self.can_delete() {
            actions.push("Eliminar razón social");
        }
        actions
    }

    /// Rebuild the selector and load the default profile into the form.
    pub fn populate_selector(&mut self, form: &mut RequestForm) {
        self.options = self
            .profiles
            .iter()
            .map(|p| {
                let mut label = format!("{} - {}", p.rfc, p.razon);
                if p.predeterminada {
                    label.push_str(" ★");
                }
                SelectOption::new(p.id.clone(), label)
            })
            .chain(std::iter::once(SelectOption::new(
                NEW_PROFILE,
                "+ Nueva razón social",
            )))
            .collect();

        let default = self
            .profiles
            .iter()
            .find(|p| p.predeterminada)
            .map(|p| p.id.clone());
        self.load_profile(form, default.as_deref());
    }

    /// Copy a profile into the form. `None` or the sentinel blanks the tax
    /// fields. An id missing from the cache is ignored.
    pub fn load_profile(&mut self, form: &mut RequestForm, id: Option<&str>) {
        let id = id.filter(|id| *id != NEW_PROFILE);
        let Some(id) = id else {
            form.clear_tax_identity();
            self.selected = None;
            return;
        };
        let Some(profile) = self.profiles.iter().find(|p| p.id == id) else {
            debug!(id, "Profile not in cache, ignoring selection");
            return;
        };
        form.apply_profile(profile);
        self.selected = Some(profile.id.clone());
    }

    /// Drop the selection once the form no longer holds the selected
    /// profile's identity.
    pub fn sync_selection(&mut self, form: &RequestForm) {
        if self.selected.is_some() && !form.is_linked() {
            debug!("Form diverged from selected profile");
            self.selected = None;
        }
    }

    pub fn validate(input: &TaxProfileInput) -> AppResult<()> {
        let fields = [
            &input.rfc,
            &input.razon,
            &input.regimen,
            &input.cp,
            &input.uso_cfdi,
        ];
        if fields.iter().any(|f| f.trim().is_empty()) {
            return Err(AppError::Validation(
                "RFC, razón social, régimen, código postal y uso de CFDI son obligatorios".into(),
            ));
        }
        Ok(())
    }

    fn normalized(input: &TaxProfileInput) -> TaxProfileInput {
        TaxProfileInput {
            rfc: normalize_rfc(&input.rfc),
            razon: input.razon.trim().to_string(),
            regimen: input.regimen.trim().to_string(),
            cp: input.cp.trim().to_string(),
            uso_cfdi: input.uso_cfdi.trim().to_string(),
            csf: input.csf.clone(),
        }
    }

    pub fn create(
        &mut self,
        backend: &dyn Backend,
        sessions: &mut SessionStore,
        form: &mut RequestForm,
        input: &TaxProfileInput,
    ) -> AppResult<()> {
        Self::validate(input)?;
        backend.create_tax_profile(&Self::normalized(input))?;
        info!("Tax profile created");
        self.refresh(backend, sessions, form)
    }

    pub fn update(
        &mut self,
        backend: &dyn Backend,
        sessions: &mut SessionStore,
        form: &mut RequestForm,
        id: &str,
        input: &TaxProfileInput,
    ) -> AppResult<()> {
        Self::validate(input)?;
        backend.update_tax_profile(id, &Self::normalized(input))?;
        info!(id, "Tax profile updated");
        self.refresh(backend, sessions, form)
    }

    pub fn set_default(
        &mut self,
        backend: &dyn Backend,
        sessions: &mut SessionStore,
        form: &mut RequestForm,
        id: &str,
    ) -> AppResult<()> {
        backend.set_default_tax_profile(id)?;
        info!(id, "Default tax profile changed");
        self.refresh(backend, sessions, form)
    }

    /// Returns `Ok(false)` when the user declined the confirmation.
    pub fn delete(
        &mut self,
        backend: &dyn Backend,
        sessions: &mut SessionStore,
        form: &mut RequestForm,
        ui: &dyn Feedback,
        id: &str,
    ) -> AppResult<bool> {
        if !self.can_delete() {
            return Err(AppError::Validation(
                "Debes conservar al menos una razón social".into(),
            ));
        }
        if !ui.confirm("¿Eliminar esta razón social?") {
            return Ok(false);
        }
        backend.delete_tax_profile(id)?;
        info!(id, "Tax profile deleted");
        self.refresh(backend, sessions, form)?;
        Ok(true)
    }

    /// Refetch the list, persist it into the session and rebuild the selector.
    pub fn refresh(
        &mut self,
        backend: &dyn Backend,
        sessions: &mut SessionStore,
        form: &mut RequestForm,
    ) -> AppResult<()> {
        let profiles = backend.tax_profiles()?;
        debug!(count = profiles.len(), "Tax profiles refreshed");
        self.profiles = profiles.clone();
        sessions.update_tax_profiles(profiles)?;
        self.populate_selector(form);
        Ok(())
    }
}
