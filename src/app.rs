//! The application container.
//!
//! [`App`] owns the session, every controller and the feedback surface.
//! Front ends call its actions and redraw from [`App::screen`]. Actions
//! report their own outcome through toasts and also return it, so callers
//! can decide what to do next without re-reporting errors.

use std::rc::Rc;
use std::time::{Duration, Instant};

use reqwest::Url;
use tracing::{debug, info, warn};

use crate::api::Backend;
use crate::catalog::CatalogCache;
use crate::error::{AppError, AppResult};
use crate::feedback::{Feedback, Loading, ToastKind};
use crate::form::{FormField, RequestForm};
use crate::lookup::{self, Debouncer, RfcOutcome};
use crate::model::{
    DashboardStats, InvoiceRequest, ProfileUpdate, Registration, RequestStatus, Session,
    StaffSession, TaxProfileInput,
};
use crate::profiles::TaxProfileManager;
use crate::requests::RequestListController;
use crate::router::{self, DataLoad, Router, Screen, View};
use crate::session::SessionStore;
use crate::share;
use crate::staff_users::{StaffUserDraft, StaffUserManager};
use crate::storage::KeyValueStore;

/// Session-scoped key holding a store id taken from a share link.
pub const STAGED_STORE_KEY: &str = "factufacil_empresa";

/// State of the indicator next to the RFC input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RfcStatus {
    Searching,
    Found,
    New,
}

pub struct App<B: Backend> {
    backend: B,
    ui: Rc<dyn Feedback>,
    sessions: SessionStore,
    ephemeral: Box<dyn KeyValueStore>,
    router: Router,
    pub catalogs: CatalogCache,
    pub profiles: TaxProfileManager,
    pub form: RequestForm,
    pub requests: RequestListController,
    pub staff_users: StaffUserManager,
    rfc_lookup: Debouncer,
    rfc_status: Option<RfcStatus>,
    stats: Option<DashboardStats>,
}

impl<B: Backend> App<B> {
    pub fn new(
        backend: B,
        ui: Rc<dyn Feedback>,
        durable: Box<dyn KeyValueStore>,
        ephemeral: Box<dyn KeyValueStore>,
        lookup_delay: Duration,
    ) -> Self {
        Self {
            backend,
            ui,
            sessions: SessionStore::new(durable),
            ephemeral,
            router: Router::new(),
            catalogs: CatalogCache::new(),
            profiles: TaxProfileManager::new(),
            form: RequestForm::new(),
            requests: RequestListController::new(),
            staff_users: StaffUserManager::new(),
            rfc_lookup: Debouncer::new(lookup_delay),
            rfc_status: None,
            stats: None,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn session(&self) -> Option<&Session> {
        self.sessions.current()
    }

    pub fn screen(&self) -> Screen {
        router::render(self.sessions.current(), &self.router)
    }

    pub fn stats(&self) -> Option<&DashboardStats> {
        self.stats.as_ref()
    }

    pub fn rfc_status(&self) -> Option<RfcStatus> {
        self.rfc_status
    }

    /// Show the outcome of an action and pass it through.
    fn report<T>(&self, result: AppResult<T>, success: Option<&str>, fallback: &str) -> AppResult<T> {
        match &result {
            Ok(_) => {
                if let Some(msg) = success {
                    self.ui.toast(msg, ToastKind::Success);
                }
            }
            Err(e) => {
                debug!(error = %e, "Action failed");
                self.ui.toast(&e.user_message(fallback), ToastKind::Error);
            }
        }
        result
    }

    fn staff(&self) -> AppResult<StaffSession> {
        self.sessions
            .current()
            .and_then(Session::as_staff)
            .cloned()
            .ok_or(AppError::NoSession)
    }

    fn require_customer(&self) -> AppResult<()> {
        match self.sessions.current() {
            Some(Session::Customer(_)) => Ok(()),
            _ => Err(AppError::NoSession),
        }
    }

    // ==========================================
    // Startup & session lifecycle
    // ==========================================

    /// Load catalogs, restore the stored session and mount its panel.
    pub fn start(&mut self) {
        self.catalogs.load(&self.backend);
        let restored = self.sessions.restore().cloned();
        match restored {
            Some(session) => {
                self.backend.set_token(session.token().map(str::to_string));
                if let Some(profiles) = session.as_customer().and_then(|c| c.usuario.razones.clone()) {
                    self.profiles.replace(profiles);
                }
                self.mount();
            }
            None => self.router.reset(),
        }
    }

    /// Remember a store id until the next guest or customer panel mounts.
    pub fn stage_store(&mut self, store_id: &str) -> AppResult<()> {
        self.ephemeral.set(STAGED_STORE_KEY, store_id.trim())?;
        debug!(store_id, "Store staged");
        Ok(())
    }

    fn take_staged_store(&mut self) -> Option<String> {
        let staged = match self.ephemeral.get(STAGED_STORE_KEY) {
            Ok(v) => v.filter(|v| !v.is_empty()),
            Err(e) => {
                warn!(error = %e, "Could not read staged store");
                None
            }
        };
        if staged.is_some() {
            if let Err(e) = self.ephemeral.remove(STAGED_STORE_KEY) {
                warn!(error = %e, "Could not clear staged store");
            }
        }
        staged
    }

    /// Map a share-link key to a catalog store id. Without a catalog the key
    /// is used as given.
    fn resolve_staged(&self, key: &str) -> Option<String> {
        if !self.catalogs.has_stores() {
            return Some(key.to_string());
        }
        match self.catalogs.resolve_store(key) {
            Some(id) => Some(id.to_string()),
            None => {
                warn!(key, "Staged store not in catalog");
                self.ui.toast("La tienda del enlace no está disponible", ToastKind::Info);
                None
            }
        }
    }

    fn mount(&mut self) {
        let Some(session) = self.sessions.current().cloned() else {
            self.router.reset();
            return;
        };
        let staged = match session {
            Session::Staff(_) => None,
            _ => self.take_staged_store().and_then(|key| self.resolve_staged(&key)),
        };

        if let Session::Customer(customer) = &session {
            if customer.usuario.razones.is_none() {
                if let Err(e) = self.profiles.refresh(&self.backend, &mut self.sessions, &mut self.form) {
                    warn!(error = %e, "Could not load tax profiles");
                }
            } else {
                self.profiles.populate_selector(&mut self.form);
            }
        }

        match self.router.mount(&session, staged, &mut self.form) {
            Ok(load) => self.run_load(load),
            Err(e) => warn!(error = %e, "Could not mount panel"),
        }
        info!(role = ?session.role(), view = ?self.router.active(), "Panel mounted");
    }

    fn start_session(&mut self, session: Session) -> AppResult<()> {
        self.backend.set_token(session.token().map(str::to_string));
        if let Some(profiles) = self.sessions.save(session)? {
            self.profiles.replace(profiles.to_vec());
        }
        self.mount();
        Ok(())
    }

    pub fn continue_as_guest(&mut self) -> AppResult<()> {
        let result = self.start_session(Session::Guest);
        self.report(result, None, "No se pudo continuar")
    }

    pub fn login_staff(&mut self, usuario: &str, password: &str) -> AppResult<()> {
        let result = self.login(usuario, password, true);
        self.report(result, Some("¡Bienvenido!"), "Error al iniciar sesión")
    }

    pub fn login_customer(&mut self, email: &str, password: &str) -> AppResult<()> {
        let result = self.login(email, password, false);
        self.report(result, Some("¡Bienvenido!"), "Error al iniciar sesión")
    }

    fn login(&mut self, user: &str, password: &str, staff: bool) -> AppResult<()> {
        let user = user.trim();
        if user.is_empty() || password.is_empty() {
            return Err(AppError::Validation("Completa todos los campos".into()));
        }
        let session = {
            let _loading = Loading::start(&self.ui, "Iniciando sesión...");
            if staff {
                self.backend.login_staff(user, password)?
            } else {
                self.backend.login_customer(user, password)?
            }
        };
        info!(role = ?session.role(), "Logged in");
        self.start_session(session)
    }

    /// Create a customer account. Returns the email to prefill the login.
    pub fn register(&mut self, registration: Registration) -> AppResult<String> {
        let result = self.do_register(registration);
        self.report(result, Some("Cuenta creada. Inicia sesión."), "Error al registrar")
    }

    fn do_register(&mut self, mut registration: Registration) -> AppResult<String> {
        registration.nombre = registration.nombre.trim().to_string();
        registration.email = registration.email.trim().to_string();
        registration.rfc = lookup::normalize_rfc(&registration.rfc);
        registration.razon = registration.razon.trim().to_string();
        registration.cp = registration.cp.trim().to_string();
        if registration.email.is_empty()
            || registration.password.is_empty()
            || registration.rfc.is_empty()
            || registration.razon.is_empty()
        {
            return Err(AppError::Validation("Completa los campos obligatorios".into()));
        }
        let _loading = Loading::start(&self.ui, "Creando cuenta...");
        self.backend.register(&registration)?;
        info!("Customer registered");
        Ok(registration.email)
    }

    /// Drop the session and start over from the login panel.
    pub fn logout(&mut self) -> AppResult<()> {
        self.sessions.clear()?;
        self.backend.set_token(None);
        self.router.reset();
        self.profiles = TaxProfileManager::new();
        self.form = RequestForm::new();
        self.requests = RequestListController::new();
        self.staff_users = StaffUserManager::new();
        self.rfc_lookup.cancel();
        self.rfc_status = None;
        self.stats = None;
        Ok(())
    }

    // ==========================================
    // Navigation
    // ==========================================

    pub fn navigate(&mut self, view: View) -> AppResult<()> {
        let Some(session) = self.sessions.current().cloned() else {
            return Err(AppError::NoSession);
        };
        let load = self.router.navigate_to(&session, view)?;
        self.run_load(load);
        Ok(())
    }

    fn run_load(&mut self, load: Option<DataLoad>) {
        let Some(load) = load else { return };
        debug!(?load, "Loading view data");
        match load {
            DataLoad::DashboardStats => {
                self.stats = match self.backend.dashboard() {
                    Ok(stats) => Some(stats),
                    Err(e) => {
                        warn!(error = %e, "Could not load dashboard");
                        None
                    }
                };
            }
            DataLoad::MyRequests => self.requests.load_mine(&self.backend),
            DataLoad::StaffRequests => match self.staff() {
                Ok(staff) => self.requests.load_for_staff(&self.backend, &staff.empresa_id),
                Err(e) => warn!(error = %e, "Staff list without staff session"),
            },
            DataLoad::StaffUsers => match self.staff() {
                Ok(staff) => self.staff_users.load(&self.backend, &staff),
                Err(e) => warn!(error = %e, "Staff users without staff session"),
            },
        }
    }

    // ==========================================
    // Request form
    // ==========================================

    /// Feed the RFC input. Returns whether a lookup is scheduled.
    pub fn rfc_input(&mut self, raw: &str, now: Instant) -> bool {
        let scheduled = self.rfc_lookup.input(raw, now);
        self.rfc_status = scheduled.then_some(RfcStatus::Searching);
        scheduled
    }

    pub fn rfc_deadline(&self) -> Option<Instant> {
        self.rfc_lookup.deadline()
    }

    /// Run the pending lookup if its deadline has passed.
    pub fn poll_rfc(&mut self, now: Instant) -> Option<RfcStatus> {
        let rfc = self.rfc_lookup.poll(now)?;
        self.rfc_status = match lookup::lookup(&self.backend, &rfc) {
            Ok(RfcOutcome::Found(data)) => {
                self.form.apply_rfc_data(&rfc, &data);
                self.profiles.sync_selection(&self.form);
                Some(RfcStatus::Found)
            }
            Ok(RfcOutcome::New) => Some(RfcStatus::New),
            Err(e) => {
                debug!(error = %e, "RFC lookup failed");
                None
            }
        };
        self.rfc_status
    }

    /// Edit one form field, keeping the profile selection consistent.
    pub fn set_field(&mut self, field: FormField, value: impl Into<String>) {
        self.form.set(field, value);
        self.profiles.sync_selection(&self.form);
    }

    pub fn select_profile(&mut self, id: Option<&str>) {
        self.profiles.load_profile(&mut self.form, id);
    }

    pub fn submit_request(&mut self) -> AppResult<()> {
        let result = self.do_submit();
        self.report(result, Some("¡Solicitud enviada correctamente!"), "Error al enviar")
    }

    fn do_submit(&mut self) -> AppResult<()> {
        let body = self.form.to_submission()?;
        {
            let _loading = Loading::start(&self.ui, "Enviando solicitud...");
            self.backend.submit_request(&body)?;
        }
        info!(store = %body.empresa_id, "Request submitted");
        self.form.clear();
        self.rfc_lookup.cancel();
        self.rfc_status = None;
        if self.require_customer().is_ok() {
            self.profiles.populate_selector(&mut self.form);
        }
        Ok(())
    }

    // ==========================================
    // Customer profile & tax identities
    // ==========================================

    pub fn update_account(&mut self, nombre: &str, password: Option<String>) -> AppResult<()> {
        let result = self.do_update_account(nombre, password);
        self.report(result, Some("Perfil actualizado"), "Error")
    }

    fn do_update_account(&mut self, nombre: &str, password: Option<String>) -> AppResult<()> {
        let Some(Session::Customer(mut customer)) = self.sessions.current().cloned() else {
            return Err(AppError::NoSession);
        };
        let update = ProfileUpdate {
            nombre: nombre.trim().to_string(),
            password: password.filter(|p| !p.is_empty()),
        };
        let refreshed = {
            let _loading = Loading::start(&self.ui, "Guardando...");
            self.backend.update_profile(&update)?
        };
        if let Some(mut user) = refreshed {
            if user.razones.is_none() {
                user.razones = customer.usuario.razones.take();
            }
            customer.usuario = user;
            self.sessions.save(Session::Customer(customer))?;
        }
        Ok(())
    }

    pub fn create_profile(&mut self, input: &TaxProfileInput) -> AppResult<()> {
        let result = self.require_customer().and_then(|()| {
            let _loading = Loading::start(&self.ui, "Guardando...");
            self.profiles
                .create(&self.backend, &mut self.sessions, &mut self.form, input)
        });
        self.report(result, Some("Razón social agregada"), "Error al guardar")
    }

    pub fn update_profile(&mut self, id: &str, input: &TaxProfileInput) -> AppResult<()> {
        let result = self.require_customer().and_then(|()| {
            let _loading = Loading::start(&self.ui, "Guardando...");
            self.profiles
                .update(&self.backend, &mut self.sessions, &mut self.form, id, input)
        });
        self.report(result, Some("Razón social actualizada"), "Error al guardar")
    }

    pub fn set_default_profile(&mut self, id: &str) -> AppResult<()> {
        let result = self.require_customer().and_then(|()| {
            let _loading = Loading::start(&self.ui, "Guardando...");
            self.profiles
                .set_default(&self.backend, &mut self.sessions, &mut self.form, id)
        });
        self.report(result, Some("Razón social predeterminada"), "Error al guardar")
    }

    pub fn delete_profile(&mut self, id: &str) -> AppResult<bool> {
        let result = self.require_customer().and_then(|()| {
            let ui = Rc::clone(&self.ui);
            self.profiles
                .delete(&self.backend, &mut self.sessions, &mut self.form, ui.as_ref(), id)
        });
        let success = matches!(result, Ok(true)).then_some("Razón social eliminada");
        self.report(result, success, "Error al eliminar")
    }

    // ==========================================
    // Staff
    // ==========================================

    pub fn request_detail(&self, id: &str) -> AppResult<InvoiceRequest> {
        let result = self.staff().and_then(|_| {
            let _loading = Loading::start(&self.ui, "Cargando...");
            self.requests.detail(&self.backend, id)
        });
        self.report(result, None, "No se pudo cargar la solicitud")
    }

    pub fn change_status(&mut self, id: &str, status: RequestStatus) -> AppResult<bool> {
        let result = self.staff().and_then(|staff| {
            let _loading = Loading::start(&self.ui, "Actualizando...");
            self.requests.change_status(&self.backend, &staff, id, status)
        });
        let success = match &result {
            Ok(true) => Some(format!("Solicitud marcada como {}", status.as_str().to_lowercase())),
            _ => None,
        };
        self.report(result, success.as_deref(), "Error al actualizar")
    }

    pub fn reload_staff_requests(&mut self) {
        self.run_load(Some(DataLoad::StaffRequests));
    }

    pub fn create_staff_user(&mut self, draft: StaffUserDraft) -> AppResult<()> {
        let result = self.staff().and_then(|staff| {
            let _loading = Loading::start(&self.ui, "Guardando...");
            self.staff_users.create(&self.backend, &staff, draft)
        });
        self.report(result, Some("Usuario creado"), "Error")
    }

    pub fn update_staff_user(&mut self, id: &str, draft: StaffUserDraft) -> AppResult<()> {
        let result = self.staff().and_then(|staff| {
            let _loading = Loading::start(&self.ui, "Guardando...");
            self.staff_users.update(&self.backend, &staff, id, draft)
        });
        self.report(result, Some("Usuario actualizado"), "Error")
    }

    pub fn delete_staff_user(&mut self, id: &str) -> AppResult<bool> {
        let result = self.staff().and_then(|staff| {
            let ui = Rc::clone(&self.ui);
            self.staff_users.delete(&self.backend, &staff, ui.as_ref(), id)
        });
        let success = matches!(result, Ok(true)).then_some("Usuario eliminado");
        self.report(result, success, "Error")
    }

    /// Share link for the logged-in store and the URL of its QR image.
    pub fn store_qr(&self, public: &Url, qr_service: &Url) -> AppResult<(Url, Url)> {
        let staff = self.staff()?;
        let link = share::store_link(public, &staff);
        let image = share::qr_image_url(qr_service, &link);
        Ok((link, image))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PermissionLevel, RfcData};
    use crate::storage::MemoryStore;
    use crate::testing::{
        FakeBackend, RecordingFeedback, customer_session, profile, request, staff_session,
    };
    use crate::upload::StagedFile;

    struct Harness {
        app: App<FakeBackend>,
        ui: Rc<RecordingFeedback>,
        durable: Rc<MemoryStore>,
        ephemeral: Rc<MemoryStore>,
    }

    fn harness(backend: FakeBackend) -> Harness {
        let ui = Rc::new(RecordingFeedback::accepting());
        let durable = Rc::new(MemoryStore::new());
        let ephemeral = Rc::new(MemoryStore::new());
        let app = App::new(
            backend,
            ui.clone(),
            Box::new(durable.clone()),
            Box::new(ephemeral.clone()),
            Duration::from_millis(800),
        );
        Harness {
            app,
            ui,
            durable,
            ephemeral,
        }
    }

    fn last_toast(h: &Harness) -> (String, ToastKind) {
        h.ui.last_toast().unwrap()
    }

    #[test]
    fn empty_credentials_never_reach_the_api() {
        let mut h = harness(FakeBackend::new());
        assert!(h.app.login_customer("  ", "secret").is_err());
        assert_eq!(last_toast(&h), ("Completa todos los campos".to_string(), ToastKind::Error));
        assert_eq!(h.app.backend().count("login_customer"), 0);
        assert_eq!(h.ui.loading.get(), 0);
    }

    #[test]
    fn rejected_login_shows_fallback_and_releases_loading() {
        let mut h = harness(FakeBackend::new());
        h.app.backend().fail_next("login_staff");
        assert!(h.app.login_staff("caja1", "x").is_err());
        assert_eq!(h.ui.loading.get(), 0);
        assert_eq!(last_toast(&h).1, ToastKind::Error);
        assert!(h.app.session().is_none());
    }

    #[test]
    fn staff_login_mounts_request_list_with_token() {
        let backend = FakeBackend::new();
        *backend.login.borrow_mut() = Some(staff_session(PermissionLevel::Gestionar, true));
        *backend.requests.borrow_mut() =
            vec![request("1", RequestStatus::Pendiente, "2024-05-01")];
        let mut h = harness(backend);

        h.app.login_staff("caja1", "pw").unwrap();
        assert_eq!(h.app.screen().active, Some(View::StaffRequests));
        assert_eq!(h.app.requests.requests().len(), 1);
        assert_eq!(h.app.backend().token.borrow().as_deref(), Some("staff-token"));
        assert_eq!(last_toast(&h), ("¡Bienvenido!".to_string(), ToastKind::Success));
    }

    #[test]
    fn session_survives_restart() {
        let mut h = harness(FakeBackend::with_catalogs());
        let session = customer_session(Some(vec![profile("1", true)]));
        *h.app.backend().login.borrow_mut() = Some(session.clone());
        h.app.login_customer("maria@example.com", "pw").unwrap();

        let mut restarted = App::new(
            FakeBackend::with_catalogs(),
            h.ui.clone(),
            Box::new(h.durable.clone()),
            Box::new(MemoryStore::new()),
            Duration::from_millis(800),
        );
        restarted.start();
        assert_eq!(restarted.session(), Some(&session));
        assert_eq!(restarted.screen().active, Some(View::Dashboard));
        assert_eq!(restarted.profiles.selected(), Some("1"));
        assert_eq!(restarted.form.get(FormField::Rfc), "XAXX01010101");
        assert_eq!(restarted.backend().token.borrow().as_deref(), Some("cust-token"));
    }

    #[test]
    fn guest_from_share_link_lands_on_request_with_store() {
        let mut h = harness(FakeBackend::with_catalogs());
        h.app.start();
        h.app.stage_store("5").unwrap();
        h.app.continue_as_guest().unwrap();

        let screen = h.app.screen();
        assert_eq!(screen.active, Some(View::Request));
        assert_eq!(h.app.form.get(FormField::Store), "5");
        // consumed once
        assert_eq!(h.ephemeral.get(STAGED_STORE_KEY).unwrap(), None);
        for view in [View::Dashboard, View::History, View::Profile] {
            assert!(h.app.navigate(view).is_err());
        }
    }

    #[test]
    fn share_link_alias_preselects_the_store_id() {
        let mut h = harness(FakeBackend::with_catalogs());
        h.app.start();
        h.app.stage_store("centro").unwrap();
        h.app.continue_as_guest().unwrap();
        assert_eq!(h.app.form.get(FormField::Store), "5");
        assert_eq!(h.app.screen().active, Some(View::Request));
    }

    #[test]
    fn unknown_share_link_store_is_reported() {
        let mut h = harness(FakeBackend::with_catalogs());
        h.app.start();
        h.app.stage_store("sur").unwrap();
        h.app.continue_as_guest().unwrap();
        assert_eq!(h.app.form.get(FormField::Store), "");
        assert_eq!(
            last_toast(&h),
            ("La tienda del enlace no está disponible".to_string(), ToastKind::Info)
        );
        assert_eq!(h.ephemeral.get(STAGED_STORE_KEY).unwrap(), None);
    }

    #[test]
    fn staff_login_leaves_staged_store_alone() {
        let backend = FakeBackend::new();
        *backend.login.borrow_mut() = Some(staff_session(PermissionLevel::Lectura, false));
        let mut h = harness(backend);
        h.app.stage_store("5").unwrap();
        h.app.login_staff("caja1", "pw").unwrap();
        assert_eq!(h.ephemeral.get(STAGED_STORE_KEY).unwrap().as_deref(), Some("5"));
    }

    #[test]
    fn customer_without_profiles_in_session_fetches_them() {
        let backend = FakeBackend::new();
        *backend.login.borrow_mut() = Some(customer_session(None));
        *backend.profiles.borrow_mut() = vec![profile("1", false), profile("2", true)];
        let mut h = harness(backend);

        h.app.login_customer("maria@example.com", "pw").unwrap();
        assert_eq!(h.app.profiles.selected(), Some("2"));
        let stored = h.app.session().unwrap().as_customer().unwrap();
        assert_eq!(stored.usuario.razones.as_ref().map(Vec::len), Some(2));
    }

    #[test]
    fn entering_history_loads_it_each_time() {
        let backend = FakeBackend::new();
        *backend.login.borrow_mut() = Some(customer_session(Some(vec![])));
        let mut h = harness(backend);
        h.app.login_customer("maria@example.com", "pw").unwrap();
        assert_eq!(h.app.backend().count("dashboard"), 1);

        h.app.navigate(View::History).unwrap();
        h.app.navigate(View::Request).unwrap();
        h.app.navigate(View::History).unwrap();
        assert_eq!(h.app.backend().count("my_requests"), 2);
    }

    #[test]
    fn submit_validates_then_clears_form() {
        let mut h = harness(FakeBackend::new());
        h.app.continue_as_guest().unwrap();

        assert!(h.app.submit_request().is_err());
        assert_eq!(
            last_toast(&h),
            ("Completa los campos obligatorios".to_string(), ToastKind::Error)
        );

        h.app.form.set(FormField::Store, "5");
        h.app.form.set(FormField::Rfc, "ABC010101XY1");
        h.app.form.set(FormField::LegalName, "ACME");
        h.app.form.set(FormField::Email, "a@acme.mx");
        h.app.form.ticket = Some(StagedFile::from_data_url("t.jpg", "data:image/jpeg;base64,AA=="));
        h.app.submit_request().unwrap();

        assert_eq!(h.app.backend().submitted.borrow().len(), 1);
        assert_eq!(h.app.form.get(FormField::Rfc), "");
        assert_eq!(h.app.form.get(FormField::Store), "5");
        assert!(h.app.form.ticket.is_none());
        assert_eq!(h.ui.loading.get(), 0);
    }

    #[test]
    fn rfc_lookup_autofills_after_delay() {
        let backend = FakeBackend::new();
        *backend.rfc.borrow_mut() = Some(RfcData {
            razon: "ACME".into(),
            email: "a@acme.mx".into(),
            ..RfcData::default()
        });
        let mut h = harness(backend);
        let t0 = Instant::now();

        assert!(h.app.rfc_input("abc010101xy1", t0));
        assert_eq!(h.app.rfc_status(), Some(RfcStatus::Searching));
        assert_eq!(h.app.poll_rfc(t0 + Duration::from_millis(100)), None);
        assert_eq!(
            h.app.poll_rfc(t0 + Duration::from_millis(900)),
            Some(RfcStatus::Found)
        );
        assert_eq!(h.app.form.get(FormField::LegalName), "ACME");
        assert_eq!(h.app.backend().count("lookup_rfc"), 1);

        *h.app.backend().rfc.borrow_mut() = None;
        h.app.rfc_input("XYZ010101AB2", t0);
        assert_eq!(
            h.app.poll_rfc(t0 + Duration::from_secs(1)),
            Some(RfcStatus::New)
        );
    }

    #[test]
    fn other_rfc_is_submitted_without_profile_link() {
        let mut default = profile("1", true);
        default.csf = Some("data:application/pdf;base64,UFJPRklMRTE=".into());
        let backend = FakeBackend::new();
        *backend.login.borrow_mut() = Some(customer_session(Some(vec![default])));
        let mut h = harness(backend);
        h.app.login_customer("maria@example.com", "pw").unwrap();
        assert_eq!(h.app.form.profile_id.as_deref(), Some("1"));

        h.app.set_field(FormField::Store, "5");
        h.app.set_field(FormField::Rfc, "OTRO800101AB1");
        h.app.set_field(FormField::Email, "otro@example.com");
        assert_eq!(h.app.profiles.selected(), None);
        h.app.form.ticket = Some(StagedFile::from_data_url("t.jpg", "data:image/jpeg;base64,AA=="));
        h.app.submit_request().unwrap();

        let sent = h.app.backend().submitted.borrow()[0].clone();
        assert_eq!(sent.rfc, "OTRO800101AB1");
        assert_eq!(sent.razon_id, None);
        assert_eq!(sent.csf, "");
    }

    #[test]
    fn lookup_of_another_rfc_drops_selected_profile() {
        let backend = FakeBackend::new();
        *backend.login.borrow_mut() = Some(customer_session(Some(vec![profile("1", true)])));
        *backend.rfc.borrow_mut() = Some(RfcData {
            razon: "Otro SA".into(),
            ..RfcData::default()
        });
        let mut h = harness(backend);
        h.app.login_customer("maria@example.com", "pw").unwrap();
        let t0 = Instant::now();

        h.app.rfc_input("OTRO800101AB1", t0);
        h.app.poll_rfc(t0 + Duration::from_secs(1));
        assert_eq!(h.app.form.get(FormField::Rfc), "OTRO800101AB1");
        assert_eq!(h.app.form.profile_id, None);
        assert_eq!(h.app.profiles.selected(), None);
    }

    #[test]
    fn account_update_keeps_profiles_in_session() {
        let backend = FakeBackend::new();
        *backend.login.borrow_mut() = Some(customer_session(Some(vec![profile("1", true)])));
        let mut h = harness(backend);
        h.app.login_customer("maria@example.com", "pw").unwrap();

        h.app.update_account("María José", Some(String::new())).unwrap();
        let stored = h.app.session().unwrap().as_customer().unwrap();
        assert_eq!(stored.usuario.nombre.as_deref(), Some("María José"));
        assert_eq!(stored.usuario.razones.as_ref().map(Vec::len), Some(1));
        assert_eq!(last_toast(&h), ("Perfil actualizado".to_string(), ToastKind::Success));
    }

    #[test]
    fn guests_cannot_manage_profiles() {
        let mut h = harness(FakeBackend::new());
        h.app.continue_as_guest().unwrap();
        let input = TaxProfileInput::from(&profile("9", false));
        assert!(matches!(h.app.create_profile(&input), Err(AppError::NoSession)));
        assert_eq!(h.app.backend().count("create_tax_profile"), 0);
    }

    #[test]
    fn status_change_toasts_and_reloads() {
        let backend = FakeBackend::new();
        *backend.login.borrow_mut() = Some(staff_session(PermissionLevel::Gestionar, false));
        *backend.requests.borrow_mut() =
            vec![request("1", RequestStatus::Pendiente, "2024-05-01")];
        let mut h = harness(backend);
        h.app.login_staff("caja1", "pw").unwrap();

        assert!(h.app.change_status("1", RequestStatus::Rechazado).unwrap());
        assert_eq!(
            last_toast(&h),
            ("Solicitud marcada como rechazado".to_string(), ToastKind::Success)
        );
        assert_eq!(h.app.requests.get("1").unwrap().estatus, RequestStatus::Rechazado);
        assert_eq!(h.ui.loading.get(), 0);
    }

    #[test]
    fn logout_clears_everything() {
        let backend = FakeBackend::new();
        *backend.login.borrow_mut() = Some(customer_session(Some(vec![profile("1", true)])));
        let mut h = harness(backend);
        h.app.login_customer("maria@example.com", "pw").unwrap();

        h.app.logout().unwrap();
        assert!(h.app.session().is_none());
        assert_eq!(h.app.screen().panel, crate::router::Panel::Login);
        assert!(h.app.profiles.profiles().is_empty());
        assert_eq!(h.app.form.get(FormField::Rfc), "");
        assert_eq!(h.durable.get(crate::session::SESSION_KEY).unwrap(), None);
        assert_eq!(h.app.backend().token.borrow().as_deref(), None);
    }

    #[test]
    fn register_returns_email_for_login() {
        let mut h = harness(FakeBackend::new());
        let email = h
            .app
            .register(Registration {
                email: " maria@example.com ".into(),
                password: "pw".into(),
                rfc: "xaxx010101000".into(),
                razon: "María".into(),
                ..Registration::default()
            })
            .unwrap();
        assert_eq!(email, "maria@example.com");

        assert!(h.app.register(Registration::default()).is_err());
        assert_eq!(h.app.backend().count("register"), 1);
    }

    #[test]
    fn qr_link_uses_store_alias() {
        let backend = FakeBackend::new();
        *backend.login.borrow_mut() = Some(staff_session(PermissionLevel::Lectura, false));
        let mut h = harness(backend);
        h.app.login_staff("caja1", "pw").unwrap();
        let public = Url::parse("https://factura.example.mx").unwrap();
        let service = Url::parse("https://api.qrserver.com/v1/create-qr-code/").unwrap();
        let (link, image) = h.app.store_qr(&public, &service).unwrap();
        assert_eq!(link.as_str(), "https://factura.example.mx/?empresa=centro");
        assert!(image.as_str().contains("size=400x400"));
    }
}
