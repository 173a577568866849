//! In-memory stand-ins for the API and the terminal, shared by unit tests.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;

use crate::api::{Backend, Catalogs};
use crate::error::{AppError, AppResult};
use crate::feedback::{Feedback, ToastKind};
use crate::model::*;

pub fn profile(id: &str, default: bool) -> TaxProfile {
    TaxProfile {
        id: id.into(),
        rfc: format!("XAXX0101010{id}"),
        razon: format!("Razón {id}"),
        regimen: "601".into(),
        cp: "06600".into(),
        uso_cfdi: "G03".into(),
        csf: None,
        predeterminada: default,
    }
}

pub fn request(id: &str, status: RequestStatus, fecha: &str) -> InvoiceRequest {
    InvoiceRequest {
        id: id.into(),
        tienda: "Tienda Centro".into(),
        rfc: format!("RFC{id}"),
        razon: format!("Cliente {id}"),
        regimen: "601".into(),
        cp: "06600".into(),
        uso_cfdi: "G03".into(),
        email: format!("c{id}@example.com"),
        monto: Some(100.0),
        folio: None,
        notas: None,
        ticket: None,
        csf: None,
        estatus: status,
        fecha: fecha.into(),
    }
}

pub fn customer_session(razones: Option<Vec<TaxProfile>>) -> Session {
    Session::Customer(CustomerSession {
        usuario: CustomerUser {
            id: Some("1".into()),
            nombre: Some("María".into()),
            email: "maria@example.com".into(),
            razones,
        },
        token: "cust-token".into(),
    })
}

pub fn staff_session(permisos: PermissionLevel, admin: bool) -> Session {
    Session::Staff(StaffSession {
        empresa_id: "5".into(),
        usuario: "caja1".into(),
        empresa_nombre: "Tienda Centro".into(),
        empresa_alias: Some("centro".into()),
        admin,
        permisos,
        token: "staff-token".into(),
    })
}

/// Fake API with server-side state and a call log.
#[derive(Default)]
pub struct FakeBackend {
    pub catalogs: RefCell<Catalogs>,
    pub login: RefCell<Option<Session>>,
    pub rfc: RefCell<Option<RfcData>>,
    pub profiles: RefCell<Vec<TaxProfile>>,
    pub requests: RefCell<Vec<InvoiceRequest>>,
    pub submitted: RefCell<Vec<NewInvoiceRequest>>,
    pub staff_users: RefCell<Vec<StaffUser>>,
    pub stats: RefCell<DashboardStats>,
    pub token: RefCell<Option<String>>,
    calls: RefCell<Vec<String>>,
    failures: RefCell<HashSet<String>>,
    next_id: Cell<u32>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_catalogs() -> Self {
        let backend = Self::new();
        *backend.catalogs.borrow_mut() = Catalogs {
            regimenes: vec![
                CatalogEntry { clave: "601".into(), descripcion: "General de Ley Personas Morales".into() },
                CatalogEntry { clave: "612".into(), descripcion: "Personas Físicas con Actividades Empresariales".into() },
            ],
            usos_cfdi: vec![
                CatalogEntry { clave: "G01".into(), descripcion: "Adquisición de mercancías".into() },
                CatalogEntry { clave: "G03".into(), descripcion: "Gastos en general".into() },
            ],
            empresas: vec![
                StoreEntry {
                    id: "5".into(),
                    nombre: "Tienda Centro".into(),
                    alias: Some("centro".into()),
                },
                StoreEntry {
                    id: "8".into(),
                    nombre: "Tienda Norte".into(),
                    alias: None,
                },
            ],
        };
        backend
    }

    /// Make the next call to `operation` answer `success: false`.
    pub fn fail_next(&self, operation: &str) {
        self.failures.borrow_mut().insert(operation.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    pub fn count(&self, operation: &str) -> usize {
        self.calls.borrow().iter().filter(|c| c.as_str() == operation).count()
    }

    pub fn reset_calls(&self) {
        self.calls.borrow_mut().clear();
    }

    fn call(&self, operation: &str) -> AppResult<()> {
        self.calls.borrow_mut().push(operation.to_string());
        if self.failures.borrow_mut().remove(operation) {
            return Err(AppError::Rejected(Some(format!("falló {operation}"))));
        }
        Ok(())
    }

    fn fresh_id(&self) -> String {
        let id = self.next_id.get() + 100;
        self.next_id.set(self.next_id.get() + 1);
        id.to_string()
    }
}

impl Backend for FakeBackend {
    fn set_token(&mut self, token: Option<String>) {
        *self.token.borrow_mut() = token;
    }

    fn catalogs(&self) -> AppResult<Catalogs> {
        self.call("catalogs")?;
        Ok(self.catalogs.borrow().clone())
    }

    fn login_staff(&self, _usuario: &str, _password: &str) -> AppResult<Session> {
        self.call("login_staff")?;
        self.login.borrow().clone().ok_or(AppError::Rejected(None))
    }

    fn login_customer(&self, _email: &str, _password: &str) -> AppResult<Session> {
        self.call("login_customer")?;
        self.login.borrow().clone().ok_or(AppError::Rejected(None))
    }

    fn register(&self, _registration: &Registration) -> AppResult<()> {
        self.call("register")
    }

    fn lookup_rfc(&self, _rfc: &str) -> AppResult<Option<RfcData>> {
        self.call("lookup_rfc")?;
        Ok(self.rfc.borrow().clone())
    }

    fn submit_request(&self, request: &NewInvoiceRequest) -> AppResult<()> {
        self.call("submit_request")?;
        self.submitted.borrow_mut().push(request.clone());
        Ok(())
    }

    fn my_requests(&self) -> AppResult<Vec<InvoiceRequest>> {
        self.call("my_requests")?;
        Ok(self.requests.borrow().clone())
    }

    fn request_detail(&self, id: &str) -> AppResult<InvoiceRequest> {
        self.call("request_detail")?;
        self.requests
            .borrow()
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or(AppError::Rejected(Some("No encontrada".into())))
    }

    fn company_requests(&self, _company_id: &str) -> AppResult<Vec<InvoiceRequest>> {
        self.call("company_requests")?;
        Ok(self.requests.borrow().clone())
    }

    fn change_request_status(&self, id: &str, status: RequestStatus) -> AppResult<()> {
        self.call("change_request_status")?;
        if let Some(r) = self.requests.borrow_mut().iter_mut().find(|r| r.id == id) {
            r.estatus = status;
        }
        Ok(())
    }

    fn tax_profiles(&self) -> AppResult<Vec<TaxProfile>> {
        self.call("tax_profiles")?;
        Ok(self.profiles.borrow().clone())
    }

    fn create_tax_profile(&self, input: &TaxProfileInput) -> AppResult<()> {
        self.call("create_tax_profile")?;
        let mut profiles = self.profiles.borrow_mut();
        let first = profiles.is_empty();
        profiles.push(TaxProfile {
            id: self.fresh_id(),
            rfc: input.rfc.clone(),
            razon: input.razon.clone(),
            regimen: input.regimen.clone(),
            cp: input.cp.clone(),
            uso_cfdi: input.uso_cfdi.clone(),
            csf: input.csf.clone(),
            predeterminada: first,
        });
        Ok(())
    }

    fn update_tax_profile(&self, id: &str, input: &TaxProfileInput) -> AppResult<()> {
        self.call("update_tax_profile")?;
        if let Some(p) = self.profiles.borrow_mut().iter_mut().find(|p| p.id == id) {
            p.rfc = input.rfc.clone();
            p.razon = input.razon.clone();
            p.regimen = input.regimen.clone();
            p.cp = input.cp.clone();
            p.uso_cfdi = input.uso_cfdi.clone();
        }
        Ok(())
    }

    fn delete_tax_profile(&self, id: &str) -> AppResult<()> {
        self.call("delete_tax_profile")?;
        self.profiles.borrow_mut().retain(|p| p.id != id);
        Ok(())
    }

    fn set_default_tax_profile(&self, id: &str) -> AppResult<()> {
        self.call("set_default_tax_profile")?;
        for p in self.profiles.borrow_mut().iter_mut() {
            p.predeterminada = p.id == id;
        }
        Ok(())
    }

    fn dashboard(&self) -> AppResult<DashboardStats> {
        self.call("dashboard")?;
        Ok(self.stats.borrow().clone())
    }

    fn update_profile(&self, update: &ProfileUpdate) -> AppResult<Option<CustomerUser>> {
        self.call("update_profile")?;
        Ok(Some(CustomerUser {
            id: Some("1".into()),
            nombre: Some(update.nombre.clone()),
            email: "maria@example.com".into(),
            razones: None,
        }))
    }

    fn staff_users(&self, _company_id: &str) -> AppResult<Vec<StaffUser>> {
        self.call("staff_users")?;
        Ok(self.staff_users.borrow().clone())
    }

    fn create_staff_user(&self, input: &StaffUserInput) -> AppResult<()> {
        self.call("create_staff_user")?;
        self.staff_users.borrow_mut().push(StaffUser {
            id: self.fresh_id(),
            usuario: input.usuario.clone(),
            nombre: input.nombre.clone(),
            email: Some(input.email.clone()).filter(|e| !e.is_empty()),
            permisos: input.permisos,
            admin: input.admin == "Si",
            estado: input.estado,
        });
        Ok(())
    }

    fn update_staff_user(&self, id: &str, input: &StaffUserInput) -> AppResult<()> {
        self.call("update_staff_user")?;
        if let Some(u) = self.staff_users.borrow_mut().iter_mut().find(|u| u.id == id) {
            u.nombre = input.nombre.clone();
            u.permisos = input.permisos;
            u.estado = input.estado;
        }
        Ok(())
    }

    fn delete_staff_user(&self, id: &str) -> AppResult<()> {
        self.call("delete_staff_user")?;
        self.staff_users.borrow_mut().retain(|u| u.id != id);
        Ok(())
    }
}

/// Feedback that records what would have been shown.
#[derive(Default)]
pub struct RecordingFeedback {
    pub toasts: RefCell<Vec<(String, ToastKind)>>,
    pub loading: Cell<i32>,
    pub answer: Cell<bool>,
    pub questions: RefCell<Vec<String>>,
}

impl RecordingFeedback {
    pub fn accepting() -> Self {
        let ui = Self::default();
        ui.answer.set(true);
        ui
    }

    pub fn last_toast(&self) -> Option<(String, ToastKind)> {
        self.toasts.borrow().last().cloned()
    }
}

impl Feedback for RecordingFeedback {
    fn show_loading(&self, _message: &str) {
        self.loading.set(self.loading.get() + 1);
    }

    fn hide_loading(&self) {
        self.loading.set(self.loading.get() - 1);
    }

    fn toast(&self, message: &str, kind: ToastKind) {
        self.toasts.borrow_mut().push((message.to_string(), kind));
    }

    fn confirm(&self, question: &str) -> bool {
        self.questions.borrow_mut().push(question.to_string());
        self.answer.get()
    }
}
