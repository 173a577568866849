//! HTTP gateway to the invoicing API.
//!
//! Every response is a JSON object with at least `success`; failures add a
//! human readable `mensaje`. A few list endpoints answer with a bare array
//! instead. [`ApiClient`] normalises both shapes, and everything above it
//! talks to the [`Backend`] trait.

use std::time::Duration;

use reqwest::Method;
use reqwest::Url;
use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::error::{AppError, AppResult};
use crate::model::{
    CatalogEntry, CustomerUser, DashboardStats, InvoiceRequest, NewInvoiceRequest, ProfileUpdate,
    Registration, RequestStatus, RfcData, Session, StaffUser, StaffUserInput, StoreEntry,
    TaxProfile, TaxProfileInput,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Reference data from `GET /api/catalogos`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Catalogs {
    #[serde(default)]
    pub regimenes: Vec<CatalogEntry>,
    #[serde(default, rename = "usosCfdi")]
    pub usos_cfdi: Vec<CatalogEntry>,
    #[serde(default)]
    pub empresas: Vec<StoreEntry>,
}

/// Remote operations the client depends on.
pub trait Backend {
    /// Token attached as `Authorization: Bearer` on every later call.
    fn set_token(&mut self, token: Option<String>);

    fn catalogs(&self) -> AppResult<Catalogs>;

    fn login_staff(&self, usuario: &str, password: &str) -> AppResult<Session>;
    fn login_customer(&self, email: &str, password: &str) -> AppResult<Session>;
    fn register(&self, registration: &Registration) -> AppResult<()>;

    /// `Ok(None)` when the RFC is unknown to the server.
    fn lookup_rfc(&self, rfc: &str) -> AppResult<Option<RfcData>>;

    fn submit_request(&self, request: &NewInvoiceRequest) -> AppResult<()>;
    fn my_requests(&self) -> AppResult<Vec<InvoiceRequest>>;
    fn request_detail(&self, id: &str) -> AppResult<InvoiceRequest>;
    fn company_requests(&self, company_id: &str) -> AppResult<Vec<InvoiceRequest>>;
    fn change_request_status(&self, id: &str, status: RequestStatus) -> AppResult<()>;

    fn tax_profiles(&self) -> AppResult<Vec<TaxProfile>>;
    fn create_tax_profile(&self, input: &TaxProfileInput) -> AppResult<()>;
    fn update_tax_profile(&self, id: &str, input: &TaxProfileInput) -> AppResult<()>;
    fn delete_tax_profile(&self, id: &str) -> AppResult<()>;
    fn set_default_tax_profile(&self, id: &str) -> AppResult<()>;

    fn dashboard(&self) -> AppResult<DashboardStats>;
    /// Returns the refreshed user when the server sends one back.
    fn update_profile(&self, update: &ProfileUpdate) -> AppResult<Option<CustomerUser>>;

    fn staff_users(&self, company_id: &str) -> AppResult<Vec<StaffUser>>;
    fn create_staff_user(&self, input: &StaffUserInput) -> AppResult<()>;
    fn update_staff_user(&self, id: &str, input: &StaffUserInput) -> AppResult<()>;
    fn delete_staff_user(&self, id: &str) -> AppResult<()>;
}

pub struct ApiClient {
    http: Client,
    base: Url,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base: Url) -> AppResult<Self> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            base,
            token: None,
        })
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<&B>,
    ) -> AppResult<Value> {
        let url = self.url(segments);
        debug!(%method, path = url.path(), "API call");

        let mut req = self.http.request(method, url);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        if let Some(body) = body {
            req = req.json(body);
        }
        Ok(req.send()?.json::<Value>()?)
    }

    fn get(&self, segments: &[&str]) -> AppResult<Value> {
        self.send::<Value>(Method::GET, segments, None)
    }

    fn post<B: Serialize + ?Sized>(&self, segments: &[&str], body: &B) -> AppResult<Value> {
        self.send(Method::POST, segments, Some(body))
    }

    fn put<B: Serialize + ?Sized>(&self, segments: &[&str], body: &B) -> AppResult<Value> {
        self.send(Method::PUT, segments, Some(body))
    }

    fn delete(&self, segments: &[&str]) -> AppResult<Value> {
        self.send::<Value>(Method::DELETE, segments, None)
    }
}

/// Turn `success: false` into [`AppError::Rejected`].
pub fn envelope(value: Value) -> AppResult<Value> {
    if value.get("success").and_then(Value::as_bool) == Some(true) {
        Ok(value)
    } else {
        let message = value
            .get("mensaje")
            .and_then(Value::as_str)
            .map(str::to_string);
        Err(AppError::Rejected(message))
    }
}

/// Extract a list from either a bare array or a `{success, data: [...]}`
/// envelope. Anything else is an empty list; malformed items are skipped.
pub fn list_payload<T: DeserializeOwned>(value: Value) -> Vec<T> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut obj) => {
            let ok = obj.get("success").and_then(Value::as_bool) == Some(true);
            match obj.remove("data") {
                Some(Value::Array(items)) if ok => items,
                _ => {
                    warn!("List response without data, treating as empty");
                    return Vec::new();
                }
            }
        }
        _ => {
            warn!("List response is not an array, treating as empty");
            return Vec::new();
        }
    };

    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value(item) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(error = %e, "Skipping malformed list item");
                None
            }
        })
        .collect()
}

impl Backend for ApiClient {
    fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }

    fn catalogs(&self) -> AppResult<Catalogs> {
        let value = envelope(self.get(&["api", "catalogos"])?)?;
        Ok(serde_json::from_value(value)?)
    }

    fn login_staff(&self, usuario: &str, password: &str) -> AppResult<Session> {
        let body = json!({ "usuario": usuario, "password": password });
        let value = envelope(self.post(&["api", "auth", "login-empresa"], &body)?)?;
        Ok(serde_json::from_value(value)?)
    }

    fn login_customer(&self, email: &str, password: &str) -> AppResult<Session> {
        let body = json!({ "email": email, "password": password });
        let value = envelope(self.post(&["api", "auth", "login-usuario"], &body)?)?;
        Ok(serde_json::from_value(value)?)
    }

    fn register(&self, registration: &Registration) -> AppResult<()> {
        envelope(self.post(&["api", "auth", "registro"], registration)?)?;
        Ok(())
    }

    fn lookup_rfc(&self, rfc: &str) -> AppResult<Option<RfcData>> {
        let value = self.get(&["api", "rfc", rfc])?;
        let found = value.get("success").and_then(Value::as_bool) == Some(true);
        match value.get("datos") {
            Some(datos) if found && !datos.is_null() => {
                Ok(Some(serde_json::from_value(datos.clone())?))
            }
            _ => Ok(None),
        }
    }

    fn submit_request(&self, request: &NewInvoiceRequest) -> AppResult<()> {
        envelope(self.post(&["api", "solicitudes"], request)?)?;
        Ok(())
    }

    fn my_requests(&self) -> AppResult<Vec<InvoiceRequest>> {
        Ok(list_payload(self.get(&["api", "solicitudes", "mis"])?))
    }

    fn request_detail(&self, id: &str) -> AppResult<InvoiceRequest> {
        let value = envelope(self.get(&["api", "solicitudes", id])?)?;
        let record = value.get("data").cloned().unwrap_or(value);
        Ok(serde_json::from_value(record)?)
    }

    fn company_requests(&self, company_id: &str) -> AppResult<Vec<InvoiceRequest>> {
        Ok(list_payload(
            self.get(&["api", "solicitudes", "empresa", company_id])?,
        ))
    }

    fn change_request_status(&self, id: &str, status: RequestStatus) -> AppResult<()> {
        let body = json!({ "estatus": status });
        envelope(self.put(&["api", "solicitudes", id, "estatus"], &body)?)?;
        Ok(())
    }

    fn tax_profiles(&self) -> AppResult<Vec<TaxProfile>> {
        // a failed refetch must not wipe the cached profiles
        let value = envelope(self.get(&["api", "clientes", "razones"])?)?;
        Ok(list_payload(value))
    }

    fn create_tax_profile(&self, input: &TaxProfileInput) -> AppResult<()> {
        envelope(self.post(&["api", "clientes", "razones"], input)?)?;
        Ok(())
    }

    fn update_tax_profile(&self, id: &str, input: &TaxProfileInput) -> AppResult<()> {
        envelope(self.put(&["api", "clientes", "razones", id], input)?)?;
        Ok(())
    }

    fn delete_tax_profile(&self, id: &str) -> AppResult<()> {
        envelope(self.delete(&["api", "clientes", "razones", id])?)?;
        Ok(())
    }

    fn set_default_tax_profile(&self, id: &str) -> AppResult<()> {
        let segments = ["api", "clientes", "razones", id, "predeterminada"];
        envelope(self.put(&segments, &json!({}))?)?;
        Ok(())
    }

    fn dashboard(&self) -> AppResult<DashboardStats> {
        let value = envelope(self.get(&["api", "clientes", "dashboard"])?)?;
        let stats = value
            .get("data")
            .or_else(|| value.get("stats"))
            .cloned()
            .unwrap_or(value);
        Ok(serde_json::from_value(stats)?)
    }

    fn update_profile(&self, update: &ProfileUpdate) -> AppResult<Option<CustomerUser>> {
        let value = envelope(self.put(&["api", "clientes", "perfil"], update)?)?;
        match value.get("usuario") {
            Some(user) if !user.is_null() => Ok(Some(serde_json::from_value(user.clone())?)),
            _ => Ok(None),
        }
    }

    fn staff_users(&self, company_id: &str) -> AppResult<Vec<StaffUser>> {
        Ok(list_payload(self.get(&["api", "usuarios-empresa", company_id])?))
    }

    fn create_staff_user(&self, input: &StaffUserInput) -> AppResult<()> {
        envelope(self.post(&["api", "usuarios-empresa"], input)?)?;
        Ok(())
    }

    fn update_staff_user(&self, id: &str, input: &StaffUserInput) -> AppResult<()> {
        envelope(self.put(&["api", "usuarios-empresa", id], input)?)?;
        Ok(())
    }

    fn delete_staff_user(&self, id: &str) -> AppResult<()> {
        envelope(self.delete(&["api", "usuarios-empresa", id])?)?;
        Ok(())
    }
}
