use serde::{Deserialize, Serialize};

/// Server identifiers arrive as numbers or strings depending on the table.
/// They are always carried as strings on this side.
pub type Id = String;

// ==========================================
// Session
// ==========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Guest,
    Customer,
    Staff,
}

/// The single current session.
///
/// Serialized with the `tipo` tag the API uses in its login responses, so a
/// login payload can be stored as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tipo")]
pub enum Session {
    #[serde(rename = "invitado")]
    Guest,
    #[serde(rename = "cliente")]
    Customer(CustomerSession),
    #[serde(rename = "empresa")]
    Staff(StaffSession),
}

impl Session {
    pub fn role(&self) -> Role {
        match self {
            Session::Guest => Role::Guest,
            Session::Customer(_) => Role::Customer,
            Session::Staff(_) => Role::Staff,
        }
    }

    pub fn token(&self) -> Option<&str> {
        match self {
            Session::Guest => None,
            Session::Customer(c) => Some(c.token.as_str()),
            Session::Staff(s) => Some(s.token.as_str()),
        }
    }

    pub fn as_customer(&self) -> Option<&CustomerSession> {
        match self {
            Session::Customer(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_staff(&self) -> Option<&StaffSession> {
        match self {
            Session::Staff(s) => Some(s),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerSession {
    pub usuario: CustomerUser,
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerUser {
    #[serde(default, with = "wire::opt_id")]
    pub id: Option<Id>,
    #[serde(default)]
    pub nombre: Option<String>,
    pub email: String,
    /// Saved tax profiles. Absent in older login payloads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub razones: Option<Vec<TaxProfile>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PermissionLevel {
    #[default]
    Lectura,
    Gestionar,
}

impl PermissionLevel {
    pub fn is_read_only(self) -> bool {
        self == PermissionLevel::Lectura
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffSession {
    #[serde(with = "wire::id")]
    pub empresa_id: Id,
    /// Display name of the logged-in staff member.
    #[serde(default)]
    pub usuario: String,
    #[serde(default)]
    pub empresa_nombre: String,
    #[serde(default)]
    pub empresa_alias: Option<String>,
    #[serde(default, deserialize_with = "wire::flag")]
    pub admin: bool,
    #[serde(default)]
    pub permisos: PermissionLevel,
    pub token: String,
}

// ==========================================
// Catalogs
// ==========================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub clave: String,
    pub descripcion: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreEntry {
    #[serde(with = "wire::id")]
    pub id: Id,
    pub nombre: String,
    /// Short name used in share links.
    #[serde(default)]
    pub alias: Option<String>,
}

// ==========================================
// Tax profiles ("razones sociales")
// ==========================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxProfile {
    #[serde(with = "wire::id")]
    pub id: Id,
    pub rfc: String,
    pub razon: String,
    #[serde(default)]
    pub regimen: String,
    #[serde(default)]
    pub cp: String,
    #[serde(default)]
    pub uso_cfdi: String,
    /// Tax certificate ("constancia de situación fiscal") as a data URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub csf: Option<String>,
    #[serde(default, deserialize_with = "wire::flag")]
    pub predeterminada: bool,
}

/// Body of a profile create/update call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaxProfileInput {
    pub rfc: String,
    pub razon: String,
    pub regimen: String,
    pub cp: String,
    pub uso_cfdi: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub csf: Option<String>,
}

impl From<&TaxProfile> for TaxProfileInput {
    fn from(p: &TaxProfile) -> Self {
        Self {
            rfc: p.rfc.clone(),
            razon: p.razon.clone(),
            regimen: p.regimen.clone(),
            cp: p.cp.clone(),
            uso_cfdi: p.uso_cfdi.clone(),
            csf: p.csf.clone(),
        }
    }
}

// ==========================================
// Invoice requests ("solicitudes")
// ==========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestStatus {
    Pendiente,
    Facturado,
    Rechazado,
}

impl RequestStatus {
    pub const ALL: [RequestStatus; 3] = [
        RequestStatus::Pendiente,
        RequestStatus::Facturado,
        RequestStatus::Rechazado,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RequestStatus::Pendiente => "Pendiente",
            RequestStatus::Facturado => "Facturado",
            RequestStatus::Rechazado => "Rechazado",
        }
    }

    pub fn is_terminal(self) -> bool {
        self != RequestStatus::Pendiente
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceRequest {
    #[serde(with = "wire::id")]
    pub id: Id,
    #[serde(default)]
    pub tienda: String,
    #[serde(default)]
    pub rfc: String,
    #[serde(default)]
    pub razon: String,
    #[serde(default)]
    pub regimen: String,
    #[serde(default)]
    pub cp: String,
    #[serde(default)]
    pub uso_cfdi: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, deserialize_with = "wire::amount")]
    pub monto: Option<f64>,
    #[serde(default)]
    pub folio: Option<String>,
    #[serde(default)]
    pub notas: Option<String>,
    #[serde(default)]
    pub ticket: Option<String>,
    #[serde(default)]
    pub csf: Option<String>,
    pub estatus: RequestStatus,
    /// ISO-8601 creation timestamp, compared lexically by the filters.
    #[serde(default)]
    pub fecha: String,
}

/// Body of `POST /api/solicitudes`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NewInvoiceRequest {
    pub empresa_id: String,
    pub rfc: String,
    pub razon: String,
    pub regimen: String,
    pub cp: String,
    pub uso_cfdi: String,
    pub email: String,
    pub cc: String,
    pub monto: String,
    pub folio: String,
    pub notas: String,
    pub ticket: String,
    pub csf: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub razon_id: Option<Id>,
}

// ==========================================
// Staff-managed users
// ==========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AccountState {
    #[default]
    Activo,
    Inactivo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaffUser {
    #[serde(with = "wire::id")]
    pub id: Id,
    #[serde(rename = "Usuario")]
    pub usuario: String,
    #[serde(rename = "Nombre", default)]
    pub nombre: String,
    #[serde(rename = "Email", default)]
    pub email: Option<String>,
    #[serde(rename = "Permisos", default)]
    pub permisos: PermissionLevel,
    #[serde(rename = "Admin", default, deserialize_with = "wire::flag")]
    pub admin: bool,
    #[serde(rename = "Estado", default)]
    pub estado: AccountState,
}

/// Body of a staff user create/update call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffUserInput {
    pub empresa_id: Id,
    pub usuario: String,
    pub nombre: String,
    pub email: String,
    /// Empty keeps the current password on edits.
    pub password: String,
    pub permisos: PermissionLevel,
    /// The API expects `"Si"` / `"No"`.
    pub admin: &'static str,
    pub estado: AccountState,
}

// ==========================================
// Misc payloads
// ==========================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardStats {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub pendientes: u64,
    #[serde(default)]
    pub facturadas: u64,
    #[serde(default)]
    pub rechazadas: u64,
}

/// Autofill data returned by the RFC lookup.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RfcData {
    #[serde(default)]
    pub razon: String,
    #[serde(default)]
    pub regimen: String,
    #[serde(default)]
    pub cp: String,
    #[serde(default)]
    pub uso_cfdi: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Registration {
    pub nombre: String,
    pub email: String,
    pub password: String,
    pub rfc: String,
    pub razon: String,
    pub regimen: String,
    pub cp: String,
    pub uso_cfdi: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProfileUpdate {
    pub nombre: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// Serde helpers for the loosely typed fields the API returns.
pub(crate) mod wire {
    use serde::de::{self, Deserializer};
    use serde::{Deserialize, Serializer};
    use serde_json::Value;

    fn value_to_id<E: de::Error>(v: Value) -> Result<String, E> {
        match v {
            Value::String(s) => Ok(s),
            Value::Number(n) => Ok(n.to_string()),
            other => Err(E::custom(format!("expected id, got {other}"))),
        }
    }

    pub mod id {
        use super::*;

        pub fn serialize<S: Serializer>(v: &str, s: S) -> Result<S::Ok, S::Error> {
            s.serialize_str(v)
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
            value_to_id(Value::deserialize(d)?)
        }
    }

    pub mod opt_id {
        use super::*;

        pub fn serialize<S: Serializer>(v: &Option<String>, s: S) -> Result<S::Ok, S::Error> {
            match v {
                Some(v) => s.serialize_some(v),
                None => s.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
            match Value::deserialize(d)? {
                Value::Null => Ok(None),
                v => value_to_id(v).map(Some),
            }
        }
    }

    /// `true`, `1`, `"Si"`, `"true"` all mean yes.
    pub fn flag<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Bool(b) => b,
            Value::Number(n) => n.as_i64().is_some_and(|n| n != 0),
            Value::String(s) => matches!(s.trim().to_lowercase().as_str(), "si" | "sí" | "true" | "1"),
            _ => false,
        })
    }

    /// Amounts come as numbers, numeric strings, empty strings or null.
    pub fn amount<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
    }
}
