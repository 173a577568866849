//! Invoice request lists for customers and staff.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use comfy_table::{Attribute, Cell, Color, Table};
use tracing::{debug, info, warn};

use crate::api::Backend;
use crate::error::{AppError, AppResult};
use crate::model::{Id, InvoiceRequest, PermissionLevel, RequestStatus, StaffSession};

/// Filter criteria. Empty strings count as "no criterion".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filters {
    pub status: Option<RequestStatus>,
    /// `YYYY-MM-DD`, inclusive.
    pub date_from: Option<String>,
    /// `YYYY-MM-DD`, inclusive through the end of that day.
    pub date_to: Option<String>,
    pub search: String,
}

impl Filters {
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && non_empty(&self.date_from).is_none()
            && non_empty(&self.date_to).is_none()
            && self.search.trim().is_empty()
    }
}

fn non_empty(v: &Option<String>) -> Option<&str> {
    v.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Records matching every criterion, in their original order.
///
/// Dates are compared lexically against the ISO timestamps the API sends.
pub fn apply_filters(list: &[InvoiceRequest], filters: &Filters) -> Vec<InvoiceRequest> {
    let from = non_empty(&filters.date_from);
    let to = non_empty(&filters.date_to).map(|d| format!("{d}T23:59:59"));
    let needle = filters.search.trim().to_lowercase();

    list.iter()
        .filter(|r| filters.status.is_none_or(|s| r.estatus == s))
        .filter(|r| from.is_none_or(|f| r.fecha.as_str() >= f))
        .filter(|r| to.as_deref().is_none_or(|t| r.fecha.as_str() <= t))
        .filter(|r| {
            needle.is_empty()
                || [&r.rfc, &r.razon, &r.email]
                    .iter()
                    .any(|field| field.to_lowercase().contains(&needle))
        })
        .cloned()
        .collect()
}

/// Status changes offered on a row.
pub fn row_actions(permisos: PermissionLevel, record: &InvoiceRequest) -> &'static [RequestStatus] {
    if permisos.is_read_only() || record.estatus.is_terminal() {
        &[]
    } else {
        &[RequestStatus::Facturado, RequestStatus::Rechazado]
    }
}

/// Menu entries for the staff request list. Read-only staff get no status
/// change.
pub fn list_actions(permisos: PermissionLevel) -> Vec<&'static str> {
    let mut actions = vec!["Ver detalle"];
    if !permisos.is_read_only() {
        actions.push("Cambiar estatus");
    }
    actions.extend(["Filtrar", "Quitar filtros", "Recargar"]);
    actions
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Scope {
    Mine,
    Company(Id),
}

#[derive(Debug, Default)]
pub struct RequestListController {
    scope: Option<Scope>,
    requests: Vec<InvoiceRequest>,
    load_failed: bool,
    pub filters: Filters,
}

impl RequestListController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything loaded, unfiltered.
    pub fn requests(&self) -> &[InvoiceRequest] {
        &self.requests
    }

    /// What the list shows with the current filters.
    pub fn visible(&self) -> Vec<InvoiceRequest> {
        apply_filters(&self.requests, &self.filters)
    }

    /// Whether the last load failed (the list is then empty).
    pub fn load_failed(&self) -> bool {
        self.load_failed
    }

    pub fn get(&self, id: &str) -> Option<&InvoiceRequest> {
        self.requests.iter().find(|r| r.id == id)
    }

    pub fn load_mine(&mut self, backend: &dyn Backend) {
        self.scope = Some(Scope::Mine);
        self.reload(backend);
    }

    pub fn load_for_staff(&mut self, backend: &dyn Backend, company_id: &str) {
        self.scope = Some(Scope::Company(company_id.to_string()));
        self.reload(backend);
    }

    /// Refetch the current scope. Failures degrade to an empty list.
    pub fn reload(&mut self, backend: &dyn Backend) {
        let result = match &self.scope {
            Some(Scope::Mine) => backend.my_requests(),
            Some(Scope::Company(id)) => backend.company_requests(id),
            None => return,
        };
        match result {
            Ok(list) => {
                debug!(count = list.len(), "Requests loaded");
                self.requests = list;
                self.load_failed = false;
            }
            Err(e) => {
                warn!(error = %e, "Could not load requests");
                self.requests.clear();
                self.load_failed = true;
            }
        }
    }

    pub fn detail(&self, backend: &dyn Backend, id: &str) -> AppResult<InvoiceRequest> {
        backend.request_detail(id)
    }

    /// Move a pending request to a final status, then reload the list.
    ///
    /// Returns `Ok(false)` when the id is no longer in the list.
    pub fn change_status(
        &mut self,
        backend: &dyn Backend,
        staff: &StaffSession,
        id: &str,
        status: RequestStatus,
    ) -> AppResult<bool> {
        if staff.permisos.is_read_only() {
            return Err(AppError::Forbidden(
                "Tu usuario solo tiene permiso de lectura".into(),
            ));
        }
        if !status.is_terminal() {
            return Err(AppError::Validation(
                "Solo se puede marcar como Facturado o Rechazado".into(),
            ));
        }
        let Some(record) = self.get(id) else {
            debug!(id, "Request not in list, ignoring status change");
            return Ok(false);
        };
        if record.estatus.is_terminal() {
            return Err(AppError::Validation(format!(
                "La solicitud ya está {}",
                record.estatus.as_str().to_lowercase()
            )));
        }

        backend.change_request_status(id, status)?;
        info!(id, %status, "Request status changed");
        self.reload(backend);
        Ok(true)
    }
}

const MONTHS: [&str; 12] = [
    "ene", "feb", "mar", "abr", "may", "jun", "jul", "ago", "sep", "oct", "nov", "dic",
];

fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.date_naive());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt.date());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}

/// `2024-05-03T10:00:00Z` becomes `03 may 2024`. Unparseable input is
/// returned unchanged.
pub fn format_date(raw: &str) -> String {
    match parse_date(raw) {
        Some(d) => format!("{:02} {} {}", d.day(), MONTHS[d.month0() as usize], d.year()),
        None => raw.to_string(),
    }
}

/// `$1,234.50`, or `-` when there is no amount.
pub fn format_amount(amount: Option<f64>) -> String {
    let Some(amount) = amount else {
        return "-".into();
    };
    let fixed = format!("{:.2}", amount.abs());
    let (int, frac) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    let mut grouped = String::new();
    for (i, ch) in int.chars().enumerate() {
        if i > 0 && (int.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    let sign = if amount < 0.0 { "-" } else { "" };
    format!("{sign}${grouped}.{frac}")
}

fn status_cell(status: RequestStatus) -> Cell {
    let cell = Cell::new(status.as_str());
    match status {
        RequestStatus::Pendiente => cell.fg(Color::Rgb { r: 180, g: 83, b: 9 }),
        RequestStatus::Facturado => cell.fg(Color::Rgb { r: 4, g: 120, b: 87 }),
        RequestStatus::Rechazado => cell.fg(Color::Rgb { r: 185, g: 28, b: 28 }),
    }
}

/// Table of requests. `permisos` adds the actions column for staff.
pub fn render_table(list: &[InvoiceRequest], permisos: Option<PermissionLevel>) -> Table {
    let mut table = Table::new();
    let mut header = vec![
        Cell::new("Fecha"),
        Cell::new("Tienda"),
        Cell::new("RFC"),
        Cell::new("Razón social"),
        Cell::new("Monto"),
        Cell::new("Estatus"),
    ];
    if permisos.is_some() {
        header.push(Cell::new("Acciones"));
    }
    table.set_header(header);

    for r in list {
        let mut row = vec![
            Cell::new(format_date(&r.fecha)),
            Cell::new(&r.tienda),
            Cell::new(&r.rfc),
            Cell::new(&r.razon),
            Cell::new(format_amount(r.monto)),
            status_cell(r.estatus),
        ];
        if let Some(permisos) = permisos {
            let actions = row_actions(permisos, r)
                .iter()
                .map(|s| match s {
                    RequestStatus::Facturado => "Facturar",
                    _ => "Rechazar",
                })
                .collect::<Vec<_>>()
                .join(" / ");
            row.push(Cell::new(actions).add_attribute(Attribute::Bold));
        }
        table.add_row(row);
    }
    table
}
