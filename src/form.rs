//! The invoice request form.
//!
//! Fields are addressed by [`FormField`] instead of widget ids. Profiles,
//! RFC autofill and clearing all iterate the same field list, so adding a
//! field is a one-line change in the match arms below.

use std::collections::BTreeMap;

use crate::error::{AppError, AppResult};
use crate::lookup::normalize_rfc;
use crate::model::{Id, NewInvoiceRequest, RfcData, TaxProfile};
use crate::upload::StagedFile;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FormField {
    Store,
    Rfc,
    LegalName,
    Regime,
    PostalCode,
    CfdiUse,
    Email,
    Cc,
    Amount,
    Folio,
    Notes,
}

impl FormField {
    pub const ALL: [FormField; 11] = [
        FormField::Store,
        FormField::Rfc,
        FormField::LegalName,
        FormField::Regime,
        FormField::PostalCode,
        FormField::CfdiUse,
        FormField::Email,
        FormField::Cc,
        FormField::Amount,
        FormField::Folio,
        FormField::Notes,
    ];

    /// Fields that make up a tax identity.
    pub const TAX: [FormField; 5] = [
        FormField::Rfc,
        FormField::LegalName,
        FormField::Regime,
        FormField::PostalCode,
        FormField::CfdiUse,
    ];

    pub fn label(self) -> &'static str {
        match self {
            FormField::Store => "Tienda",
            FormField::Rfc => "RFC",
            FormField::LegalName => "Razón social",
            FormField::Regime => "Régimen fiscal",
            FormField::PostalCode => "Código postal",
            FormField::CfdiUse => "Uso de CFDI",
            FormField::Email => "Correo",
            FormField::Cc => "Copia a (CC)",
            FormField::Amount => "Monto",
            FormField::Folio => "Folio / referencia",
            FormField::Notes => "Notas",
        }
    }

    pub fn from_profile(self, p: &TaxProfile) -> Option<&str> {
        match self {
            FormField::Rfc => Some(p.rfc.as_str()),
            FormField::LegalName => Some(p.razon.as_str()),
            FormField::Regime => Some(p.regimen.as_str()),
            FormField::PostalCode => Some(p.cp.as_str()),
            FormField::CfdiUse => Some(p.uso_cfdi.as_str()),
            _ => None,
        }
    }

    pub fn from_rfc_data(self, d: &RfcData) -> Option<&str> {
        match self {
            FormField::LegalName => Some(d.razon.as_str()),
            FormField::Regime => Some(d.regimen.as_str()),
            FormField::PostalCode => Some(d.cp.as_str()),
            FormField::CfdiUse => Some(d.uso_cfdi.as_str()),
            FormField::Email => Some(d.email.as_str()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestForm {
    values: BTreeMap<FormField, String>,
    pub ticket: Option<StagedFile>,
    pub tax_document: Option<StagedFile>,
    /// Profile the tax fields were copied from, if any.
    pub profile_id: Option<Id>,
    /// RFC of the linked profile, normalised.
    profile_rfc: Option<String>,
    /// Whether `tax_document` is the linked profile's certificate.
    document_from_profile: bool,
}

impl RequestForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: FormField) -> &str {
        self.values.get(&field).map(String::as_str).unwrap_or("")
    }

    /// Typing an RFC other than the linked profile's unlinks the profile
    /// and drops its certificate.
    pub fn set(&mut self, field: FormField, value: impl Into<String>) {
        let value = value.into();
        if value.is_empty() {
            self.values.remove(&field);
        } else {
            self.values.insert(field, value);
        }
        if field == FormField::Rfc {
            self.unlink_if_diverged();
        }
    }

    fn unlink_if_diverged(&mut self) {
        let Some(linked) = &self.profile_rfc else {
            return;
        };
        if normalize_rfc(self.get(FormField::Rfc)) == *linked {
            return;
        }
        self.profile_id = None;
        self.profile_rfc = None;
        if self.document_from_profile {
            self.tax_document = None;
            self.document_from_profile = false;
        }
    }

    /// Whether the tax fields still belong to a saved profile.
    pub fn is_linked(&self) -> bool {
        self.profile_id.is_some()
    }

    /// Stage a certificate picked by the user.
    pub fn attach_tax_document(&mut self, file: StagedFile) {
        self.tax_document = Some(file);
        self.document_from_profile = false;
    }

    /// Blank every tax field and the staged certificate.
    pub fn clear_tax_identity(&mut self) {
        for field in FormField::TAX {
            self.values.remove(&field);
        }
        self.tax_document = None;
        self.document_from_profile = false;
        self.profile_id = None;
        self.profile_rfc = None;
    }

    pub fn apply_profile(&mut self, profile: &TaxProfile) {
        for field in FormField::TAX {
            if let Some(v) = field.from_profile(profile) {
                self.set(field, v);
            }
        }
        self.tax_document = profile
            .csf
            .as_ref()
            .map(|csf| StagedFile::from_data_url(format!("CSF {}", profile.rfc), csf.clone()));
        self.document_from_profile = self.tax_document.is_some();
        self.profile_id = Some(profile.id.clone());
        self.profile_rfc = Some(normalize_rfc(&profile.rfc));
    }

    /// Fill the form from a lookup of `rfc`.
    pub fn apply_rfc_data(&mut self, rfc: &str, data: &RfcData) {
        self.set(FormField::Rfc, rfc);
        for field in FormField::ALL {
            if let Some(v) = field.from_rfc_data(data) {
                self.set(field, v);
            }
        }
    }

    /// Reset after a successful submission. The chosen store is kept.
    pub fn clear(&mut self) {
        let store = self.values.remove(&FormField::Store);
        *self = Self::default();
        if let Some(store) = store {
            self.values.insert(FormField::Store, store);
        }
    }

    /// Validate and build the submission body.
    pub fn to_submission(&self) -> AppResult<NewInvoiceRequest> {
        let required = [
            FormField::Store,
            FormField::Rfc,
            FormField::LegalName,
            FormField::Email,
        ];
        if required.iter().any(|f| self.get(*f).trim().is_empty()) {
            return Err(AppError::Validation(
                "Completa los campos obligatorios".into(),
            ));
        }
        let Some(ticket) = &self.ticket else {
            return Err(AppError::Validation("Sube una imagen del ticket".into()));
        };

        let text = |f: FormField| self.get(f).trim().to_string();
        Ok(NewInvoiceRequest {
            empresa_id: text(FormField::Store),
            rfc: normalize_rfc(self.get(FormField::Rfc)),
            razon: text(FormField::LegalName),
            regimen: text(FormField::Regime),
            cp: text(FormField::PostalCode),
            uso_cfdi: text(FormField::CfdiUse),
            email: text(FormField::Email),
            cc: text(FormField::Cc),
            monto: text(FormField::Amount),
            folio: text(FormField::Folio),
            notas: text(FormField::Notes),
            ticket: ticket.data_url.clone(),
            csf: self
                .tax_document
                .as_ref()
                .map(|f| f.data_url.clone())
                .unwrap_or_default(),
            razon_id: self.profile_id.clone(),
        })
    }
}
