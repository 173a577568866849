//! Reference data cache and the selectors bound to it.

use std::collections::BTreeMap;

use tracing::{info, warn};

use crate::api::{Backend, Catalogs};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CatalogKind {
    TaxRegime,
    CfdiUse,
    Store,
}

/// Every selector fed from the catalogs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Selector {
    RegistrationRegime,
    RegistrationCfdiUse,
    RequestRegime,
    RequestCfdiUse,
    ProfileRegime,
    ProfileCfdiUse,
    RequestStore,
}

/// Which catalog populates which selector.
pub const SELECTOR_BINDINGS: &[(Selector, CatalogKind)] = &[
    (Selector::RegistrationRegime, CatalogKind::TaxRegime),
    (Selector::RequestRegime, CatalogKind::TaxRegime),
    (Selector::ProfileRegime, CatalogKind::TaxRegime),
    (Selector::RegistrationCfdiUse, CatalogKind::CfdiUse),
    (Selector::RequestCfdiUse, CatalogKind::CfdiUse),
    (Selector::ProfileCfdiUse, CatalogKind::CfdiUse),
    (Selector::RequestStore, CatalogKind::Store),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
}

impl SelectOption {
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.value.is_empty()
    }
}

impl std::fmt::Display for SelectOption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.label)
    }
}

#[derive(Debug, Default)]
pub struct CatalogCache {
    data: Catalogs,
    options: BTreeMap<Selector, Vec<SelectOption>>,
}

impl CatalogCache {
    pub fn new() -> Self {
        let mut cache = Self::default();
        cache.populate_selectors();
        cache
    }

    /// Fetch the catalogs once. Failures keep whatever was loaded before.
    pub fn load(&mut self, backend: &dyn Backend) {
        match backend.catalogs() {
            Ok(data) => {
                info!(
                    regimenes = data.regimenes.len(),
                    usos_cfdi = data.usos_cfdi.len(),
                    empresas = data.empresas.len(),
                    "Catalogs loaded"
                );
                self.data = data;
                self.populate_selectors();
            }
            Err(e) => warn!(error = %e, "Could not load catalogs"),
        }
    }

    pub fn options(&self, selector: Selector) -> &[SelectOption] {
        self.options.get(&selector).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn store_name(&self, id: &str) -> Option<&str> {
        self.data
            .empresas
            .iter()
            .find(|e| e.id == id)
            .map(|e| e.nombre.as_str())
    }

    /// Store id for a share-link key, which may be the id or the alias.
    pub fn resolve_store(&self, key: &str) -> Option<&str> {
        let key = key.trim();
        self.data
            .empresas
            .iter()
            .find(|e| {
                e.id == key
                    || e.alias
                        .as_deref()
                        .is_some_and(|a| a.eq_ignore_ascii_case(key))
            })
            .map(|e| e.id.as_str())
    }

    pub fn has_stores(&self) -> bool {
        !self.data.empresas.is_empty()
    }

    fn kind_options(&self, kind: CatalogKind) -> Vec<SelectOption> {
        let placeholder = match kind {
            CatalogKind::Store => SelectOption::new("", "Selecciona una tienda..."),
            _ => SelectOption::new("", "Selecciona..."),
        };
        let entries = match kind {
            CatalogKind::TaxRegime => self.catalog_options(&self.data.regimenes),
            CatalogKind::CfdiUse => self.catalog_options(&self.data.usos_cfdi),
            CatalogKind::Store => self
                .data
                .empresas
                .iter()
                .map(|e| SelectOption::new(e.id.clone(), e.nombre.clone()))
                .collect(),
        };
        std::iter::once(placeholder).chain(entries).collect()
    }

    fn catalog_options(&self, entries: &[crate::model::CatalogEntry]) -> Vec<SelectOption> {
        entries
            .iter()
            .map(|e| SelectOption::new(e.clave.clone(), format!("{} - {}", e.clave, e.descripcion)))
            .collect()
    }

    fn populate_selectors(&mut self) {
        self.options = SELECTOR_BINDINGS
            .iter()
            .map(|&(selector, kind)| (selector, self.kind_options(kind)))
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeBackend;

    #[test]
    fn every_selector_starts_with_placeholder_only() {
        let cache = CatalogCache::new();
        for (selector, _) in SELECTOR_BINDINGS {
            let opts = cache.options(*selector);
            assert_eq!(opts.len(), 1);
            assert!(opts[0].is_placeholder());
        }
    }

    #[test]
    fn load_populates_bound_selectors() {
        let backend = FakeBackend::with_catalogs();
        let mut cache = CatalogCache::new();
        cache.load(&backend);

        let regimes = cache.options(Selector::ProfileRegime);
        assert_eq!(regimes.len(), 3);
        assert_eq!(regimes[1].value, "601");
        assert_eq!(regimes[1].label, "601 - General de Ley Personas Morales");

        let stores = cache.options(Selector::RequestStore);
        assert_eq!(stores[0].label, "Selecciona una tienda...");
        assert_eq!(stores[1].value, "5");
        assert_eq!(cache.store_name("5"), Some("Tienda Centro"));
    }

    #[test]
    fn share_key_resolves_by_id_or_alias() {
        let backend = FakeBackend::with_catalogs();
        let mut cache = CatalogCache::new();
        assert!(!cache.has_stores());
        cache.load(&backend);

        assert_eq!(cache.resolve_store("5"), Some("5"));
        assert_eq!(cache.resolve_store("Centro"), Some("5"));
        assert_eq!(cache.resolve_store("norte"), None);
    }

    #[test]
    fn failed_load_keeps_previous_lists() {
        let backend = FakeBackend::with_catalogs();
        let mut cache = CatalogCache::new();
        cache.load(&backend);

        backend.fail_next("catalogs");
        cache.load(&backend);
        assert_eq!(cache.options(Selector::RequestCfdiUse).len(), 3);
    }
}
