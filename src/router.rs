//! Views, navigation and the screen computed from them.
//!
//! The active view is the only navigation state. Everything else (which
//! panel is up, which menu entries exist, which one is highlighted) is
//! derived by [`render`] from the session and that view.

use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::form::{FormField, RequestForm};
use crate::model::{Role, Session};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum View {
    Dashboard,
    Request,
    History,
    Profile,
    StaffRequests,
    StaffUsers,
    StaffQr,
}

impl View {
    pub fn id(self) -> &'static str {
        match self {
            View::Dashboard => "dashboard",
            View::Request => "solicitar",
            View::History => "historial",
            View::Profile => "perfil",
            View::StaffRequests => "solicitudes-empresa",
            View::StaffUsers => "usuarios-empresa",
            View::StaffQr => "qr-empresa",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            View::Dashboard => "Inicio",
            View::Request => "Solicitar factura",
            View::History => "Mis solicitudes",
            View::Profile => "Mi perfil",
            View::StaffRequests => "Solicitudes",
            View::StaffUsers => "Usuarios",
            View::StaffQr => "Código QR",
        }
    }

    /// The data load entering this view triggers.
    pub fn entry_load(self) -> Option<DataLoad> {
        match self {
            View::Dashboard => Some(DataLoad::DashboardStats),
            View::History => Some(DataLoad::MyRequests),
            View::StaffRequests => Some(DataLoad::StaffRequests),
            View::StaffUsers => Some(DataLoad::StaffUsers),
            View::Request | View::Profile | View::StaffQr => None,
        }
    }
}

impl std::fmt::Display for View {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataLoad {
    DashboardStats,
    MyRequests,
    StaffRequests,
    StaffUsers,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Panel {
    Login,
    /// Shared by guests and customers.
    Customer,
    Staff,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavSurface {
    /// Sidebar / main menu.
    Primary,
    /// Bottom bar. Staff sessions have none.
    Secondary,
}

const CUSTOMER_VIEWS: &[View] = &[View::Dashboard, View::Request, View::History, View::Profile];
const GUEST_VIEWS: &[View] = &[View::Request];

/// Views reachable from a navigation surface for this session.
pub fn nav_views(session: &Session, surface: NavSurface) -> Vec<View> {
    match (session, surface) {
        (Session::Guest, _) => GUEST_VIEWS.to_vec(),
        (Session::Customer(_), _) => CUSTOMER_VIEWS.to_vec(),
        (Session::Staff(_), NavSurface::Secondary) => Vec::new(),
        (Session::Staff(staff), NavSurface::Primary) => {
            let mut views = vec![View::StaffRequests];
            if staff.admin {
                views.push(View::StaffUsers);
            }
            views.push(View::StaffQr);
            views
        }
    }
}

pub fn is_reachable(session: &Session, view: View) -> bool {
    nav_views(session, NavSurface::Primary).contains(&view)
}

#[derive(Debug, Default)]
pub struct Router {
    active: Option<View>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> Option<View> {
        self.active
    }

    /// Activate `view` and return the load its entry triggers.
    pub fn navigate_to(&mut self, session: &Session, view: View) -> AppResult<Option<DataLoad>> {
        if !is_reachable(session, view) {
            debug!(view = view.id(), role = ?session.role(), "Navigation refused");
            return Err(AppError::Forbidden("Esta sección no está disponible".into()));
        }
        debug!(view = view.id(), "Navigate");
        self.active = Some(view);
        Ok(view.entry_load())
    }

    /// Show the panel for a freshly started session.
    ///
    /// A staged store id (from a QR link) preselects the store and lands on
    /// the request view; it only applies to guest and customer panels.
    pub fn mount(
        &mut self,
        session: &Session,
        staged_store: Option<String>,
        form: &mut RequestForm,
    ) -> AppResult<Option<DataLoad>> {
        let landing = match session.role() {
            Role::Staff => View::StaffRequests,
            Role::Guest => View::Request,
            Role::Customer if staged_store.is_some() => View::Request,
            Role::Customer => View::Dashboard,
        };
        if session.role() != Role::Staff {
            if let Some(store) = staged_store {
                form.set(FormField::Store, store);
            }
        }
        self.navigate_to(session, landing)
    }

    pub fn reset(&mut self) {
        self.active = None;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavEntry {
    pub view: View,
    pub highlighted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub name: String,
    pub subtitle: String,
    pub avatar: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Screen {
    pub panel: Panel,
    pub header: Option<Header>,
    /// Visible content region. `None` on the login panel.
    pub active: Option<View>,
    pub primary: Vec<NavEntry>,
    pub secondary: Option<Vec<NavEntry>>,
}

fn header(session: &Session) -> Header {
    match session {
        Session::Guest => Header {
            name: "Invitado".into(),
            subtitle: "Sin cuenta".into(),
            avatar: "👤".into(),
        },
        Session::Customer(c) => {
            let name = c
                .usuario
                .nombre
                .clone()
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| c.usuario.email.clone());
            let avatar = name
                .chars()
                .next()
                .map(|ch| ch.to_uppercase().to_string())
                .unwrap_or_else(|| "C".into());
            Header {
                name: if name.is_empty() { "Cliente".into() } else { name },
                subtitle: "Cliente".into(),
                avatar,
            }
        }
        Session::Staff(s) => Header {
            name: if s.usuario.is_empty() { "Empresa".into() } else { s.usuario.clone() },
            subtitle: if s.empresa_nombre.is_empty() {
                "Empresa".into()
            } else {
                s.empresa_nombre.clone()
            },
            avatar: "🏢".into(),
        },
    }
}

/// Compute what is visible from the session and the active view.
pub fn render(session: Option<&Session>, router: &Router) -> Screen {
    let Some(session) = session else {
        return Screen {
            panel: Panel::Login,
            header: None,
            active: None,
            primary: Vec::new(),
            secondary: None,
        };
    };

    let active = router.active().filter(|v| is_reachable(session, *v));
    let entries = |surface| {
        nav_views(session, surface)
            .into_iter()
            .map(|view| NavEntry {
                view,
                highlighted: Some(view) == active,
            })
            .collect::<Vec<_>>()
    };

    let (panel, secondary) = match session.role() {
        Role::Staff => (Panel::Staff, None),
        Role::Guest | Role::Customer => (Panel::Customer, Some(entries(NavSurface::Secondary))),
    };

    Screen {
        panel,
        header: Some(header(session)),
        active,
        primary: entries(NavSurface::Primary),
        secondary,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PermissionLevel;
    use crate::testing::{customer_session, staff_session};

    #[test]
    fn guests_cannot_reach_identity_views() {
        let mut router = Router::new();
        for view in [View::Dashboard, View::History, View::Profile] {
            assert!(!is_reachable(&Session::Guest, view));
            assert!(router.navigate_to(&Session::Guest, view).is_err());
        }
        let screen = render(Some(&Session::Guest), &router);
        let views: Vec<View> = screen.primary.iter().map(|e| e.view).collect();
        assert_eq!(views, vec![View::Request]);
        let bottom: Vec<View> = screen.secondary.unwrap().iter().map(|e| e.view).collect();
        assert_eq!(bottom, vec![View::Request]);
    }

    #[test]
    fn entering_views_triggers_their_loads() {
        let session = customer_session(None);
        let mut router = Router::new();
        assert_eq!(
            router.navigate_to(&session, View::Dashboard).unwrap(),
            Some(DataLoad::DashboardStats)
        );
        assert_eq!(
            router.navigate_to(&session, View::History).unwrap(),
            Some(DataLoad::MyRequests)
        );
        assert_eq!(router.navigate_to(&session, View::Request).unwrap(), None);

        let admin = staff_session(PermissionLevel::Gestionar, true);
        assert_eq!(
            router.navigate_to(&admin, View::StaffUsers).unwrap(),
            Some(DataLoad::StaffUsers)
        );
    }

    #[test]
    fn highlight_follows_active_view_on_both_surfaces() {
        let session = customer_session(None);
        let mut router = Router::new();
        router.navigate_to(&session, View::History).unwrap();
        let screen = render(Some(&session), &router);

        assert_eq!(screen.panel, Panel::Customer);
        assert_eq!(screen.active, Some(View::History));
        for surface in [Some(screen.primary.clone()), screen.secondary.clone()] {
            let lit: Vec<View> = surface
                .unwrap()
                .iter()
                .filter(|e| e.highlighted)
                .map(|e| e.view)
                .collect();
            assert_eq!(lit, vec![View::History]);
        }
    }

    #[test]
    fn staff_has_no_bottom_bar_and_non_admins_lack_users() {
        let reader = staff_session(PermissionLevel::Lectura, false);
        let mut router = Router::new();
        let mut form = RequestForm::new();
        assert_eq!(
            router.mount(&reader, None, &mut form).unwrap(),
            Some(DataLoad::StaffRequests)
        );
        let screen = render(Some(&reader), &router);
        assert_eq!(screen.panel, Panel::Staff);
        assert!(screen.secondary.is_none());
        assert!(!screen.primary.iter().any(|e| e.view == View::StaffUsers));
        assert!(router.navigate_to(&reader, View::StaffUsers).is_err());

        let admin = staff_session(PermissionLevel::Lectura, true);
        assert!(render(Some(&admin), &router)
            .primary
            .iter()
            .any(|e| e.view == View::StaffUsers));
    }

    #[test]
    fn staged_store_lands_guest_on_request_view() {
        let mut router = Router::new();
        let mut form = RequestForm::new();
        let load = router
            .mount(&Session::Guest, Some("5".into()), &mut form)
            .unwrap();
        assert_eq!(load, None);
        assert_eq!(router.active(), Some(View::Request));
        assert_eq!(form.get(FormField::Store), "5");
    }

    #[test]
    fn customer_lands_on_dashboard_without_staged_store() {
        let mut router = Router::new();
        let mut form = RequestForm::new();
        let session = customer_session(None);
        assert_eq!(
            router.mount(&session, None, &mut form).unwrap(),
            Some(DataLoad::DashboardStats)
        );
        assert_eq!(router.active(), Some(View::Dashboard));
    }

    #[test]
    fn stale_active_view_is_not_rendered_for_new_role() {
        let customer = customer_session(None);
        let mut router = Router::new();
        router.navigate_to(&customer, View::Profile).unwrap();
        let screen = render(Some(&Session::Guest), &router);
        assert_eq!(screen.active, None);
        assert!(screen.primary.iter().all(|e| !e.highlighted));
    }

    #[test]
    fn login_panel_without_session() {
        let screen = render(None, &Router::new());
        assert_eq!(screen.panel, Panel::Login);
        assert!(screen.primary.is_empty());
    }

    #[test]
    fn customer_header_uses_initial() {
        let screen = render(Some(&customer_session(None)), &Router::new());
        let header = screen.header.unwrap();
        assert_eq!(header.name, "María");
        assert_eq!(header.avatar, "M");
    }
}
