//! Company staff accounts, managed by admin staff.

use comfy_table::{Cell, Color, Table};
use tracing::{info, warn};

use crate::api::Backend;
use crate::error::{AppError, AppResult};
use crate::feedback::Feedback;
use crate::model::{AccountState, PermissionLevel, StaffSession, StaffUser, StaffUserInput};

/// Editable fields of a staff account.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StaffUserDraft {
    pub usuario: String,
    pub nombre: String,
    pub email: String,
    /// Empty keeps the current password when editing.
    pub password: String,
    pub permisos: PermissionLevel,
    pub admin: bool,
    pub estado: AccountState,
}

impl From<&StaffUser> for StaffUserDraft {
    fn from(u: &StaffUser) -> Self {
        Self {
            usuario: u.usuario.clone(),
            nombre: u.nombre.clone(),
            email: u.email.clone().unwrap_or_default(),
            password: String::new(),
            permisos: u.permisos,
            admin: u.admin,
            estado: u.estado,
        }
    }
}

impl StaffUserDraft {
    fn into_input(self, company_id: &str) -> StaffUserInput {
        StaffUserInput {
            empresa_id: company_id.to_string(),
            usuario: self.usuario.trim().to_string(),
            nombre: self.nombre.trim().to_string(),
            email: self.email.trim().to_string(),
            password: self.password,
            permisos: self.permisos,
            admin: if self.admin { "Si" } else { "No" },
            estado: self.estado,
        }
    }
}

fn require_admin(staff: &StaffSession) -> AppResult<()> {
    if staff.admin {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "Solo un administrador puede gestionar usuarios".into(),
        ))
    }
}

#[derive(Debug, Default)]
pub struct StaffUserManager {
    users: Vec<StaffUser>,
}

impl StaffUserManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn users(&self) -> &[StaffUser] {
        &self.users
    }

    pub fn get(&self, id: &str) -> Option<&StaffUser> {
        self.users.iter().find(|u| u.id == id)
    }

    /// Failures leave an empty list.
    pub fn load(&mut self, backend: &dyn Backend, staff: &StaffSession) {
        self.users = match backend.staff_users(&staff.empresa_id) {
            Ok(users) => users,
            Err(e) => {
                warn!(error = %e, "Could not load staff users");
                Vec::new()
            }
        };
    }

    pub fn create(
        &mut self,
        backend: &dyn Backend,
        staff: &StaffSession,
        draft: StaffUserDraft,
    ) -> AppResult<()> {
        require_admin(staff)?;
        if draft.usuario.trim().is_empty() || draft.password.is_empty() {
            return Err(AppError::Validation(
                "Usuario y contraseña son obligatorios".into(),
            ));
        }
        backend.create_staff_user(&draft.into_input(&staff.empresa_id))?;
        info!("Staff user created");
        self.load(backend, staff);
        Ok(())
    }

    pub fn update(
        &mut self,
        backend: &dyn Backend,
        staff: &StaffSession,
        id: &str,
        draft: StaffUserDraft,
    ) -> AppResult<()> {
        require_admin(staff)?;
        if draft.usuario.trim().is_empty() {
            return Err(AppError::Validation("El usuario es obligatorio".into()));
        }
        backend.update_staff_user(id, &draft.into_input(&staff.empresa_id))?;
        info!(id, "Staff user updated");
        self.load(backend, staff);
        Ok(())
    }

    /// Returns `Ok(false)` when the user declined the confirmation.
    pub fn delete(
        &mut self,
        backend: &dyn Backend,
        staff: &StaffSession,
        ui: &dyn Feedback,
        id: &str,
    ) -> AppResult<bool> {
        require_admin(staff)?;
        if !ui.confirm("¿Eliminar este usuario?") {
            return Ok(false);
        }
        backend.delete_staff_user(id)?;
        info!(id, "Staff user deleted");
        self.load(backend, staff);
        Ok(true)
    }

    pub fn render_table(&self) -> Table {
        let mut table = Table::new();
        table.set_header(vec![
            Cell::new("Usuario"),
            Cell::new("Nombre"),
            Cell::new("Email"),
            Cell::new("Permisos"),
            Cell::new("Admin"),
            Cell::new("Estado"),
        ]);
        for u in &self.users {
            let permisos = match u.permisos {
                PermissionLevel::Lectura => "Lectura",
                PermissionLevel::Gestionar => "Gestionar",
            };
            let estado = match u.estado {
                AccountState::Activo => Cell::new("Activo").fg(Color::Rgb { r: 4, g: 120, b: 87 }),
                AccountState::Inactivo => Cell::new("Inactivo").fg(Color::Rgb { r: 185, g: 28, b: 28 }),
            };
            table.add_row(vec![
                Cell::new(&u.usuario),
                Cell::new(&u.nombre),
                Cell::new(u.email.as_deref().unwrap_or("-")),
                Cell::new(permisos),
                Cell::new(if u.admin { "Sí" } else { "No" }),
                estado,
            ]);
        }
        table
    }
}
