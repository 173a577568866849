//! Interactive terminal front end.

use std::fmt;
use std::path::PathBuf;
use std::thread;
use std::time::Instant;

use comfy_table::{Attribute, Cell, Table};
use inquire::{Confirm, DateSelect, Password, Select, Text};
use tracing::debug;

use crate::api::Backend;
use crate::app::{App, RfcStatus};
use crate::catalog::{SelectOption, Selector};
use crate::config::Settings;
use crate::feedback::{Feedback, ToastKind};
use crate::form::FormField;
use crate::model::{
    AccountState, InvoiceRequest, PermissionLevel, Registration, RequestStatus, Role, Session,
    TaxProfileInput,
};
use crate::profiles::NEW_PROFILE;
use crate::requests::{self, Filters};
use crate::router::{Panel, Screen, View};
use crate::staff_users::StaffUserDraft;
use crate::upload::{self, StagedFile};

/// Feedback printed to the terminal.
pub struct TerminalFeedback;

impl Feedback for TerminalFeedback {
    fn show_loading(&self, message: &str) {
        eprintln!("⏳ {message}");
    }

    fn hide_loading(&self) {}

    fn toast(&self, message: &str, kind: ToastKind) {
        match kind {
            ToastKind::Success => println!("✅ {message}"),
            ToastKind::Error => println!("❌ {message}"),
            ToastKind::Info => println!("ℹ️  {message}"),
        }
    }

    fn confirm(&self, question: &str) -> bool {
        Confirm::new(question)
            .with_default(false)
            .prompt()
            .unwrap_or(false)
    }
}

// ==========================================
// Prompt helpers
// ==========================================

/// `None` means the user cancelled (Esc / Ctrl-C).
fn text(message: &str, default: &str) -> Option<String> {
    let mut prompt = Text::new(message);
    if !default.is_empty() {
        prompt = prompt.with_default(default);
    }
    prompt.prompt().ok().map(|v| v.trim().to_string())
}

fn password(message: &str) -> Option<String> {
    Password::new(message).without_confirmation().prompt().ok()
}

fn choose(message: &str, options: &[SelectOption], current: &str) -> Option<String> {
    if options.is_empty() {
        return None;
    }
    let cursor = options.iter().position(|o| o.value == current).unwrap_or(0);
    Select::new(message, options.to_vec())
        .with_starting_cursor(cursor)
        .prompt()
        .ok()
        .map(|o| o.value)
}

fn pick_file(title: &str, extensions: &[&str]) -> Option<StagedFile> {
    println!("📂 Abriendo selector de archivos...");
    let picked = rfd::FileDialog::new()
        .set_title(title)
        .add_filter("Archivo", extensions)
        .pick_file();
    let path = match picked {
        Some(path) => path,
        None => {
            let typed = text("Ruta del archivo (vacío para omitir):", "")?;
            if typed.is_empty() {
                return None;
            }
            PathBuf::from(typed)
        }
    };
    match upload::read_data_url(&path) {
        Ok(file) => {
            println!("📎 {}", file.name);
            Some(file)
        }
        Err(e) => {
            println!("❌ No se pudo leer el archivo: {e}");
            None
        }
    }
}

#[derive(Clone)]
enum MenuItem {
    Go(View, bool),
    Act(&'static str),
    Logout,
    Quit,
}

impl fmt::Display for MenuItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MenuItem::Go(view, true) => write!(f, "▸ {view}"),
            MenuItem::Go(view, false) => write!(f, "  {view}"),
            MenuItem::Act(label) => write!(f, "• {label}"),
            MenuItem::Logout => f.write_str("🚪 Cerrar sesión"),
            MenuItem::Quit => f.write_str("Salir"),
        }
    }
}

// ==========================================
// Main loop
// ==========================================

pub fn run<B: Backend>(app: &mut App<B>, settings: &Settings) {
    loop {
        let screen = app.screen();
        let keep_going = match screen.panel {
            Panel::Login => login_screen(app),
            Panel::Customer | Panel::Staff => panel_screen(app, &screen, settings),
        };
        if !keep_going {
            break;
        }
    }
}

fn login_screen<B: Backend>(app: &mut App<B>) -> bool {
    println!("\n🧾 --- FactuFácil ---");
    let options = vec![
        "Continuar como invitado",
        "Soy cliente",
        "Soy empresa",
        "Crear cuenta",
        "Salir",
    ];
    let Ok(choice) = Select::new("¿Cómo quieres entrar?", options).prompt() else {
        return false;
    };
    match choice {
        "Continuar como invitado" => {
            let _ = app.continue_as_guest();
        }
        "Soy cliente" => customer_login(app, ""),
        "Soy empresa" => {
            let (Some(user), Some(pass)) = (text("Usuario:", ""), password("Contraseña:")) else {
                return true;
            };
            let _ = app.login_staff(&user, &pass);
        }
        "Crear cuenta" => {
            if let Some(email) = registration(app) {
                customer_login(app, &email);
            }
        }
        _ => return false,
    }
    true
}

fn customer_login<B: Backend>(app: &mut App<B>, email: &str) {
    let (Some(email), Some(pass)) = (text("Correo electrónico:", email), password("Contraseña:"))
    else {
        return;
    };
    let _ = app.login_customer(&email, &pass);
}

fn registration<B: Backend>(app: &mut App<B>) -> Option<String> {
    println!("\n📝 --- Crear cuenta ---");
    let nombre = text("Nombre:", "")?;
    let email = text("Correo electrónico*:", "")?;
    let password = Password::new("Contraseña*:").prompt().ok()?;
    let rfc = text("RFC*:", "")?;
    let razon = text("Razón social*:", "")?;
    let regimen = choose(
        "Régimen fiscal:",
        app.catalogs.options(Selector::RegistrationRegime),
        "",
    )
    .unwrap_or_default();
    let cp = text("Código postal:", "")?;
    let uso_cfdi = choose(
        "Uso de CFDI:",
        app.catalogs.options(Selector::RegistrationCfdiUse),
        "",
    )
    .unwrap_or_default();

    app.register(Registration {
        nombre,
        email,
        password,
        rfc,
        razon,
        regimen,
        cp,
        uso_cfdi,
    })
    .ok()
}

fn print_header(screen: &Screen) {
    if let Some(header) = &screen.header {
        println!("\n{} {} · {}", header.avatar, header.name, header.subtitle);
    }
    if let Some(view) = screen.active {
        println!("=== {view} ===");
    }
}

fn panel_screen<B: Backend>(app: &mut App<B>, screen: &Screen, settings: &Settings) -> bool {
    print_header(screen);
    let actions: Vec<&'static str> = match screen.active {
        Some(View::Dashboard) => {
            show_dashboard(app);
            Vec::new()
        }
        Some(View::Request) => vec!["Llenar solicitud"],
        Some(View::History) => {
            show_requests(app, None);
            vec!["Filtrar", "Quitar filtros"]
        }
        Some(View::Profile) => {
            show_profile(app);
            let mut actions = vec!["Editar mis datos"];
            actions.extend(app.profiles.menu_actions());
            actions
        }
        Some(View::StaffRequests) => {
            let permisos = staff_permissions(app);
            show_requests(app, permisos);
            requests::list_actions(permisos.unwrap_or_default())
        }
        Some(View::StaffUsers) => {
            println!("{}", app.staff_users.render_table());
            vec!["Nuevo usuario", "Editar usuario", "Eliminar usuario"]
        }
        Some(View::StaffQr) => {
            show_qr(app, settings);
            Vec::new()
        }
        None => Vec::new(),
    };

    let mut menu: Vec<MenuItem> = actions.into_iter().map(MenuItem::Act).collect();
    menu.extend(
        screen
            .primary
            .iter()
            .map(|e| MenuItem::Go(e.view, e.highlighted)),
    );
    menu.push(MenuItem::Logout);
    menu.push(MenuItem::Quit);

    let Ok(choice) = Select::new("Menú:", menu).with_page_size(12).prompt() else {
        return false;
    };
    match choice {
        MenuItem::Go(view, _) => {
            if let Err(e) = app.navigate(view) {
                println!("❌ {e}");
            }
        }
        MenuItem::Act(action) => run_action(app, action),
        MenuItem::Logout => {
            if let Err(e) = app.logout() {
                println!("❌ {e}");
            }
        }
        MenuItem::Quit => return false,
    }
    true
}

fn run_action<B: Backend>(app: &mut App<B>, action: &str) {
    debug!(action, "Menu action");
    match action {
        "Llenar solicitud" => request_form(app),
        "Filtrar" => edit_filters(&mut app.requests.filters),
        "Quitar filtros" => app.requests.filters = Filters::default(),
        "Recargar" => app.reload_staff_requests(),
        "Ver detalle" => {
            if let Some(id) = pick_request(app, false) {
                if let Ok(record) = app.request_detail(&id) {
                    show_detail(&record);
                    let permisos = staff_permissions(app).unwrap_or_default();
                    offer_status_change(app, &record, permisos);
                }
            }
        }
        "Cambiar estatus" => change_status(app),
        "Editar mis datos" => edit_account(app),
        "Agregar razón social" => {
            if let Some(input) = profile_input(app, &TaxProfileInput::default()) {
                let _ = app.create_profile(&input);
            }
        }
        "Editar razón social" => {
            if let Some(id) = pick_profile(app) {
                let current = app.profiles.get(&id).map(TaxProfileInput::from).unwrap_or_default();
                if let Some(input) = profile_input(app, &current) {
                    let _ = app.update_profile(&id, &input);
                }
            }
        }
        "Predeterminar razón social" => {
            if let Some(id) = pick_profile(app) {
                let _ = app.set_default_profile(&id);
            }
        }
        "Eliminar razón social" => {
            if let Some(id) = pick_profile(app) {
                let _ = app.delete_profile(&id);
            }
        }
        "Nuevo usuario" => {
            if let Some(draft) = staff_user_form(&StaffUserDraft::default(), true) {
                let _ = app.create_staff_user(draft);
            }
        }
        "Editar usuario" => {
            if let Some(user) = pick_staff_user(app) {
                let draft = StaffUserDraft::from(&user);
                if let Some(draft) = staff_user_form(&draft, false) {
                    let _ = app.update_staff_user(&user.id, draft);
                }
            }
        }
        "Eliminar usuario" => {
            if let Some(user) = pick_staff_user(app) {
                let _ = app.delete_staff_user(&user.id);
            }
        }
        _ => {}
    }
}

// ==========================================
// Views
// ==========================================

fn show_dashboard<B: Backend>(app: &App<B>) {
    let Some(stats) = app.stats() else {
        println!("(Sin estadísticas)");
        return;
    };
    let mut table = Table::new();
    table.set_header(vec![
        Cell::new("Total"),
        Cell::new("Pendientes"),
        Cell::new("Facturadas"),
        Cell::new("Rechazadas"),
    ]);
    table.add_row(vec![
        Cell::new(stats.total).add_attribute(Attribute::Bold),
        Cell::new(stats.pendientes),
        Cell::new(stats.facturadas),
        Cell::new(stats.rechazadas),
    ]);
    println!("{table}");
}

fn show_requests<B: Backend>(app: &App<B>, permisos: Option<PermissionLevel>) {
    if app.requests.load_failed() {
        println!("❌ Error al cargar");
        return;
    }
    let visible = app.requests.visible();
    if visible.is_empty() {
        println!("📋 No hay solicitudes");
        return;
    }
    if !app.requests.filters.is_empty() {
        println!(
            "🔎 {} de {} solicitudes",
            visible.len(),
            app.requests.requests().len()
        );
    }
    println!("{}", requests::render_table(&visible, permisos));
}

fn show_detail(r: &InvoiceRequest) {
    let mut table = Table::new();
    let rows = [
        ("Razón social", r.razon.clone()),
        ("RFC", r.rfc.clone()),
        ("Régimen", r.regimen.clone()),
        ("C.P.", r.cp.clone()),
        ("Uso CFDI", r.uso_cfdi.clone()),
        ("Email", r.email.clone()),
        ("Monto", requests::format_amount(r.monto)),
        ("Folio", r.folio.clone().unwrap_or_else(|| "-".into())),
        ("Notas", r.notas.clone().unwrap_or_else(|| "-".into())),
        ("Fecha", requests::format_date(&r.fecha)),
        ("Estatus", r.estatus.to_string()),
        ("Ticket", (if r.ticket.is_some() { "Adjunto" } else { "-" }).to_string()),
        ("CSF", (if r.csf.is_some() { "Adjunta" } else { "-" }).to_string()),
    ];
    for (label, value) in rows {
        table.add_row(vec![Cell::new(label).add_attribute(Attribute::Bold), Cell::new(value)]);
    }
    println!("{table}");
}

fn show_profile<B: Backend>(app: &App<B>) {
    if let Some(customer) = app.session().and_then(Session::as_customer) {
        println!(
            "👤 {} <{}>",
            customer.usuario.nombre.as_deref().unwrap_or("-"),
            customer.usuario.email
        );
    }
    let mut table = Table::new();
    table.set_header(vec![
        Cell::new(""),
        Cell::new("RFC"),
        Cell::new("Razón social"),
        Cell::new("Régimen"),
        Cell::new("C.P."),
        Cell::new("Uso CFDI"),
    ]);
    for p in app.profiles.profiles() {
        table.add_row(vec![
            Cell::new(if p.predeterminada { "★" } else { "" }),
            Cell::new(&p.rfc),
            Cell::new(&p.razon),
            Cell::new(&p.regimen),
            Cell::new(&p.cp),
            Cell::new(&p.uso_cfdi),
        ]);
    }
    println!("{table}");
}

fn show_qr<B: Backend>(app: &App<B>, settings: &Settings) {
    let urls = settings
        .public_base()
        .and_then(|public| Ok((public, settings.qr_service()?)));
    let (public, service) = match urls {
        Ok(urls) => urls,
        Err(e) => {
            println!("❌ {e}");
            return;
        }
    };
    match app.store_qr(&public, &service) {
        Ok((link, image)) => {
            println!("🔗 Enlace para clientes: {link}");
            println!("🖼️  Código QR: {image}");
        }
        Err(e) => println!("❌ {e}"),
    }
}

// ==========================================
// Forms
// ==========================================

fn request_form<B: Backend>(app: &mut App<B>) {
    println!("\n🧾 --- Solicitar factura ---");
    let Some(store) = choose(
        "Tienda*:",
        app.catalogs.options(Selector::RequestStore),
        app.form.get(FormField::Store),
    ) else {
        return;
    };
    app.set_field(FormField::Store, store);

    if app.session().map(Session::role) == Some(Role::Customer) {
        let current = app.profiles.selected().unwrap_or(NEW_PROFILE).to_string();
        if let Some(id) = choose("Razón social:", app.profiles.options(), &current) {
            app.select_profile(Some(&id));
        }
    }

    let Some(rfc) = text("RFC*:", app.form.get(FormField::Rfc)) else {
        return;
    };
    app.set_field(FormField::Rfc, rfc.clone());
    if app.rfc_input(&rfc, Instant::now()) {
        if let Some(deadline) = app.rfc_deadline() {
            thread::sleep(deadline.saturating_duration_since(Instant::now()));
        }
        match app.poll_rfc(Instant::now()) {
            Some(RfcStatus::Found) => println!("✅ Datos encontrados"),
            Some(RfcStatus::New) => println!("🆕 RFC nuevo"),
            _ => {}
        }
    }

    for field in [FormField::LegalName, FormField::PostalCode, FormField::Email] {
        let label = format!("{}{}:", field.label(), if field == FormField::PostalCode { "" } else { "*" });
        let Some(value) = text(&label, app.form.get(field)) else {
            return;
        };
        app.set_field(field, value);
    }
    for (field, selector) in [
        (FormField::Regime, Selector::RequestRegime),
        (FormField::CfdiUse, Selector::RequestCfdiUse),
    ] {
        let label = format!("{}:", field.label());
        if let Some(value) = choose(&label, app.catalogs.options(selector), app.form.get(field)) {
            app.set_field(field, value);
        }
    }
    for field in [FormField::Cc, FormField::Amount, FormField::Folio, FormField::Notes] {
        let label = format!("{}:", field.label());
        let Some(value) = text(&label, app.form.get(field)) else {
            return;
        };
        app.set_field(field, value);
    }

    if let Some(ticket) = pick_file("Foto del ticket", &["jpg", "jpeg", "png", "webp", "heic"]) {
        app.form.ticket = Some(ticket);
    }
    let wants_csf = Confirm::new("¿Adjuntar constancia de situación fiscal?")
        .with_default(false)
        .prompt()
        .unwrap_or(false);
    if wants_csf {
        if let Some(csf) = pick_file("Constancia de situación fiscal", &["pdf", "jpg", "jpeg", "png"]) {
            app.form.attach_tax_document(csf);
        }
    }

    let send = Confirm::new("¿Enviar solicitud?")
        .with_default(true)
        .prompt()
        .unwrap_or(false);
    if send {
        let _ = app.submit_request();
    }
}

fn edit_filters(filters: &mut Filters) {
    let mut statuses = vec!["Todos".to_string()];
    statuses.extend(RequestStatus::ALL.iter().map(|s| s.to_string()));
    if let Ok(choice) = Select::new("Estatus:", statuses).prompt() {
        filters.status = RequestStatus::ALL.into_iter().find(|s| s.as_str() == choice);
    }
    let date = |msg: &str| {
        DateSelect::new(msg)
            .prompt_skippable()
            .ok()
            .flatten()
            .map(|d| d.format("%Y-%m-%d").to_string())
    };
    filters.date_from = date("Desde (Esc para omitir):");
    filters.date_to = date("Hasta (Esc para omitir):");
    filters.search = text("Buscar (RFC, razón social o email):", &filters.search).unwrap_or_default();
}

fn pick_request<B: Backend>(app: &App<B>, pending_only: bool) -> Option<String> {
    let options: Vec<SelectOption> = app
        .requests
        .visible()
        .into_iter()
        .filter(|r| !pending_only || r.estatus == RequestStatus::Pendiente)
        .map(|r| {
            SelectOption::new(
                r.id.clone(),
                format!("{} · {} · {} · {}", requests::format_date(&r.fecha), r.rfc, r.razon, r.estatus),
            )
        })
        .collect();
    if options.is_empty() {
        println!("(Sin solicitudes)");
        return None;
    }
    choose("Solicitud:", &options, "")
}

fn staff_permissions<B: Backend>(app: &App<B>) -> Option<PermissionLevel> {
    app.session().and_then(Session::as_staff).map(|s| s.permisos)
}

fn change_status<B: Backend>(app: &mut App<B>) {
    let Some(permisos) = staff_permissions(app) else {
        return;
    };
    let Some(id) = pick_request(app, true) else {
        return;
    };
    let Some(record) = app.requests.get(&id).cloned() else {
        return;
    };
    offer_status_change(app, &record, permisos);
}

/// Status buttons for one request. Nothing is shown when none apply.
fn offer_status_change<B: Backend>(app: &mut App<B>, record: &InvoiceRequest, permisos: PermissionLevel) {
    let actions = requests::row_actions(permisos, record);
    if actions.is_empty() {
        return;
    }
    let mut labels: Vec<String> = actions.iter().map(|s| s.to_string()).collect();
    labels.push("Volver".into());
    if let Ok(choice) = Select::new("Marcar como:", labels).prompt() {
        if let Some(status) = actions.iter().find(|s| s.as_str() == choice) {
            let _ = app.change_status(&record.id, *status);
        }
    }
}

fn edit_account<B: Backend>(app: &mut App<B>) {
    let current = app
        .session()
        .and_then(Session::as_customer)
        .and_then(|c| c.usuario.nombre.clone())
        .unwrap_or_default();
    let Some(nombre) = text("Nombre:", &current) else {
        return;
    };
    let new_password = Password::new("Nueva contraseña (vacío para conservar):")
        .without_confirmation()
        .prompt()
        .ok();
    let _ = app.update_account(&nombre, new_password);
}

fn pick_profile<B: Backend>(app: &App<B>) -> Option<String> {
    let options: Vec<SelectOption> = app
        .profiles
        .options()
        .iter()
        .filter(|o| o.value != NEW_PROFILE)
        .cloned()
        .collect();
    if options.is_empty() {
        println!("(Sin razones sociales)");
        return None;
    }
    choose("Razón social:", &options, app.profiles.selected().unwrap_or(""))
}

fn profile_input<B: Backend>(app: &App<B>, current: &TaxProfileInput) -> Option<TaxProfileInput> {
    let rfc = text("RFC*:", &current.rfc)?;
    let razon = text("Razón social*:", &current.razon)?;
    let regimen = choose(
        "Régimen fiscal*:",
        app.catalogs.options(Selector::ProfileRegime),
        &current.regimen,
    )?;
    let cp = text("Código postal*:", &current.cp)?;
    let uso_cfdi = choose(
        "Uso de CFDI*:",
        app.catalogs.options(Selector::ProfileCfdiUse),
        &current.uso_cfdi,
    )?;
    let attach = Confirm::new("¿Adjuntar constancia de situación fiscal?")
        .with_default(false)
        .prompt()
        .unwrap_or(false);
    let csf = if attach {
        pick_file("Constancia de situación fiscal", &["pdf", "jpg", "jpeg", "png"]).map(|f| f.data_url)
    } else {
        current.csf.clone()
    };
    Some(TaxProfileInput {
        rfc,
        razon,
        regimen,
        cp,
        uso_cfdi,
        csf,
    })
}

fn pick_staff_user<B: Backend>(app: &App<B>) -> Option<crate::model::StaffUser> {
    let options: Vec<SelectOption> = app
        .staff_users
        .users()
        .iter()
        .map(|u| SelectOption::new(u.id.clone(), format!("{} ({})", u.usuario, u.nombre)))
        .collect();
    if options.is_empty() {
        println!("(Sin usuarios)");
        return None;
    }
    let id = choose("Usuario:", &options, "")?;
    app.staff_users.get(&id).cloned()
}

fn staff_user_form(current: &StaffUserDraft, creating: bool) -> Option<StaffUserDraft> {
    let usuario = text("Usuario*:", &current.usuario)?;
    let nombre = text("Nombre:", &current.nombre)?;
    let email = text("Email:", &current.email)?;
    let password_label = if creating {
        "Contraseña*:"
    } else {
        "Contraseña (vacío para conservar):"
    };
    let password = password(password_label)?;
    let permisos = Select::new("Permisos:", vec!["Lectura", "Gestionar"])
        .with_starting_cursor(usize::from(current.permisos == PermissionLevel::Gestionar))
        .prompt()
        .ok()?;
    let admin = Confirm::new("¿Administrador?")
        .with_default(current.admin)
        .prompt()
        .ok()?;
    let estado = Select::new("Estado:", vec!["Activo", "Inactivo"])
        .with_starting_cursor(usize::from(current.estado == AccountState::Inactivo))
        .prompt()
        .ok()?;
    Some(StaffUserDraft {
        usuario,
        nombre,
        email,
        password,
        permisos: if permisos == "Gestionar" {
            PermissionLevel::Gestionar
        } else {
            PermissionLevel::Lectura
        },
        admin,
        estado: if estado == "Inactivo" {
            AccountState::Inactivo
        } else {
            AccountState::Activo
        },
    })
}
