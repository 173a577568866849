use std::process::ExitCode;
use std::rc::Rc;

use clap::{Parser, Subcommand};
use inquire::Text;
use tracing::error;
use tracing_subscriber::EnvFilter;

use factufacil::api::ApiClient;
use factufacil::app::App;
use factufacil::config::{self, Settings};
use factufacil::error::ConfigError;
use factufacil::feedback::Feedback;
use factufacil::model::Session;
use factufacil::session::SessionStore;
use factufacil::share;
use factufacil::storage::{FileStore, MemoryStore};
use factufacil::terminal::{self, TerminalFeedback};

#[derive(Parser)]
#[command(name = "factufacil", version, about = "Solicita y gestiona facturas de tus compras")]
struct Cli {
    /// Preselect a store by id or alias
    #[arg(long, value_name = "ID")]
    empresa: Option<String>,

    /// Preselect the store from a shared link (`...?empresa=<id>`)
    #[arg(long, value_name = "URL", conflicts_with = "empresa")]
    link: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure the API address and lookup delay
    Config,
    /// Forget the stored session
    Logout,
    /// Show the stored session and settings
    Status,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("factufacil=warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Command failed: {e}");
            eprintln!("❌ {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Some(Commands::Config) => {
            setup_config_wizard()?;
            return Ok(());
        }
        Some(Commands::Logout) => {
            SessionStore::new(Box::new(FileStore::platform_default())).clear()?;
            println!("✅ Sesión cerrada.");
            return Ok(());
        }
        Some(Commands::Status) => {
            show_status()?;
            return Ok(());
        }
        None => {}
    }

    let settings = Settings::load()?;
    let backend = ApiClient::new(settings.api_base()?)?;
    let ui: Rc<dyn Feedback> = Rc::new(TerminalFeedback);
    let mut app = App::new(
        backend,
        ui,
        Box::new(FileStore::platform_default()),
        Box::new(MemoryStore::new()),
        settings.lookup_delay(),
    );

    let staged = match (cli.empresa, cli.link) {
        (Some(id), _) => Some(id),
        (None, Some(link)) => {
            let store = share::store_from_link(&link);
            if store.is_none() {
                println!("⚠️  El enlace no indica una tienda.");
            }
            store
        }
        (None, None) => None,
    };
    if let Some(store) = staged {
        app.stage_store(&store)?;
    }

    app.start();
    terminal::run(&mut app, &settings);
    Ok(())
}

fn setup_config_wizard() -> Result<Settings, ConfigError> {
    println!("\n⚙️  --- Configuración ---");
    let path = config::config_path();
    let current = Settings::load_from(&path)?;

    let prompt_or = |message: &str, default: &str| {
        Text::new(message)
            .with_default(default)
            .prompt()
            .unwrap_or_else(|_| default.to_string())
    };

    let api_url = prompt_or("URL del API:", &current.api_url);
    let public_default = current.public_url.clone().unwrap_or_else(|| api_url.clone());
    let public_url = prompt_or("URL pública (enlaces QR):", &public_default);
    let delay = prompt_or(
        "Espera antes de buscar el RFC (ms):",
        &current.lookup_delay_ms.to_string(),
    );

    let settings = Settings {
        public_url: (public_url.trim() != api_url.trim()).then(|| public_url.trim().to_string()),
        api_url: api_url.trim().to_string(),
        lookup_delay_ms: delay.trim().parse().unwrap_or(current.lookup_delay_ms),
        ..current
    };
    settings.validate()?;
    settings.save_to(&path)?;
    println!("✅ Configuración guardada en {}", path.display());
    Ok(settings)
}

fn show_status() -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::load()?;
    println!("⚙️  Configuración: {}", config::config_path().display());
    println!("🌐 API: {}", settings.api_url);

    let mut sessions = SessionStore::new(Box::new(FileStore::platform_default()));
    match sessions.restore() {
        None => println!("🔒 Sin sesión guardada"),
        Some(Session::Guest) => println!("👤 Invitado"),
        Some(Session::Customer(c)) => println!(
            "👤 Cliente: {} ({} razones sociales)",
            c.usuario.email,
            c.usuario.razones.as_ref().map_or(0, Vec::len)
        ),
        Some(Session::Staff(s)) => println!(
            "🏢 {} en {} ({:?}{})",
            s.usuario,
            s.empresa_nombre,
            s.permisos,
            if s.admin { ", admin" } else { "" }
        ),
    }
    Ok(())
}
