use clap::{Parser, Subcommand};
use std::path::Path;
use std::sync::Arc;

use sans_bot::application::errors::HostError;
use sans_bot::application::services::CommandService;
use sans_bot::infrastructure::adapters::ConsoleAdapter;
use sans_bot::infrastructure::config::HostConfig;
use sans_bot::infrastructure::native::NativeCatalog;
use sans_bot::modules::{
    api_version, Module, ModuleCatalog, ModuleLoader, ModuleRegistry, SystemModule, SYSTEM_MODULE,
};

#[derive(Parser)]
#[command(name = "sans-bot")]
#[command(about = "A modular bot host", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "config.yaml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the host and the operator console
    Run,
    /// Show version
    Version,
    /// Generate default config
    InitConfig,
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run => {
            let config = load_config(&cli.config);
            init_logging(&config.logging.level);

            let rt = match tokio::runtime::Runtime::new() {
                Ok(rt) => rt,
                Err(e) => {
                    eprintln!("Failed to start runtime: {}", e);
                    std::process::exit(1);
                }
            };
            if let Err(e) = rt.block_on(run_host(config)) {
                tracing::error!("Host stopped: {}", e);
                std::process::exit(1);
            }
        }
        Commands::Version => {
            println!("sans-bot v{} (module API {})", env!("CARGO_PKG_VERSION"), api_version());
        }
        Commands::InitConfig => {
            init_config();
        }
    }
}

fn init_logging(level: &str) {
    let level = level.parse::<tracing::Level>().unwrap_or(tracing::Level::INFO);
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();
}

fn load_config(path: &str) -> HostConfig {
    if !Path::new(path).exists() {
        return HostConfig::load_env();
    }
    match HostConfig::load(path) {
        Ok(config) => config.with_env(),
        Err(e) => {
            // Logging is not up yet
            eprintln!("Failed to load config: {}, using defaults", e);
            HostConfig::load_env()
        }
    }
}

fn build_loader(config: &HostConfig) -> ModuleLoader {
    let store = config.store.clone();
    let autoload = config.modules.autoload.clone();
    let catalog = ModuleCatalog::new()
        .with(SYSTEM_MODULE, move || {
            Ok(Box::new(SystemModule::new(store.clone(), autoload.clone())) as Box<dyn Module>)
        })
        .with_fallback(Arc::new(NativeCatalog::new(&config.modules.directory)));

    ModuleLoader::new(Arc::new(ModuleRegistry::new()), Arc::new(catalog))
}

async fn run_host(config: HostConfig) -> Result<(), HostError> {
    tracing::info!("Starting {} (module API {})", config.host.name, api_version());

    let loader = build_loader(&config);
    loader.load_module(SYSTEM_MODULE).await?;

    let report = loader
        .dispatcher()
        .call(SYSTEM_MODULE, "StartModules", Vec::new())
        .await?;
    let failed = report["failed"].as_array().map(Vec::len).unwrap_or(0);
    if failed > 0 {
        tracing::warn!("{} startup module(s) failed to load", failed);
    }

    let mut commands = CommandService::new(&config.host.prefix);
    commands.register_defaults(loader.clone());

    let console = ConsoleAdapter::new(Arc::new(commands));
    let result = console.run().await;

    tracing::info!("Shutting down");
    let unloaded = loader.unload_all().await;
    tracing::info!("Unloaded {} module(s)", unloaded.len());

    result
}

fn init_config() {
    match HostConfig::default().to_yaml() {
        Ok(yaml) => {
            println!("{}", yaml);
            println!("\nSave this to config.yaml and adjust as needed.");
        }
        Err(e) => eprintln!("{}", e),
    }
}
