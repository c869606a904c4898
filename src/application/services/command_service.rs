use futures::future::FutureExt;
use serde_json::Value;

use crate::application::errors::CommandError;
use crate::domain::entities::{Command, CommandRegistry};
use crate::modules::{api_version, ModuleLoader, SYSTEM_MODULE};

/// Service for managing and executing operator commands
pub struct CommandService {
    registry: CommandRegistry,
    prefix: String,
}

impl CommandService {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            registry: CommandRegistry::new(),
            prefix: prefix.into(),
        }
    }

    pub fn register(&mut self, command: Command) {
        self.registry.register(command);
    }

    /// Register the built-in module management commands
    pub fn register_defaults(&mut self, loader: ModuleLoader) {
        self.register(
            Command::new("help")
                .with_description("Show help message")
                .with_usage("help [command]"),
        );

        self.register(
            Command::new("quit")
                .with_description("Unload every module and exit")
                .with_aliases(vec!["exit".to_string()]),
        );

        self.register(
            Command::new("version")
                .with_description("Show host and module API version")
                .with_handler(|_| {
                    async move {
                        Ok(format!(
                            "sans-bot v{} (module API {})",
                            env!("CARGO_PKG_VERSION"),
                            api_version()
                        ))
                    }
                    .boxed()
                }),
        );

        let l = loader.clone();
        self.register(
            Command::new("load")
                .with_description("Load a module and its dependencies")
                .with_usage("load <key>")
                .with_handler(move |args| {
                    let loader = l.clone();
                    async move {
                        let key = required(&args, 0, "load <key>")?;
                        if loader.dispatcher().provides(SYSTEM_MODULE, "LoadModule") {
                            loader
                                .dispatcher()
                                .call(SYSTEM_MODULE, "LoadModule", vec![Value::from(key.clone())])
                                .await?;
                        } else {
                            loader.load_module(&key).await?;
                        }
                        Ok(format!("Loaded {}", key))
                    }
                    .boxed()
                }),
        );

        let l = loader.clone();
        self.register(
            Command::new("unload")
                .with_description("Unload a module and everything that depends on it")
                .with_usage("unload <key>")
                .with_handler(move |args| {
                    let loader = l.clone();
                    async move {
                        let key = required(&args, 0, "unload <key>")?;
                        if key == SYSTEM_MODULE {
                            return Err(CommandError::InvalidArgs(format!(
                                "{} cannot be unloaded",
                                SYSTEM_MODULE
                            )));
                        }
                        let unloaded: Vec<String> =
                            if loader.dispatcher().provides(SYSTEM_MODULE, "UnloadModule") {
                                let value = loader
                                    .dispatcher()
                                    .call(SYSTEM_MODULE, "UnloadModule", vec![Value::from(key.clone())])
                                    .await?;
                                serde_json::from_value(value)
                                    .map_err(|e| CommandError::ExecutionFailed(e.to_string()))?
                            } else {
                                loader.unload_module(&key).await?
                            };

                        if unloaded.is_empty() {
                            return Ok(format!("{} is not loaded", key));
                        }
                        Ok(format!("Unloaded {}", unloaded.join(", ")))
                    }
                    .boxed()
                }),
        );

        let l = loader.clone();
        self.register(
            Command::new("reload")
                .with_description("Reload a module and everything that depends on it")
                .with_usage("reload <key>")
                .with_handler(move |args| {
                    let loader = l.clone();
                    async move {
                        let key = required(&args, 0, "reload <key>")?;
                        if key == SYSTEM_MODULE {
                            return Err(CommandError::InvalidArgs(format!(
                                "{} cannot be reloaded",
                                SYSTEM_MODULE
                            )));
                        }
                        let reloaded = loader.reload_module(&key).await?;
                        Ok(format!("Reloaded {}", reloaded.join(", ")))
                    }
                    .boxed()
                }),
        );

        let l = loader.clone();
        self.register(
            Command::new("modules")
                .with_description("List known modules and their status")
                .with_aliases(vec!["ls".to_string()])
                .with_handler(move |_| {
                    let loader = l.clone();
                    async move { Ok(render_modules(&loader)) }.boxed()
                }),
        );

        let l = loader;
        self.register(
            Command::new("call")
                .with_description("Call a function exported by a loaded module")
                .with_usage("call <key> <function> [json args]")
                .with_handler(move |args| {
                    let loader = l.clone();
                    async move {
                        let usage = "call <key> <function> [json args]";
                        let key = required(&args, 0, usage)?;
                        let function = required(&args, 1, usage)?;
                        let call_args = parse_call_args(&args[2..].join(" "))?;

                        let result = loader.dispatcher().call(&key, &function, call_args).await?;
                        serde_json::to_string_pretty(&result)
                            .map_err(|e| CommandError::ExecutionFailed(e.to_string()))
                    }
                    .boxed()
                }),
        );
    }

    /// Split a console line into command name and arguments. The prefix is
    /// optional on the console.
    pub fn parse(&self, line: &str) -> Option<(String, Vec<String>)> {
        let line = line.trim();
        let line = line.strip_prefix(self.prefix.as_str()).unwrap_or(line);
        let mut parts = line.split_whitespace();
        let name = parts.next()?.to_string();
        Some((name, parts.map(str::to_string).collect()))
    }

    /// Whether the line asks the console to exit
    pub fn is_quit(&self, line: &str) -> bool {
        self.parse(line)
            .and_then(|(name, _)| self.registry.find(&name).map(|cmd| cmd.name == "quit"))
            .unwrap_or(false)
    }

    pub async fn handle(&self, line: &str) -> Result<Option<String>, CommandError> {
        let Some((name, args)) = self.parse(line) else {
            return Ok(None);
        };

        let cmd = self
            .registry
            .find(&name)
            .ok_or_else(|| CommandError::NotFound(name.clone()))?;

        if cmd.name == "help" {
            return Ok(Some(self.get_help(args.first().map(String::as_str))));
        }

        match &cmd.handler {
            Some(handler) => Ok(Some(handler(args).await?)),
            None => Ok(None),
        }
    }

    pub fn get_help(&self, command: Option<&str>) -> String {
        if let Some(name) = command {
            if let Some(cmd) = self.registry.find(name) {
                let mut help = format!(
                    "{}{} - {}",
                    self.prefix,
                    cmd.name,
                    cmd.description.as_deref().unwrap_or("No description")
                );
                if let Some(usage) = &cmd.usage {
                    help.push_str(&format!("\nUsage: {}{}", self.prefix, usage));
                }
                return help;
            }
            return format!("Command {}{} not found", self.prefix, name);
        }

        let mut help = "Available commands:\n".to_string();
        for cmd in self.registry.all() {
            help.push_str(&format!(
                "  {}{} - {}\n",
                self.prefix,
                cmd.name,
                cmd.description.as_deref().unwrap_or("")
            ));
        }
        help
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

fn required(args: &[String], index: usize, usage: &str) -> Result<String, CommandError> {
    args.get(index)
        .cloned()
        .ok_or_else(|| CommandError::InvalidArgs(format!("Usage: {}", usage)))
}

/// An array is spread into arguments; any other JSON value is one argument
fn parse_call_args(raw: &str) -> Result<Vec<Value>, CommandError> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| CommandError::InvalidArgs(format!("arguments must be JSON: {}", e)))?;
    Ok(match value {
        Value::Array(items) => items,
        other => vec![other],
    })
}

fn render_modules(loader: &ModuleLoader) -> String {
    let entries = loader.registry().entries();
    if entries.is_empty() {
        return "No modules".to_string();
    }

    let mut out = String::new();
    for (key, entry) in entries {
        match entry.instance() {
            Some(module) => out.push_str(&format!(
                "  {:<20} {:<9} {} v{}\n",
                key,
                entry.status().as_str(),
                module.name(),
                module.version()
            )),
            None => out.push_str(&format!("  {:<20} {}\n", key, entry.status().as_str())),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::config::{StoreConfig, StoreDriver};
    use crate::modules::{Module, ModuleCatalog, ModuleRegistry, SystemModule};
    use std::path::PathBuf;
    use std::sync::Arc;

    fn service() -> (CommandService, ModuleLoader) {
        let catalog = ModuleCatalog::new().with(SYSTEM_MODULE, || {
            let store = StoreConfig {
                driver: StoreDriver::Memory,
                path: PathBuf::new(),
                table: "config".to_string(),
            };
            Ok(Box::new(SystemModule::new(store, Vec::new())) as Box<dyn Module>)
        });
        let loader = ModuleLoader::new(Arc::new(ModuleRegistry::new()), Arc::new(catalog));
        let mut service = CommandService::new("!");
        service.register_defaults(loader.clone());
        (service, loader)
    }

    #[test]
    fn test_parse_with_and_without_prefix() {
        let (service, _) = service();
        assert_eq!(
            service.parse("!load Discord"),
            Some(("load".to_string(), vec!["Discord".to_string()]))
        );
        assert_eq!(service.parse("  modules "), Some(("modules".to_string(), vec![])));
        assert_eq!(service.parse("   "), None);
        assert!(service.is_quit("exit"));
        assert!(!service.is_quit("load quit"));
    }

    #[test]
    fn test_parse_call_args() {
        assert!(parse_call_args("").unwrap().is_empty());
        assert_eq!(parse_call_args(r#"["a", 1]"#).unwrap().len(), 2);
        assert_eq!(parse_call_args(r#"{"k": "v"}"#).unwrap().len(), 1);
        assert!(parse_call_args("not json").is_err());
    }

    #[tokio::test]
    async fn test_help_and_unknown_command() {
        let (service, _) = service();
        let help = service.handle("help").await.unwrap().unwrap();
        assert!(help.contains("!reload"));
        assert!(service.handle("help call").await.unwrap().unwrap().contains("Usage"));
        assert!(matches!(
            service.handle("frobnicate").await,
            Err(CommandError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_module_commands() {
        let (service, loader) = service();
        loader.load_module(SYSTEM_MODULE).await.unwrap();

        let listing = service.handle("modules").await.unwrap().unwrap();
        assert!(listing.contains("System Module"));
        assert!(listing.contains("loaded"));

        let version = service.handle("call System ApiVersion").await.unwrap().unwrap();
        assert!(version.contains("1.0.0-alpha"));

        assert!(matches!(
            service.handle("reload System").await,
            Err(CommandError::InvalidArgs(_))
        ));
        assert!(matches!(
            service.handle("unload").await,
            Err(CommandError::InvalidArgs(_))
        ));
        assert!(matches!(
            service.handle("load Ghost").await,
            Err(CommandError::Module(_))
        ));
        assert_eq!(
            service.handle("unload Ghost").await.unwrap().unwrap(),
            "Ghost is not loaded"
        );
    }
}
