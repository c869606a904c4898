//! Bootstrapping through the System module

mod common;

use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;

use common::{Journal, TestSpec, TestModule};
use sans_bot::infrastructure::config::{StoreConfig, StoreDriver};
use sans_bot::modules::{Module, ModuleCatalog, ModuleLoader, ModuleRegistry, SystemModule, SYSTEM_MODULE};

fn temp_store() -> StoreConfig {
    StoreConfig {
        driver: StoreDriver::File,
        path: std::env::temp_dir().join(format!("sans-system-{}.yaml", uuid::Uuid::new_v4())),
        table: "config".to_string(),
    }
}

fn host(store: StoreConfig, autoload: &[&str], journal: &Journal) -> ModuleLoader {
    let autoload: Vec<String> = autoload.iter().map(|s| s.to_string()).collect();
    let mut catalog = ModuleCatalog::new().with(SYSTEM_MODULE, move || {
        Ok(Box::new(SystemModule::new(store.clone(), autoload.clone())) as Box<dyn Module>)
    });
    for spec in [
        TestSpec::new("Discord"),
        TestSpec::new("Members").depends_on("Discord", 1, 0, 0),
    ] {
        let journal = journal.clone();
        let key = spec.key.clone();
        catalog.register(key, move || {
            Ok(Box::new(TestModule::new(spec.clone(), journal.clone())) as Box<dyn Module>)
        });
    }
    ModuleLoader::new(Arc::new(ModuleRegistry::new()), Arc::new(catalog))
}

#[tokio::test]
async fn test_bootstrap_starts_configured_modules() {
    let journal = Journal::default();
    let loader = host(temp_store(), &["Members", "Ghost"], &journal);

    loader.load_module(SYSTEM_MODULE).await.unwrap();
    let report = loader
        .dispatcher()
        .call(SYSTEM_MODULE, "StartModules", vec![])
        .await
        .unwrap();

    assert_eq!(report["loaded"], json!(["Members"]));
    assert_eq!(report["failed"][0]["key"], json!("Ghost"));
    assert_eq!(journal.events(), vec!["load:Discord", "load:Members"]);

    let modules = loader
        .dispatcher()
        .call(SYSTEM_MODULE, "ListModules", vec![])
        .await
        .unwrap();
    let statuses: Vec<(String, String)> = modules
        .as_array()
        .unwrap()
        .iter()
        .map(|m| {
            (
                m["key"].as_str().unwrap().to_string(),
                m["status"].as_str().unwrap().to_string(),
            )
        })
        .collect();
    assert!(statuses.contains(&("Ghost".to_string(), "failure".to_string())));
    assert!(statuses.contains(&("Discord".to_string(), "loaded".to_string())));
}

#[tokio::test]
async fn test_startup_list_persists_across_hosts() {
    let store = temp_store();
    let path: PathBuf = store.path.clone();

    let journal = Journal::default();
    let first = host(store.clone(), &[], &journal);
    first.load_module(SYSTEM_MODULE).await.unwrap();
    first
        .dispatcher()
        .call(SYSTEM_MODULE, "LoadModule", vec![json!("Discord")])
        .await
        .unwrap();
    first.unload_all().await;

    let journal = Journal::default();
    let second = host(store, &[], &journal);
    second.load_module(SYSTEM_MODULE).await.unwrap();
    let value = second
        .dispatcher()
        .call(SYSTEM_MODULE, "GetValue", vec![json!("System.Modules")])
        .await
        .unwrap();
    assert_eq!(value, json!("Discord"));

    second
        .dispatcher()
        .call(SYSTEM_MODULE, "StartModules", vec![])
        .await
        .unwrap();
    assert!(second.registry().is_loaded("Discord"));

    let unloaded = second
        .dispatcher()
        .call(SYSTEM_MODULE, "UnloadModule", vec![json!("Discord")])
        .await
        .unwrap();
    assert_eq!(unloaded, json!(["Discord"]));
    let value = second
        .dispatcher()
        .call(SYSTEM_MODULE, "GetValue", vec![json!("System.Modules")])
        .await
        .unwrap();
    assert_eq!(value, json!(""));

    second.unload_all().await;
    let _ = std::fs::remove_file(path);
}

#[tokio::test]
async fn test_reload_through_system() {
    let journal = Journal::default();
    let loader = host(temp_store(), &["Members"], &journal);
    loader.load_module(SYSTEM_MODULE).await.unwrap();
    let dispatcher = loader.dispatcher();
    dispatcher.call(SYSTEM_MODULE, "StartModules", vec![]).await.unwrap();
    journal.clear();

    let reloaded = dispatcher
        .call(SYSTEM_MODULE, "ReloadModule", vec![json!("Discord")])
        .await
        .unwrap();

    assert_eq!(reloaded, json!(["Discord", "Members"]));
    assert_eq!(
        journal.events(),
        vec!["unload:Members", "unload:Discord", "load:Discord", "load:Members"]
    );

    let uptime = dispatcher.call(SYSTEM_MODULE, "Uptime", vec![]).await.unwrap();
    assert!(uptime["seconds"].as_u64().is_some());
}
