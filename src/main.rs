use anyhow::Result;
use std::sync::Arc;
use storyloom::core::config::Config;
use storyloom::core::io::{NativeStorage, Storage};
use storyloom::services::generator::create_generator;
use storyloom::services::persistence::create_store;
use storyloom::services::setup::run_setup;
use storyloom::services::snapshot::SnapshotStore;
use storyloom::services::workflow::WorkflowManager;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    // 1. Load config; a missing config.yml falls back to the offline stub
    let mut config = match Config::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error loading config: {:#}", e);
            eprintln!("Please fix 'config.yml' or remove it to use the defaults.");
            return Err(e);
        }
    };
    config.apply_env();
    config.ensure_directories()?;

    // 2. Services
    let storage: Arc<dyn Storage> = Arc::new(NativeStorage::new());
    let generator = create_generator(&config.llm);
    let store = create_store(&config);
    let snapshots = SnapshotStore::new(storage.clone(), &config.snapshot_folder);

    // 3. Pick or resume a story
    let start = run_setup(&mut config, generator.as_ref(), &snapshots).await?;

    // 4. Read and branch
    let mut manager = WorkflowManager::new(config, generator, store, storage, snapshots, start)?;
    manager.run().await?;

    Ok(())
}
