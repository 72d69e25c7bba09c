//! # v2e-demo — End-to-End Wiring
//!
//! Not a CLI surface: a single smoke-test run exercising the Graph,
//! Analyze, Memory, and Learning Session FSMs over one shared embedded
//! store, in the order a real caller would drive them.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use v2e_core::{SecurityItem, SecurityItemKind, Urn};
use v2e_memory::MemoryObject;
use v2e_session::SessionFsm;
use v2e_store::{Store, V2eConfig};
use v2e_transition::MemoryState;

struct DemoMemoryObject {
    urn: Urn,
    state: parking_lot::Mutex<MemoryState>,
}

impl MemoryObject for DemoMemoryObject {
    fn get_urn(&self) -> &Urn {
        &self.urn
    }

    fn get_memory_fsm_state(&self) -> MemoryState {
        *self.state.lock()
    }

    fn set_memory_fsm_state(&self, target: MemoryState) -> Result<(), String> {
        *self.state.lock() = target;
        Ok(())
    }
}

fn sample_catalog() -> Vec<SecurityItem> {
    vec![
        SecurityItem {
            urn: Urn::new("cve", "2024-0001").unwrap(),
            kind: SecurityItemKind::Cve,
            id: "CVE-2024-0001".to_string(),
            title: "Example buffer overflow".to_string(),
            source: "nvd".to_string(),
        },
        SecurityItem {
            urn: Urn::new("cwe", "CWE-120").unwrap(),
            kind: SecurityItemKind::Cwe,
            id: "CWE-120".to_string(),
            title: "Buffer copy without checking size of input".to_string(),
            source: "mitre".to_string(),
        },
    ]
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let data_dir = std::env::temp_dir().join("v2e-demo-store");
    let config = V2eConfig::new(&data_dir);
    let store = Arc::new(Store::open_with_config(&config).await?);
    tracing::info!(path = %data_dir.display(), "store opened");

    let coordinator = v2e_analyze::AnalyzeCoordinator::with_config(&config);
    coordinator.start().expect("bootstrapping -> idle is always valid");
    tracing::info!(state = %coordinator.get_state(), "analyze coordinator started");

    let graph = coordinator.graph();
    graph.start_build()?;
    tracing::info!(state = %coordinator.get_state(), "graph build started, coordinator followed");
    graph.complete_build()?;
    graph.start_analysis()?;
    graph.complete_analysis()?;
    graph.start_persist()?;
    graph.complete_persist()?;
    tracing::info!(state = %graph.get_state(), "graph reached ready");

    let item_urn = Urn::new("cve", "2024-0001").unwrap();
    let memory_object = Arc::new(DemoMemoryObject {
        urn: item_urn.clone(),
        state: parking_lot::Mutex::new(MemoryState::New),
    });
    let memory_fsm = v2e_memory::MemoryFsm::new(memory_object, store.clone());
    memory_fsm.transition(MemoryState::Learning, "demo run", Some("demo-user"))?;
    tracing::info!(state = %memory_fsm.get_state_value(), "memory fsm advanced");

    let catalog = Arc::new(sample_catalog());
    let session = SessionFsm::new(catalog, store.clone());
    let first = session.load_item()?;
    tracing::info!(urn = %first.urn, "session loaded first item");

    let ctx = CancellationToken::new();
    session.mark_viewed(&first.urn, &ctx).await?;
    session.mark_learned(&first.urn, &ctx).await?;
    tracing::info!(state = ?session.get_context(), "session progressed");

    coordinator.stop()?;
    store.close();
    tracing::info!("demo run complete");
    Ok(())
}
