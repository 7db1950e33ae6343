#![allow(dead_code)]

use std::sync::Arc;

use hoopfeed_common::Config;
use hoopfeed_counters::MemoryCounterStore;
use hoopfeed_engine::{EngagementEngine, EngineDeps};
use hoopfeed_entities::MemoryEntities;
use hoopfeed_events::MemoryActivityLog;

pub struct Harness {
    pub log: Arc<MemoryActivityLog>,
    pub counters: Arc<MemoryCounterStore>,
    pub entities: Arc<MemoryEntities>,
    pub engine: EngagementEngine,
}

pub fn harness() -> Harness {
    harness_with(Config::default())
}

pub fn harness_with(config: Config) -> Harness {
    let log = Arc::new(MemoryActivityLog::new());
    let counters = Arc::new(MemoryCounterStore::new());
    let entities = Arc::new(MemoryEntities::new(log.clone()));
    let engine = EngagementEngine::new(
        EngineDeps {
            log: log.clone(),
            counters: counters.clone(),
            entities: entities.clone(),
            writer: entities.clone(),
        },
        &config,
    );
    Harness {
        log,
        counters,
        entities,
        engine,
    }
}
