//! One CLI invocation: load config and state, boot the engine, save on the way out.

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;
use vox_core::{Coordinates, PlaceCategory};
use vox_engine::memory::{InMemory, MemoryStore, SystemClock};
use vox_engine::ports::{Clock, ResolvedPlace};
use vox_engine::{Engine, EngineError};

use crate::config::{Config, load_config};
use crate::state::{read_snapshot, state_path, write_snapshot};

pub struct Session {
    pub config: Config,
    pub mem: InMemory,
    pub engine: Engine,
    state: PathBuf,
}

impl Session {
    /// `now` pins the clock; without it the profile timezone's wall clock is used.
    pub async fn open(now: Option<NaiveDateTime>) -> Result<Self> {
        let config = load_config()?;
        let tz = config.timezone()?;
        let state = state_path()?;
        let snapshot = read_snapshot(&state)?;

        let system: Arc<dyn Clock> = Arc::new(SystemClock(tz));
        let mem = InMemory::with_store(MemoryStore::from_snapshot(snapshot), now.unwrap_or_else(|| system.now()));
        mem.location.set(config.location.current).await;
        mem.permissions
            .set(config.location.permission, config.location.background_permission);
        for place in &config.places {
            mem.saved_places
                .insert(&place.name, Coordinates::new(place.latitude, place.longitude))
                .await;
        }
        let mut nearby: HashMap<PlaceCategory, Vec<ResolvedPlace>> = HashMap::new();
        for (i, place) in config.nearby.iter().enumerate() {
            nearby.entry(place.category).or_default().push(ResolvedPlace {
                id: format!("nearby-{i}"),
                name: place.name.clone(),
                coordinates: Coordinates::new(place.latitude, place.longitude),
            });
        }
        for (category, places) in nearby {
            mem.places.insert(category, places).await;
        }

        let ports = match now {
            Some(_) => mem.ports(),
            None => mem.ports_with_clock(system),
        };
        let engine = Engine::new(ports, config.engine.clone()).context("build engine")?;
        engine.start().await.map_err(user_error)?;

        Ok(Self {
            config,
            mem,
            engine,
            state,
        })
    }

    pub fn now(&self) -> NaiveDateTime {
        self.engine.router().now()
    }

    pub async fn save(&self) -> Result<()> {
        write_snapshot(&self.state, &self.mem.store.snapshot().await)
    }
}

/// Engine errors reach the terminal as the sentence a user would hear.
pub fn user_error(e: EngineError) -> anyhow::Error {
    debug!(error = ?e, "command failed");
    anyhow::anyhow!(e.user_message())
}
