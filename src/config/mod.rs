use serde::Deserialize;

use crate::models::store::Store;

/// Which persistence backend the server runs against.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PersistenceMode {
    Postgres,
    Memory,
}

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:8080").
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// PostgreSQL connection string. Required in postgres mode.
    pub database_url: Option<String>,

    #[serde(default = "default_persistence")]
    pub persistence: PersistenceMode,

    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    /// Upper bound on visits processed at the same time across all jobs.
    #[serde(default = "default_max_concurrent_visits")]
    pub max_concurrent_visits: usize,

    /// Simulated per-image processing latency in milliseconds.
    #[serde(default)]
    pub analyzer_delay_ms: u64,

    /// Stores upserted at startup in either persistence mode, as `id:name:area,id:name:area`.
    pub seed_stores: Option<String>,
}

fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_persistence() -> PersistenceMode {
    PersistenceMode::Postgres
}

fn default_db_max_connections() -> u32 {
    20
}

fn default_max_concurrent_visits() -> usize {
    32
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    /// Parse `seed_stores`. Malformed entries are skipped with a warning.
    pub fn seed_stores(&self) -> Vec<Store> {
        let Some(raw) = self.seed_stores.as_deref() else {
            return Vec::new();
        };

        raw.split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .filter_map(|entry| {
                let mut parts = entry.splitn(3, ':');
                match (parts.next(), parts.next(), parts.next()) {
                    (Some(id), Some(name), Some(area)) if !id.is_empty() => Some(Store {
                        store_id: id.to_string(),
                        store_name: name.to_string(),
                        area_code: area.to_string(),
                    }),
                    _ => {
                        tracing::warn!(entry, "Ignoring malformed SEED_STORES entry");
                        None
                    }
                }
            })
            .collect()
    }
}
