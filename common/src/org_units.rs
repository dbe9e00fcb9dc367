// Organisation-unit cache and its synchronization from upstream systems

use crate::dhis::Dhis2Client;
use crate::errors::IntegrationError;
use crate::models::Server;
use crate::store::ScheduleStore;
use crate::telemetry;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

const FACILITIES_PATH: &str = "/api/facilities";

/// Snapshot of the organisation-unit codes runs fan out over.
///
/// Readers take the current snapshot and keep it for the whole run; the
/// refresh job swaps in a new one.
#[derive(Debug, Clone, Default)]
pub struct OrgUnitCache {
    codes: Arc<RwLock<Arc<Vec<String>>>>,
}

impl OrgUnitCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_codes(codes: Vec<String>) -> Self {
        Self {
            codes: Arc::new(RwLock::new(Arc::new(normalize(codes)))),
        }
    }

    /// Current, possibly stale, codes. Never fails.
    pub async fn current_codes(&self) -> Arc<Vec<String>> {
        self.codes.read().await.clone()
    }

    /// Replace the snapshot, returning the new size
    pub async fn replace(&self, codes: Vec<String>) -> usize {
        let codes = Arc::new(normalize(codes));
        let size = codes.len();
        *self.codes.write().await = codes;
        telemetry::update_org_unit_cache_size(size);
        size
    }

    pub async fn len(&self) -> usize {
        self.codes.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.codes.read().await.is_empty()
    }
}

fn normalize(codes: Vec<String>) -> Vec<String> {
    codes
        .into_iter()
        .map(|code| code.trim().to_string())
        .filter(|code| !code.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Repopulates the organisation-unit cache
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrgUnitSync: Send + Sync {
    /// Refresh the cache, returning the number of cached units
    async fn refresh(&self) -> Result<usize, IntegrationError>;
}

#[derive(Debug, Deserialize)]
struct Facility {
    #[serde(default)]
    code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FacilityPage {
    content: Vec<Facility>,
}

/// Synchronizes the cache with the facilities known to the reference-data
/// service that also exist as organisation units on a reporting server
pub struct HttpOrgUnitSync {
    client: Client,
    reference_data_url: String,
    token: String,
    dhis: Dhis2Client,
    schedules: Arc<dyn ScheduleStore>,
    cache: OrgUnitCache,
}

impl HttpOrgUnitSync {
    pub fn new(
        reference_data_url: &str,
        token: &str,
        timeout_seconds: u64,
        dhis: Dhis2Client,
        schedules: Arc<dyn ScheduleStore>,
        cache: OrgUnitCache,
    ) -> Result<Self, IntegrationError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .map_err(|e| {
                IntegrationError::ConnectionFailed(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            reference_data_url: reference_data_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            dhis,
            schedules,
            cache,
        })
    }

    async fn facility_codes(&self) -> Result<BTreeSet<String>, IntegrationError> {
        let response = self
            .client
            .get(format!("{}{}", self.reference_data_url, FACILITIES_PATH))
            .bearer_auth(&self.token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(IntegrationError::ClientError {
                status: status.as_u16(),
                body,
            });
        }

        let page: FacilityPage = response.json().await?;
        Ok(page
            .content
            .into_iter()
            .filter_map(|facility| facility.code)
            .collect())
    }

    /// Distinct servers referenced by the persisted schedules
    async fn servers(&self) -> Result<Vec<Server>, IntegrationError> {
        let schedules = self
            .schedules
            .find_all()
            .await
            .map_err(|e| IntegrationError::ConnectionFailed(e.to_string()))?;
        let servers: HashMap<_, _> = schedules
            .into_iter()
            .map(|schedule| (schedule.server.id, schedule.server))
            .collect();
        Ok(servers.into_values().collect())
    }
}

#[async_trait]
impl OrgUnitSync for HttpOrgUnitSync {
    #[instrument(skip(self))]
    async fn refresh(&self) -> Result<usize, IntegrationError> {
        let facilities = self.facility_codes().await?;
        debug!(count = facilities.len(), "Fetched facility codes");

        let mut known = BTreeSet::new();
        for server in self.servers().await? {
            let codes = self
                .dhis
                .organisation_unit_codes(&server.url, &server.username, &server.password)
                .await?;
            known.extend(codes);
        }

        let codes: Vec<String> = facilities.intersection(&known).cloned().collect();
        if codes.is_empty() && !facilities.is_empty() {
            warn!("No facility matches an organisation unit on any reporting server");
        }

        let size = self.cache.replace(codes).await;
        info!(org_units = size, "Organisation unit cache refreshed");
        Ok(size)
    }
}
