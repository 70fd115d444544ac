use chrono::Local;
use minijinja::Environment;
use std::sync::Arc;
use tokio::sync::{OnceCell, OwnedSemaphorePermit, Semaphore};

use crate::classify::RuleSet;
use crate::config::Config;
use crate::directory::LocationDirectory;
use crate::error::{AppError, AppResult};
use crate::hires::HiresClient;
use crate::render;
use crate::services::cache::CachingApi;
use crate::viewer::Viewer;

/// Backend client shared by every request.
pub type Api = Arc<CachingApi<HiresClient>>;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub api: Api,
    pub rules: Arc<RuleSet>,
    pub templates: Arc<Environment<'static>>,
    /// Bounds concurrent requests that reach the backend
    pub upstream_permits: Arc<Semaphore>,
    /// Set by the first successful load, then fixed for the process
    directory: Arc<OnceCell<Arc<LocationDirectory>>>,
}

impl AppState {
    /// # Errors
    ///
    /// Returns `minijinja::Error` if the page template does not compile.
    pub fn new(
        config: Config,
        client: HiresClient,
        rules: RuleSet,
    ) -> Result<Self, minijinja::Error> {
        let api = Arc::new(CachingApi::new(client, &config));
        let upstream_permits = Arc::new(Semaphore::new(config.upstream_concurrent_limit.max(1)));

        Ok(Self {
            config: Arc::new(config),
            api,
            rules: Arc::new(rules),
            templates: Arc::new(render::templates()?),
            upstream_permits,
            directory: Arc::new(OnceCell::new()),
        })
    }

    /// The location directory. A failed load is not kept: the caller gets an
    /// empty directory and the next call tries the backend again.
    pub async fn directory(&self) -> Arc<LocationDirectory> {
        let shape = self.config.directory_shape;
        let loaded = self
            .directory
            .get_or_try_init(|| async {
                LocationDirectory::fetch(&self.api, shape).await.map(Arc::new)
            })
            .await;

        match loaded {
            Ok(directory) => directory.clone(),
            Err(e) => {
                tracing::error!(error = %e, "Failed to load location directory, will retry");
                Arc::new(LocationDirectory::empty(shape))
            }
        }
    }

    /// A page controller in the server's local time zone.
    pub async fn viewer(&self) -> Viewer<Api> {
        Viewer::new(
            self.api.clone(),
            Local,
            self.config.query_shape,
            self.directory().await,
        )
    }

    /// Wait for a free backend slot. Hold the permit for the whole request.
    pub async fn upstream_permit(&self) -> AppResult<OwnedSemaphorePermit> {
        self.upstream_permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| AppError::Internal("Upstream limiter closed".to_string()))
    }
}
