//! Application state: AI client, response cache, rate limiter, export store.
//!
//! This module owns:
//!   - the service configuration (from TOML or defaults)
//!   - the optional AI client (None => fallback-only mode)
//!   - the process-wide rate limiter and response cache, as explicit instances
//!   - exported files kept for download/share links
//!
//! Nothing here is a global: handlers and tests receive the state they use.

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument};

use crate::cache::ResponseCache;
use crate::config::{load_app_config_from_env, AppConfig};
use crate::openai::{ClientSettings, OpenAI};
use crate::ratelimit::RateLimiter;
use crate::retry::RetryPolicy;

/// One exported artifact, addressable by id.
#[derive(Clone, Debug)]
pub struct ExportedFile {
    pub file_name: String,
    pub mime: &'static str,
    pub bytes: Arc<Vec<u8>>,
    pub created_at: Instant,
}

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub openai: Option<OpenAI>,
    pub cache: Arc<Mutex<ResponseCache>>,
    pub limiter: Arc<Mutex<RateLimiter>>,
    pub retry: RetryPolicy,
    pub exports: Arc<RwLock<HashMap<String, ExportedFile>>>,
}

impl AppState {
    /// Build state from env: load config, init limiter/cache, init AI client.
    #[instrument(level = "info", skip_all)]
    pub fn new() -> Self {
        let config = load_app_config_from_env().unwrap_or_default();
        let limiter = Arc::new(Mutex::new(limiter_from(&config)));
        let openai = OpenAI::from_env(&config, limiter.clone());
        if let Some(oa) = &openai {
            info!(target: "studysheet_backend", base_url = %oa.settings.base_url, model = %oa.settings.model, "AI generation enabled.");
        } else {
            info!(target: "studysheet_backend", "AI generation disabled (no OPENROUTER_API_KEY). Using fallback templates.");
        }
        Self::assemble(config, openai, limiter)
    }

    /// Build state around explicit client settings (or none for fallback-only mode).
    pub fn with_settings(config: AppConfig, settings: Option<ClientSettings>) -> Self {
        let limiter = Arc::new(Mutex::new(limiter_from(&config)));
        let openai = settings.and_then(|s| OpenAI::new(s, config.prompts.clone(), limiter.clone()).ok());
        Self::assemble(config, openai, limiter)
    }

    fn assemble(config: AppConfig, openai: Option<OpenAI>, limiter: Arc<Mutex<RateLimiter>>) -> Self {
        let limits = &config.limits;
        let cache = ResponseCache::new(limits.cache_ttl(), limits.cache_max_entries);
        let retry = RetryPolicy {
            max_attempts: limits.retry_attempts,
            base_delay: limits.retry_base_delay(),
            // Slightly above the transport timeout so the transport reports first.
            attempt_timeout: Some(limits.request_timeout() + Duration::from_secs(5)),
        };
        info!(
            target: "studysheet_backend",
            requests_per_window = limits.requests_per_window,
            window_secs = limits.window_secs,
            cache_ttl_secs = limits.cache_ttl_secs,
            retry_attempts = limits.retry_attempts,
            "Service limits"
        );
        Self {
            config,
            openai,
            cache: Arc::new(Mutex::new(cache)),
            limiter,
            retry,
            exports: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn ai_configured(&self) -> bool {
        self.openai.is_some()
    }

    /// Keep an exported file and return its id. Past `max_exports` the oldest file is dropped.
    #[instrument(level = "debug", skip(self, bytes), fields(%file_name, size = bytes.len()))]
    pub async fn store_export(&self, file_name: String, mime: &'static str, bytes: Vec<u8>) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        let file = ExportedFile { file_name, mime, bytes: Arc::new(bytes), created_at: Instant::now() };
        let mut exports = self.exports.write().await;
        exports.insert(id.clone(), file);
        let cap = self.config.limits.max_exports.max(1);
        while exports.len() > cap {
            let oldest = exports
                .iter()
                .min_by_key(|(_, f)| f.created_at)
                .map(|(k, _)| k.clone());
            match oldest {
                Some(k) => {
                    exports.remove(&k);
                    debug!(target: "studysheet_backend", evicted = %k, "Export store full; dropped oldest file");
                }
                None => break,
            }
        }
        id
    }

    /// Drop exports older than `export_ttl_secs` as of `now`; returns how many were removed.
    pub async fn purge_expired_exports_at(&self, now: Instant) -> usize {
        let ttl = self.config.limits.export_ttl();
        let mut exports = self.exports.write().await;
        let before = exports.len();
        exports.retain(|_, f| now.saturating_duration_since(f.created_at) < ttl);
        before - exports.len()
    }

    /// Read-only access to an exported file by id.
    #[instrument(level = "debug", skip(self), fields(%id))]
    pub async fn get_export(&self, id: &str) -> Option<ExportedFile> {
        self.exports.read().await.get(id).cloned()
    }

    /// Periodically drop expired cache entries and stale exports for the life of the process.
    pub fn spawn_cache_sweeper(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        let every = Duration::from_secs(self.config.limits.cache_sweep_secs.max(1));
        let state = self;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = state.cache.lock().await.purge_expired();
                if removed > 0 {
                    debug!(target: "studysheet_backend", removed, "Purged expired cache entries");
                }
                let removed = state.purge_expired_exports_at(Instant::now()).await;
                if removed > 0 {
                    debug!(target: "studysheet_backend", removed, "Purged expired exports");
                }
            }
        })
    }
}

fn limiter_from(config: &AppConfig) -> RateLimiter {
    RateLimiter::new(config.limits.requests_per_window, config.limits.window())
}
