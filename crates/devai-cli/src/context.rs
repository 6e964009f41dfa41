//! Wiring of the collaborators behind every subcommand.

use anyhow::{Context as _, Result, anyhow};
use clap::Args;
use devai_application::{CredentialAuthenticator, SessionSynchronizer, SyncOptions};
use devai_core::answer::AnswerService;
use devai_core::auth::{AuthIdentity, AuthProvider};
use devai_core::config::AppConfig;
use devai_core::history::HistoryCache;
use devai_core::store::TableStore;
use devai_infrastructure::{
    ConfigService, DevaiPaths, InMemoryTableStore, JsonFileHistoryCache, PostgrestStore,
};
use devai_interaction::WebhookAnswerService;
use std::sync::Arc;

/// Login flags shared by the subcommands that talk to the session store.
#[derive(Args, Debug, Clone)]
pub struct Credentials {
    /// Username or email to sign in with
    #[arg(long, short = 'u', env = "DEVAI_USERNAME")]
    pub username: Option<String>,

    #[arg(long, short = 'p', env = "DEVAI_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

pub struct AppContext {
    pub config: AppConfig,
    store: Arc<dyn TableStore>,
    cache: Arc<dyn HistoryCache>,
}

impl AppContext {
    pub fn load(paths: DevaiPaths) -> Result<Self> {
        let config = ConfigService::new(paths.clone())
            .load()
            .context("Failed to load configuration")?;

        let store: Arc<dyn TableStore> = match config.store.url.as_deref() {
            Some(url) if config.store.is_remote() => {
                tracing::info!("[Startup] Using REST session store at {}", url);
                Arc::new(PostgrestStore::new(url, config.store.key.clone()))
            }
            _ => {
                tracing::info!("[Startup] No store URL configured, sessions live in memory");
                Arc::new(InMemoryTableStore::new())
            }
        };

        let cache_file = match &config.sync.cache_file {
            Some(path) => path.clone(),
            None => paths.history_file()?,
        };
        tracing::debug!("[Startup] Fallback cache at {}", cache_file.display());
        let cache = Arc::new(JsonFileHistoryCache::with_limit(
            cache_file,
            config.sync.history_limit,
        ));

        Ok(Self {
            config,
            store,
            cache,
        })
    }

    pub fn store(&self) -> Arc<dyn TableStore> {
        Arc::clone(&self.store)
    }

    pub fn synchronizer(&self) -> SessionSynchronizer {
        SessionSynchronizer::new(
            self.store(),
            Arc::clone(&self.cache),
            SyncOptions {
                debounce: self.config.sync.debounce(),
                default_title: self.config.chat.default_title.clone(),
            },
        )
    }

    pub fn answers(&self) -> Result<Arc<dyn AnswerService>> {
        let url = self
            .config
            .webhook
            .url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| {
                anyhow!("No webhook URL configured. Set DEVAI_WEBHOOK_URL or [webhook].url in config.toml")
            })?;
        Ok(Arc::new(
            WebhookAnswerService::new(url).with_timeout(self.config.webhook.timeout()),
        ))
    }

    /// Signs in when a username was given. Chatting without an identity is
    /// allowed; conversations then only reach the local cache.
    pub async fn login(&self, credentials: &Credentials) -> Result<Option<AuthIdentity>> {
        let Some(username) = credentials.username.as_deref() else {
            return Ok(None);
        };
        let password = credentials.password.as_deref().unwrap_or_default();
        let identity = CredentialAuthenticator::new(self.store())
            .authenticate(username, password)
            .await?;
        tracing::info!(user_id = %identity.user_id, "[Auth] Signed in");
        Ok(Some(identity))
    }

    pub async fn require_login(&self, credentials: &Credentials) -> Result<AuthIdentity> {
        self.login(credentials)
            .await?
            .ok_or_else(|| anyhow!("This command needs --username and --password"))
    }
}
