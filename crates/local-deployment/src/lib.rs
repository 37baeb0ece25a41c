use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use db::DBService;
use deployment::Deployment;
use services::services::{config::AppConfig, mail::MailService, session::SessionSigner};
use tracing::info;

#[derive(Clone)]
pub struct LocalDeployment {
    config: Arc<AppConfig>,
    db: DBService,
    mail: MailService,
    sessions: SessionSigner,
}

impl LocalDeployment {
    /// Build the deployment from environment variables (and `.env`).
    pub async fn new() -> anyhow::Result<Self> {
        let config = AppConfig::from_env().context("invalid configuration")?;
        let db = DBService::new(&config.database_url)
            .await
            .with_context(|| format!("failed to open database {}", config.database_url))?;
        let mail = MailService::new(&config.mail).context("invalid mail configuration")?;
        let sessions = SessionSigner::from_config(&config)?;
        info!(
            workplace_day_offset = config.utc_offset_hours,
            mail_enabled = mail.is_enabled(),
            "Deployment ready"
        );
        Ok(Self {
            config: Arc::new(config),
            db,
            mail,
            sessions,
        })
    }

    /// In-memory database and no outgoing mail.
    pub async fn for_tests(config: AppConfig) -> anyhow::Result<Self> {
        let db = DBService::new_in_memory().await?;
        let sessions = SessionSigner::from_config(&config)?;
        Ok(Self {
            config: Arc::new(config),
            db,
            mail: MailService::disabled(),
            sessions,
        })
    }
}

#[async_trait]
impl Deployment for LocalDeployment {
    fn config(&self) -> &AppConfig {
        &self.config
    }

    fn db(&self) -> &DBService {
        &self.db
    }

    fn mail(&self) -> &MailService {
        &self.mail
    }

    fn sessions(&self) -> &SessionSigner {
        &self.sessions
    }
}
