use async_trait::async_trait;
use db::DBService;
use services::services::{config::AppConfig, mail::MailService, session::SessionSigner};

/// Everything a request handler needs from the running process.
#[async_trait]
pub trait Deployment: Clone + Send + Sync + 'static {
    fn config(&self) -> &AppConfig;

    fn db(&self) -> &DBService;

    fn mail(&self) -> &MailService;

    fn sessions(&self) -> &SessionSigner;

    /// Checks the deployment can still serve requests.
    async fn ping(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.db().pool).await?;
        Ok(())
    }
}
