//! Submission notifications over SMTP.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use secrecy::ExposeSecret;
use thiserror::Error;
use tracing::{debug, info, warn};
use utils::text::escape_html;

use super::{
    checklist_progress::{ChecklistInstanceView, ChecklistItemView},
    config::{MailConfig, SmtpSecurity},
};

#[derive(Debug, Error)]
pub enum MailError {
    #[error("invalid mail address: {0}")]
    Address(#[from] lettre::address::AddressError),
    #[error("failed to build message: {0}")]
    Message(#[from] lettre::error::Error),
    #[error("smtp error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
    #[error("delivery failed for {failed} of {total} recipients")]
    Delivery { failed: usize, total: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionEmail {
    pub subject: String,
    pub html: String,
}

struct Mailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    recipients: Vec<Mailbox>,
}

/// Sends checklist submission summaries. A disabled service accepts every
/// message and drops it.
#[derive(Clone)]
pub struct MailService {
    mailer: Option<Arc<Mailer>>,
}

impl std::fmt::Debug for MailService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailService")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

impl MailService {
    pub fn new(config: &MailConfig) -> Result<Self, MailError> {
        let Some(host) = config.smtp_host.as_deref().filter(|_| config.is_enabled()) else {
            info!("SMTP not configured; submission mail is disabled");
            return Ok(Self::disabled());
        };

        let builder = match config.security {
            SmtpSecurity::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(host)?,
            SmtpSecurity::Starttls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)?,
            SmtpSecurity::None => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host),
        };
        let mut builder = builder.port(config.smtp_port);
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(
                username.clone(),
                password.expose_secret().to_string(),
            ));
        }

        let from: Mailbox = config.from.parse()?;
        let recipients = config
            .recipients
            .iter()
            .map(|r| r.parse::<Mailbox>())
            .collect::<Result<Vec<_>, _>>()?;
        info!(
            host,
            port = config.smtp_port,
            security = %config.security,
            recipients = recipients.len(),
            "Submission mail enabled"
        );

        Ok(Self {
            mailer: Some(Arc::new(Mailer {
                transport: builder.build(),
                from,
                recipients,
            })),
        })
    }

    pub fn disabled() -> Self {
        Self { mailer: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.mailer.is_some()
    }

    /// Mail the summary of a submitted checklist to every configured recipient.
    pub async fn send_submission(
        &self,
        view: &ChecklistInstanceView,
        submitted_by: &str,
        submitted_at: DateTime<Utc>,
    ) -> Result<(), MailError> {
        let Some(mailer) = &self.mailer else {
            debug!(instance_id = %view.instance.id, "Mail disabled; skipping submission mail");
            return Ok(());
        };

        let email = render_submission_email(view, submitted_by, submitted_at);
        let total = mailer.recipients.len();
        let mut failed = 0;
        for recipient in &mailer.recipients {
            let message = Message::builder()
                .from(mailer.from.clone())
                .to(recipient.clone())
                .subject(email.subject.clone())
                .header(ContentType::TEXT_HTML)
                .body(email.html.clone())?;
            if let Err(e) = mailer.transport.send(message).await {
                warn!(recipient = %recipient, error = %e, "Failed to send submission mail");
                failed += 1;
            }
        }

        if failed > 0 {
            return Err(MailError::Delivery { failed, total });
        }
        info!(instance_id = %view.instance.id, recipients = total, "Submission mail sent");
        Ok(())
    }
}

pub fn render_submission_email(
    view: &ChecklistInstanceView,
    submitted_by: &str,
    submitted_at: DateTime<Utc>,
) -> SubmissionEmail {
    let template = &view.template;
    let subject = format!(
        "[{}] {} submitted ({})",
        template.workplace, template.name, view.instance.target_date
    );

    let (done, pending): (Vec<&ChecklistItemView>, Vec<&ChecklistItemView>) = view
        .items
        .iter()
        .partition(|i| i.completion.is_completed);

    let mut html = String::new();
    html.push_str(&format!(
        "<h2>{}</h2>\n<p>{} &middot; {} &middot; {}</p>\n",
        escape_html(&template.name),
        template.workplace,
        template.time_slot,
        view.instance.target_date
    ));
    html.push_str(&format!(
        "<p>Submitted by <strong>{}</strong> at {}. {} of {} items completed.</p>\n",
        escape_html(submitted_by),
        format_time(submitted_at),
        view.completed_items,
        view.total_items
    ));

    html.push_str("<h3>Completed</h3>\n");
    push_item_list(&mut html, &done);
    if !pending.is_empty() {
        html.push_str("<h3>Not completed</h3>\n");
        push_item_list(&mut html, &pending);
    }

    SubmissionEmail { subject, html }
}

fn push_item_list(html: &mut String, items: &[&ChecklistItemView]) {
    if items.is_empty() {
        html.push_str("<p>None</p>\n");
        return;
    }
    html.push_str("<ul>\n");
    for item in items {
        html.push_str("<li>");
        html.push_str(&escape_html(&item.item.content));
        if !item.item.is_required {
            html.push_str(" <em>(optional)</em>");
        }
        push_attribution(
            html,
            item.completion.completed_by.as_deref(),
            item.completion.completed_at,
        );
        if let Some(notes) = item.notes.as_deref().filter(|n| !n.trim().is_empty()) {
            html.push_str(&format!("<br><small>{}</small>", escape_html(notes)));
        }
        if !item.connected_items.is_empty() {
            html.push_str("\n<ul>\n");
            for connected in &item.connected_items {
                let title = connected
                    .connected
                    .target_title
                    .as_deref()
                    .unwrap_or("(removed)");
                html.push_str(&format!(
                    "<li>{} {}: {}",
                    if connected.is_completed { "&#10003;" } else { "&#10007;" },
                    connected.connected.item_type,
                    escape_html(title)
                ));
                push_attribution(html, connected.completed_by.as_deref(), connected.completed_at);
                html.push_str("</li>\n");
            }
            html.push_str("</ul>\n");
        }
        html.push_str("</li>\n");
    }
    html.push_str("</ul>\n");
}

fn push_attribution(html: &mut String, by: Option<&str>, at: Option<DateTime<Utc>>) {
    match (by, at) {
        (Some(by), Some(at)) => {
            html.push_str(&format!(" &mdash; {} at {}", escape_html(by), format_time(at)))
        }
        (Some(by), None) => html.push_str(&format!(" &mdash; {}", escape_html(by))),
        _ => {}
    }
}

fn format_time(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M UTC").to_string()
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone};
    use db::models::{
        checklist_instance::ChecklistInstance,
        checklist_item::{ChecklistItem, ConnectedItem, ConnectedItemType},
        checklist_template::ChecklistTemplate,
        shift::{TimeSlot, Workplace},
    };
    use uuid::Uuid;

    use super::*;
    use crate::services::checklist_progress::{ConnectedItemView, ItemCompletion};

    fn item_view(content: &str, done: bool, connected_items: Vec<ConnectedItemView>) -> ChecklistItemView {
        ChecklistItemView {
            item: ChecklistItem {
                id: Uuid::new_v4(),
                template_id: Uuid::nil(),
                content: content.to_string(),
                instructions: None,
                position: 0,
                is_required: true,
                is_active: true,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
            notes: None,
            completion: ItemCompletion {
                is_completed: done,
                completed_by: done.then(|| "Aiko".to_string()),
                completed_at: done.then(Utc::now),
                connected_done: 0,
                connected_total: connected_items.len(),
            },
            connected_items,
        }
    }

    fn view(items: Vec<ChecklistItemView>) -> ChecklistInstanceView {
        let template = ChecklistTemplate {
            id: Uuid::new_v4(),
            name: "Bar <closing>".to_string(),
            description: None,
            workplace: Workplace::Hall,
            time_slot: TimeSlot::Closing,
            category: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let completed_items = items.iter().filter(|i| i.completion.is_completed).count();
        ChecklistInstanceView {
            instance: ChecklistInstance {
                id: Uuid::new_v4(),
                template_id: template.id,
                target_date: NaiveDate::from_ymd_opt(2025, 3, 14).unwrap(),
                is_completed: false,
                completed_at: None,
                is_submitted: true,
                submitted_at: None,
                submitted_by: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
            template,
            total_items: items.len(),
            completed_items,
            required_remaining: 0,
            items,
        }
    }

    #[test]
    fn subject_names_workplace_template_and_date() {
        let email = render_submission_email(&view(vec![]), "Aiko", Utc::now());
        assert_eq!(email.subject, "[hall] Bar <closing> submitted (2025-03-14)");
    }

    #[test]
    fn body_escapes_user_text_and_splits_pending() {
        let connected = ConnectedItemView {
            connected: ConnectedItem {
                id: Uuid::new_v4(),
                checklist_item_id: Uuid::nil(),
                item_type: ConnectedItemType::Inventory,
                item_id: Uuid::new_v4(),
                position: 0,
                target_title: Some("Lime & soda".to_string()),
            },
            is_completed: true,
            completed_by: Some("Ben".to_string()),
            completed_at: Some(Utc.with_ymd_and_hms(2025, 3, 14, 22, 5, 0).unwrap()),
        };
        let items = vec![
            item_view("Restock <script>", true, vec![connected]),
            item_view("Lock the cellar", false, vec![]),
        ];
        let email = render_submission_email(
            &view(items),
            "Aiko <admin>",
            Utc.with_ymd_and_hms(2025, 3, 14, 23, 0, 0).unwrap(),
        );

        assert!(email.html.contains("Bar &lt;closing&gt;"));
        assert!(email.html.contains("Restock &lt;script&gt;"));
        assert!(email.html.contains("Aiko &lt;admin&gt;"));
        assert!(email.html.contains("inventory: Lime &amp; soda &mdash; Ben at 2025-03-14 22:05 UTC"));
        assert!(email.html.contains("1 of 2 items completed"));
        let pending_at = email.html.find("Not completed").unwrap();
        assert!(email.html.find("Lock the cellar").unwrap() > pending_at);
        assert!(!email.html.contains("<script>"));
    }

    #[test]
    fn unconfigured_service_is_disabled() {
        let service = MailService::new(&MailConfig::disabled()).unwrap();
        assert!(!service.is_enabled());
    }

    #[test]
    fn bad_recipient_is_reported() {
        let mut config = MailConfig::disabled();
        config.smtp_host = Some("localhost".to_string());
        config.security = SmtpSecurity::None;
        config.recipients = vec!["not an address".to_string()];
        assert!(matches!(MailService::new(&config), Err(MailError::Address(_))));
    }

    #[tokio::test]
    async fn disabled_service_skips_sending() {
        let service = MailService::disabled();
        service
            .send_submission(&view(vec![]), "Aiko", Utc::now())
            .await
            .unwrap();
    }
}
