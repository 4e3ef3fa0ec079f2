//! Contact-form mail delivery.
//!
//! Two paths reach the site owner's inbox: the public contact form (no
//! login, all fields required, the sender gets a confirmation copy) and a
//! short-circuit for logged-in Discord users. Both are disabled when SMTP
//! credentials are absent.

use axum::{extract::State, Json};
use lettre::message::{header::ContentType, Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::Deserialize;
use tracing::info;

use crate::api::AppState;
use crate::auth::AuthedUser;
use crate::config::SmtpConfig;
use crate::error::ServerError;

// ---------------------------------------------------------------------------
// Mailer
// ---------------------------------------------------------------------------

/// Async SMTP transport plus the owner mailbox that receives notifications.
#[derive(Clone)]
pub struct Mailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    owner: Mailbox,
}

impl Mailer {
    /// Build the STARTTLS transport from config. Errors here disable the
    /// contact endpoints rather than the whole service.
    pub fn from_config(config: &SmtpConfig) -> Result<Self, ServerError> {
        let owner: Mailbox = config
            .user
            .parse()
            .map_err(|e| ServerError::Internal(format!("SMTP_USER is not a mail address: {e}")))?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| ServerError::Internal(format!("SMTP relay setup failed: {e}")))?
            .port(config.port)
            .credentials(Credentials::new(config.user.clone(), config.pass.clone()))
            .build();

        Ok(Self { transport, owner })
    }

    pub fn owner(&self) -> &Mailbox {
        &self.owner
    }

    pub async fn send(&self, message: Message) -> Result<(), ServerError> {
        self.transport
            .send(message)
            .await
            .map(|_| ())
            .map_err(|e| ServerError::Upstream(format!("mail delivery failed: {e}")))
    }
}

/// Minimal HTML escaping for user-supplied text interpolated into the
/// confirmation mail.
fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn build_error(e: lettre::error::Error) -> ServerError {
    ServerError::Internal(format!("building mail failed: {e}"))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ContactEmailRequest {
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
}

/// `POST /api/contact/email` -- public contact form. Sends the owner a
/// notification and the sender a confirmation.
pub async fn contact_email(
    State(state): State<AppState>,
    Json(request): Json<ContactEmailRequest>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let name = request.name.trim();
    let email = request.email.trim();
    let subject = request.subject.trim();
    let message = request.message.trim();

    if name.is_empty() || email.is_empty() || subject.is_empty() || message.is_empty() {
        return Err(ServerError::BadRequest(
            "All fields are required".to_string(),
        ));
    }

    let mailer = state
        .mailer
        .as_ref()
        .ok_or(ServerError::NotConfigured("SMTP"))?;

    let sender: Mailbox = email
        .parse()
        .map_err(|_| ServerError::BadRequest("Invalid email address".to_string()))?;

    // Notification to the owner, reply-to pointed at the sender.
    let notification = Message::builder()
        .from(mailer.owner().clone())
        .to(mailer.owner().clone())
        .reply_to(sender.clone())
        .subject(format!("MyHub Contact: {subject} (from {name})"))
        .header(ContentType::TEXT_PLAIN)
        .body(format!(
            "Name: {name}\nEmail: {email}\nSubject: {subject}\n\nMessage:\n{message}"
        ))
        .map_err(build_error)?;
    mailer.send(notification).await?;

    // Confirmation copy back to the sender.
    let plain = format!(
        "Hi {name},\n\nThank you for reaching out! I've received your message \
         regarding \"{subject}\" and will get back to you as soon as possible.\n\n\
         Your message:\n{message}\n\nBest regards,\nBlake"
    );
    let html = format!(
        "<h3>Hi {name},</h3>\
         <p>Thank you for reaching out! I've received your message regarding \
         <strong>\"{subject}\"</strong> and will get back to you as soon as possible.</p>\
         <blockquote>{body}</blockquote>\
         <p>Best regards,<br>Blake</p>",
        name = escape_html(name),
        subject = escape_html(subject),
        body = escape_html(message).replace('\n', "<br>"),
    );
    let confirmation = Message::builder()
        .from(mailer.owner().clone())
        .to(sender)
        .subject(format!("Re: {subject}"))
        .multipart(MultiPart::alternative_plain_html(plain, html))
        .map_err(build_error)?;
    mailer.send(confirmation).await?;

    info!(%email, "contact form delivered");
    Ok(Json(serde_json::json!({ "success": true })))
}

#[derive(Debug, Deserialize)]
pub struct ContactDiscordRequest {
    pub message: String,
}

/// `POST /api/contact/discord` -- logged-in users relay a note to the owner.
pub async fn contact_discord(
    State(state): State<AppState>,
    user: AuthedUser,
    Json(request): Json<ContactDiscordRequest>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let message = request.message.trim();
    if message.is_empty() {
        return Err(ServerError::BadRequest(
            "Message content is required".to_string(),
        ));
    }

    let mailer = state
        .mailer
        .as_ref()
        .ok_or(ServerError::NotConfigured("SMTP"))?;

    let mail = Message::builder()
        .from(mailer.owner().clone())
        .to(mailer.owner().clone())
        .subject(format!("MyHub Contact from {}", user.identity.username))
        .header(ContentType::TEXT_PLAIN)
        .body(format!(
            "Message from Discord user {} ({}):\n\n{message}",
            user.identity.username, user.identity.id
        ))
        .map_err(build_error)?;
    mailer.send(mail).await?;

    info!(user = %user.identity.id, "discord contact delivered");
    Ok(Json(serde_json::json!({ "success": true })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_html_neutralizes_markup() {
        assert_eq!(
            escape_html("<script>alert(\"x\") & more</script>"),
            "&lt;script&gt;alert(&quot;x&quot;) &amp; more&lt;/script&gt;"
        );
    }
}
