use lettre::message::{header::ContentType, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use recall_core::EmailMessage;
use recall_logging::recall_info;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SendError {
    #[error("invalid address '{address}': {reason}")]
    Address { address: String, reason: String },
    #[error("message has no recipients")]
    NoRecipients,
    #[error("failed to build message: {0}")]
    Build(String),
    #[error("smtp: {0}")]
    Transport(String),
}

/// Delivers a rendered message and reports its message id.
#[async_trait::async_trait]
pub trait MailTransport: Send + Sync {
    async fn send_message(&self, message: &EmailMessage) -> Result<String, SendError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    /// Usually injected from the environment rather than written to config.
    pub password: String,
    pub from: String,
}

impl Default for SmtpSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 587,
            username: String::new(),
            password: String::new(),
            from: "alerts@localhost".to_string(),
        }
    }
}

/// STARTTLS SMTP relay; each message goes out as text + HTML alternatives.
pub struct SmtpMailer {
    settings: SmtpSettings,
    from: Mailbox,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    pub fn new(settings: SmtpSettings) -> Result<Self, SendError> {
        let from = parse_mailbox(&settings.from)?;
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)
            .map_err(|err| SendError::Transport(err.to_string()))?
            .port(settings.port);
        if !settings.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                settings.username.clone(),
                settings.password.clone(),
            ));
        }
        Ok(Self {
            settings,
            from,
            transport: builder.build(),
        })
    }

    fn build(&self, message: &EmailMessage, message_id: &str) -> Result<Message, SendError> {
        if message.recipients.is_empty() {
            return Err(SendError::NoRecipients);
        }
        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(message.subject.clone())
            .message_id(Some(message_id.to_string()));
        for recipient in &message.recipients {
            builder = builder.to(parse_mailbox(recipient)?);
        }
        builder
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(message.text.clone()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(message.html.clone()),
                    ),
            )
            .map_err(|err| SendError::Build(err.to_string()))
    }
}

#[async_trait::async_trait]
impl MailTransport for SmtpMailer {
    async fn send_message(&self, message: &EmailMessage) -> Result<String, SendError> {
        let message_id = new_message_id(&self.from);
        let email = self.build(message, &message_id)?;
        self.transport
            .send(email)
            .await
            .map_err(|err| SendError::Transport(err.to_string()))?;
        recall_info!(
            "Sent '{}' to {} via {}:{}",
            message.subject,
            message.recipients.join(", "),
            self.settings.host,
            self.settings.port
        );
        Ok(message_id)
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, SendError> {
    address.parse().map_err(|err: lettre::address::AddressError| SendError::Address {
        address: address.to_string(),
        reason: err.to_string(),
    })
}

fn new_message_id(from: &Mailbox) -> String {
    format!("<{}@{}>", uuid::Uuid::new_v4(), from.email.domain())
}
