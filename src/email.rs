use anyhow::{Context, Result};
use lettre::message::{Mailbox, Message, header};
use lettre::transport::smtp::{AsyncSmtpTransport, authentication::Credentials};
use lettre::{AsyncTransport, Tokio1Executor};

use crate::deal::Deal;

const MAX_DIGEST_DEALS: usize = 10;

/// Sends the deals digest by SMTP instead of posting it. The recipient
/// list is comma-separated in RECIPIENT_EMAILS.
pub struct EmailSender {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    recipients: Vec<Mailbox>,
}

impl EmailSender {
    pub fn from_env() -> Result<Self> {
        let host = std::env::var("SMTP_HOST").context("SMTP_HOST must be set")?;
        let user = std::env::var("SMTP_USER").context("SMTP_USER must be set")?;
        let pass = std::env::var("SMTP_PASS").context("SMTP_PASS must be set")?;
        let from = std::env::var("SMTP_FROM").context("SMTP_FROM must be set")?;
        let recipients = std::env::var("RECIPIENT_EMAILS").context("RECIPIENT_EMAILS must be set")?;

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&host)
            .context("invalid SMTP_HOST")?
            .credentials(Credentials::new(user, pass))
            .build();

        Ok(Self {
            mailer,
            from: from.parse().context("invalid SMTP_FROM")?,
            recipients: parse_recipients(&recipients)?,
        })
    }

    pub async fn send_deals(&self, deals: &[Deal]) -> Result<()> {
        let (subject, html) = render_digest(deals, MAX_DIGEST_DEALS);

        for recipient in &self.recipients {
            let message = Message::builder()
                .from(self.from.clone())
                .to(recipient.clone())
                .subject(&subject)
                .header(header::ContentType::TEXT_HTML)
                .body(html.clone())
                .context("failed to build digest email")?;

            self.mailer
                .send(message)
                .await
                .with_context(|| format!("failed to send digest to {recipient}"))?;
            tracing::info!(to = %recipient, "Sent deals digest");
        }
        Ok(())
    }
}

fn parse_recipients(raw: &str) -> Result<Vec<Mailbox>> {
    let recipients = raw
        .split(',')
        .map(str::trim)
        .filter(|addr| !addr.is_empty())
        .map(|addr| addr.parse().with_context(|| format!("invalid recipient address: {addr}")))
        .collect::<Result<Vec<Mailbox>>>()?;
    if recipients.is_empty() {
        anyhow::bail!("RECIPIENT_EMAILS has no addresses");
    }
    Ok(recipients)
}

/// Render the digest as a small self-contained HTML document. Source text
/// goes through entity encoding; only our own markup stays raw.
fn render_digest(deals: &[Deal], max_deals: usize) -> (String, String) {
    if deals.is_empty() {
        return (
            "No Deals Today".to_string(),
            "<p>No deals found matching criteria.</p>".to_string(),
        );
    }

    let shown = &deals[..deals.len().min(max_deals)];
    let subject = format!("🔥 {} Hot Deals Today", shown.len());

    let mut html = String::from(
        "<html><body style=\"font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;\">\n\
         <h1>🔥 Today's Hot Deals</h1>\n",
    );
    for (i, deal) in shown.iter().enumerate() {
        let title = html_escape::encode_text(&deal.title);
        html.push_str(&format!("<div><h3>{}. {title}</h3>\n", i + 1));
        if let Some(image) = &deal.image_url {
            html.push_str(&format!(
                "<img src=\"{}\" style=\"max-width: 100%;\" />\n",
                html_escape::encode_double_quoted_attribute(image)
            ));
        }
        html.push_str(&format!("<p><b>{}</b>", html_escape::encode_text(&deal.price)));
        if let Some(original) = &deal.original_price {
            html.push_str(&format!(" <s>{}</s>", html_escape::encode_text(original)));
        }
        if let Some(discount) = &deal.discount_percentage {
            html.push_str(&format!(" ({} OFF)", html_escape::encode_text(discount)));
        }
        html.push_str("</p>\n");
        html.push_str(&format!("<p>👍 {} votes</p>\n", deal.score));
        html.push_str(&format!(
            "<p><a href=\"{}\">View Deal →</a></p></div>\n",
            html_escape::encode_double_quoted_attribute(&deal.link)
        ));
    }
    html.push_str("<hr><p style=\"color: #999;\">Powered by dealcaster</p></body></html>");

    (subject, html)
}
