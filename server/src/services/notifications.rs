//! E-mail composition and background delivery.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use uuid::Uuid;

use crate::models::event::Event;
use crate::models::guest::Guest;
use crate::models::order::Order;
use crate::models::ticket::{TicketDetail, TicketStatus};
use crate::repositories::{events, guests, orders, tickets};
use crate::services::mailer::{Email, EmailAttachment};
use crate::services::{qr, ticket_pdf};
use crate::state::AppState;
use crate::utils::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InviteKind {
    Invitation,
    Reminder,
}

fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn event_when_where(event: &Event) -> String {
    let venue = event.venue_name.as_deref().unwrap_or(&event.location);
    format!(
        "{} at {}",
        event.event_date.format("%A, %d %B %Y %H:%M UTC"),
        venue
    )
}

pub fn invitation_email(
    frontend_url: &str,
    event: &Event,
    guest: &Guest,
    token: &str,
    kind: InviteKind,
) -> Result<Email, AppError> {
    let url = qr::validation_url(frontend_url, token);
    let png = qr::render_png(&url)?;
    let inline = STANDARD.encode(&png);

    let subject = match kind {
        InviteKind::Invitation => format!("You're invited to {}", event.title),
        InviteKind::Reminder => format!("Reminder: {}", event.title),
    };
    let when = event_when_where(event);

    let text = format!(
        "Hi {},\n\n{}\n{}\n\nShow the attached QR code at the entrance or open {}\n",
        guest.first_name, subject, when, url
    );
    let html = format!(
        r#"<h2>{subject}</h2>
<p>Hi {name},</p>
<p>{when}</p>
<p>Show this QR code at the entrance:</p>
<p><img src="data:image/png;base64,{inline}" alt="Check-in QR code" width="240" height="240"></p>
<p><a href="{url}">{url}</a></p>"#,
        subject = escape_html(&subject),
        name = escape_html(&guest.first_name),
        when = escape_html(&when),
        inline = inline,
        url = escape_html(&url),
    );

    Ok(Email {
        to: guest.email.clone(),
        subject,
        text,
        html,
        attachments: vec![EmailAttachment {
            filename: format!("qr_code_{}_{}.png", guest.first_name, guest.last_name),
            content_type: "image/png",
            bytes: png,
        }],
    })
}

/// Confirmation with every ticket of the order in one printable PDF.
pub fn ticket_confirmation_email(
    order: &Order,
    event_title: &str,
    tickets: &[TicketDetail],
) -> Result<Email, AppError> {
    let mut rows = String::new();
    let mut lines = String::new();

    for detail in tickets {
        let ticket = &detail.ticket;
        rows.push_str(&format!(
            "<tr><td>{}</td><td>{}</td></tr>",
            escape_html(&ticket.ticket_number),
            escape_html(&detail.ticket_type_name)
        ));
        lines.push_str(&format!(
            "  {} ({})\n",
            ticket.ticket_number, detail.ticket_type_name
        ));
    }

    let attachment = EmailAttachment {
        filename: ticket_pdf::tickets_filename(&order.order_number),
        content_type: "application/pdf",
        bytes: ticket_pdf::order_tickets_pdf(tickets)?,
    };

    let subject = format!("Your Tickets for {}", event_title);
    let text = format!(
        "Hi {},\n\nThank you for your order {}.\nTotal paid: {}\n\nTickets:\n{}\nYour tickets are attached as a PDF. Present each QR code at the entrance.\n",
        order.customer_name, order.order_number, order.total_amount, lines
    );
    let html = format!(
        r#"<h2>{subject}</h2>
<p>Hi {name},</p>
<p>Thank you for your order <strong>{number}</strong>. Total paid: {total}.</p>
<table><tr><th>Ticket</th><th>Type</th></tr>{rows}</table>
<p>Your tickets are attached as a PDF. Present each QR code at the entrance.</p>"#,
        subject = escape_html(&subject),
        name = escape_html(&order.customer_name),
        number = escape_html(&order.order_number),
        total = order.total_amount,
        rows = rows,
    );

    Ok(Email {
        to: order.customer_email.clone(),
        subject,
        text,
        html,
        attachments: vec![attachment],
    })
}

pub fn ticket_reminder_email(
    order: &Order,
    event: &Event,
    tickets: &[TicketDetail],
) -> Result<Email, AppError> {
    let mut email = ticket_confirmation_email(order, &event.title, tickets)?;
    let when = event_when_where(event);
    email.subject = format!("Reminder: {} is coming up", event.title);
    email.text = format!(
        "Hi {},\n\n{} is on {}.\nYour tickets are attached again for convenience.\n",
        order.customer_name, event.title, when
    );
    email.html = format!(
        "<h2>{}</h2><p>Hi {},</p><p>{}</p><p>Your tickets are attached again for convenience.</p>",
        escape_html(&email.subject),
        escape_html(&order.customer_name),
        escape_html(&when)
    );
    Ok(email)
}

async fn deliver_invitation(
    state: &AppState,
    event: &Event,
    guest: &Guest,
    kind: InviteKind,
) -> Result<(), AppError> {
    let (qr_code, _) = qr::get_or_create(&state.pool, &state.qr, guest).await?;
    let email = invitation_email(&state.config.frontend_url, event, guest, &qr_code.token, kind)?;
    state
        .mailer
        .send(email)
        .await
        .map_err(|e| AppError::ExternalServiceError(e.to_string()))?;
    if kind == InviteKind::Invitation {
        guests::mark_invited(&state.pool, guest.id).await?;
    }
    Ok(())
}

/// Sends invitations or reminders on a background task.
pub fn queue_invitations(state: AppState, event: Event, recipients: Vec<Guest>, kind: InviteKind) {
    tokio::spawn(async move {
        let mut sent = 0usize;
        for guest in &recipients {
            match deliver_invitation(&state, &event, guest, kind).await {
                Ok(()) => sent += 1,
                Err(e) => tracing::error!(guest_id = %guest.id, error = %e, "Failed to send invitation"),
            }
        }
        tracing::info!(event_id = %event.id, sent, total = recipients.len(), ?kind, "Invitations processed");
    });
}

async fn deliver_ticket_confirmation(state: &AppState, order_id: Uuid) -> Result<(), AppError> {
    let row = orders::find_with_event(&state.pool, order_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Order {} not found", order_id)))?;
    let issued = tickets::for_order(&state.pool, order_id).await?;
    let email = ticket_confirmation_email(&row.order, &row.event_title, &issued)?;
    state
        .mailer
        .send(email)
        .await
        .map_err(|e| AppError::ExternalServiceError(e.to_string()))
}

/// Sends the ticket confirmation for a settled order in the background.
pub fn queue_ticket_confirmation(state: AppState, order_id: Uuid) {
    tokio::spawn(async move {
        if let Err(e) = deliver_ticket_confirmation(&state, order_id).await {
            tracing::error!(order_id = %order_id, error = %e, "Failed to send ticket confirmation");
        }
    });
}

async fn deliver_ticket_reminders(state: &AppState, event_id: Uuid) -> Result<usize, AppError> {
    let event = events::find_by_id(&state.pool, event_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Event {} not found", event_id)))?;
    let pending = orders::with_unused_tickets(&state.pool, event_id).await?;

    let mut sent = 0;
    for order in &pending {
        let unused: Vec<TicketDetail> = tickets::for_order(&state.pool, order.id)
            .await?
            .into_iter()
            .filter(|t| t.ticket.status == TicketStatus::Valid && !t.ticket.checked_in)
            .collect();
        let email = ticket_reminder_email(order, &event, &unused)?;
        match state.mailer.send(email).await {
            Ok(()) => sent += 1,
            Err(e) => tracing::error!(order_id = %order.id, error = %e, "Failed to send ticket reminder"),
        }
    }
    Ok(sent)
}

pub fn queue_ticket_reminders(state: AppState, event_id: Uuid) {
    tokio::spawn(async move {
        match deliver_ticket_reminders(&state, event_id).await {
            Ok(sent) => tracing::info!(event_id = %event_id, sent, "Ticket reminders processed"),
            Err(e) => tracing::error!(event_id = %event_id, error = %e, "Failed to send ticket reminders"),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::event::tests::sample_event;
    use crate::models::guest::tests::sample_guest;
    use crate::models::order::tests::sample_order;
    use crate::services::ticket_pdf::tests::sample_ticket_detail;

    #[test]
    fn test_invitation_embeds_and_attaches_qr() {
        let event = sample_event();
        let mut guest = sample_guest(event.id);
        guest.first_name = "<Ada>".into();

        let email = invitation_email(
            "http://localhost:5173",
            &event,
            &guest,
            "tok",
            InviteKind::Invitation,
        )
        .unwrap();

        assert_eq!(email.subject, "You're invited to Launch");
        assert!(email.html.contains("data:image/png;base64,"));
        assert!(email.html.contains("&lt;Ada&gt;"));
        assert!(email.text.contains("http://localhost:5173/validate-qr/tok"));
        assert_eq!(email.attachments.len(), 1);
        assert_eq!(email.attachments[0].content_type, "image/png");
    }

    #[test]
    fn test_reminder_subject() {
        let event = sample_event();
        let guest = sample_guest(event.id);
        let email = invitation_email("http://x", &event, &guest, "tok", InviteKind::Reminder).unwrap();
        assert_eq!(email.subject, "Reminder: Launch");
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html(r#"a&b<"c">"#), "a&amp;b&lt;&quot;c&quot;&gt;");
    }

    #[test]
    fn test_confirmation_attaches_order_pdf() {
        let order = sample_order();
        let tickets = vec![
            sample_ticket_detail("TKT-AAAAAAAAAAAA"),
            sample_ticket_detail("TKT-BBBBBBBBBBBB"),
        ];

        let email = ticket_confirmation_email(&order, "Lagos Jazz Night", &tickets).unwrap();

        assert_eq!(email.subject, "Your Tickets for Lagos Jazz Night");
        assert!(email.text.contains("TKT-BBBBBBBBBBBB (VIP)"));
        assert_eq!(email.attachments.len(), 1);
        let pdf = &email.attachments[0];
        assert_eq!(pdf.filename, format!("Tickets_{}.pdf", order.order_number));
        assert_eq!(pdf.content_type, "application/pdf");
        assert!(pdf.bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn test_ticket_reminder_keeps_the_pdf() {
        let event = sample_event();
        let order = sample_order();
        let email =
            ticket_reminder_email(&order, &event, &[sample_ticket_detail("TKT-AAAAAAAAAAAA")])
                .unwrap();

        assert_eq!(email.subject, "Reminder: Launch is coming up");
        assert_eq!(email.attachments.len(), 1);
        assert_eq!(email.attachments[0].content_type, "application/pdf");
    }
}
