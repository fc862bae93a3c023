pub mod auth;
pub mod checkin;
pub mod export;
pub mod mailer;
pub mod notifications;
pub mod orders;
pub mod payment;
pub mod pricing;
pub mod qr;
pub mod ticket_pdf;
