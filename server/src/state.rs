use sqlx::PgPool;
use std::sync::Arc;

use crate::config::Config;
use crate::services::auth::TokenService;
use crate::services::mailer::{LogMailer, MailError, Mailer, SmtpMailer};
use crate::services::payment::{PaymentError, PaymentGateway, PaystackGateway};
use crate::services::qr::QrSigner;

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error(transparent)]
    Payment(#[from] PaymentError),

    #[error(transparent)]
    Mail(#[from] MailError),
}

/// Shared handles passed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    pub tokens: TokenService,
    pub qr: QrSigner,
    pub gateway: Arc<dyn PaymentGateway>,
    pub mailer: Arc<dyn Mailer>,
}

impl AppState {
    pub fn new(
        pool: PgPool,
        config: Config,
        gateway: Arc<dyn PaymentGateway>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        Self {
            tokens: TokenService::from_config(&config),
            qr: QrSigner::from_config(&config),
            pool,
            config: Arc::new(config),
            gateway,
            mailer,
        }
    }

    /// Builds the production gateway and mailer from configuration.
    pub fn from_config(pool: PgPool, config: Config) -> Result<Self, StateError> {
        let gateway: Arc<dyn PaymentGateway> = Arc::new(PaystackGateway::new(
            &config.paystack_base_url,
            &config.paystack_secret_key,
        )?);

        let mailer: Arc<dyn Mailer> = match &config.smtp {
            Some(smtp) => {
                tracing::info!(host = %smtp.host, port = smtp.port, "Using SMTP mailer");
                Arc::new(SmtpMailer::new(smtp, &config.default_from_email)?)
            }
            None => {
                tracing::warn!("SMTP_HOST not set, emails will only be logged");
                Arc::new(LogMailer)
            }
        };

        Ok(Self::new(pool, config, gateway, mailer))
    }
}
