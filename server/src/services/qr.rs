use chrono::{Duration, Utc};
use image::{GrayImage, ImageFormat, Luma};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use qrcode::{Color, QrCode as QrMatrix};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::io::Cursor;
use uuid::Uuid;

use crate::config::Config;
use crate::models::guest::Guest;
use crate::models::qr_code::QrCode;
use crate::repositories::qr_codes;
use crate::utils::codes::is_ticket_number;
use crate::utils::error::AppError;

const MODULE_PX: u32 = 8;
const QUIET_ZONE: u32 = 4;
const VALIDATION_PATH: &str = "/validate-qr/";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QrClaims {
    pub guest_id: Uuid,
    pub event_id: Uuid,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
}

/// Signs and verifies guest check-in tokens.
#[derive(Clone)]
pub struct QrSigner {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expiry: Duration,
}

impl QrSigner {
    pub fn new(secret: &str, expiry: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            expiry,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.qr_code_secret, Duration::hours(config.qr_code_expiry_hours))
    }

    pub fn sign(&self, guest: &Guest) -> Result<String, AppError> {
        let now = Utc::now();
        let claims = QrClaims {
            guest_id: guest.id,
            event_id: guest.event_id,
            email: guest.email.clone(),
            iat: now.timestamp(),
            exp: (now + self.expiry).timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AppError::InternalServerError(format!("Failed to sign QR token: {}", e)))
    }

    pub fn verify(&self, token: &str) -> Result<QrClaims, AppError> {
        decode::<QrClaims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => {
                    AppError::ValidationError("Token has expired".to_string())
                }
                _ => AppError::ValidationError("Invalid token".to_string()),
            })
    }
}

/// Returns the guest's QR code, creating it on first use. An existing code
/// whose token no longer verifies gets a fresh token. The flag is `true` when
/// the code was created by this call.
pub async fn get_or_create(
    pool: &PgPool,
    signer: &QrSigner,
    guest: &Guest,
) -> Result<(QrCode, bool), AppError> {
    if let Some(existing) = qr_codes::find_by_guest(pool, guest.id).await? {
        if !existing.is_used && signer.verify(&existing.token).is_err() {
            let token = signer.sign(guest)?;
            let refreshed = qr_codes::replace_token(pool, existing.id, &token).await?;
            return Ok((refreshed, false));
        }
        return Ok((existing, false));
    }

    let token = signer.sign(guest)?;
    match qr_codes::insert_if_absent(pool, guest.id, &token).await? {
        Some(created) => Ok((created, true)),
        // Lost a race with a concurrent request for the same guest.
        None => qr_codes::find_by_guest(pool, guest.id)
            .await?
            .map(|qr| (qr, false))
            .ok_or_else(|| AppError::NotFound("QR code not found".to_string())),
    }
}

/// URL a guest QR image points at.
pub fn validation_url(frontend_url: &str, token: &str) -> String {
    format!("{}{}{}", frontend_url.trim_end_matches('/'), VALIDATION_PATH, token)
}

/// A scanned credential, before lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    GuestToken(String),
    Ticket { number: String, code: Option<Uuid> },
}

/// Classifies raw scanner input. Accepts a guest token (bare or inside a
/// validation URL), a `TKT-…|<ticket_code>` payload or a bare ticket number.
pub fn parse_credential(raw: &str) -> Result<Credential, AppError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(AppError::ValidationError("Token is required".to_string()));
    }

    if let Some((number, code)) = raw.split_once('|') {
        let number = number.trim().to_uppercase();
        if !is_ticket_number(&number) {
            return Err(AppError::ValidationError("Invalid ticket payload".to_string()));
        }
        let code = Uuid::parse_str(code.trim())
            .map_err(|_| AppError::ValidationError("Invalid ticket payload".to_string()))?;
        return Ok(Credential::Ticket {
            number,
            code: Some(code),
        });
    }

    let upper = raw.to_uppercase();
    if is_ticket_number(&upper) {
        return Ok(Credential::Ticket {
            number: upper,
            code: None,
        });
    }

    let token = match raw.rfind(VALIDATION_PATH) {
        Some(idx) => {
            let rest = &raw[idx + VALIDATION_PATH.len()..];
            rest.split(['?', '#']).next().unwrap_or(rest).trim_end_matches('/')
        }
        None => raw,
    };
    if token.is_empty() {
        return Err(AppError::ValidationError("Invalid token".to_string()));
    }
    Ok(Credential::GuestToken(token.to_string()))
}

/// Square module grid of a QR code, row-major from the top-left corner.
pub struct QrModules {
    pub width: u32,
    dark: Vec<bool>,
}

impl QrModules {
    pub fn encode(payload: &str) -> Result<Self, AppError> {
        let code = QrMatrix::new(payload.as_bytes()).map_err(|e| {
            AppError::InternalServerError(format!("Failed to encode QR code: {}", e))
        })?;
        Ok(Self {
            width: code.width() as u32,
            dark: code.to_colors().into_iter().map(|c| c == Color::Dark).collect(),
        })
    }

    pub fn is_dark(&self, x: u32, y: u32) -> bool {
        x < self.width && y < self.width && self.dark[(y * self.width + x) as usize]
    }
}

/// Renders `payload` as a black-on-white PNG.
pub fn render_png(payload: &str) -> Result<Vec<u8>, AppError> {
    let modules = QrModules::encode(payload)?;
    let width = modules.width;
    let size = (width + 2 * QUIET_ZONE) * MODULE_PX;

    let image = GrayImage::from_fn(size, size, |x, y| {
        let (mx, my) = (x / MODULE_PX, y / MODULE_PX);
        let inside = (QUIET_ZONE..QUIET_ZONE + width).contains(&mx)
            && (QUIET_ZONE..QUIET_ZONE + width).contains(&my);
        let dark = inside && modules.is_dark(mx - QUIET_ZONE, my - QUIET_ZONE);
        if dark {
            Luma([0u8])
        } else {
            Luma([255u8])
        }
    });

    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .map_err(|e| AppError::InternalServerError(format!("Failed to render QR image: {}", e)))?;
    Ok(bytes)
}
