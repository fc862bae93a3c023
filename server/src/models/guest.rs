use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "guest_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum GuestStatus {
    #[default]
    Pending,
    Confirmed,
    Declined,
    Attended,
    Cancelled,
}

impl GuestStatus {
    pub fn label(&self) -> &'static str {
        match self {
            GuestStatus::Pending => "Pending",
            GuestStatus::Confirmed => "Confirmed",
            GuestStatus::Declined => "Declined",
            GuestStatus::Attended => "Attended",
            GuestStatus::Cancelled => "Cancelled",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "guest_source", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum GuestSource {
    #[default]
    Manual,
    Bulk,
    TicketPurchase,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Guest {
    pub id: Uuid,
    pub event_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: Option<String>,
    pub company: Option<String>,
    pub title: Option<String>,
    pub notes: Option<String>,
    pub plus_one_allowed: bool,
    pub plus_one_name: Option<String>,
    pub status: GuestStatus,
    pub rsvp_status: bool,
    pub rsvp_date: Option<DateTime<Utc>>,
    pub has_checked_in: bool,
    pub checked_in_at: Option<DateTime<Utc>>,
    pub checked_in_by: Option<String>,
    pub invitation_sent: bool,
    pub invitation_sent_at: Option<DateTime<Utc>>,
    pub source: GuestSource,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Guest {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// Guest row joined with the owning event, used for ownership checks and
/// list views.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct GuestWithEvent {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub guest: Guest,
    pub event_title: String,
    #[serde(skip)]
    pub organizer_id: Uuid,
}

/// Splits a single display name into first and last name.
pub fn split_name(name: &str) -> (String, String) {
    let name = name.trim();
    match name.split_once(char::is_whitespace) {
        Some((first, rest)) => (first.to_string(), rest.trim().to_string()),
        None => (name.to_string(), String::new()),
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct GuestFilter {
    pub event: Option<Uuid>,
    pub checked_in: Option<bool>,
    pub rsvp: Option<bool>,
    pub status: Option<GuestStatus>,
    pub search: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct NewGuest {
    #[validate(length(min = 1, max = 150, message = "This field is required."))]
    pub first_name: String,
    #[validate(length(min = 1, max = 150, message = "This field is required."))]
    pub last_name: String,
    #[validate(email(message = "Enter a valid email address."))]
    pub email: String,
    #[validate(length(max = 20))]
    pub phone_number: Option<String>,
    #[validate(length(max = 255))]
    pub company: Option<String>,
    #[validate(length(max = 255))]
    pub title: Option<String>,
    pub notes: Option<String>,
    #[serde(default)]
    pub plus_one_allowed: bool,
    pub plus_one_name: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateGuestRequest {
    pub event: Uuid,
    #[serde(flatten)]
    #[validate(nested)]
    pub guest: NewGuest,
    #[serde(default)]
    pub status: GuestStatus,
    #[serde(default)]
    pub rsvp_status: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct BulkCreateGuestsRequest {
    pub event_id: Uuid,
    #[validate(length(min = 1, message = "At least one guest is required"))]
    pub guests: Vec<NewGuest>,
}

#[derive(Debug, Serialize)]
pub struct BulkCreateError {
    pub index: usize,
    pub email: String,
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct BulkCreateResult {
    pub created: Vec<Guest>,
    pub created_count: usize,
    pub errors: Vec<BulkCreateError>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateGuestRequest {
    #[validate(length(min = 1, max = 150))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, max = 150))]
    pub last_name: Option<String>,
    #[validate(email(message = "Enter a valid email address."))]
    pub email: Option<String>,
    #[validate(length(max = 20))]
    pub phone_number: Option<String>,
    #[validate(length(max = 255))]
    pub company: Option<String>,
    #[validate(length(max = 255))]
    pub title: Option<String>,
    pub notes: Option<String>,
    pub plus_one_allowed: Option<bool>,
    pub plus_one_name: Option<String>,
    pub status: Option<GuestStatus>,
    pub rsvp_status: Option<bool>,
}

impl UpdateGuestRequest {
    pub fn apply(self, guest: &mut Guest, now: DateTime<Utc>) {
        if let Some(v) = self.first_name {
            guest.first_name = v;
        }
        if let Some(v) = self.last_name {
            guest.last_name = v;
        }
        if let Some(v) = self.email {
            guest.email = v.trim().to_lowercase();
        }
        if let Some(v) = self.phone_number {
            guest.phone_number = Some(v);
        }
        if let Some(v) = self.company {
            guest.company = Some(v);
        }
        if let Some(v) = self.title {
            guest.title = Some(v);
        }
        if let Some(v) = self.notes {
            guest.notes = Some(v);
        }
        if let Some(v) = self.plus_one_allowed {
            guest.plus_one_allowed = v;
        }
        if let Some(v) = self.plus_one_name {
            guest.plus_one_name = Some(v);
        }
        if let Some(v) = self.status {
            guest.status = v;
        }
        if let Some(rsvp) = self.rsvp_status {
            if rsvp && !guest.rsvp_status {
                guest.rsvp_date = Some(now);
            }
            guest.rsvp_status = rsvp;
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_guest(event_id: Uuid) -> Guest {
        let now = Utc::now();
        Guest {
            id: Uuid::new_v4(),
            event_id,
            first_name: "Ada".into(),
            last_name: "Obi".into(),
            email: "ada@example.com".into(),
            phone_number: None,
            company: None,
            title: None,
            notes: None,
            plus_one_allowed: false,
            plus_one_name: None,
            status: GuestStatus::Pending,
            rsvp_status: false,
            rsvp_date: None,
            has_checked_in: false,
            checked_in_at: None,
            checked_in_by: None,
            invitation_sent: false,
            invitation_sent_at: None,
            source: GuestSource::Manual,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_split_name() {
        assert_eq!(
            split_name("Ada Lovelace King"),
            ("Ada".to_string(), "Lovelace King".to_string())
        );
        assert_eq!(split_name("  Cher "), ("Cher".to_string(), String::new()));
    }

    #[test]
    fn test_rsvp_stamps_date_once() {
        let mut guest = sample_guest(Uuid::new_v4());
        let now = Utc::now();
        UpdateGuestRequest {
            rsvp_status: Some(true),
            ..Default::default()
        }
        .apply(&mut guest, now);
        assert!(guest.rsvp_status);
        assert_eq!(guest.rsvp_date, Some(now));

        let later = now + chrono::Duration::minutes(5);
        UpdateGuestRequest {
            rsvp_status: Some(true),
            ..Default::default()
        }
        .apply(&mut guest, later);
        assert_eq!(guest.rsvp_date, Some(now));
    }

    #[test]
    fn test_update_normalizes_email() {
        let mut guest = sample_guest(Uuid::new_v4());
        UpdateGuestRequest {
            email: Some(" New@Example.com".into()),
            ..Default::default()
        }
        .apply(&mut guest, Utc::now());
        assert_eq!(guest.email, "new@example.com");
    }

    #[test]
    fn test_create_request_flattens_guest_fields() {
        let raw = serde_json::json!({
            "event": Uuid::new_v4(),
            "first_name": "Ada",
            "last_name": "Obi",
            "email": "not-an-email"
        });
        let req: CreateGuestRequest = serde_json::from_value(raw).unwrap();
        assert!(req.validate().is_err());
    }
}
