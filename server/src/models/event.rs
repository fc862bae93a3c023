use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::utils::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "event_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    #[default]
    Draft,
    Published,
    Ongoing,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Event {
    pub id: Uuid,
    pub organizer_id: Uuid,
    pub title: String,
    pub slug: String,
    pub description: Option<String>,
    pub event_date: DateTime<Utc>,
    pub event_end_date: Option<DateTime<Utc>>,
    pub location: String,
    pub venue_name: Option<String>,
    pub address: Option<String>,
    pub capacity: Option<i32>,
    pub allow_plus_one: bool,
    pub require_rsvp: bool,
    pub enable_self_checkin: bool,
    pub checkin_start_time: Option<DateTime<Utc>>,
    pub checkin_end_time: Option<DateTime<Utc>>,
    pub status: EventStatus,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    /// Why check-in is closed at `now`, if it is.
    pub fn checkin_window_error(&self, now: DateTime<Utc>) -> Option<&'static str> {
        if matches!(self.checkin_start_time, Some(start) if now < start) {
            return Some("Check-in has not started yet for this event");
        }
        if matches!(self.checkin_end_time, Some(end) if now > end) {
            return Some("Check-in has closed for this event");
        }
        None
    }

    pub fn validate_schedule(&self) -> Result<(), AppError> {
        validate_schedule(
            self.event_date,
            self.event_end_date,
            self.checkin_start_time,
            self.checkin_end_time,
        )
    }
}

pub fn validate_schedule(
    event_date: DateTime<Utc>,
    event_end_date: Option<DateTime<Utc>>,
    checkin_start_time: Option<DateTime<Utc>>,
    checkin_end_time: Option<DateTime<Utc>>,
) -> Result<(), AppError> {
    if matches!(event_end_date, Some(end) if end < event_date) {
        return Err(AppError::ValidationError(
            "Event end date must be after start date".to_string(),
        ));
    }
    if let (Some(start), Some(end)) = (checkin_start_time, checkin_end_time) {
        if end < start {
            return Err(AppError::ValidationError(
                "Check-in end time must be after check-in start time".to_string(),
            ));
        }
    }
    Ok(())
}

/// An event together with its guest aggregates, as selected by the
/// events repository.
#[derive(Debug, Clone, FromRow)]
pub struct EventWithCounts {
    #[sqlx(flatten)]
    pub event: Event,
    pub total_guests: i64,
    pub checked_in_count: i64,
    pub pending_count: i64,
    pub has_tickets: bool,
}

#[derive(Debug, Serialize)]
pub struct EventView {
    #[serde(flatten)]
    pub event: Event,
    pub total_guests: i64,
    pub checked_in_count: i64,
    pub pending_count: i64,
    pub attendance_rate: Decimal,
    pub is_at_capacity: bool,
    pub available_slots: Option<i64>,
    pub has_tickets: bool,
}

/// Percentage with exactly two decimal places, `0.00` when there is nobody.
pub fn attendance_rate(checked_in: i64, total: i64) -> Decimal {
    let mut rate = if total <= 0 {
        Decimal::ZERO
    } else {
        (Decimal::from(checked_in) * Decimal::ONE_HUNDRED / Decimal::from(total)).round_dp(2)
    };
    rate.rescale(2);
    rate
}

impl From<EventWithCounts> for EventView {
    fn from(row: EventWithCounts) -> Self {
        let capacity = row.event.capacity.map(i64::from);
        Self {
            attendance_rate: attendance_rate(row.checked_in_count, row.total_guests),
            is_at_capacity: capacity.map_or(false, |c| row.total_guests >= c),
            available_slots: capacity.map(|c| (c - row.total_guests).max(0)),
            total_guests: row.total_guests,
            checked_in_count: row.checked_in_count,
            pending_count: row.pending_count,
            has_tickets: row.has_tickets,
            event: row.event,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct EventFilter {
    pub status: Option<EventStatus>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub search: Option<String>,
    pub ordering: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOrdering {
    EventDate,
    CreatedAt,
    Title,
}

impl EventOrdering {
    /// Parses `field` or `-field`; unknown fields fall back to newest event first.
    pub fn parse(raw: Option<&str>) -> (Self, bool) {
        let raw = raw.unwrap_or("-event_date").trim();
        let (descending, field) = match raw.strip_prefix('-') {
            Some(field) => (true, field),
            None => (false, raw),
        };
        match field {
            "event_date" => (EventOrdering::EventDate, descending),
            "created_at" => (EventOrdering::CreatedAt, descending),
            "title" => (EventOrdering::Title, descending),
            _ => (EventOrdering::EventDate, true),
        }
    }

    pub fn column(&self) -> &'static str {
        match self {
            EventOrdering::EventDate => "e.event_date",
            EventOrdering::CreatedAt => "e.created_at",
            EventOrdering::Title => "e.title",
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateEventRequest {
    #[validate(length(min = 1, max = 255, message = "This field is required."))]
    pub title: String,
    pub description: Option<String>,
    pub event_date: DateTime<Utc>,
    pub event_end_date: Option<DateTime<Utc>>,
    #[validate(length(min = 1, max = 500, message = "This field is required."))]
    pub location: String,
    #[validate(length(max = 255))]
    pub venue_name: Option<String>,
    pub address: Option<String>,
    #[validate(range(min = 1, message = "Capacity must be at least 1"))]
    pub capacity: Option<i32>,
    #[serde(default)]
    pub allow_plus_one: bool,
    #[serde(default = "default_true")]
    pub require_rsvp: bool,
    #[serde(default)]
    pub enable_self_checkin: bool,
    pub checkin_start_time: Option<DateTime<Utc>>,
    pub checkin_end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: EventStatus,
    #[serde(default)]
    pub is_public: bool,
}

fn default_true() -> bool {
    true
}

/// Partial update; `PUT` and `PATCH` share it.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateEventRequest {
    #[validate(length(min = 1, max = 255))]
    pub title: Option<String>,
    pub description: Option<String>,
    pub event_date: Option<DateTime<Utc>>,
    pub event_end_date: Option<DateTime<Utc>>,
    #[validate(length(min = 1, max = 500))]
    pub location: Option<String>,
    #[validate(length(max = 255))]
    pub venue_name: Option<String>,
    pub address: Option<String>,
    #[validate(range(min = 1, message = "Capacity must be at least 1"))]
    pub capacity: Option<i32>,
    pub allow_plus_one: Option<bool>,
    pub require_rsvp: Option<bool>,
    pub enable_self_checkin: Option<bool>,
    pub checkin_start_time: Option<DateTime<Utc>>,
    pub checkin_end_time: Option<DateTime<Utc>>,
    pub status: Option<EventStatus>,
    pub is_public: Option<bool>,
}

impl UpdateEventRequest {
    pub fn apply(self, event: &mut Event) {
        if let Some(title) = self.title {
            event.title = title;
        }
        if let Some(description) = self.description {
            event.description = Some(description);
        }
        if let Some(date) = self.event_date {
            event.event_date = date;
        }
        if let Some(end) = self.event_end_date {
            event.event_end_date = Some(end);
        }
        if let Some(location) = self.location {
            event.location = location;
        }
        if let Some(venue) = self.venue_name {
            event.venue_name = Some(venue);
        }
        if let Some(address) = self.address {
            event.address = Some(address);
        }
        if let Some(capacity) = self.capacity {
            event.capacity = Some(capacity);
        }
        if let Some(v) = self.allow_plus_one {
            event.allow_plus_one = v;
        }
        if let Some(v) = self.require_rsvp {
            event.require_rsvp = v;
        }
        if let Some(v) = self.enable_self_checkin {
            event.enable_self_checkin = v;
        }
        if let Some(start) = self.checkin_start_time {
            event.checkin_start_time = Some(start);
        }
        if let Some(end) = self.checkin_end_time {
            event.checkin_end_time = Some(end);
        }
        if let Some(status) = self.status {
            event.status = status;
        }
        if let Some(v) = self.is_public {
            event.is_public = v;
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::Duration;

    pub(crate) fn sample_event() -> Event {
        let now = Utc::now();
        Event {
            id: Uuid::new_v4(),
            organizer_id: Uuid::new_v4(),
            title: "Launch".into(),
            slug: "launch-abc123".into(),
            description: None,
            event_date: now + Duration::days(3),
            event_end_date: None,
            location: "Lagos".into(),
            venue_name: None,
            address: None,
            capacity: Some(10),
            allow_plus_one: false,
            require_rsvp: true,
            enable_self_checkin: false,
            checkin_start_time: None,
            checkin_end_time: None,
            status: EventStatus::Published,
            is_public: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_attendance_rate_rounds_to_two_places() {
        assert_eq!(attendance_rate(0, 0), Decimal::ZERO);
        assert_eq!(attendance_rate(1, 3).to_string(), "33.33");
        assert_eq!(attendance_rate(3, 3), Decimal::ONE_HUNDRED);
        assert_eq!(attendance_rate(0, 0).to_string(), "0.00");
        assert_eq!(attendance_rate(1, 2).to_string(), "50.00");
        assert_eq!(attendance_rate(3, 3).to_string(), "100.00");
    }

    #[test]
    fn test_view_capacity_fields() {
        let row = EventWithCounts {
            event: sample_event(),
            total_guests: 12,
            checked_in_count: 6,
            pending_count: 2,
            has_tickets: false,
        };
        let view = EventView::from(row);
        assert!(view.is_at_capacity);
        assert_eq!(view.available_slots, Some(0));
        assert_eq!(view.attendance_rate.to_string(), "50.00");

        let mut uncapped = sample_event();
        uncapped.capacity = None;
        let view = EventView::from(EventWithCounts {
            event: uncapped,
            total_guests: 12,
            checked_in_count: 0,
            pending_count: 0,
            has_tickets: true,
        });
        assert!(!view.is_at_capacity);
        assert_eq!(view.available_slots, None);
    }

    #[test]
    fn test_schedule_validation() {
        let mut event = sample_event();
        assert!(event.validate_schedule().is_ok());

        event.event_end_date = Some(event.event_date - Duration::hours(1));
        assert!(event.validate_schedule().is_err());

        event.event_end_date = None;
        event.checkin_start_time = Some(event.event_date);
        event.checkin_end_time = Some(event.event_date - Duration::hours(2));
        assert!(event.validate_schedule().is_err());
    }

    #[test]
    fn test_checkin_window() {
        let mut event = sample_event();
        let now = Utc::now();
        assert!(event.checkin_window_error(now).is_none());

        event.checkin_start_time = Some(now + Duration::hours(1));
        assert!(event.checkin_window_error(now).is_some());

        event.checkin_start_time = None;
        event.checkin_end_time = Some(now - Duration::hours(1));
        assert!(event.checkin_window_error(now).is_some());
    }

    #[test]
    fn test_ordering_parse() {
        assert_eq!(EventOrdering::parse(None), (EventOrdering::EventDate, true));
        assert_eq!(
            EventOrdering::parse(Some("title")),
            (EventOrdering::Title, false)
        );
        assert_eq!(
            EventOrdering::parse(Some("-created_at")),
            (EventOrdering::CreatedAt, true)
        );
        assert_eq!(
            EventOrdering::parse(Some("; drop table")),
            (EventOrdering::EventDate, true)
        );
    }

    #[test]
    fn test_update_only_touches_given_fields() {
        let mut event = sample_event();
        let update = UpdateEventRequest {
            title: Some("Renamed".into()),
            is_public: Some(false),
            ..Default::default()
        };
        update.apply(&mut event);
        assert_eq!(event.title, "Renamed");
        assert!(!event.is_public);
        assert_eq!(event.location, "Lagos");
    }
}
