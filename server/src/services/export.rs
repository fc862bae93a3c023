use csv::Writer;

use crate::models::guest::Guest;
use crate::utils::error::AppError;

const HEADER: [&str; 9] = [
    "First Name",
    "Last Name",
    "Email",
    "Phone",
    "Company",
    "Status",
    "RSVP",
    "Checked In",
    "Checked In At",
];

fn yes_no(value: bool) -> &'static str {
    if value {
        "Yes"
    } else {
        "No"
    }
}

/// Guest list as CSV, one row per guest in the given order.
pub fn guests_csv(guests: &[Guest]) -> Result<Vec<u8>, AppError> {
    let mut writer = Writer::from_writer(Vec::new());
    let csv_error = |e: csv::Error| AppError::InternalServerError(format!("CSV export failed: {}", e));

    writer.write_record(HEADER).map_err(csv_error)?;
    for guest in guests {
        let checked_in_at = guest
            .checked_in_at
            .map(|at| at.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default();
        writer
            .write_record([
                guest.first_name.as_str(),
                guest.last_name.as_str(),
                guest.email.as_str(),
                guest.phone_number.as_deref().unwrap_or(""),
                guest.company.as_deref().unwrap_or(""),
                guest.status.label(),
                yes_no(guest.rsvp_status),
                yes_no(guest.has_checked_in),
                checked_in_at.as_str(),
            ])
            .map_err(csv_error)?;
    }

    writer
        .into_inner()
        .map_err(|e| AppError::InternalServerError(format!("CSV export failed: {}", e)))
}

/// `guests_<slug>.csv`
pub fn export_filename(slug: &str) -> String {
    format!("guests_{}.csv", slug)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::guest::tests::sample_guest;
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    #[test]
    fn test_csv_header_and_rows() {
        let mut guest = sample_guest(Uuid::new_v4());
        guest.first_name = "Grace".into();
        guest.last_name = "Hopper, Jr".into();
        guest.company = None;
        guest.rsvp_status = true;
        guest.has_checked_in = true;
        guest.checked_in_at = Some(Utc.with_ymd_and_hms(2025, 3, 1, 18, 30, 0).unwrap());

        let bytes = guests_csv(&[guest]).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let mut lines = text.lines();

        assert_eq!(
            lines.next().unwrap(),
            "First Name,Last Name,Email,Phone,Company,Status,RSVP,Checked In,Checked In At"
        );
        let row = lines.next().unwrap();
        assert!(row.starts_with("Grace,\"Hopper, Jr\","));
        assert!(row.ends_with(",Yes,Yes,2025-03-01 18:30:00"));
        assert!(lines.next().is_none());
    }

    #[test]
    fn test_export_filename() {
        assert_eq!(export_filename("launch-abc123"), "guests_launch-abc123.csv");
    }
}
