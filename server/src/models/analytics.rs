use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use super::checkin::MethodCounts;
use super::event::EventView;

#[derive(Debug, Clone, Copy, Default, Serialize, FromRow)]
pub struct GuestCounts {
    pub total: i64,
    pub checked_in: i64,
    pub pending: i64,
    pub confirmed: i64,
    pub declined: i64,
    pub rsvp_yes: i64,
    pub rsvp_no: i64,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TicketTypeSales {
    pub ticket_type_id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub quantity_available: i32,
    pub quantity_sold: i32,
    pub revenue: Decimal,
}

#[derive(Debug, Serialize)]
pub struct CapacityStats {
    pub capacity: i64,
    pub used: i64,
    pub available: i64,
    pub percentage_full: Decimal,
}

impl CapacityStats {
    pub fn new(capacity: Option<i32>, used: i64) -> Option<Self> {
        let capacity = i64::from(capacity?);
        Some(Self {
            capacity,
            used,
            available: (capacity - used).max(0),
            percentage_full: super::event::attendance_rate(used, capacity),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct EventStats {
    pub event_id: Uuid,
    pub event_title: String,
    pub guests: GuestCounts,
    pub attendance_rate: Decimal,
    pub capacity: Option<CapacityStats>,
    pub check_in_methods: MethodCounts,
    pub ticket_sales: Vec<TicketTypeSales>,
    pub total_tickets_sold: i64,
    pub total_revenue: Decimal,
}

#[derive(Debug, Clone, Copy, Default, Serialize, FromRow)]
pub struct DashboardTotals {
    pub total_events: i64,
    pub published_events: i64,
    pub upcoming_events: i64,
    pub total_guests: i64,
    pub total_checked_in: i64,
    pub total_tickets_sold: i64,
    pub total_orders: i64,
    pub total_revenue: Decimal,
}

#[derive(Debug, Serialize)]
pub struct Dashboard {
    #[serde(flatten)]
    pub totals: DashboardTotals,
    pub overall_attendance_rate: Decimal,
    pub recent_events: Vec<EventView>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_stats() {
        assert!(CapacityStats::new(None, 5).is_none());

        let stats = CapacityStats::new(Some(8), 10).unwrap();
        assert_eq!(stats.available, 0);
        assert_eq!(stats.percentage_full.to_string(), "125.00");

        let stats = CapacityStats::new(Some(200), 50).unwrap();
        assert_eq!(stats.available, 150);
        assert_eq!(stats.percentage_full.to_string(), "25.00");
    }
}
