pub mod analytics;
pub mod checkin;
pub mod discount;
pub mod event;
pub mod guest;
pub mod order;
pub mod qr_code;
pub mod ticket;
pub mod user;
