pub mod codes;
pub mod error;
pub mod pagination;
pub mod response;
