pub mod finance;
pub mod seed;
pub mod shipments;
