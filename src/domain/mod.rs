pub mod fee;
pub mod history;
pub mod money;
pub mod payment;
pub mod ports;
pub mod shipment;
