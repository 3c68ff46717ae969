//! Background workers.

pub mod expiry_worker;
