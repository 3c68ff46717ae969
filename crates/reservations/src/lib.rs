//! `boxoffice-reservations`: the hold lifecycle state machine.
//!
//! A `Reservation` is a time-bounded claim on inventory pending payment
//! confirmation. Held → {Confirmed, Released, Expired}; all three are
//! terminal and retained for audit.

pub mod reservation;

pub use reservation::{Reservation, ReservationError, ReservationStatus};
