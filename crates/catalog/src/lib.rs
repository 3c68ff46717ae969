//! `boxoffice-catalog`: read-mostly event/tier metadata.
//!
//! One aggregate root (`EventListing`) owns its dates and tier definitions as
//! value-object collections; there are no back-pointing child entities.

pub mod event;

pub use event::{EventListing, TierDef};
