//! Background Tasks Module
//!
//! Contains the periodic purge task for time-to-use expiration.

mod purger;

pub use purger::{spawn_purger, PurgerHandle};
