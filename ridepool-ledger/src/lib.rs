pub mod ledger;

pub use ledger::{clamp_available, SeatLedger};
