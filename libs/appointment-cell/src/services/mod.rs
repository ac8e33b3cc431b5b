pub mod booking;
pub mod ledger;
pub mod lifecycle;

pub use booking::BookingService;
pub use ledger::BookingLedger;
pub use lifecycle::AppointmentLifecycleService;
