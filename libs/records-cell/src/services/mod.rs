pub mod recurrence;
pub mod records;

pub use recurrence::RecurrenceService;
pub use records::RecordsService;
