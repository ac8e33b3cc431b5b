pub mod memory;
pub mod postgrest;
pub mod store;
pub mod supabase;

pub use memory::MemoryStore;
pub use postgrest::SupabaseStore;
pub use store::{BookingCommit, ClinicStore, RecurrenceCommit, StoreError, StoreResult};
