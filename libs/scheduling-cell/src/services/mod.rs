pub mod date_keys;
pub mod schedule_rules;
pub mod alignment;
pub mod availability;
pub mod store;
pub mod scheduling;

pub use schedule_rules::{ScheduleRules, ScheduleStrategy, WeeklyScheduleTemplate, is_weekend_date};
pub use alignment::{align_to_slot, is_aligned_to_slot};
pub use availability::{AvailabilityEngine, resolve_selected_date, resolve_selected_time};
pub use store::{BookingStore, DateRange, SupabaseBookingStore};
pub use scheduling::AvailabilityService;
