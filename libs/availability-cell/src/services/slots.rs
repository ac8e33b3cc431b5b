use std::collections::BTreeSet;

use chrono::{Duration, NaiveTime};

use shared_models::clinic::AttendanceWindow;

/// Bookable start times for a set of windows: every `granularity_minutes` from each
/// window's start while strictly before its end, merged across windows, deduplicated
/// and ascending. Windows shorter than one granule and a non-positive or out of range
/// granularity yield nothing.
pub fn slots_for(windows: &[AttendanceWindow], granularity_minutes: i64) -> Vec<NaiveTime> {
    if granularity_minutes <= 0 {
        return Vec::new();
    }

    let Some(step) = Duration::try_minutes(granularity_minutes) else {
        return Vec::new();
    };
    let mut slots = BTreeSet::new();

    for window in windows {
        if window.end_time - window.start_time < step {
            continue;
        }

        let mut current = window.start_time;
        while current < window.end_time {
            slots.insert(current);

            let (next, wrapped) = current.overflowing_add_signed(step);
            if wrapped != 0 {
                break;
            }
            current = next;
        }
    }

    slots.into_iter().collect()
}

pub fn format_slots<'a>(slots: impl IntoIterator<Item = &'a NaiveTime>) -> Vec<String> {
    slots
        .into_iter()
        .map(|slot| slot.format("%H:%M").to_string())
        .collect()
}
