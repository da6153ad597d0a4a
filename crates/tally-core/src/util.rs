use std::time::{SystemTime, UNIX_EPOCH};

/// Seconds since the Unix epoch, as carried in the stats file and on every
/// per-user timestamp.
pub fn epoch_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Render an elapsed duration as `D days, H hours, M minutes, S seconds`.
pub fn seconds_to_dhms(elapsed: f64) -> String {
    let total = elapsed.max(0.0) as u64;

    let days = total / 86_400;
    let rem = total % 86_400;
    let hours = rem / 3_600;
    let rem = rem % 3_600;
    let minutes = rem / 60;
    let seconds = rem % 60;

    format!("{days} days, {hours} hours, {minutes} minutes, {seconds} seconds")
}

/// Uppercase the first letter of every whitespace-separated word.
pub fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
