use chrono::format::StrftimeItems;
use chrono::NaiveDateTime;

/// unix_to_time converts a split unix timestamp to a NaiveDateTime.
pub fn unix_to_time(seconds: i64, nanoseconds: i32) -> NaiveDateTime {
    NaiveDateTime::from_timestamp_opt(seconds, nanoseconds as u32).unwrap_or(NaiveDateTime::MIN)
}

pub fn time_format(dt: NaiveDateTime) -> String {
    let fmt = StrftimeItems::new("%Y-%m-%d %H:%M:%S%.3f");
    format!("{}", dt.format_with_items(fmt))
}
