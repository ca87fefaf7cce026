use chrono::Utc;

pub const MS_PER_DAY: i64 = 86_400_000;

pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}
