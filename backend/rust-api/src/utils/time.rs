use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use mongodb::bson::DateTime as BsonDateTime;

pub fn chrono_to_bson(dt: DateTime<Utc>) -> BsonDateTime {
    BsonDateTime::from_millis(dt.timestamp_millis())
}

/// Calendar date of `now` in the play-date timezone.
pub fn play_date(now: DateTime<Utc>, timezone: Tz) -> NaiveDate {
    now.with_timezone(&timezone).date_naive()
}

/// `YYYY-MM-DD`, the key format used for daily questions, scores and leaderboards.
pub fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}
