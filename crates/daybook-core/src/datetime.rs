use std::fs;
use std::path::PathBuf;
use std::sync::OnceLock;

use anyhow::{Context, anyhow};
use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Utc, Weekday};
use chrono::Datelike;
use chrono_tz::Tz;
use regex::Regex;
use serde::Deserialize;

const TIMEZONE_CONFIG_FILE: &str = "daybook-time.toml";
const TIMEZONE_ENV_VAR: &str = "DAYBOOK_TIMEZONE";
const TIMEZONE_CONFIG_ENV_VAR: &str = "DAYBOOK_TIME_CONFIG";

#[derive(Debug, Deserialize)]
struct TimezoneConfig {
    timezone: Option<String>,
    time: Option<TimezoneSection>,
}

#[derive(Debug, Deserialize)]
struct TimezoneSection {
    timezone: Option<String>,
}

/// The zone every calendar-day boundary in the app is computed in.
/// Resolved once: env var, then config file, then UTC.
pub fn project_timezone() -> &'static Tz {
    static PROJECT_TZ: OnceLock<Tz> = OnceLock::new();
    PROJECT_TZ.get_or_init(resolve_project_timezone)
}

/// Collapses an instant to its calendar day in `tz`, discarding time-of-day.
/// Two instants compare equal under this iff they fall on the same local day.
#[must_use]
pub fn date_key(dt: DateTime<Utc>, tz: &Tz) -> NaiveDate {
    dt.with_timezone(tz).date_naive()
}

/// The stable `YYYY-MM-DD` form persisted inside completed-day sets.
/// Must match everywhere; this is the only place that formats it.
#[must_use]
pub fn date_key_string(day: NaiveDate) -> String {
    day.format("%Y-%m-%d").to_string()
}

/// Signed whole-day distance `b - a` in calendar days. Both sides are already
/// day-granular, so DST shifts cannot skew the count.
#[must_use]
pub fn days_between(a: NaiveDate, b: NaiveDate) -> i64 {
    (b - a).num_days()
}

/// Inclusive day count of a `[start, end]` span, never below 1.
#[must_use]
pub fn span_days(start: NaiveDate, end: NaiveDate) -> i64 {
    (days_between(start, end) + 1).max(1)
}

fn resolve_project_timezone() -> Tz {
    if let Ok(raw) = std::env::var(TIMEZONE_ENV_VAR) {
        if let Some(tz) = parse_timezone(&raw, TIMEZONE_ENV_VAR) {
            return tz;
        }
    }

    if let Some(path) = timezone_config_path()
        && let Some(tz) = load_timezone_from_file(&path)
    {
        return tz;
    }

    tracing::info!("no timezone configured; using UTC");
    chrono_tz::UTC
}

fn timezone_config_path() -> Option<PathBuf> {
    if let Ok(raw) = std::env::var(TIMEZONE_CONFIG_ENV_VAR) {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }

    std::env::current_dir()
        .ok()
        .map(|dir| dir.join(TIMEZONE_CONFIG_FILE))
}

fn load_timezone_from_file(path: &PathBuf) -> Option<Tz> {
    if !path.exists() {
        tracing::debug!(file = %path.display(), "timezone config file not found");
        return None;
    }

    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) => {
            tracing::error!(
                file = %path.display(),
                error = %err,
                "failed reading timezone config file"
            );
            return None;
        }
    };

    let parsed = match toml::from_str::<TimezoneConfig>(&raw) {
        Ok(parsed) => parsed,
        Err(err) => {
            tracing::error!(
                file = %path.display(),
                error = %err,
                "failed parsing timezone config file"
            );
            return None;
        }
    };

    let timezone = parsed
        .timezone
        .or_else(|| parsed.time.and_then(|section| section.timezone));
    let Some(timezone) = timezone else {
        tracing::warn!(file = %path.display(), "timezone config had no timezone field");
        return None;
    };

    parse_timezone(timezone.as_str(), &format!("file:{}", path.display()))
}

fn parse_timezone(raw: &str, source: &str) -> Option<Tz> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        tracing::warn!(source, "timezone source was empty");
        return None;
    }

    match trimmed.parse::<Tz>() {
        Ok(tz) => {
            tracing::info!(source, timezone = %trimmed, "configured project timezone");
            Some(tz)
        }
        Err(err) => {
            tracing::error!(
                source,
                timezone = %trimmed,
                error = %err,
                "failed to parse timezone id"
            );
            None
        }
    }
}

fn to_utc_from_local(tz: &Tz, local_naive: NaiveDateTime, context: &str) -> anyhow::Result<DateTime<Utc>> {
    match tz.from_local_datetime(&local_naive) {
        LocalResult::Single(local_dt) => Ok(local_dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(first, second) => {
            tracing::warn!(
                context,
                first = %first,
                second = %second,
                "ambiguous local datetime; using earliest"
            );
            let chosen = if first <= second { first } else { second };
            Ok(chosen.with_timezone(&Utc))
        }
        LocalResult::None => Err(anyhow!(
            "local datetime does not exist in configured timezone: {context}"
        )),
    }
}

/// The UTC instant at local midnight of `day` in `tz`. Spring-forward days
/// where 00:00 does not exist fall forward to the earliest valid instant.
pub fn day_start(day: NaiveDate, tz: &Tz) -> anyhow::Result<DateTime<Utc>> {
    let midnight = day
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| anyhow!("failed to construct midnight for {day}"))?;
    match tz.from_local_datetime(&midnight) {
        LocalResult::Single(dt) => Ok(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(first, _) => Ok(first.with_timezone(&Utc)),
        LocalResult::None => {
            // 00:00 skipped by DST; try 01:00 which still keys to the same day
            let one = day
                .and_hms_opt(1, 0, 0)
                .ok_or_else(|| anyhow!("failed to construct 01:00 for {day}"))?;
            to_utc_from_local(tz, one, "day-start-dst")
        }
    }
}

#[tracing::instrument(skip(now), fields(input = input))]
pub fn parse_date_expr(input: &str, now: DateTime<Utc>) -> anyhow::Result<DateTime<Utc>> {
    let tz = project_timezone();
    let token = input.trim();
    let lower = token.to_ascii_lowercase();

    match lower.as_str() {
        "now" => return Ok(now),
        "today" => {
            let date = date_key(now, tz);
            return day_start(date, tz);
        }
        "tomorrow" => {
            let today = parse_date_expr("today", now)?;
            return Ok(today + Duration::days(1));
        }
        "yesterday" => {
            let today = parse_date_expr("today", now)?;
            return Ok(today - Duration::days(1));
        }
        _ => {}
    }

    if let Some(target_weekday) = parse_weekday_name(&lower) {
        let local_today = date_key(now, tz);
        let target_date = next_weekday_date(local_today, target_weekday);
        return day_start(target_date, tz);
    }

    let rel_re = Regex::new(r"^(?P<sign>[+-])(?P<num>\d+)(?P<unit>[dhm])$")
        .map_err(|e| anyhow!("internal regex compile failure: {e}"))?;

    if let Some(caps) = rel_re.captures(token) {
        let sign = caps
            .name("sign")
            .map(|m| m.as_str())
            .ok_or_else(|| anyhow!("missing relative sign"))?;
        let num: i64 = caps
            .name("num")
            .map(|m| m.as_str())
            .ok_or_else(|| anyhow!("missing relative amount"))?
            .parse()
            .context("invalid relative number")?;
        let unit = caps
            .name("unit")
            .map(|m| m.as_str())
            .ok_or_else(|| anyhow!("missing relative unit"))?;

        let duration = match unit {
            "d" => Duration::days(num),
            "h" => Duration::hours(num),
            "m" => Duration::minutes(num),
            _ => return Err(anyhow!("unknown relative unit: {unit}")),
        };

        return Ok(if sign == "-" { now - duration } else { now + duration });
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(token) {
        return Ok(dt.with_timezone(&Utc));
    }

    if let Ok(ndt) = NaiveDateTime::parse_from_str(token, "%Y%m%dT%H%M%SZ") {
        return Ok(DateTime::<Utc>::from_naive_utc_and_offset(ndt, Utc));
    }

    if let Ok(date) = NaiveDate::parse_from_str(token, "%Y-%m-%d") {
        return day_start(date, tz);
    }

    for fmt in ["%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"] {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(token, fmt) {
            return to_utc_from_local(tz, ndt, fmt);
        }
    }

    Err(anyhow!("unrecognized date expression: {input}")).with_context(|| {
        "supported formats: now/today/tomorrow/yesterday, weekday names (e.g. monday), \
         +Nd/+Nh/+Nm, RFC3339, YYYY-MM-DD, YYYY-MM-DDTHH:MM, YYYY-MM-DD HH:MM, \
         YYYYMMDDTHHMMSSZ"
    })
}

/// `parse_date_expr` narrowed to a calendar day in the project zone.
pub fn parse_day_expr(input: &str, now: DateTime<Utc>) -> anyhow::Result<NaiveDate> {
    let instant = parse_date_expr(input, now)?;
    Ok(date_key(instant, project_timezone()))
}

fn parse_weekday_name(token: &str) -> Option<Weekday> {
    match token.trim() {
        "monday" | "mon" => Some(Weekday::Mon),
        "tuesday" | "tue" | "tues" => Some(Weekday::Tue),
        "wednesday" | "wed" => Some(Weekday::Wed),
        "thursday" | "thu" | "thur" | "thurs" => Some(Weekday::Thu),
        "friday" | "fri" => Some(Weekday::Fri),
        "saturday" | "sat" => Some(Weekday::Sat),
        "sunday" | "sun" => Some(Weekday::Sun),
        _ => None,
    }
}

fn next_weekday_date(from: NaiveDate, target: Weekday) -> NaiveDate {
    let from_idx = from.weekday().num_days_from_monday() as i64;
    let target_idx = target.num_days_from_monday() as i64;
    let mut delta = (7 + target_idx - from_idx) % 7;
    if delta == 0 {
        delta = 7;
    }
    from.checked_add_signed(Duration::days(delta)).unwrap_or(from)
}

pub mod store_date_serde {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&dt.format("%Y%m%dT%H%M%SZ").to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&raw, "%Y%m%dT%H%M%SZ")
            .map(|ndt| DateTime::<Utc>::from_naive_utc_and_offset(ndt, Utc))
            .map_err(serde::de::Error::custom)
    }

    pub mod option {
        use chrono::{DateTime, NaiveDateTime, Utc};
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S>(dt: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match dt {
                Some(value) => super::serialize(value, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
        where
            D: Deserializer<'de>,
        {
            let opt = Option::<String>::deserialize(deserializer)?;
            match opt {
                Some(raw) => NaiveDateTime::parse_from_str(&raw, "%Y%m%dT%H%M%SZ")
                    .map(|ndt| Some(DateTime::<Utc>::from_naive_utc_and_offset(ndt, Utc)))
                    .map_err(serde::de::Error::custom),
                None => Ok(None),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};
    use chrono_tz::America::Mexico_City;
    use chrono_tz::UTC;

    use super::{date_key, date_key_string, days_between, parse_date_expr, span_days};

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn date_key_discards_time_of_day() {
        let morning = Utc.with_ymd_and_hms(2024, 6, 2, 8, 0, 0).single().expect("valid");
        let late = Utc.with_ymd_and_hms(2024, 6, 2, 23, 59, 59).single().expect("valid");
        assert_eq!(date_key(morning, &UTC), date_key(late, &UTC));
        assert_eq!(date_key(morning, &UTC), day(2024, 6, 2));
    }

    #[test]
    fn date_key_follows_zone_day_boundary() {
        // 03:00 UTC is still the previous evening in Mexico City (UTC-6)
        let instant = Utc.with_ymd_and_hms(2024, 6, 2, 3, 0, 0).single().expect("valid");
        assert_eq!(date_key(instant, &UTC), day(2024, 6, 2));
        assert_eq!(date_key(instant, &Mexico_City), day(2024, 6, 1));
    }

    #[test]
    fn date_key_string_is_zero_padded() {
        assert_eq!(date_key_string(day(2024, 6, 2)), "2024-06-02");
        assert_eq!(date_key_string(day(999, 1, 9)), "0999-01-09");
    }

    #[test]
    fn day_arithmetic_is_calendar_based() {
        assert_eq!(days_between(day(2024, 6, 1), day(2024, 6, 3)), 2);
        assert_eq!(days_between(day(2024, 6, 3), day(2024, 6, 1)), -2);
        assert_eq!(span_days(day(2024, 6, 1), day(2024, 6, 3)), 3);
        assert_eq!(span_days(day(2024, 6, 1), day(2024, 6, 1)), 1);
        // US spring-forward weekend: still exactly 3 calendar days
        assert_eq!(span_days(day(2024, 3, 9), day(2024, 3, 11)), 3);
    }

    #[test]
    fn parses_plain_date() {
        let now = Utc.with_ymd_and_hms(2024, 6, 2, 12, 0, 0).single().expect("valid");
        let parsed = parse_date_expr("2024-06-05", now).expect("parse date");
        assert_eq!(date_key(parsed, super::project_timezone()), day(2024, 6, 5));
    }

    #[test]
    fn parses_relative_days() {
        let now = Utc.with_ymd_and_hms(2024, 6, 2, 12, 0, 0).single().expect("valid");
        let parsed = parse_date_expr("+3d", now).expect("parse relative");
        assert_eq!(parsed - now, chrono::Duration::days(3));
    }

    #[test]
    fn rejects_garbage() {
        let now = Utc.with_ymd_and_hms(2024, 6, 2, 12, 0, 0).single().expect("valid");
        assert!(parse_date_expr("06/02/2024ish", now).is_err());
    }
}
