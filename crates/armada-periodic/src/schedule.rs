use std::str::FromStr;

use armada_core::types::{PeriodicConfig, PeriodicSpec};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::error::{PeriodicError, Result};

/// Compute the next launch of `periodic` strictly *after* `after`.
///
/// Returns `Ok(None)` when the schedule has no future instant (e.g. every
/// literal instant has passed). Cron expressions are evaluated in the job's
/// time zone, or `default_tz` when the job declares none.
pub fn next_launch(
    periodic: &PeriodicConfig,
    after: DateTime<Utc>,
    default_tz: Tz,
) -> Result<Option<DateTime<Utc>>> {
    let tz = match periodic.time_zone.as_deref() {
        Some(name) => parse_time_zone(name)?,
        None => default_tz,
    };

    match &periodic.spec {
        PeriodicSpec::Cron { expressions } => next_cron(expressions, after, tz),
        PeriodicSpec::Literal { instants } => next_literal(instants, after),
    }
}

/// Resolve an IANA zone name such as `"Europe/Oslo"`.
pub fn parse_time_zone(name: &str) -> Result<Tz> {
    Tz::from_str(name)
        .map_err(|_| PeriodicError::InvalidSchedule(format!("unknown time zone {name:?}")))
}

fn next_cron(expressions: &[String], after: DateTime<Utc>, tz: Tz) -> Result<Option<DateTime<Utc>>> {
    if expressions.is_empty() {
        return Err(PeriodicError::InvalidSchedule(
            "cron schedule has no expressions".to_string(),
        ));
    }

    let local = after.with_timezone(&tz);
    let mut earliest: Option<DateTime<Utc>> = None;
    for expr in expressions {
        for schedule in parse_cron(expr)? {
            if let Some(next) = schedule.after(&local).next() {
                let next = next.with_timezone(&Utc);
                earliest = Some(earliest.map_or(next, |e| e.min(next)));
            }
        }
    }
    Ok(earliest)
}

/// Parse one expression into the schedules whose union it denotes.
fn parse_cron(expr: &str) -> Result<Vec<cron::Schedule>> {
    let invalid = |reason: String| {
        PeriodicError::InvalidSchedule(format!("failed parsing cron expression {expr:?}: {reason}"))
    };
    normalize_cron(expr)
        .map_err(invalid)?
        .iter()
        .map(|normalized| cron::Schedule::from_str(normalized).map_err(|e| invalid(e.to_string())))
        .collect()
}

/// Rewrite a standard cron expression into the seconds-first dialect the
/// `cron` crate parses.
///
/// 5 fields (minute..day-of-week) and 6 fields (+ year) get a `0` seconds
/// field prepended; 7 fields already start with seconds. Day-of-week numbers
/// are shifted from 0-7 (0 and 7 = Sunday) to 1-7 (1 = Sunday).
///
/// The `cron` crate requires day-of-month AND day-of-week to match, while
/// standard cron fires when either matches if both are restricted. Such an
/// expression is split in two, one per day field, and the caller takes the
/// earlier match.
fn normalize_cron(expr: &str) -> std::result::Result<Vec<String>, String> {
    let expr = expr.trim();
    if expr.starts_with('@') {
        return Ok(vec![expr.to_string()]);
    }

    let fields: Vec<&str> = expr.split_whitespace().collect();
    let (seconds, rest) = match fields.len() {
        5 | 6 => ("0", &fields[..]),
        7 => (fields[0], &fields[1..]),
        n => return Err(format!("expected 5 to 7 fields, found {n}")),
    };

    // rest = minute hour day-of-month month day-of-week [year]
    let mut out: Vec<String> = Vec::with_capacity(rest.len() + 1);
    out.push(seconds.to_string());
    out.extend(rest.iter().map(|field| field.to_string()));
    out[5] = translate_day_of_week(rest[4])?;

    if is_restricted(&out[3]) && is_restricted(&out[5]) {
        let mut by_month_day = out.clone();
        by_month_day[5] = "*".to_string();
        let mut by_week_day = out;
        by_week_day[3] = "*".to_string();
        return Ok(vec![by_month_day.join(" "), by_week_day.join(" ")]);
    }
    Ok(vec![out.join(" ")])
}

fn is_restricted(field: &str) -> bool {
    !matches!(field, "*" | "?")
}

fn translate_day_of_week(field: &str) -> std::result::Result<String, String> {
    let mut items = Vec::new();
    for item in field.split(',') {
        if let Some((range, step)) = item.split_once('/') {
            match expand_stepped_days(range, step)? {
                Some(days) => items.extend(days),
                None => items.push(item.to_string()),
            }
            continue;
        }

        match item.split_once('-') {
            Some((start, end)) => {
                let wraps_to_sunday = end == "7" && start != "0";
                let end = if end == "7" {
                    "7".to_string()
                } else {
                    shift_day(end)?
                };
                items.push(format!("{}-{end}", shift_day(start)?));
                if wraps_to_sunday {
                    items.push("1".to_string());
                }
            }
            None => items.push(shift_day(item)?),
        }
    }
    Ok(items.join(","))
}

/// Expand a stepped day-of-week item (`*/2`, `3-7/2`, `1/3`) into explicit
/// days, so a step landing on 7 still means Sunday. `None` for day names,
/// which the crate steps over itself.
fn expand_stepped_days(range: &str, step: &str) -> std::result::Result<Option<Vec<String>>, String> {
    let step: usize = step
        .parse()
        .ok()
        .filter(|&s| s > 0)
        .ok_or_else(|| format!("invalid day-of-week step {step:?}"))?;

    let bounds: Option<(u8, u8)> = match range {
        "*" | "?" => Some((0, 6)),
        _ => match range.split_once('-') {
            Some((start, end)) => start.parse().ok().zip(end.parse().ok()),
            None => range.parse().ok().map(|start: u8| (start, start.max(6))),
        },
    };
    let Some((start, end)) = bounds else {
        return Ok(None);
    };
    if start > end {
        return Err(format!("day-of-week range {range:?} is reversed"));
    }

    let mut days: Vec<String> = Vec::new();
    for day in (start..=end).step_by(step) {
        let day = shift_day(&day.to_string())?;
        if !days.contains(&day) {
            days.push(day);
        }
    }
    Ok(Some(days))
}

/// 0-7 with Sunday as 0 or 7 -> 1-7 with Sunday as 1. Names and wildcards pass through.
fn shift_day(day: &str) -> std::result::Result<String, String> {
    let Ok(n) = day.parse::<u8>() else {
        return Ok(day.to_string());
    };
    match n {
        0 | 7 => Ok("1".to_string()),
        1..=6 => Ok((n + 1).to_string()),
        _ => Err(format!("day-of-week {n} out of range 0-7")),
    }
}

fn next_literal(instants: &str, after: DateTime<Utc>) -> Result<Option<DateTime<Utc>>> {
    let mut earliest: Option<DateTime<Utc>> = None;
    for raw in instants.split(',') {
        let raw = raw.trim();
        let secs: i64 = raw.parse().map_err(|_| {
            PeriodicError::InvalidSchedule(format!("invalid literal launch instant {raw:?}"))
        })?;
        let instant = DateTime::from_timestamp(secs, 0).ok_or_else(|| {
            PeriodicError::InvalidSchedule(format!("literal launch instant {secs} out of range"))
        })?;
        if instant > after {
            earliest = Some(earliest.map_or(instant, |e| e.min(instant)));
        }
    }
    Ok(earliest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    fn cron(exprs: &[&str]) -> PeriodicConfig {
        PeriodicConfig::new(PeriodicSpec::Cron {
            expressions: exprs.iter().map(|e| e.to_string()).collect(),
        })
    }

    fn literal(instants: &str) -> PeriodicConfig {
        PeriodicConfig::new(PeriodicSpec::Literal {
            instants: instants.to_string(),
        })
    }

    fn next(periodic: &PeriodicConfig, after: DateTime<Utc>) -> Result<Option<DateTime<Utc>>> {
        next_launch(periodic, after, Tz::UTC)
    }

    #[test]
    fn five_field_cron() {
        let got = next(&cron(&["*/15 * * * *"]), utc(2024, 3, 5, 12, 7, 30)).unwrap();
        assert_eq!(got, Some(utc(2024, 3, 5, 12, 15, 0)));
    }

    #[test]
    fn cron_is_strictly_after_reference() {
        let got = next(&cron(&["*/15 * * * *"]), utc(2024, 3, 5, 12, 15, 0)).unwrap();
        assert_eq!(got, Some(utc(2024, 3, 5, 12, 30, 0)));
    }

    #[test]
    fn cron_in_job_time_zone() {
        let mut periodic = cron(&["0 9 * * *"]);
        periodic.time_zone = Some("America/New_York".to_string());
        // 09:00 EST is 14:00 UTC.
        let got = next(&periodic, utc(2024, 1, 10, 0, 0, 0)).unwrap();
        assert_eq!(got, Some(utc(2024, 1, 10, 14, 0, 0)));
    }

    #[test]
    fn cron_falls_back_to_default_time_zone() {
        let tz = parse_time_zone("Asia/Tokyo").unwrap();
        // 08:00 JST is 23:00 UTC the day before.
        let got = next_launch(&cron(&["0 8 * * *"]), utc(2024, 1, 10, 0, 0, 0), tz).unwrap();
        assert_eq!(got, Some(utc(2024, 1, 10, 23, 0, 0)));
    }

    #[test]
    fn day_of_week_uses_standard_numbering() {
        // 2024-03-04 is a Monday.
        let sunday = next(&cron(&["30 6 * * 0"]), utc(2024, 3, 4, 0, 0, 0)).unwrap();
        assert_eq!(sunday, Some(utc(2024, 3, 10, 6, 30, 0)));

        let weekday = next(&cron(&["0 0 * * 1-5"]), utc(2024, 3, 9, 12, 0, 0)).unwrap();
        assert_eq!(weekday, Some(utc(2024, 3, 11, 0, 0, 0)));

        let weekend = next(&cron(&["0 0 * * 5-7"]), utc(2024, 3, 9, 12, 0, 0)).unwrap();
        assert_eq!(weekend, Some(utc(2024, 3, 10, 0, 0, 0)));
    }

    #[test]
    fn month_day_or_week_day_fires_on_either() {
        // "the 1st, or any Monday": 2024-03-05 is a Tuesday.
        let periodic = cron(&["0 0 1 * 1"]);
        assert_eq!(
            next(&periodic, utc(2024, 3, 5, 0, 0, 0)).unwrap(),
            Some(utc(2024, 3, 11, 0, 0, 0))
        );
        // 2024-03-30 is a Saturday; April 1st is a Monday, fired once.
        assert_eq!(
            next(&periodic, utc(2024, 3, 30, 0, 0, 0)).unwrap(),
            Some(utc(2024, 4, 1, 0, 0, 0))
        );
        // 2024-05-31 is a Friday; June 1st (Saturday) comes before Monday.
        assert_eq!(
            next(&periodic, utc(2024, 5, 31, 0, 0, 0)).unwrap(),
            Some(utc(2024, 6, 1, 0, 0, 0))
        );
    }

    #[test]
    fn only_one_day_field_restricted_still_intersects() {
        // Day-of-week wildcard: only the 15th.
        assert_eq!(
            next(&cron(&["0 0 15 * *"]), utc(2024, 3, 5, 0, 0, 0)).unwrap(),
            Some(utc(2024, 3, 15, 0, 0, 0))
        );
    }

    #[test]
    fn stepped_day_of_week_keeps_sunday() {
        // 3-7/2 is Wed, Fri, Sun; 2024-03-09 is a Saturday.
        let periodic = cron(&["0 0 * * 3-7/2"]);
        assert_eq!(
            next(&periodic, utc(2024, 3, 9, 0, 0, 0)).unwrap(),
            Some(utc(2024, 3, 10, 0, 0, 0))
        );
        assert_eq!(
            next(&periodic, utc(2024, 3, 10, 0, 0, 0)).unwrap(),
            Some(utc(2024, 3, 13, 0, 0, 0))
        );

        // */2 is Sun, Tue, Thu, Sat; 2024-03-04 is a Monday.
        assert_eq!(
            next(&cron(&["0 0 * * */2"]), utc(2024, 3, 4, 0, 0, 0)).unwrap(),
            Some(utc(2024, 3, 5, 0, 0, 0))
        );
    }

    #[test]
    fn normalized_forms() {
        assert_eq!(normalize_cron("*/5 * * * *").unwrap(), vec!["0 */5 * * * *"]);
        assert_eq!(normalize_cron("0 0 * * 3-7/2").unwrap(), vec!["0 0 0 * * 4,6,1"]);
        assert_eq!(
            normalize_cron("0 0 1 * 1").unwrap(),
            vec!["0 0 0 1 * *", "0 0 0 * * 2"]
        );
        assert!(normalize_cron("0 0 * * */0").is_err());
    }

    #[test]
    fn earliest_of_several_expressions() {
        let periodic = cron(&["0 12 * * *", "0 6 * * *"]);
        assert_eq!(
            next(&periodic, utc(2024, 3, 5, 7, 0, 0)).unwrap(),
            Some(utc(2024, 3, 5, 12, 0, 0))
        );
        assert_eq!(
            next(&periodic, utc(2024, 3, 5, 13, 0, 0)).unwrap(),
            Some(utc(2024, 3, 6, 6, 0, 0))
        );
    }

    #[test]
    fn predefined_and_long_forms() {
        assert_eq!(
            next(&cron(&["@hourly"]), utc(2024, 3, 5, 12, 7, 0)).unwrap(),
            Some(utc(2024, 3, 5, 13, 0, 0))
        );
        assert_eq!(
            next(&cron(&["30 0 12 * * * *"]), utc(2024, 3, 5, 7, 0, 0)).unwrap(),
            Some(utc(2024, 3, 5, 12, 0, 30))
        );
        assert_eq!(
            next(&cron(&["0 12 * * * 2030"]), utc(2024, 3, 5, 7, 0, 0)).unwrap(),
            Some(utc(2030, 1, 1, 12, 0, 0))
        );
    }

    #[test]
    fn cron_with_only_past_years_never_fires() {
        let got = next(&cron(&["0 12 * * * 2020"]), utc(2024, 3, 5, 7, 0, 0)).unwrap();
        assert_eq!(got, None);
    }

    #[test]
    fn malformed_cron_is_rejected() {
        let err = next(&cron(&["foo"]), Utc::now()).unwrap_err();
        assert!(err.to_string().contains("failed parsing cron expression"));

        let err = next(&cron(&["0 0 * * 9"]), Utc::now()).unwrap_err();
        assert!(matches!(err, PeriodicError::InvalidSchedule(_)));

        assert!(next(&cron(&[]), Utc::now()).is_err());
    }

    #[test]
    fn unknown_time_zone_is_rejected() {
        let mut periodic = cron(&["@daily"]);
        periodic.time_zone = Some("Mars/Olympus_Mons".to_string());
        assert!(matches!(
            next(&periodic, Utc::now()),
            Err(PeriodicError::InvalidSchedule(_))
        ));
    }

    #[test]
    fn literal_picks_smallest_future_instant() {
        let periodic = literal("300,100,200");
        assert_eq!(
            next(&periodic, utc(1970, 1, 1, 0, 0, 0)).unwrap(),
            DateTime::from_timestamp(100, 0)
        );
        assert_eq!(
            next(&periodic, DateTime::from_timestamp(100, 0).unwrap()).unwrap(),
            DateTime::from_timestamp(200, 0)
        );
        assert_eq!(
            next(&periodic, DateTime::from_timestamp(300, 0).unwrap()).unwrap(),
            None
        );
    }

    #[test]
    fn malformed_literal_is_rejected() {
        assert!(next(&literal("12,abc"), Utc::now()).is_err());
        assert!(next(&literal(""), Utc::now()).is_err());
    }

    #[test]
    fn evaluation_is_deterministic() {
        let periodic = cron(&["17 */3 * * *"]);
        let after = utc(2024, 6, 1, 1, 0, 0);
        assert_eq!(next(&periodic, after).unwrap(), next(&periodic, after).unwrap());
    }
}
