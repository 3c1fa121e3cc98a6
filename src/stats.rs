use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Months, NaiveDate, NaiveDateTime};

use crate::models::{EnrollmentStats, EnrollmentView, Task, TaskStats, TaskStatus, APPROVED};

pub fn count_by_status<T>(records: &[T], status: impl Fn(&T) -> &str) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for record in records {
        *counts.entry(status(record).trim().to_string()).or_insert(0) += 1;
    }
    counts
}

/// Sums `amount` over records whose status equals `wanted`, ignoring case.
pub fn sum_where_status<T>(
    records: &[T],
    status: impl Fn(&T) -> &str,
    amount: impl Fn(&T) -> f64,
    wanted: &str,
) -> f64 {
    records
        .iter()
        .filter(|record| status(*record).trim().eq_ignore_ascii_case(wanted))
        .map(amount)
        .sum()
}

/// Month-over-month growth in percent.
///
/// A month following an empty month counts as 100% growth when it has any
/// records, and 0% when it is empty too.
pub fn growth_percent(last_month: usize, this_month: usize) -> f64 {
    match (last_month, this_month) {
        (0, 0) => 0.0,
        (0, _) => 100.0,
        (last, this) => (this as f64 - last as f64) / last as f64 * 100.0,
    }
}

pub fn completion_rate(completed: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        completed as f64 / total as f64 * 100.0
    }
}

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%m/%d/%Y %H:%M:%S"];
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y"];

pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.naive_utc());
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

/// Growth of this calendar month over the previous one, relative to `today`.
///
/// Unparseable timestamps count in no month.
pub fn month_over_month<'a>(
    timestamps: impl IntoIterator<Item = &'a str>,
    today: NaiveDate,
) -> f64 {
    let previous = today.checked_sub_months(Months::new(1)).unwrap_or(today);
    let same_month = |date: NaiveDate, anchor: NaiveDate| {
        date.year() == anchor.year() && date.month() == anchor.month()
    };

    let mut this_month = 0;
    let mut last_month = 0;
    for date in timestamps
        .into_iter()
        .filter_map(parse_timestamp)
        .map(|stamp| stamp.date())
    {
        if same_month(date, today) {
            this_month += 1;
        } else if same_month(date, previous) {
            last_month += 1;
        }
    }

    growth_percent(last_month, this_month)
}

pub fn enrollment_stats(views: &[EnrollmentView], today: NaiveDate) -> EnrollmentStats {
    let paid_count = views
        .iter()
        .filter(|view| view.payment_status.trim().eq_ignore_ascii_case(APPROVED))
        .count();

    EnrollmentStats {
        total: views.len(),
        by_status: count_by_status(views, |view| view.status.as_str()),
        revenue: sum_where_status(
            views,
            |view| view.payment_status.as_str(),
            |view| view.amount,
            APPROVED,
        ),
        paid_count,
        growth_percent: month_over_month(views.iter().map(|view| view.timestamp.as_str()), today),
    }
}

pub fn task_stats(tasks: &[Task]) -> TaskStats {
    let completed = tasks
        .iter()
        .filter(|task| task.status == TaskStatus::Completed)
        .count();

    TaskStats {
        total: tasks.len(),
        by_status: count_by_status(tasks, |task| task.status.as_str()),
        completion_rate: completion_rate(completed, tasks.len()),
    }
}
