use std::fmt::Write;
use std::path::Path;

use chrono::NaiveDate;

use crate::models::{EnrollmentView, InternProgress, Task};
use crate::stats;

pub fn build_report(
    today: NaiveDate,
    enrollments: &[EnrollmentView],
    tasks: &[Task],
    interns: &[InternProgress],
) -> String {
    let enrollment_stats = stats::enrollment_stats(enrollments, today);
    let task_stats = stats::task_stats(tasks);

    let mut output = String::new();

    let _ = writeln!(output, "# Enrollment Dashboard Report");
    let _ = writeln!(output, "Generated on {today}");
    let _ = writeln!(output);
    let _ = writeln!(output, "## Enrollments");
    let _ = writeln!(output, "- Total: {}", enrollment_stats.total);
    let _ = writeln!(
        output,
        "- Revenue (approved payments): {:.2} across {} payments",
        enrollment_stats.revenue, enrollment_stats.paid_count
    );
    let _ = writeln!(
        output,
        "- Month-over-month growth: {:.1}%",
        enrollment_stats.growth_percent
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Application Status");

    if enrollment_stats.by_status.is_empty() {
        let _ = writeln!(output, "No enrollments recorded.");
    } else {
        for (status, count) in &enrollment_stats.by_status {
            let _ = writeln!(output, "- {status}: {count}");
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Tasks");
    let _ = writeln!(
        output,
        "- {} tasks, {:.1}% completed",
        task_stats.total, task_stats.completion_rate
    );
    for (status, count) in &task_stats.by_status {
        let _ = writeln!(output, "- {status}: {count}");
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Intern Progress");

    let mut ranked: Vec<&InternProgress> = interns.iter().collect();
    ranked.sort_by(|a, b| {
        b.completion_rate
            .partial_cmp(&a.completion_rate)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    if ranked.is_empty() {
        let _ = writeln!(output, "No interns registered.");
    } else {
        for intern in ranked.iter().take(10) {
            let _ = writeln!(
                output,
                "- {} ({}) {}/{} tasks, {:.0}% complete",
                intern.name,
                intern.email,
                intern.completed_tasks,
                intern.total_tasks,
                intern.completion_rate
            );
        }
    }

    let mut recent: Vec<(chrono::NaiveDateTime, &EnrollmentView)> = enrollments
        .iter()
        .filter_map(|view| stats::parse_timestamp(&view.timestamp).map(|stamp| (stamp, view)))
        .collect();
    recent.sort_by(|a, b| b.0.cmp(&a.0));

    let _ = writeln!(output);
    let _ = writeln!(output, "## Recent Enrollments");

    if recent.is_empty() {
        let _ = writeln!(output, "No dated enrollments.");
    } else {
        for (stamp, view) in recent.iter().take(5) {
            let _ = writeln!(
                output,
                "- {} ({}, {}) on {}: payment {}",
                view.name,
                view.email,
                view.track,
                stamp.date(),
                view.payment_status
            );
        }
    }

    output
}

pub fn export_csv(path: &Path, views: &[&EnrollmentView]) -> anyhow::Result<usize> {
    let mut writer = csv::Writer::from_path(path)?;
    for view in views {
        writer.serialize(view)?;
    }
    writer.flush()?;
    Ok(views.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Priority, TaskStatus};

    fn view(
        name: &str,
        status: &str,
        payment_status: &str,
        amount: f64,
        timestamp: &str,
    ) -> EnrollmentView {
        EnrollmentView {
            email: format!("{}@example.com", name.to_lowercase()),
            name: name.to_string(),
            phone: String::new(),
            college: "Riverside College".to_string(),
            track: "Data Science".to_string(),
            status: status.to_string(),
            timestamp: timestamp.to_string(),
            payment_status: payment_status.to_string(),
            amount,
            transaction_id: "N/A".to_string(),
        }
    }

    #[test]
    fn report_lists_revenue_and_recent_enrollments() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 15).expect("date");
        let enrollments = vec![
            view("Avery", "Approved", "Approved", 100.0, "2026-03-02"),
            view("Jules", "Pending", "Pending", 50.0, "2026-02-10"),
            view("Kiara", "Approved", "Approved", 25.0, ""),
        ];
        let tasks = vec![Task {
            id: "1".to_string(),
            email: "avery@example.com".to_string(),
            title: "Essay review".to_string(),
            category: "General".to_string(),
            priority: Priority::Medium,
            status: TaskStatus::Completed,
            deadline: String::new(),
        }];

        let report = build_report(today, &enrollments, &tasks, &[]);
        assert!(report.contains("Revenue (approved payments): 125.00 across 2 payments"));
        assert!(report.contains("- Approved: 2"));
        assert!(report.contains("1 tasks, 100.0% completed"));
        assert!(report.contains("No interns registered."));
        let avery = report.find("- Avery").expect("avery listed");
        let jules = report.find("- Jules").expect("jules listed");
        assert!(avery < jules);
        assert!(!report.contains("- Kiara"));
    }

    #[test]
    fn empty_report_has_placeholders() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 15).expect("date");
        let report = build_report(today, &[], &[], &[]);
        assert!(report.contains("No enrollments recorded."));
        assert!(report.contains("No dated enrollments."));
        assert!(report.contains("Month-over-month growth: 0.0%"));
    }

    #[test]
    fn csv_export_writes_header_and_rows() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("enrollments.csv");
        let rows = [view("Avery", "Approved", "Approved", 100.0, "2026-03-02")];
        let refs: Vec<&EnrollmentView> = rows.iter().collect();

        assert_eq!(export_csv(&path, &refs).expect("export"), 1);
        let contents = std::fs::read_to_string(&path).expect("read");
        let mut lines = contents.lines();
        assert!(lines.next().expect("header").starts_with("email,name,phone"));
        assert!(lines.next().expect("row").starts_with("avery@example.com,Avery"));
    }
}
