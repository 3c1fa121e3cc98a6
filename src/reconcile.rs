use std::collections::HashMap;

use crate::models::{
    EnrollmentView, InternProgress, Payment, Student, Task, TaskStatus, User, NOT_AVAILABLE,
    PENDING,
};
use crate::normalize::normalize_key;
use crate::stats;

/// Joins `primary` with `secondary` on normalized keys.
///
/// Produces exactly one output per primary record, in primary order. When
/// several secondary records share a key, the last one wins. A primary
/// record with no match is merged with `None` and the merge function fills
/// in its fallbacks.
pub fn reconcile<A, B, M>(
    primary: &[A],
    secondary: &[B],
    primary_key: impl Fn(&A) -> &str,
    secondary_key: impl Fn(&B) -> &str,
    merge: impl Fn(&A, Option<&B>) -> M,
) -> Vec<M> {
    let mut index: HashMap<String, &B> = HashMap::with_capacity(secondary.len());
    for record in secondary {
        index.insert(normalize_key(secondary_key(record)), record);
    }

    primary
        .iter()
        .map(|record| {
            let matched = index.get(&normalize_key(primary_key(record))).copied();
            merge(record, matched)
        })
        .collect()
}

pub fn merge_enrollments(students: &[Student], payments: &[Payment]) -> Vec<EnrollmentView> {
    reconcile(
        students,
        payments,
        |student| student.email.as_str(),
        |payment| payment.email.as_str(),
        |student, payment| EnrollmentView {
            email: student.email.clone(),
            name: student.name.clone(),
            phone: student.phone.clone(),
            college: student.college.clone(),
            track: student.track.clone(),
            status: student.status.clone(),
            timestamp: student.timestamp.clone(),
            payment_status: payment.map_or_else(|| PENDING.to_string(), |p| p.status.clone()),
            amount: payment.map_or(0.0, |p| p.amount),
            transaction_id: payment
                .map_or_else(|| NOT_AVAILABLE.to_string(), |p| p.transaction_id.clone()),
        },
    )
}

#[derive(Debug, Clone, Default)]
struct TaskTally {
    email: String,
    total: usize,
    completed: usize,
}

pub fn merge_intern_progress(users: &[User], tasks: &[Task]) -> Vec<InternProgress> {
    let mut tallies: HashMap<String, TaskTally> = HashMap::new();
    for task in tasks {
        let key = normalize_key(&task.email);
        let tally = tallies.entry(key.clone()).or_insert_with(|| TaskTally {
            email: key,
            ..TaskTally::default()
        });
        tally.total += 1;
        if task.status == TaskStatus::Completed {
            tally.completed += 1;
        }
    }
    let tallies: Vec<TaskTally> = tallies.into_values().collect();

    reconcile(
        users,
        &tallies,
        |user| user.email.as_str(),
        |tally| tally.email.as_str(),
        |user, tally| {
            let (total, completed) = tally.map_or((0, 0), |t| (t.total, t.completed));
            InternProgress {
                email: user.email.clone(),
                name: user.name.clone(),
                role: user.role.clone(),
                status: user.status.clone(),
                total_tasks: total,
                completed_tasks: completed,
                completion_rate: stats::completion_rate(completed, total),
            }
        },
    )
}
