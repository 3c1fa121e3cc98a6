use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::normalize::{CanonicalRecord, Entity, FieldSpec, Schema};

pub const APPROVED: &str = "Approved";
pub const PENDING: &str = "Pending";
pub const NOT_AVAILABLE: &str = "N/A";

#[derive(Debug, Clone, PartialEq)]
pub struct Student {
    pub email: String,
    pub name: String,
    pub phone: String,
    pub college: String,
    pub track: String,
    pub status: String,
    pub timestamp: String,
}

impl Entity for Student {
    const SCHEMA: Schema = Schema {
        entity: "student",
        fields: &[
            FieldSpec::identity("email", &["emailAddress", "Email Address", "mail"]),
            FieldSpec::display("name", &["fullName", "studentName", "Full Name"], ""),
            FieldSpec::display("phone", &["mobile", "phoneNumber"], ""),
            FieldSpec::display("college", &["institution", "university"], ""),
            FieldSpec::display("track", &["course", "program"], "General"),
            FieldSpec::display("status", &["applicationStatus"], PENDING),
            FieldSpec::display("timestamp", &["createdAt", "date", "submittedAt"], ""),
        ],
    };

    fn from_canonical(record: &CanonicalRecord) -> Self {
        Self {
            email: record.text("email").to_string(),
            name: record.text("name").to_string(),
            phone: record.text("phone").to_string(),
            college: record.text("college").to_string(),
            track: record.text("track").to_string(),
            status: record.text("status").to_string(),
            timestamp: record.text("timestamp").to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Payment {
    pub email: String,
    pub amount: f64,
    pub transaction_id: String,
    pub status: String,
    pub timestamp: String,
}

impl Entity for Payment {
    const SCHEMA: Schema = Schema {
        entity: "payment",
        fields: &[
            FieldSpec::identity("email", &["emailAddress", "payerEmail"]),
            FieldSpec::number("amount", &["fee", "paymentAmount"], 0.0),
            FieldSpec::display("transactionId", &["txnId", "utr", "Transaction ID"], NOT_AVAILABLE),
            FieldSpec::display("paymentStatus", &["status"], PENDING),
            FieldSpec::display("timestamp", &["paidAt", "date"], ""),
        ],
    };

    fn from_canonical(record: &CanonicalRecord) -> Self {
        Self {
            email: record.text("email").to_string(),
            amount: record.number("amount"),
            transaction_id: record.text("transactionId").to_string(),
            status: record.text("paymentStatus").to_string(),
            timestamp: record.text("timestamp").to_string(),
        }
    }
}

/// Any status may move to any other; there is no transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
}

impl TaskStatus {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "in-progress" | "in progress" | "inprogress" | "in_progress" => TaskStatus::InProgress,
            "completed" | "complete" | "done" => TaskStatus::Completed,
            _ => TaskStatus::Pending,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in-progress",
            TaskStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Display emphasis only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "low" => Priority::Low,
            "high" => Priority::High,
            _ => Priority::Medium,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub id: String,
    pub email: String,
    pub title: String,
    pub category: String,
    pub priority: Priority,
    pub status: TaskStatus,
    pub deadline: String,
}

impl Task {
    /// Ids keep the service's spelling, so whitespace around them is ignored
    /// only when matching.
    pub fn has_id(&self, id: &str) -> bool {
        self.id.trim() == id.trim()
    }
}

impl Entity for Task {
    const SCHEMA: Schema = Schema {
        entity: "task",
        fields: &[
            FieldSpec::display("id", &["taskId"], ""),
            FieldSpec::identity("email", &["assignedTo", "internEmail"]),
            FieldSpec::display("title", &["task", "taskTitle"], ""),
            FieldSpec::display("category", &[], "General"),
            FieldSpec::display("priority", &[], "medium"),
            FieldSpec::display("status", &[], "pending"),
            FieldSpec::display("deadline", &["dueDate", "due"], ""),
        ],
    };

    fn from_canonical(record: &CanonicalRecord) -> Self {
        Self {
            id: record.text("id").to_string(),
            email: record.text("email").to_string(),
            title: record.text("title").to_string(),
            category: record.text("category").to_string(),
            priority: Priority::parse(record.text("priority")),
            status: TaskStatus::parse(record.text("status")),
            deadline: record.text("deadline").to_string(),
        }
    }
}

/// An intern or admin account.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub email: String,
    pub name: String,
    pub role: String,
    pub status: String,
    pub timestamp: String,
}

impl Entity for User {
    const SCHEMA: Schema = Schema {
        entity: "user",
        fields: &[
            FieldSpec::identity("email", &["emailAddress"]),
            FieldSpec::display("name", &["fullName"], ""),
            FieldSpec::display("role", &[], "intern"),
            FieldSpec::display("status", &[], PENDING),
            FieldSpec::display("timestamp", &["createdAt", "date"], ""),
        ],
    };

    fn from_canonical(record: &CanonicalRecord) -> Self {
        Self {
            email: record.text("email").to_string(),
            name: record.text("name").to_string(),
            role: record.text("role").to_string(),
            status: record.text("status").to_string(),
            timestamp: record.text("timestamp").to_string(),
        }
    }
}

/// A student joined with their payment, rebuilt on every fetch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrollmentView {
    pub email: String,
    pub name: String,
    pub phone: String,
    pub college: String,
    pub track: String,
    pub status: String,
    pub timestamp: String,
    pub payment_status: String,
    pub amount: f64,
    pub transaction_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InternProgress {
    pub email: String,
    pub name: String,
    pub role: String,
    pub status: String,
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub completion_rate: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnrollmentStats {
    pub total: usize,
    pub by_status: BTreeMap<String, usize>,
    pub revenue: f64,
    pub paid_count: usize,
    pub growth_percent: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaskStats {
    pub total: usize,
    pub by_status: BTreeMap<String, usize>,
    pub completion_rate: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize;
    use serde_json::{json, Value};

    #[test]
    fn task_status_parses_leniently() {
        assert_eq!(TaskStatus::parse("In Progress"), TaskStatus::InProgress);
        assert_eq!(TaskStatus::parse(" done "), TaskStatus::Completed);
        assert_eq!(TaskStatus::parse("blocked"), TaskStatus::Pending);
    }

    #[test]
    fn priority_orders_low_to_high() {
        assert!(Priority::Low < Priority::Medium);
        assert!(Priority::Medium < Priority::High);
        assert_eq!(Priority::parse("URGENT"), Priority::Medium);
    }

    #[test]
    fn payment_fields_come_from_aliases() {
        let raw = json!({
            "Payer Email": "Jules.Moreno@GroupScholar.com",
            "fee": "2,500",
            "UTR": "TXN-889",
            "status": "Approved"
        });
        let payment = Payment::from_raw(raw.as_object().expect("object"));
        assert_eq!(payment.email, "jules.moreno@groupscholar.com");
        assert_eq!(payment.amount, 2500.0);
        assert_eq!(payment.transaction_id, "TXN-889");
        assert_eq!(payment.status, APPROVED);
    }

    #[test]
    fn task_defaults_apply() {
        let raw = json!({
            "taskId": "T-1",
            "assignedTo": "Avery@Example.com",
            "task": "Draft essay"
        });
        let task = Task::from_raw(raw.as_object().expect("object"));
        assert_eq!(task.id, "T-1");
        assert_eq!(task.email, "avery@example.com");
        assert_eq!(task.category, "General");
        assert_eq!(task.priority, Priority::Medium);
        assert_eq!(task.status, TaskStatus::Pending);
    }

    #[test]
    fn padded_task_id_matches_trimmed_lookup() {
        let raw = json!({ "id": " 7 ", "assignedTo": "avery@example.com" });
        let task = Task::from_raw(raw.as_object().expect("object"));
        assert_eq!(task.id, " 7 ");
        assert!(task.has_id("7"));
        assert!(task.has_id(" 7"));
        assert!(!task.has_id("17"));
    }

    fn assert_idempotent(schema: &Schema, samples: Vec<Value>) {
        for sample in samples {
            let once = normalize(schema, sample.as_object().expect("object"));
            let twice = normalize(schema, &once.to_raw());
            assert_eq!(once, twice, "{} record changed on second pass", schema.entity);
        }
    }

    #[test]
    fn entity_schemas_normalize_idempotently() {
        assert_idempotent(
            &Student::SCHEMA,
            vec![
                json!({
                    "Email Address": " Avery.Lee@GroupScholar.com ",
                    "Full Name": "Avery Lee",
                    "program": "Data Science",
                    "applicationStatus": "Approved",
                    "createdAt": "2026-09-01T10:00:00Z"
                }),
                json!({ "Email": "", "mail": "kiara@example.com", "phone": 9876543210u64 }),
                json!({}),
            ],
        );
        assert_idempotent(
            &Payment::SCHEMA,
            vec![
                json!({ "payerEmail": "Jules@Example.com", "fee": "2,500", "status": "Approved" }),
                json!({ "email": "jules@example.com", "status": "Rejected", "paymentStatus": "" }),
                json!({ "paymentStatus": "Approved", "status": "Pending", "utr": "TXN-1" }),
                json!({ "amount": "not a number" }),
            ],
        );
        assert_idempotent(
            &Task::SCHEMA,
            vec![
                json!({ "taskId": " 7 ", "assignedTo": "AVERY@example.com", "status": "Done" }),
                json!({ "id": 12, "task": "Outreach", "due": "soon" }),
                json!({}),
            ],
        );
        assert_idempotent(
            &User::SCHEMA,
            vec![
                json!({ "emailAddress": "Intern@Example.com", "fullName": "Rey", "role": "admin" }),
                json!({ "email": null, "status": "Approved", "date": "2026-08-15" }),
            ],
        );
    }

    #[test]
    fn payment_status_alias_survives_renormalization() {
        let raw = json!({ "email": "jules@example.com", "status": "Approved" });
        let once = normalize(&Payment::SCHEMA, raw.as_object().expect("object"));
        let again = once.to_raw();
        assert_eq!(again.get("paymentStatus"), Some(&json!("Approved")));
        assert!(again.get("status").is_none());
        assert_eq!(Payment::from_raw(&again).status, APPROVED);
    }
}
