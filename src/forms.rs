//! Form submissions, checked before anything is sent.

use uuid::Uuid;

use crate::error::ValidationError;
use crate::models::{Priority, TaskStatus, PENDING};
use crate::normalize::normalize_key;
use crate::source::WriteRequest;

fn required(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::MissingField(field));
    }
    Ok(value.to_string())
}

pub fn check_email(email: &str) -> Result<(), ValidationError> {
    let invalid = |reason: &str| ValidationError::InvalidField {
        field: "email",
        reason: reason.to_string(),
    };
    if email.is_empty() {
        return Err(ValidationError::MissingField("email"));
    }
    let (local, domain) = email.split_once('@').ok_or_else(|| invalid("missing @"))?;
    if local.is_empty()
        || domain.is_empty()
        || !domain.contains('.')
        || email.contains(char::is_whitespace)
    {
        return Err(invalid("expected name@domain"));
    }
    Ok(())
}

fn required_email(value: &str) -> Result<String, ValidationError> {
    let email = normalize_key(value);
    check_email(&email)?;
    Ok(email)
}

#[derive(Debug, Clone, Default)]
pub struct EnrollmentForm {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub college: String,
    pub track: String,
}

impl EnrollmentForm {
    pub fn validate(&self) -> Result<WriteRequest, ValidationError> {
        Ok(WriteRequest::new("enroll")
            .field("name", required("name", &self.name)?)
            .field("email", required_email(&self.email)?)
            .field("phone", required("phone", &self.phone)?)
            .field("college", required("college", &self.college)?)
            .field("track", required("track", &self.track)?)
            .field("status", PENDING))
    }
}

#[derive(Debug, Clone, Default)]
pub struct InternRegistration {
    pub name: String,
    pub email: String,
    pub college: String,
    pub role: String,
}

impl InternRegistration {
    pub fn validate(&self) -> Result<WriteRequest, ValidationError> {
        let role = match self.role.trim() {
            "" => "intern".to_string(),
            role => role.to_string(),
        };
        Ok(WriteRequest::new("registerIntern")
            .field("name", required("name", &self.name)?)
            .field("email", required_email(&self.email)?)
            .field("college", self.college.trim())
            .field("role", role)
            .field("status", PENDING))
    }
}

#[derive(Debug, Clone, Default)]
pub struct TaskAssignment {
    pub email: String,
    pub title: String,
    pub category: String,
    pub priority: String,
    pub deadline: String,
}

impl TaskAssignment {
    pub fn validate(&self) -> Result<WriteRequest, ValidationError> {
        let category = match self.category.trim() {
            "" => "General".to_string(),
            category => category.to_string(),
        };
        Ok(WriteRequest::new("addTask")
            .field("id", Uuid::new_v4().to_string())
            .field("email", required_email(&self.email)?)
            .field("title", required("title", &self.title)?)
            .field("category", category)
            .field("priority", Priority::parse(&self.priority).as_str())
            .field("status", TaskStatus::Pending.as_str())
            .field("deadline", self.deadline.trim()))
    }
}

#[derive(Debug, Clone, Default)]
pub struct PaymentConfirmation {
    pub email: String,
    pub amount: f64,
    pub transaction_id: String,
}

impl PaymentConfirmation {
    pub fn validate(&self) -> Result<WriteRequest, ValidationError> {
        if !self.amount.is_finite() || self.amount <= 0.0 {
            return Err(ValidationError::InvalidField {
                field: "amount",
                reason: "must be a positive number".to_string(),
            });
        }
        Ok(WriteRequest::new("confirmPayment")
            .field("email", required_email(&self.email)?)
            .field("amount", self.amount)
            .field("transactionId", required("transactionId", &self.transaction_id)?)
            .field("paymentStatus", PENDING))
    }
}
