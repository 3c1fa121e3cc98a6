//! The collections the dashboards load, each built from one or more reads.

use async_trait::async_trait;

use crate::error::FetchError;
use crate::models::{EnrollmentView, InternProgress, Payment, Student, Task, User};
use crate::normalize::decode_all;
use crate::reconcile;
use crate::source::{RecordSource, Resource};

#[async_trait]
pub trait Dataset: Send + Sync {
    type Record: Clone + Send + Sync + 'static;

    fn name(&self) -> &'static str;

    async fn load(&self, source: &dyn RecordSource) -> Result<Vec<Self::Record>, FetchError>;
}

/// Students joined with their payments.
pub struct EnrollmentDataset;

#[async_trait]
impl Dataset for EnrollmentDataset {
    type Record = EnrollmentView;

    fn name(&self) -> &'static str {
        "enrollments"
    }

    async fn load(&self, source: &dyn RecordSource) -> Result<Vec<EnrollmentView>, FetchError> {
        let (students, payments) = tokio::try_join!(
            source.fetch(Resource::Students),
            source.fetch(Resource::Payments)
        )?;
        let students: Vec<Student> = decode_all(&students);
        let payments: Vec<Payment> = decode_all(&payments);
        Ok(reconcile::merge_enrollments(&students, &payments))
    }
}

pub struct TaskDataset;

#[async_trait]
impl Dataset for TaskDataset {
    type Record = Task;

    fn name(&self) -> &'static str {
        "tasks"
    }

    async fn load(&self, source: &dyn RecordSource) -> Result<Vec<Task>, FetchError> {
        let tasks = source.fetch(Resource::Tasks).await?;
        Ok(decode_all(&tasks))
    }
}

/// Intern accounts joined with their task completion.
pub struct InternDataset;

#[async_trait]
impl Dataset for InternDataset {
    type Record = InternProgress;

    fn name(&self) -> &'static str {
        "interns"
    }

    async fn load(&self, source: &dyn RecordSource) -> Result<Vec<InternProgress>, FetchError> {
        let (users, tasks) = tokio::try_join!(
            source.fetch(Resource::Users),
            source.fetch(Resource::Tasks)
        )?;
        let users: Vec<User> = decode_all(&users);
        let tasks: Vec<Task> = decode_all(&tasks);
        Ok(reconcile::merge_intern_progress(&users, &tasks))
    }
}
