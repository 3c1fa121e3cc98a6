use crate::models::{EnrollmentView, InternProgress, Task};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Only(String),
}

impl StatusFilter {
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        if value.is_empty() || value.eq_ignore_ascii_case("all") {
            StatusFilter::All
        } else {
            StatusFilter::Only(value.to_string())
        }
    }

    fn matches(&self, status: &str) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Only(wanted) => status.trim().eq_ignore_ascii_case(wanted.trim()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ViewFilter {
    pub status: StatusFilter,
    pub search: String,
}

impl ViewFilter {
    pub fn new(status: &str, search: &str) -> Self {
        Self {
            status: StatusFilter::parse(status),
            search: search.to_string(),
        }
    }
}

/// A record the dashboards can filter.
pub trait Searchable {
    fn status(&self) -> &str;

    fn search_fields(&self) -> Vec<&str>;
}

impl Searchable for EnrollmentView {
    fn status(&self) -> &str {
        &self.status
    }

    fn search_fields(&self) -> Vec<&str> {
        vec![
            self.name.as_str(),
            self.email.as_str(),
            self.college.as_str(),
            self.track.as_str(),
            self.transaction_id.as_str(),
        ]
    }
}

impl Searchable for Task {
    fn status(&self) -> &str {
        self.status.as_str()
    }

    fn search_fields(&self) -> Vec<&str> {
        vec![self.title.as_str(), self.email.as_str(), self.category.as_str()]
    }
}

impl Searchable for InternProgress {
    fn status(&self) -> &str {
        &self.status
    }

    fn search_fields(&self) -> Vec<&str> {
        vec![self.name.as_str(), self.email.as_str()]
    }
}

/// Records matching both the status filter and the search term, in input order.
pub fn filter_view<'a, T: Searchable>(records: &'a [T], filter: &ViewFilter) -> Vec<&'a T> {
    let needle = filter.search.trim().to_lowercase();
    records
        .iter()
        .filter(|record| filter.status.matches(record.status()))
        .filter(|record| {
            needle.is_empty()
                || record
                    .search_fields()
                    .iter()
                    .any(|field| field.to_lowercase().contains(&needle))
        })
        .collect()
}
