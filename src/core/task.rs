use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A remote task list. Mirrors server state; never written to disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListSummary {
    pub id: i64,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub list_id: Option<i64>,
    pub due_date: Option<DateTime<Utc>>,
    pub done: bool,
    /// Built from the profile's base URL, not supplied by the server.
    pub url: String,
}

/// Pagination metadata read from the `X-Pagination-*` response headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
    pub total_pages: u32,
    pub total_count: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 50,
            total_pages: 1,
            total_count: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaginatedTasks {
    pub tasks: Vec<Task>,
    pub page: u32,
    pub total_pages: u32,
    pub total_count: u64,
    pub has_more: bool,
}

impl PaginatedTasks {
    pub fn new(tasks: Vec<Task>, pagination: Pagination) -> Self {
        Self {
            tasks,
            page: pagination.page,
            total_pages: pagination.total_pages,
            total_count: pagination.total_count,
            has_more: pagination.page < pagination.total_pages,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuePeriod {
    Today,
    Tomorrow,
    Week,
}

impl DuePeriod {
    pub fn as_keyword(&self) -> &'static str {
        match self {
            Self::Today => "today",
            Self::Tomorrow => "tomorrow",
            Self::Week => "week",
        }
    }

    /// Case-insensitive parse of `today`, `tomorrow` or `week`.
    pub fn from_keyword(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "today" => Some(Self::Today),
            "tomorrow" => Some(Self::Tomorrow),
            "week" => Some(Self::Week),
            _ => None,
        }
    }

    /// Half-open UTC window `[start, end)` covered by this period.
    pub fn window(&self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let start_of_day = |at: DateTime<Utc>| {
            at.date_naive()
                .and_hms_opt(0, 0, 0)
                .map(|midnight| midnight.and_utc())
                .unwrap_or(at)
        };
        match self {
            Self::Today => {
                let start = start_of_day(now);
                (start, start + Duration::days(1))
            }
            Self::Tomorrow => {
                let start = start_of_day(now + Duration::days(1));
                (start, start + Duration::days(1))
            }
            Self::Week => (now, now + Duration::days(7)),
        }
    }

    /// Subtitle shown when nothing falls inside the window.
    pub fn empty_subtitle(&self) -> &'static str {
        match self {
            Self::Today => "Tasks due today",
            Self::Tomorrow => "Tasks due tomorrow",
            Self::Week => "Tasks due this week",
        }
    }
}
