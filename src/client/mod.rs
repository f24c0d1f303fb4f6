pub mod transport;

use chrono::{DateTime, Datelike, SecondsFormat, Utc};
use reqwest::Method;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::core::profile::Profile;
use crate::core::task::{DuePeriod, ListSummary, PaginatedTasks, Pagination, Task};
use crate::error::{ApiError, ApiErrorKind};
use transport::{HttpRequest, HttpResponse, Transport};

const UNTITLED: &str = "(untitled)";

/// Task as the server sends it. Everything but the id is optional.
#[derive(Debug, Deserialize)]
struct RawTask {
    id: i64,
    title: Option<String>,
    description: Option<String>,
    list_id: Option<i64>,
    due_date: Option<String>,
    done: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct RawList {
    id: i64,
    title: String,
}

/// Vikunja REST client.
///
/// Holds nothing but the transport; every call takes the profile it acts for.
pub struct VikunjaClient {
    transport: Box<dyn Transport>,
}

impl VikunjaClient {
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Exchange username/password for an API token.
    pub fn login(
        &self,
        base_url: &str,
        username: &str,
        password: &str,
        verify_tls: bool,
    ) -> Result<String, ApiError> {
        let body = json!({ "username": username, "password": password });
        let resp = self.execute(
            base_url,
            Method::POST,
            "/auth/login",
            Vec::new(),
            Some(body),
            Vec::new(),
            verify_tls,
        )?;
        let data = read_value(&resp)?;
        data.get("token")
            .and_then(Value::as_str)
            .filter(|token| !token.is_empty())
            .map(str::to_string)
            .ok_or_else(|| ApiError::other("Login succeeded but no token returned"))
    }

    /// True when `/user` answers with a non-empty identity.
    pub fn verify_token(&self, profile: &Profile) -> Result<bool, ApiError> {
        let resp = self.execute_profile(profile, Method::GET, "/user", Vec::new(), None)?;
        let data = read_value(&resp)?;
        Ok(match data.get("id") {
            Some(Value::Number(n)) => n.as_i64().is_some_and(|id| id != 0),
            Some(Value::String(s)) => !s.is_empty(),
            _ => false,
        })
    }

    pub fn get_lists(
        &self,
        profile: &Profile,
        page: u32,
        per_page: u32,
    ) -> Result<(Vec<ListSummary>, Pagination), ApiError> {
        let resp = self.execute_profile(
            profile,
            Method::GET,
            "/lists",
            vec![
                ("page".into(), page.to_string()),
                ("per_page".into(), per_page.to_string()),
            ],
            None,
        )?;
        let raw: Option<Vec<RawList>> = read_json(&resp)?;
        let lists = raw
            .unwrap_or_default()
            .into_iter()
            .map(|l| ListSummary {
                id: l.id,
                title: l.title,
            })
            .collect();
        Ok((lists, pagination_from(&resp)))
    }

    pub fn create_task(
        &self,
        profile: &Profile,
        list_id: i64,
        title: &str,
        description: Option<&str>,
        due: Option<&str>,
    ) -> Result<Task, ApiError> {
        let mut body = json!({ "title": title });
        if let Some(description) = description.filter(|d| !d.is_empty()) {
            body["description"] = json!(description);
        }
        if let Some(due) = due.filter(|d| !d.is_empty()) {
            body["due_date"] = json!(due);
        }
        let path = format!("/lists/{}/tasks", list_id);
        let resp = self.execute_profile(profile, Method::POST, &path, Vec::new(), Some(body))?;
        self.task_from_response(profile, &resp)
    }

    /// Full-text search over every task the profile can see.
    pub fn search_tasks(
        &self,
        profile: &Profile,
        query: &str,
        page: u32,
        per_page: u32,
    ) -> Result<PaginatedTasks, ApiError> {
        let params = vec![
            ("search".into(), query.to_string()),
            ("page".into(), page.to_string()),
            ("per_page".into(), per_page.to_string()),
        ];
        self.list_tasks(profile, params)
    }

    pub fn due_tasks(
        &self,
        profile: &Profile,
        period: DuePeriod,
        page: u32,
        per_page: u32,
    ) -> Result<PaginatedTasks, ApiError> {
        self.due_tasks_at(profile, period, page, per_page, Utc::now())
    }

    /// [`Self::due_tasks`] with an explicit clock.
    pub fn due_tasks_at(
        &self,
        profile: &Profile,
        period: DuePeriod,
        page: u32,
        per_page: u32,
        now: DateTime<Utc>,
    ) -> Result<PaginatedTasks, ApiError> {
        let (start, end) = period.window(now);
        let params = vec![
            ("due_date_from".into(), iso_utc(start)),
            ("due_date_to".into(), iso_utc(end)),
            ("sort_by".into(), "due_date".into()),
            ("order".into(), "asc".into()),
            ("page".into(), page.to_string()),
            ("per_page".into(), per_page.to_string()),
        ];
        self.list_tasks(profile, params)
    }

    pub fn complete_task(&self, profile: &Profile, task_id: i64) -> Result<Task, ApiError> {
        let path = format!("/tasks/{}", task_id);
        let resp = self.execute_profile(
            profile,
            Method::PUT,
            &path,
            Vec::new(),
            Some(json!({ "done": true })),
        )?;
        self.task_from_response(profile, &resp)
    }

    pub fn get_task(&self, profile: &Profile, task_id: i64) -> Result<Task, ApiError> {
        let path = format!("/tasks/{}", task_id);
        let resp = self.execute_profile(profile, Method::GET, &path, Vec::new(), None)?;
        self.task_from_response(profile, &resp)
    }

    /// Browser URL of a task on the profile's server.
    pub fn build_task_url(&self, profile: &Profile, task_id: i64) -> String {
        task_url(profile, task_id)
    }

    fn list_tasks(
        &self,
        profile: &Profile,
        params: Vec<(String, String)>,
    ) -> Result<PaginatedTasks, ApiError> {
        let resp = self.execute_profile(profile, Method::GET, "/tasks/all", params, None)?;
        let raw: Option<Vec<RawTask>> = read_json(&resp)?;
        let tasks = raw
            .unwrap_or_default()
            .into_iter()
            .map(|t| task_from_raw(profile, t))
            .collect();
        Ok(PaginatedTasks::new(tasks, pagination_from(&resp)))
    }

    fn task_from_response(&self, profile: &Profile, resp: &HttpResponse) -> Result<Task, ApiError> {
        let raw: RawTask = read_json(resp)?;
        Ok(task_from_raw(profile, raw))
    }

    fn execute_profile(
        &self,
        profile: &Profile,
        method: Method,
        path: &str,
        query: Vec<(String, String)>,
        body: Option<Value>,
    ) -> Result<HttpResponse, ApiError> {
        let Some(token) = profile.token.as_deref().filter(|t| !t.is_empty()) else {
            return Err(ApiError::new(
                "Profile does not have an access token",
                ApiErrorKind::Auth,
            ));
        };
        let headers = vec![("Authorization".into(), format!("Bearer {}", token))];
        self.execute(
            &profile.base_url,
            method,
            path,
            query,
            body,
            headers,
            profile.verify_tls,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn execute(
        &self,
        base_url: &str,
        method: Method,
        path: &str,
        query: Vec<(String, String)>,
        body: Option<Value>,
        mut headers: Vec<(String, String)>,
        verify_tls: bool,
    ) -> Result<HttpResponse, ApiError> {
        if body.is_some() {
            headers.push(("Content-Type".into(), "application/json".into()));
        }
        let request = HttpRequest {
            method,
            url: join_url(base_url, path),
            query,
            headers,
            body,
            verify_tls,
        };
        log::debug!("{} {}", request.method, request.url);

        let resp = self.transport.send(&request)?;
        if !resp.is_success() {
            let message = error_message(&resp);
            log::warn!(
                "{} {} returned {}: {}",
                request.method,
                request.url,
                resp.status,
                message
            );
            return Err(ApiError::http(message, resp.status));
        }
        Ok(resp)
    }
}

fn join_url(base_url: &str, path: &str) -> String {
    let base = base_url.trim_end_matches('/');
    if path.starts_with('/') {
        format!("{}{}", base, path)
    } else {
        format!("{}/{}", base, path)
    }
}

fn task_url(profile: &Profile, task_id: i64) -> String {
    format!("{}/tasks/{}", profile.trimmed_base_url(), task_id)
}

fn iso_utc(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn read_value(resp: &HttpResponse) -> Result<Value, ApiError> {
    if resp.status == 204 || resp.body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(&resp.body)
        .map_err(|e| ApiError::other(format!("Invalid JSON from server: {}", e)))
}

fn read_json<T: DeserializeOwned>(resp: &HttpResponse) -> Result<T, ApiError> {
    serde_json::from_value(read_value(resp)?)
        .map_err(|e| ApiError::other(format!("Unexpected response from server: {}", e)))
}

/// `message` or `error` from a JSON error body, else the reason phrase.
fn error_message(resp: &HttpResponse) -> String {
    let from_body = serde_json::from_slice::<Value>(&resp.body).ok().and_then(|v| {
        ["message", "error"].iter().find_map(|key| {
            v.get(key)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        })
    });
    from_body.unwrap_or_else(|| {
        if resp.reason.is_empty() {
            format!("HTTP {}", resp.status)
        } else {
            resp.reason.clone()
        }
    })
}

fn pagination_from(resp: &HttpResponse) -> Pagination {
    let defaults = Pagination::default();
    let header = |name: &str| resp.header(name).and_then(|v| v.trim().parse::<u64>().ok());
    Pagination {
        page: header("X-Pagination-Page").map_or(defaults.page, |v| v as u32),
        per_page: header("X-Pagination-Limit").map_or(defaults.per_page, |v| v as u32),
        total_pages: header("X-Pagination-TotalPages").map_or(defaults.total_pages, |v| v as u32),
        total_count: header("X-Pagination-Total").unwrap_or(defaults.total_count),
    }
}

fn task_from_raw(profile: &Profile, raw: RawTask) -> Task {
    let due_date = raw
        .due_date
        .as_deref()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        // Vikunja encodes "no due date" as year 1.
        .filter(|dt| dt.year() > 1);
    Task {
        id: raw.id,
        title: raw.title.unwrap_or_else(|| UNTITLED.to_string()),
        description: raw.description.filter(|d| !d.is_empty()),
        list_id: raw.list_id,
        due_date,
        done: raw.done.unwrap_or(false),
        url: task_url(profile, raw.id),
    }
}


#[cfg(test)]
mod tests {
    use super::fake::{FakeTransport, json, paged, query_value};
    use super::*;
    use chrono::TimeZone;

    fn profile() -> Profile {
        Profile::new("home", "https://vik.example").with_token("token-123")
    }

    #[test]
    fn login_returns_token() {
        let transport = FakeTransport::new().when(
            Method::POST,
            "https://vik.example/auth/login",
            json(200, serde_json::json!({ "token": "abc" })),
        );
        let log = transport.log();
        let client = VikunjaClient::new(Box::new(transport));

        let token = client
            .login("https://vik.example/", "user", "pass", true)
            .unwrap();
        assert_eq!(token, "abc");

        let sent = &log.borrow()[0];
        assert_eq!(sent.body.as_ref().unwrap()["username"], "user");
        assert!(sent.headers.iter().all(|(k, _)| k != "Authorization"));
    }

    #[test]
    fn login_without_token_field_is_an_error() {
        let transport = FakeTransport::new().when(
            Method::POST,
            "https://vik.example/auth/login",
            json(200, serde_json::json!({ "user": "me" })),
        );
        let client = VikunjaClient::new(Box::new(transport));
        let err = client
            .login("https://vik.example", "user", "pass", true)
            .unwrap_err();
        assert!(err.message.contains("no token returned"));
    }

    #[test]
    fn verify_token_checks_identity() {
        let transport = FakeTransport::new()
            .when(
                Method::GET,
                "https://good.example/user",
                json(200, serde_json::json!({ "id": 7, "username": "me" })),
            )
            .when(
                Method::GET,
                "https://bad.example/user",
                json(200, serde_json::json!({ "id": 0 })),
            );
        let log = transport.log();
        let client = VikunjaClient::new(Box::new(transport));

        let good = Profile::new("good", "https://good.example").with_token("t");
        let bad = Profile::new("bad", "https://bad.example").with_token("t");
        assert!(client.verify_token(&good).unwrap());
        assert!(!client.verify_token(&bad).unwrap());

        let sent = &log.borrow()[0];
        assert!(
            sent.headers
                .contains(&("Authorization".to_string(), "Bearer t".to_string()))
        );
    }

    #[test]
    fn missing_token_fails_without_network() {
        let transport = FakeTransport::new();
        let log = transport.log();
        let client = VikunjaClient::new(Box::new(transport));

        let err = client
            .get_task(&Profile::new("home", "https://vik.example"), 1)
            .unwrap_err();
        assert_eq!(err.kind, ApiErrorKind::Auth);
        assert_eq!(err.status, None);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn get_lists_reads_pagination() {
        let transport = FakeTransport::new().when(
            Method::GET,
            "https://vik.example/lists",
            paged(serde_json::json!([{ "id": 99, "title": "Inbox" }]), 1, 1, 1),
        );
        let log = transport.log();
        let client = VikunjaClient::new(Box::new(transport));

        let (lists, pagination) = client.get_lists(&profile(), 1, 50).unwrap();
        assert_eq!(lists[0].title, "Inbox");
        assert_eq!(pagination.total_count, 1);
        assert_eq!(query_value(&log.borrow()[0], "per_page"), Some("50"));
    }

    #[test]
    fn pagination_defaults_when_headers_absent() {
        let transport = FakeTransport::new().when(
            Method::GET,
            "https://vik.example/lists",
            json(200, serde_json::json!([])),
        );
        let client = VikunjaClient::new(Box::new(transport));
        let (lists, pagination) = client.get_lists(&profile(), 1, 50).unwrap();
        assert!(lists.is_empty());
        assert_eq!(pagination, Pagination::default());
    }

    #[test]
    fn create_task_posts_to_list() {
        let transport = FakeTransport::new().when(
            Method::POST,
            "https://vik.example/lists/5/tasks",
            json(
                200,
                serde_json::json!({ "id": 1, "title": "Test", "list_id": 5, "done": false }),
            ),
        );
        let log = transport.log();
        let client = VikunjaClient::new(Box::new(transport));

        let task = client
            .create_task(&profile(), 5, "Test", None, Some("2026-12-31T00:00:00Z"))
            .unwrap();
        assert_eq!(task.id, 1);
        assert_eq!(task.title, "Test");
        assert_eq!(task.url, "https://vik.example/tasks/1");

        let body = log.borrow()[0].body.clone().unwrap();
        assert_eq!(body["due_date"], "2026-12-31T00:00:00Z");
        assert!(body.get("description").is_none());
    }

    #[test]
    fn search_maps_tasks_and_tolerates_gaps() {
        let transport = FakeTransport::new().when(
            Method::GET,
            "https://vik.example/tasks/all",
            paged(
                serde_json::json!([
                    { "id": 1, "title": "Pay invoice", "due_date": "2026-03-01T09:00:00Z", "list_id": 2 },
                    { "id": 2, "due_date": "not a date" },
                    { "id": 3, "title": "Unscheduled", "due_date": "0001-01-01T00:00:00Z", "done": true }
                ]),
                1,
                3,
                45,
            ),
        );
        let log = transport.log();
        let client = VikunjaClient::new(Box::new(transport));

        let result = client.search_tasks(&profile(), "invoice", 1, 20).unwrap();
        assert_eq!(result.tasks.len(), 3);
        assert!(result.has_more);
        assert_eq!(result.total_count, 45);

        assert_eq!(
            result.tasks[0].due_date,
            Some(Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap())
        );
        assert_eq!(result.tasks[1].title, "(untitled)");
        assert_eq!(result.tasks[1].due_date, None);
        assert_eq!(result.tasks[2].due_date, None);
        assert!(result.tasks[2].done);

        assert_eq!(query_value(&log.borrow()[0], "search"), Some("invoice"));
    }

    #[test]
    fn due_tasks_sends_window_sorted_ascending() {
        let transport = FakeTransport::new().when(
            Method::GET,
            "https://vik.example/tasks/all",
            paged(serde_json::json!([]), 1, 1, 0),
        );
        let log = transport.log();
        let client = VikunjaClient::new(Box::new(transport));

        let now = Utc.with_ymd_and_hms(2026, 3, 14, 15, 30, 0).unwrap();
        let result = client
            .due_tasks_at(&profile(), DuePeriod::Today, 1, 20, now)
            .unwrap();
        assert!(result.tasks.is_empty());
        assert!(!result.has_more);

        let sent = &log.borrow()[0];
        assert_eq!(query_value(sent, "due_date_from"), Some("2026-03-14T00:00:00Z"));
        assert_eq!(query_value(sent, "due_date_to"), Some("2026-03-15T00:00:00Z"));
        assert_eq!(query_value(sent, "sort_by"), Some("due_date"));
        assert_eq!(query_value(sent, "order"), Some("asc"));
    }

    #[test]
    fn complete_task_puts_done() {
        let transport = FakeTransport::new().when(
            Method::PUT,
            "https://vik.example/tasks/8",
            json(200, serde_json::json!({ "id": 8, "title": "Ship", "done": true })),
        );
        let log = transport.log();
        let client = VikunjaClient::new(Box::new(transport));

        let task = client.complete_task(&profile(), 8).unwrap();
        assert!(task.done);
        assert_eq!(log.borrow()[0].body, Some(serde_json::json!({ "done": true })));
    }

    #[test]
    fn error_body_message_is_surfaced_with_status() {
        let transport = FakeTransport::new()
            .when(
                Method::GET,
                "https://vik.example/tasks/1",
                json(401, serde_json::json!({ "message": "invalid token" })),
            )
            .when(
                Method::GET,
                "https://vik.example/tasks/2",
                HttpResponse {
                    status: 502,
                    reason: "Bad Gateway".into(),
                    headers: Default::default(),
                    body: b"<html>".to_vec(),
                },
            );
        let client = VikunjaClient::new(Box::new(transport));

        let err = client.get_task(&profile(), 1).unwrap_err();
        assert_eq!(err.status, Some(401));
        assert_eq!(err.message, "invalid token");
        assert!(err.is_access_denied());

        let err = client.get_task(&profile(), 2).unwrap_err();
        assert_eq!(err.status, Some(502));
        assert_eq!(err.message, "Bad Gateway");
    }

    #[test]
    fn transport_failures_keep_no_status() {
        let transport = FakeTransport::new().fail(
            Method::GET,
            "https://vik.example/tasks/1",
            ApiError::new("Request timed out", ApiErrorKind::Timeout),
        );
        let client = VikunjaClient::new(Box::new(transport));
        let err = client.get_task(&profile(), 1).unwrap_err();
        assert_eq!(err.status, None);
        assert_eq!(err.kind, ApiErrorKind::Timeout);
    }

    #[test]
    fn task_url_strips_trailing_slash() {
        let client = VikunjaClient::new(Box::new(FakeTransport::new()));
        let profile = Profile::new("home", "https://vik.example///");
        assert_eq!(
            client.build_task_url(&profile, 12),
            "https://vik.example/tasks/12"
        );
    }
}
