//! Parsed command -> API calls -> display entries.
//!
//! [`CommandRouter::handle`] never fails: every error becomes a single
//! explanatory entry, and cancellation becomes an empty list.

use chrono::NaiveDate;

use crate::cache::ListCache;
use crate::cancel::CancelToken;
use crate::client::VikunjaClient;
use crate::command::{AddArgs, LoginArgs, ParsedCommand, parse_query};
use crate::config::PluginConfig;
use crate::core::profile::{AuthMethod, Profile};
use crate::core::task::{DuePeriod, ListSummary, PaginatedTasks};
use crate::error::{ApiError, ApiErrorKind, Error, ParseError, Result};
use crate::results::{self, ResultItem};
use crate::store::profiles::ProfileStore;

/// Upper bound on list pages fetched for one profile.
const MAX_LIST_PAGES: u32 = 50;

/// Mutable state shared by every command: profiles and the list cache.
pub struct PluginContext {
    pub profiles: ProfileStore,
    pub list_cache: ListCache,
}

impl PluginContext {
    pub fn new(profiles: ProfileStore, list_cache: ListCache) -> Self {
        Self {
            profiles,
            list_cache,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterSettings {
    /// Prefix for follow-up queries, e.g. `vik`.
    pub action_keyword: String,
    pub search_page_size: u32,
    pub list_page_size: u32,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self::from(&PluginConfig::default())
    }
}

impl From<&PluginConfig> for RouterSettings {
    fn from(config: &PluginConfig) -> Self {
        Self {
            action_keyword: config.action_keyword.clone(),
            search_page_size: config.search_page_size,
            list_page_size: config.list_page_size,
        }
    }
}

pub struct CommandRouter {
    context: PluginContext,
    client: VikunjaClient,
    settings: RouterSettings,
}

impl CommandRouter {
    pub fn new(context: PluginContext, client: VikunjaClient, settings: RouterSettings) -> Self {
        Self {
            context,
            client,
            settings,
        }
    }

    pub fn context(&self) -> &PluginContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut PluginContext {
        &mut self.context
    }

    pub fn client(&self) -> &VikunjaClient {
        &self.client
    }

    pub fn handle(&mut self, raw_query: &str, cancel: &CancelToken) -> Vec<ResultItem> {
        match self.dispatch(raw_query, cancel) {
            Ok(items) => items,
            Err(Error::Cancelled) => {
                log::debug!("Query superseded: {}", raw_query);
                Vec::new()
            }
            Err(e) => {
                log::warn!("Command failed: {}", e);
                vec![self.error_result(e)]
            }
        }
    }

    fn dispatch(&mut self, raw_query: &str, cancel: &CancelToken) -> Result<Vec<ResultItem>> {
        let command = parse_query(raw_query)?;
        log::debug!("Dispatching {} command", command.keyword());
        match command {
            ParsedCommand::Help => Ok(self.help()),
            ParsedCommand::Login(args) => self.login(args).map(|item| vec![item]),
            ParsedCommand::Use { profile } => self.use_profile(&profile).map(|item| vec![item]),
            ParsedCommand::Lists => self.lists(cancel),
            ParsedCommand::Add(args) => self.add(args, cancel).map(|item| vec![item]),
            ParsedCommand::Find { terms, page } => self.find(&terms, page, cancel),
            ParsedCommand::Due { period, page } => self.due(period, page, cancel),
            ParsedCommand::Done { task_id } => self.done(task_id).map(|item| vec![item]),
            ParsedCommand::Open { task_id } => self.open(task_id).map(|item| vec![item]),
        }
    }

    fn help(&self) -> Vec<ResultItem> {
        let kw = &self.settings.action_keyword;
        let lines = [
            format!("{} login <profile> --url https://host --token <token>", kw),
            format!("{} use <profile>", kw),
            format!("{} add \"Title\" --list \"Inbox\" --due 2024-12-31", kw),
            format!("{} find search terms", kw),
            format!("{} due today|tomorrow|week", kw),
            format!("{} lists", kw),
            format!("{} done <task_id>", kw),
            format!("{} open <task_id>", kw),
        ];
        vec![results::info_result("Vikunja Flow", lines.join(" | "))]
    }

    fn login(&mut self, args: LoginArgs) -> Result<ResultItem> {
        let existing = match self.context.profiles.get_profile(&args.profile, false) {
            Ok(profile) => Some(profile),
            Err(Error::ProfileNotFound(_)) => None,
            Err(e) => return Err(e),
        };

        let base_url = args
            .base_url
            .or_else(|| existing.as_ref().map(|p| p.base_url.clone()))
            .filter(|url| !url.is_empty())
            .ok_or_else(|| ParseError::new("login requires --url when creating a new profile"))?;
        let verify_tls = args
            .verify_tls
            .or_else(|| existing.as_ref().map(|p| p.verify_tls))
            .unwrap_or(true);
        let default_list_id = match args.default_list {
            Some(raw) => Some(
                raw.parse::<i64>()
                    .map_err(|_| ParseError::new("--default-list must be a numeric list id"))?,
            ),
            None => existing.as_ref().and_then(|p| p.default_list_id),
        };

        let (token, auth_method) = match (args.username, args.password) {
            (Some(username), Some(password)) => {
                log::info!("Logging in to {} as {}", base_url, username);
                let token = self
                    .client
                    .login(&base_url, &username, &password, verify_tls)?;
                (Some(token), AuthMethod::Login)
            }
            (Some(_), None) | (None, Some(_)) => {
                return Err(ParseError::new("login requires both --username and --password").into());
            }
            (None, None) => (args.token, AuthMethod::Token),
        };
        let token = token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ParseError::new("login requires either --token or username/password"))?;

        let profile = Profile {
            name: args.profile,
            base_url,
            auth_method,
            verify_tls,
            default_list_id,
            token: Some(token.clone()),
        };
        if !self.client.verify_token(&profile)? {
            return Err(ApiError::http("Unable to verify token", 401).into());
        }

        self.context.profiles.save_profile(&profile, Some(&token))?;
        self.context.profiles.set_active(&profile.name)?;
        self.context.list_cache.pop(&profile.name);
        Ok(results::info_result(
            "Profile saved",
            format!("Active profile: {}", profile.name),
        ))
    }

    fn use_profile(&mut self, name: &str) -> Result<ResultItem> {
        self.context.profiles.set_active(name)?;
        Ok(results::info_result(
            "Switched profile",
            format!("Active profile: {}", name),
        ))
    }

    fn lists(&mut self, cancel: &CancelToken) -> Result<Vec<ResultItem>> {
        let profile = self.context.profiles.get_active_profile()?;
        let lists = self.cached_lists(&profile, cancel)?;
        if lists.is_empty() {
            return Ok(vec![results::info_result(
                "No lists found",
                format!("Profile: {}", profile.name),
            )]);
        }
        Ok(lists.iter().map(results::list_result).collect())
    }

    fn add(&mut self, args: AddArgs, cancel: &CancelToken) -> Result<ResultItem> {
        let profile = self.context.profiles.get_active_profile()?;
        let list_id = self.resolve_list_id(&profile, args.list_name.as_deref(), cancel)?;
        let due = args.due.as_deref().map(due_timestamp).transpose()?;

        let task = self.client.create_task(
            &profile,
            list_id,
            &args.title,
            args.description.as_deref(),
            due.as_deref(),
        )?;
        // List contents changed; drop the whole profile entry.
        self.context.list_cache.pop(&profile.name);
        log::info!("Created task {} in list {}", task.id, list_id);
        Ok(results::task_result(&task))
    }

    fn find(&mut self, terms: &str, page: u32, cancel: &CancelToken) -> Result<Vec<ResultItem>> {
        let profile = self.context.profiles.get_active_profile()?;
        cancel.check()?;
        let found = self
            .client
            .search_tasks(&profile, terms, page, self.settings.search_page_size)?;
        cancel.check()?;

        let words: Vec<&str> = terms.split_whitespace().collect();
        let next = |page: u32| format!("find {} --page {}", shell_words::join(&words), page);
        Ok(self.paged_results(found, next, || {
            results::info_result("No tasks found", format!("Query: {}", terms))
        }))
    }

    fn due(&mut self, period: DuePeriod, page: u32, cancel: &CancelToken) -> Result<Vec<ResultItem>> {
        let profile = self.context.profiles.get_active_profile()?;
        cancel.check()?;
        let found = self
            .client
            .due_tasks(&profile, period, page, self.settings.search_page_size)?;
        cancel.check()?;

        let next = |page: u32| format!("due {} --page {}", period.as_keyword(), page);
        Ok(self.paged_results(found, next, || {
            results::info_result("Nothing due", period.empty_subtitle())
        }))
    }

    fn done(&mut self, task_id: i64) -> Result<ResultItem> {
        let profile = self.context.profiles.get_active_profile()?;
        let task = self.client.complete_task(&profile, task_id)?;
        self.context.list_cache.pop(&profile.name);
        Ok(results::info_result(
            "Task completed",
            format!("Marked '{}' done", task.title),
        ))
    }

    fn open(&mut self, task_id: i64) -> Result<ResultItem> {
        let profile = self.context.profiles.get_active_profile()?;
        let task = self.client.get_task(&profile, task_id)?;
        Ok(results::task_result(&task))
    }

    /// Task entries, a "show more" entry when pages remain, or `empty` alone.
    fn paged_results(
        &self,
        found: PaginatedTasks,
        next_query: impl Fn(u32) -> String,
        empty: impl FnOnce() -> ResultItem,
    ) -> Vec<ResultItem> {
        let mut items: Vec<ResultItem> = found.tasks.iter().map(results::task_result).collect();
        if found.has_more {
            let follow_up = format!(
                "{} {}",
                self.settings.action_keyword,
                next_query(found.page + 1)
            );
            items.push(results::show_more_result(follow_up));
        }
        if items.is_empty() {
            items.push(empty());
        }
        items
    }

    /// All lists of the profile, from cache when fresh.
    fn cached_lists(&mut self, profile: &Profile, cancel: &CancelToken) -> Result<Vec<ListSummary>> {
        if let Some(lists) = self.context.list_cache.get(&profile.name) {
            log::debug!("List cache hit for {}", profile.name);
            return Ok(lists);
        }

        let mut lists = Vec::new();
        let mut page = 1;
        loop {
            cancel.check()?;
            let (batch, pagination) =
                self.client
                    .get_lists(profile, page, self.settings.list_page_size)?;
            cancel.check()?;
            let exhausted = batch.is_empty();
            lists.extend(batch);
            if exhausted || page >= pagination.total_pages {
                break;
            }
            if page >= MAX_LIST_PAGES {
                log::warn!(
                    "Stopped fetching lists for {} after {} pages",
                    profile.name,
                    MAX_LIST_PAGES
                );
                break;
            }
            page += 1;
        }

        self.context
            .list_cache
            .set(profile.name.clone(), lists.clone());
        Ok(lists)
    }

    /// `--list` by name (exact, then substring, case-insensitive), else the
    /// profile default.
    fn resolve_list_id(
        &mut self,
        profile: &Profile,
        list_name: Option<&str>,
        cancel: &CancelToken,
    ) -> Result<i64> {
        let Some(name) = list_name else {
            return profile.default_list_id.ok_or_else(|| {
                ApiError::lookup(format!(
                    "No list specified and no default list configured. Use {} login <profile> --default-list <list_id> or pass --list.",
                    self.settings.action_keyword
                ))
                .into()
            });
        };

        let lists = self.cached_lists(profile, cancel)?;
        let wanted = name.to_lowercase();
        let mut matches: Vec<&ListSummary> = lists
            .iter()
            .filter(|l| l.title.to_lowercase() == wanted)
            .collect();
        if matches.is_empty() {
            matches = lists
                .iter()
                .filter(|l| l.title.to_lowercase().contains(&wanted))
                .collect();
        }

        match matches.as_slice() {
            [list] => Ok(list.id),
            [] => Err(ApiError::lookup(format!("List '{}' not found", name)).into()),
            _ => Err(ApiError::lookup(format!("Multiple lists match '{}'", name)).into()),
        }
    }

    fn error_result(&self, error: Error) -> ResultItem {
        match error {
            Error::Parse(e) => results::error_result("Invalid command", e.0),
            Error::ProfileNotFound(name) => results::error_result("Profile not found", name),
            Error::Api(e) if e.kind == ApiErrorKind::Tls => results::error_result(
                "TLS validation failed",
                "Disable with --verify-tls false if you trust the host.",
            ),
            Error::Api(e) => {
                let subtitle = if e.is_access_denied() {
                    format!(
                        "Access denied. Refresh token with '{} login <profile> --token <token>'.",
                        self.settings.action_keyword
                    )
                } else if e.is_transport() {
                    "Check your network connection or TLS settings.".to_string()
                } else {
                    String::new()
                };
                results::error_result(e.message, subtitle)
            }
            Error::SecureStorage(msg) => results::error_result("Secure storage error", msg),
            Error::Storage(msg) => results::error_result("Profile storage error", msg),
            Error::Config(msg) => results::error_result("Configuration error", msg),
            Error::Cancelled => results::error_result("Cancelled", ""),
        }
    }
}

/// `YYYY-MM-DD` -> midnight UTC timestamp.
fn due_timestamp(date: &str) -> Result<String> {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|_| ParseError::new(format!("--due must be a date like 2024-12-31, got {}", date)))?;
    Ok(format!("{}T00:00:00Z", date))
}
