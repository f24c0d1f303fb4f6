//! Launcher display entries and the mappers that build them.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::task::{ListSummary, Task};

pub const ICON_APP: &str = "Images/app.png";
pub const ICON_LIST: &str = ICON_APP;
pub const ICON_TASK: &str = ICON_APP;

const TASK_KEY_HINT: &str = "Enter: open • Alt: complete • Ctrl: copy link";

/// Method call the launcher sends back when an entry is chosen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcAction {
    pub method: String,
    pub parameters: Vec<Value>,
}

impl RpcAction {
    pub fn new(method: impl Into<String>, parameters: Vec<Value>) -> Self {
        Self {
            method: method.into(),
            parameters,
        }
    }
}

/// Payload handed to the context menu for a task entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskContext {
    #[serde(deserialize_with = "number_or_numeric_string")]
    pub task_id: i64,
    #[serde(default, deserialize_with = "string_or_null")]
    pub url: String,
}

/// Hosts may hand the id back as `9` or `"9"`.
fn number_or_numeric_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Number(i64),
        Text(String),
    }

    match RawId::deserialize(deserializer)? {
        RawId::Number(id) => Ok(id),
        RawId::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| de::Error::custom(format!("invalid task id {:?}", text))),
    }
}

fn string_or_null<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// One row in the launcher's result list, serialized in Flow Launcher's shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultItem {
    #[serde(rename = "Title")]
    pub title: String,
    #[serde(rename = "SubTitle")]
    pub subtitle: String,
    #[serde(rename = "IcoPath")]
    pub icon: String,
    #[serde(rename = "JsonRPCAction", skip_serializing_if = "Option::is_none")]
    pub action: Option<RpcAction>,
    #[serde(rename = "ContextData", skip_serializing_if = "Option::is_none")]
    pub context: Option<TaskContext>,
    #[serde(rename = "AutoCompleteText", skip_serializing_if = "Option::is_none")]
    pub auto_complete: Option<String>,
    #[serde(rename = "DontHideAfterAction", skip_serializing_if = "std::ops::Not::not", default)]
    pub keep_open: bool,
}

impl ResultItem {
    fn plain(title: impl Into<String>, subtitle: impl Into<String>, icon: &str) -> Self {
        Self {
            title: title.into(),
            subtitle: subtitle.into(),
            icon: icon.to_string(),
            action: None,
            context: None,
            auto_complete: None,
            keep_open: false,
        }
    }
}

pub fn task_result(task: &Task) -> ResultItem {
    let mut parts = Vec::new();
    if let Some(due) = task.due_date {
        parts.push(format!("Due {}", due.format("%Y-%m-%d %H:%M UTC")));
    }
    if let Some(list_id) = task.list_id {
        parts.push(format!("List #{}", list_id));
    }
    if task.done {
        parts.push("Completed".to_string());
    }
    let subtitle = if parts.is_empty() {
        TASK_KEY_HINT.to_string()
    } else {
        parts.join(" | ")
    };

    let mut item = ResultItem::plain(task.title.clone(), subtitle, ICON_TASK);
    item.action = Some(RpcAction::new("open_task", vec![Value::from(task.id)]));
    item.context = Some(TaskContext {
        task_id: task.id,
        url: task.url.clone(),
    });
    item
}

pub fn list_result(list: &ListSummary) -> ResultItem {
    ResultItem::plain(list.title.clone(), format!("List #{}", list.id), ICON_LIST)
}

pub fn info_result(title: impl Into<String>, subtitle: impl Into<String>) -> ResultItem {
    ResultItem::plain(title, subtitle, ICON_APP)
}

pub fn error_result(title: impl Into<String>, subtitle: impl Into<String>) -> ResultItem {
    ResultItem::plain(title, subtitle, ICON_APP)
}

/// Entry that re-fills the search box with `follow_up` to load the next page.
pub fn show_more_result(follow_up: String) -> ResultItem {
    let mut item = ResultItem::plain("Show more…", "Load more results", ICON_APP);
    item.action = Some(RpcAction::new("noop", Vec::new()));
    item.auto_complete = Some(follow_up);
    item.keep_open = true;
    item
}

/// The three task actions offered on right-click; empty without a task.
pub fn context_menu(context: Option<&TaskContext>) -> Vec<ResultItem> {
    let Some(context) = context else {
        return Vec::new();
    };
    let id = Value::from(context.task_id);
    let action = |title: &str, method: &str, parameters: Vec<Value>| {
        let mut item = ResultItem::plain(title, "", ICON_APP);
        item.action = Some(RpcAction::new(method, parameters));
        item
    };
    vec![
        action("Open in browser", "open_task", vec![id.clone()]),
        action("Mark complete", "complete_task", vec![id]),
        action(
            "Copy link",
            "copy_task_link",
            vec![Value::from(context.url.clone())],
        ),
    ]
}
