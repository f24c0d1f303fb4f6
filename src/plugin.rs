//! Flow Launcher host shim.
//!
//! The launcher runs the binary once per request with a JSON-RPC payload
//! `{"method": ..., "parameters": [...]}` and reads `{"result": [...]}` back
//! from stdout for `query` and `context_menu`.

use std::io::Write;
use std::process::{Command, Stdio};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cancel::CancelToken;
use crate::config::PluginConfig;
use crate::results::{self, ResultItem, TaskContext};
use crate::router::CommandRouter;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RpcRequest {
    pub method: String,
    #[serde(default)]
    pub parameters: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RpcResponse {
    pub result: Vec<ResultItem>,
}

/// Decode the process arguments into a request.
///
/// Accepts the launcher's single JSON argument, or `<method> [json]`.
pub fn parse_args(args: &[String]) -> Result<RpcRequest, String> {
    let Some(first) = args.first() else {
        return Err("no request given".into());
    };
    if first.trim_start().starts_with('{') {
        return serde_json::from_str(first).map_err(|e| format!("invalid request: {}", e));
    }

    let parameters = match args.get(1) {
        None => Vec::new(),
        Some(raw) => match serde_json::from_str::<Value>(raw) {
            Ok(Value::Array(items)) => items,
            Ok(Value::Null) => Vec::new(),
            Ok(other) => vec![other],
            // Bare text is treated as a single string parameter.
            Err(_) => vec![Value::String(raw.clone())],
        },
    };
    Ok(RpcRequest {
        method: first.clone(),
        parameters,
    })
}

pub trait Clipboard {
    fn copy_text(&self, text: &str) -> std::io::Result<()>;
}

/// Pipes text into the first clipboard tool that can be started.
pub struct CommandClipboard {
    candidates: Vec<Vec<String>>,
}

impl CommandClipboard {
    pub fn new(candidates: Vec<Vec<String>>) -> Self {
        Self { candidates }
    }

    /// The configured command, or the usual tools for this platform.
    pub fn detect(config: &PluginConfig) -> Self {
        if !config.clipboard_command.is_empty() {
            return Self::new(vec![config.clipboard_command.clone()]);
        }
        let defaults: &[&[&str]] = if cfg!(target_os = "macos") {
            &[&["pbcopy"]]
        } else if cfg!(target_os = "windows") {
            &[&["clip"]]
        } else {
            &[&["wl-copy"], &["xclip", "-selection", "clipboard"], &["xsel", "--clipboard", "--input"]]
        };
        Self::new(
            defaults
                .iter()
                .map(|cmd| cmd.iter().map(|s| s.to_string()).collect())
                .collect(),
        )
    }

    fn pipe_into(command: &[String], text: &str) -> std::io::Result<()> {
        let Some((program, args)) = command.split_first() else {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "empty clipboard command",
            ));
        };
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(text.as_bytes())?;
        }
        let status = child.wait()?;
        if !status.success() {
            return Err(std::io::Error::other(format!("{} exited with {}", program, status)));
        }
        Ok(())
    }
}

impl Clipboard for CommandClipboard {
    fn copy_text(&self, text: &str) -> std::io::Result<()> {
        let mut last_err = std::io::Error::new(std::io::ErrorKind::NotFound, "no clipboard tool");
        for command in &self.candidates {
            match Self::pipe_into(command, text) {
                Ok(()) => return Ok(()),
                Err(e) => {
                    log::debug!("Clipboard command {:?} failed: {}", command, e);
                    last_err = e;
                }
            }
        }
        Err(last_err)
    }
}

pub struct Plugin {
    router: CommandRouter,
    clipboard: Box<dyn Clipboard>,
    browser_command: String,
    in_flight: Option<CancelToken>,
}

impl Plugin {
    pub fn new(router: CommandRouter, clipboard: Box<dyn Clipboard>, browser_command: String) -> Self {
        Self {
            router,
            clipboard,
            browser_command,
            in_flight: None,
        }
    }

    pub fn router(&self) -> &CommandRouter {
        &self.router
    }

    /// Run one request. Only `query` and `context_menu` produce a response.
    pub fn dispatch(&mut self, request: RpcRequest) -> Option<RpcResponse> {
        log::debug!("RPC {}", request.method);
        let first = request.parameters.first();
        match request.method.as_str() {
            "query" => {
                let text = first.map(query_text).unwrap_or_default();
                Some(RpcResponse {
                    result: self.query(&text),
                })
            }
            "context_menu" => Some(RpcResponse {
                result: self.context_menu(first.unwrap_or(&Value::Null)),
            }),
            "open_task" => {
                if let Some(id) = first.and_then(task_id_param) {
                    self.open_task(id);
                }
                None
            }
            "complete_task" => {
                if let Some(id) = first.and_then(task_id_param) {
                    self.complete_task(id);
                }
                None
            }
            "copy_task_link" => {
                self.copy_task_link(first.and_then(Value::as_str).unwrap_or(""));
                None
            }
            "noop" => None,
            other => {
                log::warn!("Unknown RPC method {}", other);
                None
            }
        }
    }

    /// Supersede any in-flight query, then run this one.
    pub fn query(&mut self, text: &str) -> Vec<ResultItem> {
        if let Some(previous) = self.in_flight.take() {
            previous.cancel();
        }
        let token = CancelToken::new();
        self.in_flight = Some(token.clone());
        let items = self.router.handle(text, &token);
        // Selection actions that follow must not be cancelled by this token.
        self.in_flight = None;
        items
    }

    pub fn context_menu(&self, data: &Value) -> Vec<ResultItem> {
        let context = serde_json::from_value::<TaskContext>(data.clone()).ok();
        results::context_menu(context.as_ref())
    }

    /// Browser URL for a task on the active profile.
    pub fn task_url(&self, task_id: i64) -> Option<String> {
        let profile = self.router.context().profiles.get_active_profile().ok()?;
        Some(self.router.client().build_task_url(&profile, task_id))
    }

    pub fn open_task(&self, task_id: i64) {
        let Some(url) = self.task_url(task_id) else {
            log::warn!("Cannot open task {}: no active profile", task_id);
            return;
        };
        if let Err(e) = Command::new(&self.browser_command).arg(&url).spawn() {
            log::error!("Failed to open {} with {}: {}", url, self.browser_command, e);
        }
    }

    /// Errors are logged only; the launcher has no place to show them.
    pub fn complete_task(&mut self, task_id: i64) {
        let profile = match self.router.context().profiles.get_active_profile() {
            Ok(profile) => profile,
            Err(e) => {
                log::warn!("Cannot complete task {}: {}", task_id, e);
                return;
            }
        };
        match self.router.client().complete_task(&profile, task_id) {
            Ok(task) => {
                log::info!("Completed task {} ({})", task.id, task.title);
                self.router.context_mut().list_cache.pop(&profile.name);
            }
            Err(e) => log::warn!("Failed to complete task {}: {}", task_id, e),
        }
    }

    pub fn copy_task_link(&self, url: &str) {
        if url.is_empty() {
            return;
        }
        if let Err(e) = self.clipboard.copy_text(url) {
            log::error!("Failed to copy link: {}", e);
        }
    }
}

fn query_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Object(map) => ["search", "Query"]
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_str))
            .unwrap_or_default()
            .to_string(),
        _ => String::new(),
    }
}

fn task_id_param(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::TtlCache;
    use crate::client::VikunjaClient;
    use crate::client::fake::{FakeTransport, json};
    use crate::core::profile::Profile;
    use crate::router::{PluginContext, RouterSettings};
    use crate::store::profiles::ProfileStore;
    use crate::store::secrets::MemoryStore;
    use reqwest::Method;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Clone, Default)]
    struct RecordingClipboard {
        copied: Rc<RefCell<Vec<String>>>,
    }

    impl Clipboard for RecordingClipboard {
        fn copy_text(&self, text: &str) -> std::io::Result<()> {
            self.copied.borrow_mut().push(text.to_string());
            Ok(())
        }
    }

    fn plugin(transport: FakeTransport, clipboard: RecordingClipboard) -> Plugin {
        let path = std::env::temp_dir()
            .join(format!("vikunja-flow-plugin-{}", uuid::Uuid::new_v4()))
            .join("profiles.json");
        let mut profiles = ProfileStore::open(path, Box::new(MemoryStore::new())).unwrap();
        profiles
            .save_profile(&Profile::new("home", "https://vik.example/"), Some("tok"))
            .unwrap();
        let router = CommandRouter::new(
            PluginContext::new(profiles, TtlCache::default()),
            VikunjaClient::new(Box::new(transport)),
            RouterSettings::default(),
        );
        Plugin::new(router, Box::new(clipboard), "true".into())
    }

    #[test]
    fn parses_launcher_json_request() {
        let args = vec![r#"{"method": "query", "parameters": ["find milk"]}"#.to_string()];
        let request = parse_args(&args).unwrap();
        assert_eq!(request.method, "query");
        assert_eq!(request.parameters, vec![Value::from("find milk")]);
    }

    #[test]
    fn parses_method_and_payload_arguments() {
        let args = vec!["open_task".to_string(), "[12]".to_string()];
        assert_eq!(parse_args(&args).unwrap().parameters, vec![Value::from(12)]);

        let args = vec!["context_menu".to_string(), r#"{"task_id": 3}"#.to_string()];
        assert_eq!(
            parse_args(&args).unwrap().parameters[0]["task_id"],
            Value::from(3)
        );

        let args = vec!["query".to_string(), "lists".to_string()];
        assert_eq!(parse_args(&args).unwrap().parameters, vec![Value::from("lists")]);

        assert!(parse_args(&[]).is_err());
    }

    #[test]
    fn query_returns_wrapped_results() {
        let mut plugin = plugin(FakeTransport::new(), RecordingClipboard::default());
        let response = plugin
            .dispatch(RpcRequest {
                method: "query".into(),
                parameters: vec![serde_json::json!({ "search": "" })],
            })
            .unwrap();
        assert_eq!(response.result[0].title, "Vikunja Flow");

        let wire = serde_json::to_value(&response).unwrap();
        assert_eq!(wire["result"][0]["Title"], "Vikunja Flow");
    }

    #[test]
    fn context_menu_needs_task_id() {
        let mut plugin = plugin(FakeTransport::new(), RecordingClipboard::default());
        let menu = plugin
            .dispatch(RpcRequest {
                method: "context_menu".into(),
                parameters: vec![serde_json::json!({ "task_id": 9, "url": "https://vik.example/tasks/9" })],
            })
            .unwrap();
        assert_eq!(menu.result.len(), 3);
        assert_eq!(menu.result[0].title, "Open in browser");

        let from_text = plugin
            .dispatch(RpcRequest {
                method: "context_menu".into(),
                parameters: vec![serde_json::json!({ "task_id": "9" })],
            })
            .unwrap();
        assert_eq!(from_text.result.len(), 3);
        assert_eq!(
            from_text.result[1].action.as_ref().unwrap().parameters[0],
            Value::from(9)
        );

        let empty = plugin
            .dispatch(RpcRequest {
                method: "context_menu".into(),
                parameters: vec![serde_json::json!({ "url": "x" })],
            })
            .unwrap();
        assert!(empty.result.is_empty());
    }

    #[test]
    fn copy_link_uses_clipboard_and_skips_empty() {
        let clipboard = RecordingClipboard::default();
        let copied = Rc::clone(&clipboard.copied);
        let mut plugin = plugin(FakeTransport::new(), clipboard);

        for url in ["https://vik.example/tasks/9", ""] {
            let response = plugin.dispatch(RpcRequest {
                method: "copy_task_link".into(),
                parameters: vec![Value::from(url)],
            });
            assert!(response.is_none());
        }
        assert_eq!(*copied.borrow(), vec!["https://vik.example/tasks/9".to_string()]);
    }

    #[test]
    fn complete_action_swallows_errors() {
        let transport = FakeTransport::new()
            .when(
                Method::PUT,
                "https://vik.example/tasks/2",
                json(200, serde_json::json!({ "id": 2, "title": "Done thing", "done": true })),
            )
            .when(
                Method::PUT,
                "https://vik.example/tasks/3",
                json(404, serde_json::json!({ "message": "not found" })),
            );
        let log = transport.log();
        let mut plugin = plugin(transport, RecordingClipboard::default());

        plugin.dispatch(RpcRequest {
            method: "complete_task".into(),
            parameters: vec![Value::from(2)],
        });
        plugin.dispatch(RpcRequest {
            method: "complete_task".into(),
            parameters: vec![Value::from("3")],
        });
        assert_eq!(log.borrow().len(), 2);
    }

    #[test]
    fn task_url_uses_active_profile() {
        let plugin = plugin(FakeTransport::new(), RecordingClipboard::default());
        assert_eq!(
            plugin.task_url(5).as_deref(),
            Some("https://vik.example/tasks/5")
        );
    }
}
