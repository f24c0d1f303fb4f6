use std::io::Write;

use vikunja_flow::cache::TtlCache;
use vikunja_flow::client::VikunjaClient;
use vikunja_flow::client::transport::ReqwestTransport;
use vikunja_flow::config::PluginConfig;
use vikunja_flow::error::Error;
use vikunja_flow::plugin::{self, CommandClipboard, Plugin, RpcRequest, RpcResponse};
use vikunja_flow::results;
use vikunja_flow::router::{CommandRouter, PluginContext, RouterSettings};
use vikunja_flow::store::profiles::ProfileStore;
use vikunja_flow::store::secrets;

fn main() {
    let (config, config_error) = match PluginConfig::load() {
        Ok(config) => (config, None),
        Err(e) => (PluginConfig::default(), Some(e)),
    };
    init_logging(config.debug_logging);
    if let Some(e) = config_error {
        log::warn!("{}; using defaults", e);
    }

    let args: Vec<String> = std::env::args().skip(1).collect();
    let request = match plugin::parse_args(&args) {
        Ok(request) => request,
        Err(e) => {
            log::error!("Bad invocation: {}", e);
            eprintln!("usage: vikunja-flow '{{\"method\": \"query\", \"parameters\": [\"find milk\"]}}'");
            std::process::exit(2);
        }
    };

    let wants_response = matches!(request.method.as_str(), "query" | "context_menu");
    let response = match run(&config, request) {
        Ok(response) => response,
        Err(e) => {
            log::error!("Plugin start-up failed: {}", e);
            wants_response.then(|| RpcResponse {
                result: vec![results::error_result("Vikunja Flow failed to start", e.to_string())],
            })
        }
    };

    if let Some(response) = response {
        match serde_json::to_string(&response) {
            Ok(json) => {
                let mut stdout = std::io::stdout().lock();
                if let Err(e) = stdout.write_all(json.as_bytes()).and_then(|_| stdout.flush()) {
                    log::error!("Failed to write response: {}", e);
                }
            }
            Err(e) => log::error!("Failed to serialize response: {}", e),
        }
    }
}

fn run(config: &PluginConfig, request: RpcRequest) -> Result<Option<RpcResponse>, Error> {
    let secrets = secrets::detect(&config.service_name);
    let profiles = ProfileStore::open(config.profiles_path(), secrets)?;
    let transport = ReqwestTransport::new(config.request_timeout())?;

    let context = PluginContext::new(profiles, TtlCache::new(config.list_cache_ttl()));
    let router = CommandRouter::new(
        context,
        VikunjaClient::new(Box::new(transport)),
        RouterSettings::from(config),
    );
    let mut plugin = Plugin::new(
        router,
        Box::new(CommandClipboard::detect(config)),
        config.browser_command.clone(),
    );
    Ok(plugin.dispatch(request))
}

/// Log to the systemd user journal (`journalctl --user -t vikunja-flow -f`),
/// or to stderr where there is no journal. Our crate logs at info (debug when
/// toggled), everything else at warn. Stdout carries the JSON-RPC response.
fn init_logging(debug: bool) {
    vikunja_flow::set_debug_logging(debug);

    #[cfg(target_os = "linux")]
    {
        if let Some(journal) = journal::logger() {
            if log::set_boxed_logger(journal).is_ok() {
                // Global max must be Debug so crate debug logs can pass when toggled.
                log::set_max_level(log::LevelFilter::Debug);
            }
            return;
        }
    }

    let crate_level = if debug {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    let _ = env_logger::Builder::new()
        .filter_level(log::LevelFilter::Warn)
        .filter_module("vikunja_flow", crate_level)
        .target(env_logger::Target::Stderr)
        .try_init();
}

#[cfg(target_os = "linux")]
mod journal {
    struct FilteredJournal {
        inner: systemd_journal_logger::JournalLog,
    }

    impl log::Log for FilteredJournal {
        fn enabled(&self, metadata: &log::Metadata) -> bool {
            if metadata.target().starts_with("vikunja_flow") {
                let max = if vikunja_flow::debug_logging() {
                    log::LevelFilter::Debug
                } else {
                    log::LevelFilter::Info
                };
                metadata.level() <= max
            } else {
                metadata.level() <= log::LevelFilter::Warn
            }
        }
        fn log(&self, record: &log::Record) {
            if self.enabled(record.metadata()) {
                self.inner.log(record);
            }
        }
        fn flush(&self) {
            self.inner.flush();
        }
    }

    /// `None` when the journal socket is unavailable.
    pub fn logger() -> Option<Box<dyn log::Log>> {
        let journal = systemd_journal_logger::JournalLog::new()
            .ok()?
            .with_syslog_identifier("vikunja-flow".to_string());
        Some(Box::new(FilteredJournal { inner: journal }))
    }
}
