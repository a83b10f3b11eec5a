pub mod action;
pub mod broker;
pub mod config;
pub mod errors;
pub mod executor;
pub mod page;
pub mod relay;
pub mod resolver;
pub mod session;

use std::path::PathBuf;
use std::sync::Arc;

use crate::broker::{CommandBroker, HttpInterpreter, JsonlMetricsLog};
use crate::errors::{WebGenError, WebGenResult};
use crate::executor::{ActionExecutor, RunQueue};
use crate::page::chrome::BrowserSession;
use crate::page::{Document, PageRegistry};
use crate::relay::relay_channel;
use crate::session::CommandSession;

const RELAY_BUFFER: usize = 32;

/// What the binary was asked to do.
#[derive(Debug, Default)]
pub struct RunOptions {
    pub command: Option<String>,
    /// Page to open before the command is sent.
    pub url: Option<String>,
    pub config: Option<PathBuf>,
    /// Print the interpreter's command history instead of running a command.
    pub history: bool,
}

pub async fn run(opts: RunOptions) -> WebGenResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Load .env file if present (ignore error if not found)
    let _ = dotenvy::dotenv();

    let config = config::load_or_default(opts.config.as_deref())?;
    let interpreter = Arc::new(HttpInterpreter::from_config(&config.interpreter)?);

    if opts.history {
        let user_id = config.interpreter.user_id.clone().ok_or_else(|| {
            WebGenError::Config("history needs `user_id` under [interpreter]".into())
        })?;
        for entry in interpreter.history(&user_id).await? {
            println!("{}", entry.command);
        }
        return Ok(());
    }

    let command = opts
        .command
        .ok_or_else(|| WebGenError::Config("no command given".into()))?;

    let browser_cfg = config.browser.clone();
    let start_url = opts.url.clone();
    let browser = tokio::task::spawn_blocking(move || {
        let browser = BrowserSession::attach_or_launch(&browser_cfg)?;
        if let Some(url) = &start_url {
            browser.open(url)?;
        }
        Ok::<_, WebGenError>(browser)
    })
    .await
    .map_err(|e| WebGenError::Page(format!("browser startup task failed: {e}")))??;
    let document: Arc<dyn Document> = Arc::new(browser.document());

    let pages = Arc::new(PageRegistry::new());
    let context = pages.register(Arc::clone(&document)).await;

    let metrics_path = config.metrics.resolved_path();
    tracing::info!(path = %metrics_path.display(), "metrics log");
    let broker = Arc::new(
        CommandBroker::new(interpreter, pages, Arc::new(JsonlMetricsLog::new(metrics_path)))
            .with_user(config.interpreter.user_id.clone()),
    );

    let (relay, requests) = relay_channel(RELAY_BUFFER);
    let server = tokio::spawn(Arc::clone(&broker).serve(requests));

    let executor = ActionExecutor::from_config(document, &config)?;
    let chat = CommandSession::new(relay.for_context(context), RunQueue::new(Arc::new(executor)));
    drop(relay);

    match chat.submit(&command).await {
        Some(reply) => println!("{reply}"),
        None => tracing::warn!("blank command, nothing sent"),
    }
    chat.wait_idle().await;

    // Last relay handle goes away with the session; the broker loop then ends.
    drop(chat);
    if let Err(e) = server.await {
        tracing::error!(error = %e, "broker task ended abnormally");
    }
    drop(browser);
    Ok(())
}
