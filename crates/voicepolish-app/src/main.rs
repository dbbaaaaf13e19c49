//! VoicePolish application binary - composition root.
//!
//! 1. Parse CLI flags and load configuration (any config error is fatal)
//! 2. Initialize tracing
//! 3. Build the platform collaborators and the session orchestrator
//! 4. Register the global hotkey on a dedicated thread and toggle sessions
//! 5. On Ctrl+C, tear down any live session and exit 0

mod cli;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::oneshot;

use voicepolish_core::PolishConfig;
use voicepolish_dictation::{
    Collaborators, EditorScratch, FocusController, HotkeyConfig, HotkeyService,
    SessionOrchestrator, SystemClipboard, WindowsFocusController, WindowsKeyboard,
};
use voicepolish_rewrite::RewriteClient;

use cli::CliArgs;

/// How often the hotkey thread pumps messages and checks for presses.
const HOTKEY_POLL: Duration = Duration::from_millis(20);

fn init_tracing(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .init();
}

fn build_orchestrator(config: &PolishConfig) -> Result<SessionOrchestrator, Box<dyn std::error::Error>> {
    let focus: Arc<dyn FocusController> = Arc::new(WindowsFocusController::new());
    let scratch = EditorScratch::new(&config.scratch, &config.timing, Arc::clone(&focus));
    let rewriter = RewriteClient::from_config(&config.llm)?;

    let collaborators = Collaborators {
        focus,
        keyboard: Arc::new(WindowsKeyboard::new()),
        clipboard: Arc::new(SystemClipboard::new()),
        scratch: Arc::new(scratch),
        rewriter,
    };

    Ok(SessionOrchestrator::new(
        collaborators,
        config.timing.clone(),
        config.dictation.release_stuck_modifiers,
    ))
}

/// Register the hotkey and toggle the orchestrator on every press.
///
/// `HotkeyService` must live on the thread that registered it, and that thread
/// must pump window messages, so this runs as a blocking task. The
/// registration result is reported through `ready`.
fn hotkey_loop(
    key: String,
    orchestrator: SessionOrchestrator,
    stop: Arc<AtomicBool>,
    ready: oneshot::Sender<Result<(), String>>,
) {
    let service = match HotkeyService::new(HotkeyConfig { key }) {
        Ok(service) => {
            let _ = ready.send(Ok(()));
            service
        }
        Err(e) => {
            let _ = ready.send(Err(e.to_string()));
            return;
        }
    };

    while !stop.load(Ordering::Relaxed) {
        service.pump_messages();
        if service.was_pressed() {
            tracing::debug!(state = %orchestrator.state(), "Hotkey pressed");
            // The spawned procedure runs on its own; nothing waits on it here.
            drop(orchestrator.toggle());
        }
        std::thread::sleep(HOTKEY_POLL);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    let config_file = args.resolve_config_path();
    let loaded = PolishConfig::load(&config_file);

    let level = args.resolve_log_level(loaded.as_ref().ok().map(|c| c.general.log_level.as_str()));
    init_tracing(&level);

    tracing::info!("Starting VoicePolish v{}", env!("CARGO_PKG_VERSION"));

    let config = match loaded {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(path = %config_file.display(), error = %e, "Failed to load configuration");
            return Err(e.into());
        }
    };
    tracing::info!(path = %config_file.display(), model = %config.llm.model, "Configuration loaded");
    tracing::debug!(timing = ?config.timing, "Timing configuration");

    let orchestrator = build_orchestrator(&config)?;

    let hotkey = args.resolve_hotkey(&config.dictation.hotkey);
    let stop = Arc::new(AtomicBool::new(false));
    let (ready_tx, ready_rx) = oneshot::channel();

    let listener = {
        let key = hotkey.clone();
        let orchestrator = orchestrator.clone();
        let stop = Arc::clone(&stop);
        tokio::task::spawn_blocking(move || hotkey_loop(key, orchestrator, stop, ready_tx))
    };

    match ready_rx.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            tracing::error!(hotkey = %hotkey, error = %e, "Failed to register hotkey");
            return Err(e.into());
        }
        Err(_) => return Err("hotkey thread exited before registering".into()),
    }

    #[cfg(not(target_os = "windows"))]
    tracing::warn!("Global hotkey, focus and key injection require Windows; sessions cannot be triggered on this platform");

    tracing::info!(hotkey = %hotkey, "Ready, press the hotkey to start dictating (Ctrl+C to quit)");

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");

    stop.store(true, Ordering::Relaxed);
    orchestrator.shutdown().await;
    if let Err(e) = listener.await {
        tracing::warn!(error = %e, "Hotkey thread did not exit cleanly");
    }

    tracing::info!("VoicePolish stopped");
    Ok(())
}
