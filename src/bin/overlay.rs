//! GameOverlay.Shell - Overlay window process
//!
//! This process manages:
//! - The main window and its normal/overlay mode
//! - Global shortcuts (overlay toggle, developer panel)
//! - The mode bridge relay for out-of-process display surfaces
//!
//! Usage: game_overlay [--headless] [--stdio] [--config <path>]

use anyhow::{bail, Context, Result};
use game_overlay::backend::BackendClient;
use game_overlay::config::{self, OverlayConfig};
use game_overlay::hotkey::{self, GlobalHotkeyRegistrar, ShortcutAction};
use game_overlay::relay;
use game_overlay::surface::HeadlessSurface;
use game_overlay::window::{self, WinitSurface};
use game_overlay::{OverlayController, OverlayStyle, StartupWarning};
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use winit::event::{Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop, EventLoopWindowTarget};
use winit::window::Window;

/// How often shortcut events and bridge requests are polled
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Startup flags parsed from command line
#[derive(Debug, Default)]
struct StartupFlags {
    /// Run without a window
    headless: bool,
    /// Relay bridge messages over stdin/stdout
    stdio: bool,
    /// Alternate config file
    config_path: Option<PathBuf>,
}

impl StartupFlags {
    fn parse(mut args: impl Iterator<Item = String>) -> Result<Self> {
        let mut flags = StartupFlags::default();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--headless" => flags.headless = true,
                "--stdio" => flags.stdio = true,
                "--config" => {
                    let path = args.next().context("--config needs a path")?;
                    flags.config_path = Some(PathBuf::from(path));
                }
                other => bail!(
                    "unknown argument '{}'\nusage: game_overlay [--headless] [--stdio] [--config <path>]",
                    other
                ),
            }
        }
        Ok(flags)
    }
}

fn main() -> Result<()> {
    // stdout belongs to the bridge relay
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    info!("GameOverlay.Shell starting...");

    let flags = StartupFlags::parse(std::env::args().skip(1))?;
    let config = match &flags.config_path {
        Some(path) => config::load_config_from(path),
        None => config::load_config(),
    };
    debug!("Configuration: {:?}", config);

    spawn_backend_check(&config);

    if flags.headless {
        run_headless(&config, &flags)
    } else {
        run_windowed(&config, &flags)
    }
}

/// Main window plus event loop
fn run_windowed(config: &OverlayConfig, flags: &StartupFlags) -> Result<()> {
    let event_loop = EventLoop::new().context("Failed to create event loop")?;

    let surface = WinitSurface::new(window::build_main_window(&event_loop, config)?);
    let main_window = surface.window_id();

    // Created on the event-loop thread so the OS delivers hotkey messages
    let controller = OverlayController::new(
        surface,
        GlobalHotkeyRegistrar::new(),
        OverlayStyle::from_config(config),
    );

    let warnings = controller.register_configured_shortcuts(config);
    report_startup_warnings(&warnings, true);

    let _relay = if flags.stdio {
        Some(relay::spawn_stdio_relay(controller.display_link())?)
    } else {
        None
    };

    let mut dev_panel: Option<Window> = None;

    info!("Overlay ready, entering event loop");

    event_loop
        .run(move |event, elwt| {
            elwt.set_control_flow(ControlFlow::WaitUntil(Instant::now() + POLL_INTERVAL));

            match event {
                Event::WindowEvent {
                    window_id,
                    event: WindowEvent::CloseRequested,
                } => {
                    if dev_panel.as_ref().is_some_and(|w| w.id() == window_id) {
                        info!("Developer panel closed");
                        dev_panel = None;
                    } else if window_id == main_window {
                        info!("Main window closed, exiting");
                        elwt.exit();
                    }
                }

                Event::AboutToWait => {
                    for id in hotkey::drain_pressed() {
                        match controller.on_shortcut_pressed(id) {
                            Ok(Some(ShortcutAction::ToggleDevPanel)) => {
                                toggle_dev_panel(&mut dev_panel, elwt);
                            }
                            Ok(_) => {}
                            Err(e) => error!("Shortcut toggle failed: {}", e),
                        }
                    }
                    controller.process_requests();
                }

                Event::LoopExiting => {
                    controller.shutdown();
                }

                _ => {}
            }
        })
        .context("Event loop failed")?;

    Ok(())
}

/// Open the developer panel, or close it if it is open
fn toggle_dev_panel<T: 'static>(dev_panel: &mut Option<Window>, elwt: &EventLoopWindowTarget<T>) {
    if dev_panel.take().is_some() {
        info!("Developer panel closed");
        return;
    }

    match window::build_dev_panel(elwt) {
        Ok(panel) => {
            info!("Developer panel opened");
            *dev_panel = Some(panel);
        }
        Err(e) => error!("{:#}", e),
    }
}

/// No window: a headless surface driven by shortcuts and the stdio relay
fn run_headless(config: &OverlayConfig, flags: &StartupFlags) -> Result<()> {
    let controller = OverlayController::new(
        HeadlessSurface::new(),
        GlobalHotkeyRegistrar::new(),
        OverlayStyle::from_config(config),
    );

    let warnings = controller.register_configured_shortcuts(config);
    report_startup_warnings(&warnings, false);

    let relay = if flags.stdio {
        Some(relay::spawn_stdio_relay(controller.display_link())?)
    } else {
        warn!("Headless without --stdio: only global shortcuts can toggle the overlay");
        None
    };

    info!("Headless overlay running");

    loop {
        for id in hotkey::drain_pressed() {
            match controller.on_shortcut_pressed(id) {
                Ok(Some(ShortcutAction::ToggleDevPanel)) => {
                    debug!("Developer panel is not available in headless mode");
                }
                Ok(_) => {}
                Err(e) => error!("Shortcut toggle failed: {}", e),
            }
        }
        controller.process_requests();

        if relay.as_ref().is_some_and(|r| r.is_finished()) {
            break;
        }
        thread::sleep(POLL_INTERVAL);
    }

    // Requests sent just before stdin closed
    controller.process_requests();
    controller.shutdown();

    info!("GameOverlay.Shell shutting down");
    Ok(())
}

/// Log and show shortcut failures. With `dialog` they also pop up as a
/// native warning box.
fn report_startup_warnings(warnings: &[StartupWarning], dialog: bool) {
    if warnings.is_empty() {
        return;
    }

    let text = warnings
        .iter()
        .map(|w| w.to_string())
        .collect::<Vec<_>>()
        .join("\n");

    eprintln!("Warning:\n{}", text);

    if dialog {
        let _ = rfd::MessageDialog::new()
            .set_level(rfd::MessageLevel::Warning)
            .set_title("Game Overlay - shortcuts unavailable")
            .set_description(text)
            .set_buttons(rfd::MessageButtons::Ok)
            .show();
    }
}

/// Check the backend in the background and log what it reports
fn spawn_backend_check(config: &OverlayConfig) {
    let config = config.clone();
    thread::spawn(move || {
        let client = match BackendClient::from_config(&config) {
            Ok(client) => client,
            Err(e) => {
                warn!("Backend client unavailable: {}", e);
                return;
            }
        };

        if let Err(e) = client.ping() {
            warn!("Backend at {} is not reachable: {}", config.backend_url, e);
            return;
        }
        info!("Backend reachable at {}", config.backend_url);

        match client.detect_game() {
            Ok(Some(game)) => info!("Current game: {}", game),
            Ok(None) => info!("No game detected"),
            Err(e) => warn!("Game detection failed: {}", e),
        }
    });
}
