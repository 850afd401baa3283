//! JSON-lines relay for out-of-process display surfaces
//!
//! Reads [`BridgeMessage`]s from an input stream, one per line, and writes
//! replies and bridge events (`overlay-toggled`, `from-dev`) to an output
//! stream. The output stream carries nothing else; logs go to stderr.

use crate::ipc::{BridgeMessage, DisplayLink, Subscription};
use anyhow::{Context, Result};
use parking_lot::Mutex;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

fn write_message<W: Write>(out: &Mutex<W>, message: &BridgeMessage) -> Result<()> {
    let line = message
        .to_json()
        .context("Failed to serialize bridge message")?;
    let mut out = out.lock();
    writeln!(out, "{}", line).context("Failed to write bridge message")?;
    out.flush().context("Failed to flush bridge output")?;
    Ok(())
}

/// Forward every bridge event on `link` to `out`, one message per line
pub fn forward_events<W>(link: &DisplayLink, out: Arc<Mutex<W>>) -> Subscription
where
    W: Write + Send + 'static,
{
    link.subscribe(move |event| {
        let message = BridgeMessage::from(event.clone());
        if let Err(e) = write_message(&*out, &message) {
            warn!("Relay could not deliver {:?}: {:#}", message, e);
        }
    })
}

/// Serve requests from `input` until it ends. Bad lines are logged and
/// skipped. Returns the number of messages handled.
pub fn serve<Rd, W>(input: Rd, link: &DisplayLink, out: &Mutex<W>) -> Result<usize>
where
    Rd: BufRead,
    W: Write,
{
    let mut handled = 0;
    for line in input.lines() {
        let line = line.context("Failed to read bridge input")?;
        if line.trim().is_empty() {
            continue;
        }

        match BridgeMessage::from_json(&line) {
            Ok(message) => {
                debug!("Relay received {:?}", message);
                if let Some(reply) = link.handle_message(message) {
                    write_message(out, &reply)?;
                }
                handled += 1;
            }
            Err(e) => warn!("Ignoring bad bridge message {:?}: {}", line, e),
        }
    }
    Ok(handled)
}

/// A running stdin/stdout relay
pub struct StdioRelay {
    _subscription: Subscription,
    reader: JoinHandle<()>,
}

impl StdioRelay {
    /// Whether stdin has closed
    pub fn is_finished(&self) -> bool {
        self.reader.is_finished()
    }
}

/// Start relaying between `link` and this process's stdin/stdout
pub fn spawn_stdio_relay(link: DisplayLink) -> Result<StdioRelay> {
    let out = Arc::new(Mutex::new(io::stdout()));
    let subscription = forward_events(&link, Arc::clone(&out));

    let reader = thread::Builder::new()
        .name("bridge-relay".to_string())
        .spawn(move || {
            let stdin = io::stdin();
            match serve(stdin.lock(), &link, &*out) {
                Ok(count) => info!("Bridge input closed after {} message(s)", count),
                Err(e) => warn!("Bridge relay stopped: {:#}", e),
            }
        })
        .context("Failed to spawn relay thread")?;

    info!("Bridge relay listening on stdin");
    Ok(StdioRelay {
        _subscription: subscription,
        reader,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::{OverlayController, OverlayStyle};
    use crate::hotkey::MemoryRegistrar;
    use crate::mode::OverlayMode;
    use crate::surface::HeadlessSurface;
    use std::io::Cursor;

    fn controller() -> OverlayController<HeadlessSurface, MemoryRegistrar> {
        OverlayController::new(
            HeadlessSurface::new(),
            MemoryRegistrar::default(),
            OverlayStyle::default(),
        )
    }

    fn lines(out: &Mutex<Vec<u8>>) -> Vec<String> {
        String::from_utf8(out.lock().clone())
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_serve_queues_toggles_and_answers_queries() {
        let controller = controller();
        let link = controller.display_link();
        let out = Mutex::new(Vec::new());
        let input = Cursor::new(
            "{\"channel\":\"toggle-overlay\"}\n\nnot json\n{\"channel\":\"get-mode\"}\n",
        );

        let handled = serve(input, &link, &out).unwrap();
        assert_eq!(handled, 2);
        assert_eq!(lines(&out), vec![r#"{"channel":"current-mode","isOverlay":false}"#]);
        assert_eq!(controller.process_requests(), 1);
        assert_eq!(controller.current_mode(), OverlayMode::Overlay);
    }

    #[test]
    fn test_mode_changes_are_forwarded() {
        let controller = controller();
        let out = Arc::new(Mutex::new(Vec::new()));
        let subscription = forward_events(&controller.display_link(), Arc::clone(&out));

        controller.toggle_mode().unwrap();
        controller.toggle_mode().unwrap();
        drop(subscription);
        controller.toggle_mode().unwrap();

        assert_eq!(
            lines(&out),
            vec![
                r#"{"channel":"overlay-toggled","isOverlay":true}"#,
                r#"{"channel":"overlay-toggled","isOverlay":false}"#,
            ]
        );
    }

    #[test]
    fn test_dev_messages_are_answered_and_relayed() {
        let controller = controller();
        let link = controller.display_link();
        let out = Arc::new(Mutex::new(Vec::new()));
        let _subscription = forward_events(&link, Arc::clone(&out));
        let input = Cursor::new(
            "{\"channel\":\"dev-message\",\"message\":\"ping\"}\n\
             {\"channel\":\"toggle-click-through\",\"passthrough\":true}\n",
        );

        assert_eq!(serve(input, &link, &*out).unwrap(), 2);
        assert_eq!(
            lines(&out),
            vec![
                r#"{"channel":"from-dev","message":"ping"}"#,
                r#"{"channel":"dev-response","message":"Processed: ping"}"#,
            ]
        );

        assert_eq!(controller.process_requests(), 1);
        assert!(controller.surface_properties().ignore_input);
    }

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_output_carries_only_bridge_messages() {
        let logs = LogBuffer::default();
        let sink = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(move || sink.clone())
            .finish();

        let out = Arc::new(Mutex::new(Vec::new()));
        tracing::subscriber::with_default(subscriber, || {
            let controller = controller();
            let link = controller.display_link();
            let _subscription = forward_events(&link, Arc::clone(&out));
            let input = Cursor::new(
                "{\"channel\":\"get-mode\"}\nnot json\n{\"channel\":\"toggle-overlay\"}\n",
            );
            serve(input, &link, &*out).unwrap();
            controller.process_requests();
        });

        let written = lines(&out);
        assert_eq!(written.len(), 2);
        assert!(written.iter().all(|line| BridgeMessage::from_json(line).is_ok()));
        assert!(!logs.0.lock().is_empty());
    }
}
