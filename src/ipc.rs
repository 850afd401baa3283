/// Mode bridge between the overlay controller and display surfaces
///
/// Display surfaces send toggle requests over a crossbeam channel and
/// subscribe to bridge events with handlers. Every subscription returns a
/// [`Subscription`] that removes exactly the handler it was created for.
/// Events are queued in the order they happen and delivered in that order,
/// one at a time.
use crate::mode::{ModeReader, OverlayMode};
use crossbeam::channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Wire form of bridge traffic, one JSON object per message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "channel", rename_all = "kebab-case")]
pub enum BridgeMessage {
    /// Display -> Controller: flip the mode
    ToggleOverlay,
    /// Controller -> Display: mode after a flip
    OverlayToggled {
        #[serde(rename = "isOverlay")]
        is_overlay: bool,
    },
    /// Display -> Controller: ask for the current mode
    GetMode,
    /// Controller -> Display: reply to `GetMode`
    CurrentMode {
        #[serde(rename = "isOverlay")]
        is_overlay: bool,
    },
    /// Display -> Controller: let input pass through the main window
    ToggleClickThrough { passthrough: bool },
    /// Developer panel -> Controller: free-form text
    DevMessage { message: String },
    /// Controller -> Developer panel: acknowledgement of `DevMessage`
    DevResponse { message: String },
    /// Controller -> Display: text relayed from the developer panel
    FromDev { message: String },
}

impl BridgeMessage {
    pub fn overlay_toggled(mode: OverlayMode) -> Self {
        BridgeMessage::OverlayToggled {
            is_overlay: mode.is_overlay(),
        }
    }

    pub fn current_mode(mode: OverlayMode) -> Self {
        BridgeMessage::CurrentMode {
            is_overlay: mode.is_overlay(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(line: &str) -> serde_json::Result<Self> {
        serde_json::from_str(line.trim())
    }
}

/// Something the bridge tells its subscribers about
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeEvent {
    /// A toggle completed with this mode
    ModeChanged(OverlayMode),
    /// The developer panel sent a message
    FromDev(String),
}

impl From<BridgeEvent> for BridgeMessage {
    fn from(event: BridgeEvent) -> Self {
        match event {
            BridgeEvent::ModeChanged(mode) => BridgeMessage::overlay_toggled(mode),
            BridgeEvent::FromDev(message) => BridgeMessage::FromDev { message },
        }
    }
}

/// Requests the controller drains from the bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlRequest {
    ToggleOverlay,
    SetClickThrough(bool),
}

type EventHandler = dyn Fn(&BridgeEvent) + Send + Sync;

struct HandlerEntry {
    id: u64,
    active: Arc<AtomicBool>,
    handler: Arc<EventHandler>,
}

#[derive(Default)]
struct SubscriberRegistry {
    next_id: AtomicU64,
    entries: Mutex<Vec<HandlerEntry>>,
    outbox: Mutex<VecDeque<BridgeEvent>>,
    delivering: Mutex<()>,
}

impl SubscriberRegistry {
    fn add(registry: &Arc<Self>, handler: Arc<EventHandler>) -> Subscription {
        let id = registry.next_id.fetch_add(1, Ordering::Relaxed);
        let active = Arc::new(AtomicBool::new(true));
        registry.entries.lock().push(HandlerEntry {
            id,
            active: Arc::clone(&active),
            handler,
        });
        debug!("Bridge subscription {} added", id);

        Subscription {
            id,
            active,
            registry: Arc::clone(registry),
        }
    }

    fn remove(&self, id: u64) {
        self.entries.lock().retain(|entry| entry.id != id);
    }

    fn enqueue(&self, event: BridgeEvent) {
        self.outbox.lock().push_back(event);
    }

    /// Deliver queued events in order. Whoever holds `delivering` drains the
    /// outbox for everyone; a caller that finds it taken returns at once and
    /// its event goes out after the ones ahead of it.
    fn flush(&self) {
        loop {
            let Some(guard) = self.delivering.try_lock() else {
                return;
            };
            loop {
                let Some(event) = self.outbox.lock().pop_front() else {
                    break;
                };
                self.deliver(&event);
            }
            drop(guard);

            // An event queued after the drain but before the unlock
            if self.outbox.lock().is_empty() {
                return;
            }
        }
    }

    fn deliver(&self, event: &BridgeEvent) {
        // Snapshot so handlers can subscribe or unsubscribe while running
        let handlers: Vec<(Arc<AtomicBool>, Arc<EventHandler>)> = self
            .entries
            .lock()
            .iter()
            .map(|entry| (Arc::clone(&entry.active), Arc::clone(&entry.handler)))
            .collect();

        debug!("Delivering {:?} to {} handler(s)", event, handlers.len());
        for (active, handler) in handlers {
            if active.load(Ordering::Acquire) {
                handler(event);
            }
        }
    }
}

/// Handle for one bridge subscription.
///
/// Dropping it unsubscribes. Once `unsubscribe` returns, no later broadcast
/// reaches the handler.
#[must_use = "dropping a Subscription unsubscribes its handler"]
pub struct Subscription {
    id: u64,
    active: Arc<AtomicBool>,
    registry: Arc<SubscriberRegistry>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        // Drop does the work
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.active.store(false, Ordering::Release);
        self.registry.remove(self.id);
        debug!("Bridge subscription {} removed", self.id);
    }
}

/// Control side of the bridge, owned by the controller
pub(crate) struct ModeBridge {
    request_tx: Sender<ControlRequest>,
    request_rx: Receiver<ControlRequest>,
    registry: Arc<SubscriberRegistry>,
    mode: ModeReader,
}

impl ModeBridge {
    pub(crate) fn new(mode: ModeReader) -> Self {
        let (request_tx, request_rx) = unbounded();
        Self {
            request_tx,
            request_rx,
            registry: Arc::new(SubscriberRegistry::default()),
            mode,
        }
    }

    pub(crate) fn link(&self) -> DisplayLink {
        DisplayLink {
            request_tx: self.request_tx.clone(),
            registry: Arc::clone(&self.registry),
            mode: self.mode.clone(),
        }
    }

    /// Requests queued right now. Requests sent while these are being
    /// handled wait for the next call.
    pub(crate) fn pending(&self) -> impl Iterator<Item = ControlRequest> + '_ {
        let queued = self.request_rx.len();
        self.request_rx.try_iter().take(queued)
    }

    /// Queue a mode change. Call while the mode change is still exclusive so
    /// the queue order matches the toggle order.
    pub(crate) fn enqueue_mode(&self, mode: OverlayMode) {
        self.registry.enqueue(BridgeEvent::ModeChanged(mode));
    }

    /// Deliver everything queued so far
    pub(crate) fn flush(&self) {
        self.registry.flush();
    }

    #[cfg(test)]
    pub(crate) fn broadcast(&self, mode: OverlayMode) {
        self.enqueue_mode(mode);
        self.flush();
    }
}

/// Display side of the bridge. Cheap to clone; one per display surface.
#[derive(Clone)]
pub struct DisplayLink {
    request_tx: Sender<ControlRequest>,
    registry: Arc<SubscriberRegistry>,
    mode: ModeReader,
}

impl DisplayLink {
    fn send(&self, request: ControlRequest) {
        if self.request_tx.send(request).is_err() {
            debug!("{:?} dropped: controller is gone", request);
        }
    }

    /// Ask the controller to flip the mode. Never blocks.
    pub fn send_toggle_request(&self) {
        self.send(ControlRequest::ToggleOverlay);
    }

    /// Ask the controller to make the main window click-through, or not
    pub fn send_click_through(&self, passthrough: bool) {
        self.send(ControlRequest::SetClickThrough(passthrough));
    }

    /// Relay `message` to every subscriber as [`BridgeEvent::FromDev`] and
    /// return the acknowledgement for the sender
    pub fn send_dev_message(&self, message: &str) -> String {
        info!("Received from dev panel: {}", message);
        self.registry.enqueue(BridgeEvent::FromDev(message.to_string()));
        self.registry.flush();
        format!("Processed: {}", message)
    }

    /// Run `handler` for every bridge event
    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&BridgeEvent) + Send + Sync + 'static,
    {
        SubscriberRegistry::add(&self.registry, Arc::new(handler))
    }

    /// Run `handler` with the resulting mode after every completed toggle
    pub fn on_mode_changed<F>(&self, handler: F) -> Subscription
    where
        F: Fn(OverlayMode) + Send + Sync + 'static,
    {
        self.subscribe(move |event| {
            if let BridgeEvent::ModeChanged(mode) = event {
                handler(*mode);
            }
        })
    }

    /// Run `handler` with every message relayed from the developer panel
    pub fn on_dev_message<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.subscribe(move |event| {
            if let BridgeEvent::FromDev(message) = event {
                handler(message);
            }
        })
    }

    /// The controller's mode right now
    pub fn current_mode(&self) -> OverlayMode {
        self.mode.get()
    }

    /// Answer an inbound wire message. Returns the reply, if any.
    pub fn handle_message(&self, message: BridgeMessage) -> Option<BridgeMessage> {
        match message {
            BridgeMessage::ToggleOverlay => {
                self.send_toggle_request();
                None
            }
            BridgeMessage::GetMode => Some(BridgeMessage::current_mode(self.current_mode())),
            BridgeMessage::ToggleClickThrough { passthrough } => {
                self.send_click_through(passthrough);
                None
            }
            BridgeMessage::DevMessage { message } => Some(BridgeMessage::DevResponse {
                message: self.send_dev_message(&message),
            }),
            other => {
                debug!("Ignoring controller-bound copy of {:?}", other);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::SharedMode;
    use std::sync::atomic::AtomicUsize;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    fn bridge() -> (SharedMode, ModeBridge) {
        let shared = SharedMode::default();
        let bridge = ModeBridge::new(shared.reader());
        (shared, bridge)
    }

    #[test]
    fn test_wire_format() {
        assert_eq!(
            BridgeMessage::ToggleOverlay.to_json().unwrap(),
            r#"{"channel":"toggle-overlay"}"#
        );
        assert_eq!(
            BridgeMessage::overlay_toggled(OverlayMode::Overlay).to_json().unwrap(),
            r#"{"channel":"overlay-toggled","isOverlay":true}"#
        );
        assert_eq!(
            BridgeMessage::from_json(r#" {"channel":"current-mode","isOverlay":false} "#).unwrap(),
            BridgeMessage::CurrentMode { is_overlay: false }
        );
        assert_eq!(
            BridgeMessage::from_json(r#"{"channel":"toggle-click-through","passthrough":true}"#)
                .unwrap(),
            BridgeMessage::ToggleClickThrough { passthrough: true }
        );
        assert_eq!(
            BridgeMessage::FromDev { message: "hi".into() }.to_json().unwrap(),
            r#"{"channel":"from-dev","message":"hi"}"#
        );
        assert!(BridgeMessage::from_json(r#"{"channel":"dev-message"}"#).is_err());
        assert!(BridgeMessage::from_json(r#"{"channel":"open-settings"}"#).is_err());
    }

    #[test]
    fn test_requests_are_queued() {
        let (_shared, bridge) = bridge();
        let link = bridge.link();
        link.send_toggle_request();
        link.clone().send_click_through(true);

        let pending: Vec<_> = bridge.pending().collect();
        assert_eq!(
            pending,
            vec![ControlRequest::ToggleOverlay, ControlRequest::SetClickThrough(true)]
        );
        assert_eq!(bridge.pending().count(), 0);
    }

    #[test]
    fn test_pending_stops_at_snapshot() {
        let (_shared, bridge) = bridge();
        let link = bridge.link();
        link.send_toggle_request();

        let mut drained = 0;
        for _ in bridge.pending() {
            link.send_toggle_request();
            drained += 1;
        }
        assert_eq!(drained, 1);
        assert_eq!(bridge.pending().count(), 1);
    }

    #[test]
    fn test_broadcast_reaches_handlers() {
        let (_shared, bridge) = bridge();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _sub = bridge.link().on_mode_changed(move |mode| sink.lock().push(mode));

        bridge.broadcast(OverlayMode::Overlay);
        bridge.broadcast(OverlayMode::Normal);
        assert_eq!(*seen.lock(), vec![OverlayMode::Overlay, OverlayMode::Normal]);
    }

    #[test]
    fn test_delivery_keeps_queue_order_across_threads() {
        let (_shared, bridge) = bridge();
        let bridge = Arc::new(bridge);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (entered_tx, entered_rx) = mpsc::channel();
        let entered_tx = Mutex::new(entered_tx);

        let sink = Arc::clone(&seen);
        let _sub = bridge.link().on_mode_changed(move |mode| {
            if mode == OverlayMode::Overlay {
                let _ = entered_tx.lock().send(());
                thread::sleep(Duration::from_millis(100));
            }
            sink.lock().push(mode);
        });

        let first = {
            let bridge = Arc::clone(&bridge);
            thread::spawn(move || bridge.broadcast(OverlayMode::Overlay))
        };
        entered_rx.recv().unwrap();
        // Delivered by the thread already delivering, after its event
        bridge.broadcast(OverlayMode::Normal);
        first.join().unwrap();

        assert_eq!(*seen.lock(), vec![OverlayMode::Overlay, OverlayMode::Normal]);
    }

    #[test]
    fn test_drop_unsubscribes_only_that_handler() {
        let (_shared, bridge) = bridge();
        let link = bridge.link();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let a = Arc::clone(&first);
        let sub_a = link.on_mode_changed(move |_| {
            a.fetch_add(1, Ordering::SeqCst);
        });
        let b = Arc::clone(&second);
        let _sub_b = link.on_mode_changed(move |_| {
            b.fetch_add(1, Ordering::SeqCst);
        });

        drop(sub_a);
        bridge.broadcast(OverlayMode::Overlay);

        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_handler_may_unsubscribe_during_broadcast() {
        let (_shared, bridge) = bridge();
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let calls = Arc::new(AtomicUsize::new(0));

        let inner_slot = Arc::clone(&slot);
        let inner_calls = Arc::clone(&calls);
        let sub = bridge.link().on_mode_changed(move |_| {
            inner_calls.fetch_add(1, Ordering::SeqCst);
            inner_slot.lock().take();
        });
        *slot.lock() = Some(sub);

        bridge.broadcast(OverlayMode::Overlay);
        bridge.broadcast(OverlayMode::Normal);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_get_mode_reads_authoritative_value() {
        let (shared, bridge) = bridge();
        let link = bridge.link();
        assert_eq!(
            link.handle_message(BridgeMessage::GetMode),
            Some(BridgeMessage::CurrentMode { is_overlay: false })
        );

        shared.set(OverlayMode::Overlay);
        assert_eq!(link.current_mode(), OverlayMode::Overlay);
        assert_eq!(link.handle_message(BridgeMessage::ToggleOverlay), None);
        assert_eq!(bridge.pending().count(), 1);
    }

    #[test]
    fn test_dev_message_is_acknowledged_and_relayed() {
        let (_shared, bridge) = bridge();
        let link = bridge.link();
        let relayed = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&relayed);
        let _sub = link.on_dev_message(move |text| sink.lock().push(text.to_string()));
        let modes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&modes);
        let _mode_sub = link.on_mode_changed(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let reply = link.handle_message(BridgeMessage::DevMessage {
            message: "reload data".into(),
        });
        assert_eq!(
            reply,
            Some(BridgeMessage::DevResponse {
                message: "Processed: reload data".into()
            })
        );
        assert_eq!(*relayed.lock(), vec!["reload data".to_string()]);
        assert_eq!(modes.load(Ordering::SeqCst), 0);
    }
}
