//! # Native Wayland virtual-keyboard protocol client
//!
//! Implements text injection over `zwp_virtual_keyboard_v1` directly against
//! the compositor socket, with no external process. This is the lowest
//! latency strategy and is ranked first whenever the compositor advertises
//! the protocol.
//!
//! Connection lifecycle: `Disconnected -> Connecting -> Registered ->
//! KeyboardBound -> Ready`, with `Failed` as the terminal error state whose
//! only exit is cleanup back to `Disconnected`. The connection is opened
//! lazily on first use and kept open for the process lifetime to amortize
//! the handshake against the per-injection latency budget; callers must
//! invoke [`VirtualKeyboardClient::close`] at shutdown to release the
//! compositor socket.

use std::io::Write;
use std::os::fd::AsFd;
use std::time::Instant;

use parking_lot::Mutex;
use tracing::{debug, trace, warn};
use wayland_client::{
    globals::{registry_queue_init, GlobalListContents},
    protocol::{wl_registry, wl_seat::{self, WlSeat}},
    Connection, Dispatch, EventQueue, QueueHandle,
};
use wayland_protocols_misc::zwp_virtual_keyboard_v1::client::{
    zwp_virtual_keyboard_manager_v1::{self, ZwpVirtualKeyboardManagerV1},
    zwp_virtual_keyboard_v1::{self, ZwpVirtualKeyboardV1},
};

use crate::constants::NATIVE_LATENCY_BUDGET_MS;
use crate::error::InjectionError;
use crate::keymap::{self, KeyState, KEY_LEFTSHIFT, MOD_SHIFT_MASK};
use crate::types::{redact_text, InjectionConfig, StrategyId};
use crate::TextInjector;

const VIRTUAL_KEYBOARD_MANAGER_INTERFACE: &str = "zwp_virtual_keyboard_manager_v1";

/// Keymap format constant: xkb_v1, the only format the protocol defines.
const KEYMAP_FORMAT_XKB_V1: u32 = 1;

/// Connection state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClientState {
    #[default]
    Disconnected,
    Connecting,
    Registered,
    KeyboardBound,
    Ready,
    Failed,
}

/// Dispatch target for the protocol event queue. The virtual-keyboard
/// interfaces define no events; the seat events are irrelevant here.
#[derive(Default)]
struct ProtocolState;

impl Dispatch<wl_registry::WlRegistry, GlobalListContents> for ProtocolState {
    fn event(
        _: &mut Self,
        _: &wl_registry::WlRegistry,
        _: wl_registry::Event,
        _: &GlobalListContents,
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
    }
}

impl Dispatch<WlSeat, ()> for ProtocolState {
    fn event(
        _: &mut Self,
        _: &WlSeat,
        _: wl_seat::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
    }
}

impl Dispatch<ZwpVirtualKeyboardManagerV1, ()> for ProtocolState {
    fn event(
        _: &mut Self,
        _: &ZwpVirtualKeyboardManagerV1,
        _: zwp_virtual_keyboard_manager_v1::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
    }
}

impl Dispatch<ZwpVirtualKeyboardV1, ()> for ProtocolState {
    fn event(
        _: &mut Self,
        _: &ZwpVirtualKeyboardV1,
        _: zwp_virtual_keyboard_v1::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
    }
}

struct Inner {
    state: ClientState,
    conn: Option<Connection>,
    queue: Option<EventQueue<ProtocolState>>,
    dispatch_state: ProtocolState,
    seat: Option<WlSeat>,
    keyboard: Option<ZwpVirtualKeyboardV1>,
    /// Keeps the keymap fd alive for the lifetime of the keyboard object.
    keymap_file: Option<std::fs::File>,
    /// Currently depressed modifier mask, mirrored to the compositor.
    depressed_mods: u32,
    /// Anchor for the millisecond `time` field on key events.
    epoch: Instant,
}

impl Default for Inner {
    fn default() -> Self {
        Self {
            state: ClientState::Disconnected,
            conn: None,
            queue: None,
            dispatch_state: ProtocolState,
            seat: None,
            keyboard: None,
            keymap_file: None,
            depressed_mods: 0,
            epoch: Instant::now(),
        }
    }
}

/// Direct protocol client for the compositor's virtual-keyboard extension.
pub struct VirtualKeyboardClient {
    config: InjectionConfig,
    inner: Mutex<Inner>,
}

impl VirtualKeyboardClient {
    pub fn new(config: InjectionConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Current connection state, for diagnostics.
    pub fn state(&self) -> ClientState {
        self.inner.lock().state
    }

    /// Establish the connection, bind the registry globals, create the
    /// keyboard, and upload the keymap. Idempotent once `Ready`.
    fn ensure_ready(inner: &mut Inner) -> Result<(), InjectionError> {
        match inner.state {
            ClientState::Ready => return Ok(()),
            // The only exit from Failed is cleanup back to Disconnected.
            ClientState::Failed => Self::teardown(inner),
            _ => {}
        }

        inner.state = ClientState::Connecting;
        let conn = Connection::connect_to_env().map_err(|e| {
            inner.state = ClientState::Failed;
            InjectionError::Connection(e.to_string())
        })?;

        let (globals, mut queue) = registry_queue_init::<ProtocolState>(&conn).map_err(|e| {
            inner.state = ClientState::Failed;
            InjectionError::Protocol(format!("registry init failed: {e}"))
        })?;
        inner.state = ClientState::Registered;

        let qh = queue.handle();

        // A compositor that does not advertise the manager global simply
        // lacks the capability; this is expected on GNOME/KDE, not an error
        // in the protocol sense.
        let has_manager = globals
            .contents()
            .clone_list()
            .iter()
            .any(|g| g.interface == VIRTUAL_KEYBOARD_MANAGER_INTERFACE);
        if !has_manager {
            inner.state = ClientState::Failed;
            return Err(InjectionError::Other(format!(
                "compositor does not advertise {VIRTUAL_KEYBOARD_MANAGER_INTERFACE}"
            )));
        }

        let seat: WlSeat = globals.bind(&qh, 1..=7, ()).map_err(|e| {
            inner.state = ClientState::Failed;
            InjectionError::Protocol(format!("wl_seat bind failed: {e}"))
        })?;

        let manager: ZwpVirtualKeyboardManagerV1 = globals.bind(&qh, 1..=1, ()).map_err(|e| {
            inner.state = ClientState::Failed;
            InjectionError::Protocol(format!("virtual keyboard manager bind failed: {e}"))
        })?;

        let keyboard = manager.create_virtual_keyboard(&seat, &qh, ());

        // Upload the keymap so the compositor can translate our keycodes.
        let keymap_src = keymap::xkb_keymap_source();
        let mut file = tempfile::tempfile().map_err(|e| {
            inner.state = ClientState::Failed;
            InjectionError::Other(format!("keymap staging failed: {e}"))
        })?;
        file.write_all(keymap_src.as_bytes())
            .and_then(|_| file.flush())
            .map_err(|e| {
                inner.state = ClientState::Failed;
                InjectionError::Other(format!("keymap staging failed: {e}"))
            })?;
        keyboard.keymap(KEYMAP_FORMAT_XKB_V1, file.as_fd(), keymap_src.len() as u32);
        inner.state = ClientState::KeyboardBound;

        // Roundtrip so any fatal protocol error from the compositor surfaces
        // now rather than mid-injection.
        queue
            .roundtrip(&mut inner.dispatch_state)
            .map_err(|e| {
                inner.state = ClientState::Failed;
                InjectionError::Protocol(format!("handshake roundtrip failed: {e}"))
            })?;

        debug!(
            keymap_bytes = keymap_src.len(),
            "virtual keyboard ready (keymap uploaded)"
        );

        inner.conn = Some(conn);
        inner.queue = Some(queue);
        inner.seat = Some(seat);
        inner.keyboard = Some(keyboard);
        inner.keymap_file = Some(file);
        inner.depressed_mods = 0;
        inner.state = ClientState::Ready;
        Ok(())
    }

    /// Send all events for `text`, then flush once so the batch is delivered
    /// immediately instead of buffered.
    fn dispatch_text(inner: &mut Inner, text: &str, redact: bool) -> Result<f64, InjectionError> {
        Self::ensure_ready(inner)?;

        let (events, unsupported) = keymap::compile_key_events(text);
        if !unsupported.is_empty() {
            warn!(
                count = unsupported.len(),
                "skipping graphemes with no keycode in the active layout"
            );
        }

        let start = Instant::now();
        let time_ms = inner.epoch.elapsed().as_millis() as u32;

        {
            let keyboard = inner
                .keyboard
                .as_ref()
                .ok_or_else(|| InjectionError::Protocol("keyboard object missing".into()))?;

            for event in &events {
                keyboard.key(time_ms, event.keycode, event.state as u32);

                // The compositor does not run our key events through its own
                // xkb state machine, so the depressed-modifier mask must be
                // mirrored explicitly.
                if event.keycode == KEY_LEFTSHIFT {
                    match event.state {
                        KeyState::Pressed => inner.depressed_mods |= MOD_SHIFT_MASK,
                        KeyState::Released => inner.depressed_mods &= !MOD_SHIFT_MASK,
                    }
                    keyboard.modifiers(inner.depressed_mods, 0, 0, 0);
                }
            }
        }

        // One flush for the whole batch. An I/O error here means part of the
        // text may already have been delivered; that partial-delivery risk is
        // inherent to the native path and reported up, never hidden.
        if let Some(conn) = inner.conn.as_ref() {
            if let Err(e) = conn.flush() {
                inner.state = ClientState::Failed;
                return Err(InjectionError::Connection(format!("flush failed: {e}")));
            }
        }

        let latency_ms = start.elapsed().as_secs_f64() * 1_000.0;
        if latency_ms > NATIVE_LATENCY_BUDGET_MS as f64 {
            warn!(
                latency_ms,
                budget_ms = NATIVE_LATENCY_BUDGET_MS,
                "virtual keyboard dispatch exceeded latency budget"
            );
        } else {
            trace!(
                latency_ms,
                events = events.len(),
                text = %redact_text(text, redact),
                "virtual keyboard dispatch complete"
            );
        }

        Ok(latency_ms)
    }

    fn teardown(inner: &mut Inner) {
        if let Some(keyboard) = inner.keyboard.take() {
            keyboard.destroy();
        }
        if let Some(conn) = inner.conn.as_ref() {
            let _ = conn.flush();
        }
        inner.seat = None;
        inner.queue = None;
        inner.conn = None;
        inner.keymap_file = None;
        inner.depressed_mods = 0;
        inner.state = ClientState::Disconnected;
    }

    /// Release the keyboard object and the compositor socket. Required at
    /// process shutdown.
    pub fn close(&self) {
        let mut inner = self.inner.lock();
        Self::teardown(&mut inner);
        debug!("virtual keyboard connection closed");
    }
}

impl Drop for VirtualKeyboardClient {
    fn drop(&mut self) {
        Self::teardown(self.inner.get_mut());
    }
}

#[async_trait::async_trait]
impl TextInjector for VirtualKeyboardClient {
    fn strategy_id(&self) -> StrategyId {
        StrategyId::VirtualKeyboard
    }

    fn backend_name(&self) -> &'static str {
        "wayland-virtual-keyboard"
    }

    async fn is_available(&self) -> bool {
        std::env::var_os("WAYLAND_DISPLAY").is_some()
    }

    async fn inject_text(&self, text: &str) -> Result<(), InjectionError> {
        if text.is_empty() {
            return Ok(());
        }
        // The whole dispatch is well under a scheduler tick on the happy
        // path; the connect handshake on first use is the only slow part.
        let redact = self.config.redact_logs;
        let mut inner = self.inner.lock();
        Self::dispatch_text(&mut inner, text, redact).map(|_| ())
    }

    fn backend_info(&self) -> Vec<(&'static str, String)> {
        vec![
            ("type", "native wayland protocol".to_string()),
            ("protocol", VIRTUAL_KEYBOARD_MANAGER_INTERFACE.to_string()),
            ("state", format!("{:?}", self.state())),
            ("layout", self.config.keyboard_layout.clone()),
        ]
    }
}

/// Probe state used by [`probe_virtual_keyboard`]; only registry contents
/// matter.
#[derive(Default)]
struct ProbeState;

impl Dispatch<wl_registry::WlRegistry, GlobalListContents> for ProbeState {
    fn event(
        _: &mut Self,
        _: &wl_registry::WlRegistry,
        _: wl_registry::Event,
        _: &GlobalListContents,
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
    }
}

/// Probe whether the compositor advertises the virtual-keyboard manager.
///
/// Opens a transient connection, enumerates globals, and disconnects. Never
/// panics; a failure at any step is reported as the unavailability reason.
pub fn probe_virtual_keyboard() -> Result<(), String> {
    if std::env::var_os("WAYLAND_DISPLAY").is_none() {
        return Err("WAYLAND_DISPLAY is not set".to_string());
    }

    let conn = Connection::connect_to_env()
        .map_err(|e| format!("cannot connect to compositor: {e}"))?;
    let (globals, _queue) = registry_queue_init::<ProbeState>(&conn)
        .map_err(|e| format!("registry enumeration failed: {e}"))?;

    let found = globals
        .contents()
        .clone_list()
        .iter()
        .any(|g| g.interface == VIRTUAL_KEYBOARD_MANAGER_INTERFACE);

    if found {
        Ok(())
    } else {
        Err(format!(
            "compositor does not advertise {VIRTUAL_KEYBOARD_MANAGER_INTERFACE}"
        ))
    }
}
