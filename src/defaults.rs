//! Default configuration constants for queuecall.
//!
//! Shared by the config sections and the components that can be constructed
//! without a config file (tests, `queuecall say`).

/// Pause between two consecutive announcements, in milliseconds.
///
/// Keeps announcements perceptibly separated even when the speech engine
/// returns instantly.
pub const COOLDOWN_MS: u64 = 2000;

/// Upper bound for a single `speak` call, in milliseconds.
///
/// A call that runs longer is cancelled and counted as failed so the queue
/// keeps moving.
pub const SPEECH_TIMEOUT_MS: u64 = 30_000;

/// Number of not-yet-announced items shown in the waiting preview.
pub const WAITING_CAPACITY: usize = 5;

/// Number of announced items kept in the history view.
pub const HISTORY_CAPACITY: usize = 20;

/// Default push channel room for pharmacy pickups.
pub const PHARMACY_ROOM: &str = "pharmacy-queue";

/// Default push channel endpoint.
pub const CHANNEL_ADDRESS: &str = "127.0.0.1:7070";

/// First reconnect delay after the push channel drops, in milliseconds.
pub const RECONNECT_INITIAL_MS: u64 = 500;

/// Reconnect delay ceiling, in milliseconds.
pub const RECONNECT_MAX_MS: u64 = 10_000;

/// Longest push frame kept in memory; longer lines are skipped.
pub const MAX_FRAME_BYTES: usize = 64 * 1024;

/// Clinic queue refresh interval, in seconds.
pub const POLL_INTERVAL_SECS: u64 = 30;

/// Auto-scroll tick period, in milliseconds.
pub const SCROLL_TICK_MS: u64 = 50;

/// Rows advanced per auto-scroll tick.
pub const SCROLL_STEP_ROWS: usize = 1;

/// Pause at the end of the roster before jumping back to the top, in milliseconds.
pub const SCROLL_PAUSE_MS: u64 = 3000;

/// Roster rows visible at once on the public display.
pub const SCROLL_VIEWPORT_ROWS: usize = 10;

/// Default speech command (eSpeak NG reads from argv).
pub const SPEECH_COMMAND: &str = "espeak-ng";

/// Default voice for the speech command.
pub const SPEECH_VOICE: &str = "id";

/// Spoken phrase for a prescription that is ready for pickup.
pub const PHARMACY_TEMPLATE: &str =
    "Nomor resep {identifier}, atas nama {name}, silakan mengambil obat di loket farmasi.";

/// Spoken phrase for a clinic queue number being served.
pub const CLINIC_TEMPLATE: &str = "Nomor antrian {identifier}, silakan masuk ke ruang {code}.";

/// Default log level when neither the config nor `QUEUECALL_LOG` set one.
pub const LOG_LEVEL: &str = "info";

/// HTTP timeout for one clinic poll request, in milliseconds.
pub const POLL_TIMEOUT_MS: u64 = 10_000;

/// Default log output format (`text` or `json`).
pub const LOG_FORMAT: &str = "text";
