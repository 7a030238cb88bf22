//! Credential collection state machine.
//!
//! The BLE stack delivers characteristic writes on its own tasks, racing
//! against the main flow which is parked until both credentials are in.
//! Everything the two sides share lives here: each write becomes a
//! [`CredentialWrite`] routed through [`Coordinator::handle_write`], which
//! updates the store and re-checks readiness under a single lock
//! acquisition. The first time both fields are non-empty the completion
//! signal fires and [`Coordinator::wait_ready`] resumes.

use std::sync::Mutex;

use tokio::sync::Notify;

/// Which characteristic a write landed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialField {
    Ssid,
    Passphrase,
}

/// One characteristic write as delivered by the peripheral stack.
#[derive(Debug)]
pub struct CredentialWrite {
    pub field: CredentialField,
    pub payload: Vec<u8>,
}

/// Pending credentials received so far.
///
/// Each field is overwritten unconditionally (last write wins) and never
/// cleared during a run. Content is not validated: an empty write is stored
/// but leaves the field not ready.
#[derive(Debug, Default)]
pub struct CredentialStore {
    ssid: Option<Vec<u8>>,
    passphrase: Option<Vec<u8>>,
}

impl CredentialStore {
    pub fn set(&mut self, field: CredentialField, payload: Vec<u8>) {
        match field {
            CredentialField::Ssid => self.ssid = Some(payload),
            CredentialField::Passphrase => self.passphrase = Some(payload),
        }
    }

    /// Both fields present and non-empty.
    pub fn is_ready(&self) -> bool {
        matches!(
            (&self.ssid, &self.passphrase),
            (Some(ssid), Some(pass)) if !ssid.is_empty() && !pass.is_empty()
        )
    }

    /// The collected pair as UTF-8 text (lossy), once ready.
    pub fn credentials(&self) -> Option<(String, String)> {
        match (&self.ssid, &self.passphrase) {
            (Some(ssid), Some(pass)) if !ssid.is_empty() && !pass.is_empty() => Some((
                String::from_utf8_lossy(ssid).into_owned(),
                String::from_utf8_lossy(pass).into_owned(),
            )),
            _ => None,
        }
    }
}

/// Single-shot wake-up for the main flow.
///
/// `fire` never blocks and may be called any number of times; the waiter
/// observes at most one wake. The flow waits exactly once, so a redundant
/// fire after readiness goes nowhere.
#[derive(Debug, Default)]
pub struct CompletionSignal {
    notify: Notify,
}

impl CompletionSignal {
    pub fn fire(&self) {
        self.notify.notify_one();
    }

    pub async fn wait(&self) {
        self.notify.notified().await;
    }
}

/// Owns the state shared between the BLE write callbacks and the main flow.
#[derive(Debug, Default)]
pub struct Coordinator {
    store: Mutex<CredentialStore>,
    ready: CompletionSignal,
}

impl Coordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one characteristic write and fire the completion signal if it
    /// made the store ready. Never blocks; safe to call from the peripheral
    /// stack's callbacks.
    pub fn handle_write(&self, write: CredentialWrite) {
        if let Ok(mut store) = self.store.lock() {
            store.set(write.field, write.payload);
            if store.is_ready() {
                self.ready.fire();
            }
        }
    }

    /// Park until both credentials have arrived.
    pub async fn wait_ready(&self) {
        self.ready.wait().await;
    }

    /// The collected pair, once ready.
    pub fn credentials(&self) -> Option<(String, String)> {
        self.store.lock().ok().and_then(|store| store.credentials())
    }
}
