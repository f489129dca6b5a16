//! Per-session UI state
//!
//! Each browser session owns a [`Session`]: the admin gate and the keypad
//! entry buffer. Sessions live in a [`SessionStore`] keyed by UUID, are
//! created explicitly, and disappear on logout/close or after the idle
//! timeout (purged lazily on the next access).
//!
//! Admin state machine:
//!
//! ```text
//! Locked --login(ok)--> Unlocked{armed: false} --arm_clear--> Unlocked{armed: true}
//!   ^                          |    ^                                |
//!   +--------logout------------+    +---------confirm_clear----------+
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::config::SessionSettings;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("Unknown or expired session")]
    UnknownSession,

    #[error("Admin access required")]
    Locked,

    #[error("Incorrect password")]
    WrongPassword,

    #[error("Admin login is disabled (no password configured)")]
    AdminDisabled,

    #[error("Clear was not armed")]
    ClearNotArmed,

    #[error("Keypad buffer is full ({0} digits)")]
    KeypadFull(usize),

    #[error("Unsupported keypad key '{0}'")]
    InvalidKey(String),
}

/// Admin gate of one session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AdminState {
    #[default]
    Locked,
    Unlocked { clear_armed: bool },
}

impl AdminState {
    pub fn is_unlocked(&self) -> bool {
        matches!(self, AdminState::Unlocked { .. })
    }

    pub fn require_unlocked(&self) -> Result<(), SessionError> {
        if self.is_unlocked() {
            Ok(())
        } else {
            Err(SessionError::Locked)
        }
    }

    /// Unlock after a verified password; re-login disarms a pending clear
    pub fn login(&mut self) {
        *self = AdminState::Unlocked { clear_armed: false };
    }

    pub fn logout(&mut self) {
        *self = AdminState::Locked;
    }

    /// First step of the two-step clear
    pub fn arm_clear(&mut self) -> Result<(), SessionError> {
        self.require_unlocked()?;
        *self = AdminState::Unlocked { clear_armed: true };
        Ok(())
    }

    /// Second step; succeeds only when armed and always disarms
    pub fn confirm_clear(&mut self) -> Result<(), SessionError> {
        match *self {
            AdminState::Locked => Err(SessionError::Locked),
            AdminState::Unlocked { clear_armed: false } => Err(SessionError::ClearNotArmed),
            AdminState::Unlocked { clear_armed: true } => {
                *self = AdminState::Unlocked { clear_armed: false };
                Ok(())
            }
        }
    }
}

/// Multi-step numeric entry
#[derive(Debug, Clone)]
pub struct KeypadBuffer {
    digits: String,
    max_digits: usize,
}

impl KeypadBuffer {
    pub fn new(max_digits: usize) -> Self {
        Self {
            digits: String::with_capacity(max_digits),
            max_digits,
        }
    }

    pub fn push(&mut self, digit: char) -> Result<(), SessionError> {
        if !digit.is_ascii_digit() {
            return Err(SessionError::InvalidKey(digit.to_string()));
        }
        if self.digits.len() >= self.max_digits {
            return Err(SessionError::KeypadFull(self.max_digits));
        }
        self.digits.push(digit);
        Ok(())
    }

    pub fn backspace(&mut self) {
        self.digits.pop();
    }

    pub fn reset(&mut self) {
        self.digits.clear();
    }

    /// Apply one keypad key: a digit, `backspace` or `clear`
    pub fn apply(&mut self, key: &str) -> Result<(), SessionError> {
        match key.trim() {
            "backspace" | "back" => self.backspace(),
            "clear" | "reset" => self.reset(),
            other => {
                let mut chars = other.chars();
                match (chars.next(), chars.next()) {
                    (Some(digit), None) => self.push(digit)?,
                    _ => return Err(SessionError::InvalidKey(other.to_string())),
                }
            }
        }
        Ok(())
    }

    pub fn as_str(&self) -> &str {
        &self.digits
    }

    pub fn is_empty(&self) -> bool {
        self.digits.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub admin: AdminState,
    pub keypad: KeypadBuffer,
    last_seen: Instant,
}

impl Session {
    fn new(keypad_max_digits: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            admin: AdminState::Locked,
            keypad: KeypadBuffer::new(keypad_max_digits),
            last_seen: Instant::now(),
        }
    }
}

/// SHA-256 digest of the configured admin password
#[derive(Clone)]
pub struct PasswordGate {
    digest: Option<[u8; 32]>,
}

impl PasswordGate {
    pub fn new(password: Option<&str>) -> Self {
        Self {
            digest: password.map(digest),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.digest.is_some()
    }

    pub fn verify(&self, attempt: &str) -> Result<(), SessionError> {
        let expected = self.digest.ok_or(SessionError::AdminDisabled)?;
        let actual = digest(attempt);

        // Compare every byte so timing does not depend on the prefix
        let diff = expected
            .iter()
            .zip(actual.iter())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b));

        if diff == 0 {
            Ok(())
        } else {
            Err(SessionError::WrongPassword)
        }
    }
}

impl std::fmt::Debug for PasswordGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordGate")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

fn digest(value: &str) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Sha256::digest(value.as_bytes()));
    out
}

/// All live sessions
pub struct SessionStore {
    sessions: Mutex<HashMap<Uuid, Session>>,
    idle_timeout: Duration,
    keypad_max_digits: usize,
}

impl SessionStore {
    pub fn new(settings: &SessionSettings) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            idle_timeout: settings.idle_timeout,
            keypad_max_digits: settings.keypad_max_digits,
        }
    }

    /// Start a new session
    pub async fn create(&self) -> Uuid {
        let mut sessions = self.sessions.lock().await;
        self.purge_idle(&mut sessions);

        let session = Session::new(self.keypad_max_digits);
        let id = session.id;
        sessions.insert(id, session);

        tracing::debug!(session = %id, live = sessions.len(), "Session created");
        id
    }

    /// End a session; false if it was already gone
    pub async fn remove(&self, id: Uuid) -> bool {
        let removed = self.sessions.lock().await.remove(&id).is_some();
        if removed {
            tracing::debug!(session = %id, "Session ended");
        }
        removed
    }

    /// Run `f` against a live session, refreshing its idle timer
    pub async fn with_session<R>(
        &self,
        id: Uuid,
        f: impl FnOnce(&mut Session) -> R,
    ) -> Result<R, SessionError> {
        let mut sessions = self.sessions.lock().await;
        self.purge_idle(&mut sessions);

        let session = sessions.get_mut(&id).ok_or(SessionError::UnknownSession)?;
        session.last_seen = Instant::now();
        Ok(f(session))
    }

    pub async fn len(&self) -> usize {
        let mut sessions = self.sessions.lock().await;
        self.purge_idle(&mut sessions);
        sessions.len()
    }

    fn purge_idle(&self, sessions: &mut HashMap<Uuid, Session>) {
        let before = sessions.len();
        sessions.retain(|_, session| session.last_seen.elapsed() < self.idle_timeout);
        let purged = before - sessions.len();
        if purged > 0 {
            tracing::debug!(purged, "Purged idle sessions");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(idle_ms: u64) -> SessionSettings {
        SessionSettings {
            idle_timeout: Duration::from_millis(idle_ms),
            keypad_max_digits: 4,
        }
    }

    #[test]
    fn test_admin_state_transitions() {
        let mut state = AdminState::default();
        assert_eq!(state.arm_clear(), Err(SessionError::Locked));
        assert_eq!(state.confirm_clear(), Err(SessionError::Locked));

        state.login();
        assert_eq!(state, AdminState::Unlocked { clear_armed: false });
        assert_eq!(state.confirm_clear(), Err(SessionError::ClearNotArmed));

        state.arm_clear().unwrap();
        assert_eq!(state, AdminState::Unlocked { clear_armed: true });
        state.confirm_clear().unwrap();

        // Confirmation is single use
        assert_eq!(state.confirm_clear(), Err(SessionError::ClearNotArmed));

        state.arm_clear().unwrap();
        state.logout();
        assert_eq!(state, AdminState::Locked);
        state.login();
        assert_eq!(state.confirm_clear(), Err(SessionError::ClearNotArmed));
    }

    #[test]
    fn test_keypad_buffer() {
        let mut keypad = KeypadBuffer::new(4);
        for key in ["0", "3", "5"] {
            keypad.apply(key).unwrap();
        }
        assert_eq!(keypad.as_str(), "035");

        keypad.apply("backspace").unwrap();
        keypad.apply("1").unwrap();
        keypad.apply("9").unwrap();
        assert_eq!(keypad.as_str(), "0319");
        assert_eq!(keypad.apply("9"), Err(SessionError::KeypadFull(4)));

        assert!(matches!(keypad.apply("x"), Err(SessionError::InvalidKey(_))));
        assert!(matches!(keypad.apply("12"), Err(SessionError::InvalidKey(_))));

        keypad.apply("clear").unwrap();
        assert!(keypad.is_empty());
        keypad.backspace();
        assert!(keypad.is_empty());
    }

    #[test]
    fn test_password_gate() {
        let gate = PasswordGate::new(Some("hunter2"));
        assert!(gate.verify("hunter2").is_ok());
        assert_eq!(gate.verify("hunter3"), Err(SessionError::WrongPassword));
        assert_eq!(gate.verify(""), Err(SessionError::WrongPassword));

        let disabled = PasswordGate::new(None);
        assert_eq!(disabled.verify("anything"), Err(SessionError::AdminDisabled));
        assert!(!format!("{:?}", gate).contains("hunter2"));
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let store = SessionStore::new(&settings(60_000));
        let a = store.create().await;
        let b = store.create().await;

        store.with_session(a, |s| s.admin.login()).await.unwrap();
        store.with_session(a, |s| s.keypad.apply("7")).await.unwrap().unwrap();

        let b_state = store.with_session(b, |s| (s.admin, s.keypad.is_empty())).await.unwrap();
        assert_eq!(b_state, (AdminState::Locked, true));
        assert_eq!(store.len().await, 2);

        assert!(store.remove(a).await);
        assert!(!store.remove(a).await);
        assert_eq!(
            store.with_session(a, |_| ()).await,
            Err(SessionError::UnknownSession)
        );
    }

    #[tokio::test]
    async fn test_idle_sessions_are_purged() {
        let store = SessionStore::new(&settings(50));
        let id = store.create().await;

        tokio::time::sleep(Duration::from_millis(80)).await;

        assert_eq!(
            store.with_session(id, |_| ()).await,
            Err(SessionError::UnknownSession)
        );
        assert_eq!(store.len().await, 0);
    }
}
