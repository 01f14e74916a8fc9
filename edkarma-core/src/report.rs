//! Rate-limited surfacing of store errors to the user.

use crate::ErrorKind;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;

const GENERIC_MESSAGE: &str =
    "An error was encountered while communicating with your course's Ed Karma server.";

/// Where surfaced messages go.
pub trait Notifier: Send + Sync {
    fn notify(&self, kind: ErrorKind, message: &str);
}

/// Emits surfaced messages as `warn` events.
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, kind: ErrorKind, message: &str) {
        tracing::warn!(kind = %kind, "{message}");
    }
}

/// Partial override applied by [`ErrorReporter::configure`].
#[derive(Clone, Debug, Default)]
pub struct ErrorConfig {
    pub cooldown: Option<u64>,
    pub message: Option<String>,
}

impl ErrorConfig {
    pub fn cooldown(secs: u64) -> Self {
        Self {
            cooldown: Some(secs),
            message: None,
        }
    }
}

#[derive(Clone, Debug, Default)]
struct Policy {
    cooldown_secs: u64,
    message: Option<String>,
}

pub struct ErrorReporter {
    policies: Mutex<HashMap<ErrorKind, Policy>>,
    last_seen: Mutex<HashMap<ErrorKind, DateTime<Utc>>>,
    notifier: Box<dyn Notifier>,
}

impl ErrorReporter {
    pub fn new(notifier: Box<dyn Notifier>) -> Self {
        let policies = ErrorKind::ALL
            .into_iter()
            .filter_map(|k| {
                default_message(k).map(|m| {
                    (
                        k,
                        Policy {
                            cooldown_secs: 0,
                            message: Some(m.to_string()),
                        },
                    )
                })
            })
            .collect();
        Self {
            policies: Mutex::new(policies),
            last_seen: Mutex::new(HashMap::new()),
            notifier,
        }
    }

    pub fn configure(&self, kind: ErrorKind, config: ErrorConfig) {
        let mut policies = self.policies.lock();
        let policy = policies.entry(kind).or_default();
        if let Some(secs) = config.cooldown {
            policy.cooldown_secs = secs;
        }
        if let Some(message) = config.message {
            policy.message = Some(message);
        }
    }

    pub fn message(&self, kind: ErrorKind) -> String {
        self.policies
            .lock()
            .get(&kind)
            .and_then(|p| p.message.clone())
            .unwrap_or_else(|| GENERIC_MESSAGE.to_string())
    }

    /// Returns whether the message was surfaced.
    pub fn report(&self, kind: ErrorKind) -> bool {
        self.report_at(kind, Utc::now())
    }

    /// Accepts the kebab-case code of a kind; unrecognized codes are
    /// reported as [`ErrorKind::Unknown`].
    pub fn report_code(&self, code: &str) -> bool {
        self.report(code.parse().unwrap_or(ErrorKind::Unknown))
    }

    pub fn report_at(&self, kind: ErrorKind, now: DateTime<Utc>) -> bool {
        let cooldown_secs = self.cooldown_secs(kind);
        // The occurrence is recorded whether or not it is shown.
        let previous = self.last_seen.lock().insert(kind, now);
        let show = match previous {
            None => true,
            Some(_) if cooldown_secs == 0 => true,
            Some(at) => cooldown_elapsed(now - at, cooldown_secs),
        };
        if show {
            self.notifier.notify(kind, &self.message(kind));
        } else {
            tracing::debug!(kind = %kind, "suppressed repeated error");
        }
        show
    }

    fn cooldown_secs(&self, kind: ErrorKind) -> u64 {
        self.policies
            .lock()
            .get(&kind)
            .map(|p| p.cooldown_secs)
            .unwrap_or(0)
    }
}

/// A cooldown too long to represent never elapses.
fn cooldown_elapsed(elapsed: Duration, cooldown_secs: u64) -> bool {
    match i64::try_from(cooldown_secs).ok().and_then(Duration::try_seconds) {
        Some(cooldown) => elapsed > cooldown,
        None => false,
    }
}

impl Default for ErrorReporter {
    fn default() -> Self {
        Self::new(Box::new(TracingNotifier))
    }
}

fn default_message(kind: ErrorKind) -> Option<&'static str> {
    let m = match kind {
        ErrorKind::SyncUnavailable => "There was a problem communicating with sync storage.",
        ErrorKind::ServerUnauthorised => {
            "You are not authorised to access your course's Ed Karma server."
        }
        ErrorKind::ServerUnavailable => {
            "There was a problem communicating with your course's Ed Karma server."
        }
        ErrorKind::ServerUnauthorisedSavedLocally => {
            "You are not authorised to access your course's Ed Karma server. \
             Scores will be saved locally until you have access."
        }
        ErrorKind::ServerUnavailableSavedLocally => {
            "There was a problem communicating with your course's Ed Karma server. \
             Scores will be saved locally until the server is available."
        }
        ErrorKind::CannotSyncLocalStorage => {
            "You have configured scores to be stored locally instead of on a server. \
             Please update your settings and try again."
        }
        ErrorKind::MustGrantNetworkPermission => {
            "Permission must be granted to use the Server option."
        }
        ErrorKind::Unknown => return None,
    };
    Some(m)
}
