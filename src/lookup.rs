//! RFC autofill: normalisation and the debounced lookup timer.

use std::sync::LazyLock;
use std::time::{Duration, Instant};

use regex::Regex;
use tracing::debug;

use crate::api::Backend;
use crate::error::AppResult;
use crate::model::RfcData;

/// Shorter RFCs are never looked up (persona moral RFCs have 12 chars).
pub const MIN_RFC_LEN: usize = 12;

pub const DEFAULT_DELAY: Duration = Duration::from_millis(800);

static RFC_NOISE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"[^A-Z0-9Ñ&]").unwrap()
});

/// Uppercase and drop separators people paste in (`ABC-010101 XY1`).
pub fn normalize_rfc(raw: &str) -> String {
    RFC_NOISE.replace_all(&raw.trim().to_uppercase(), "").into_owned()
}

/// Cancellable single-shot timer owned by the RFC input.
///
/// Every keystroke cancels the pending deadline and schedules a new one, so
/// only the last value inside the window is ever looked up.
#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    pending: Option<(String, Instant)>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    /// Feed the current input value. Returns `true` when a lookup has been
    /// scheduled, `false` when the value is too short (and the status
    /// indicator should be hidden).
    pub fn input(&mut self, raw: &str, now: Instant) -> bool {
        self.pending = None;
        let rfc = normalize_rfc(raw);
        if rfc.chars().count() < MIN_RFC_LEN {
            return false;
        }
        self.pending = Some((rfc, now + self.delay));
        true
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(_, due)| *due)
    }

    /// The value to look up, once its deadline has passed. Fires at most
    /// once per schedule.
    pub fn poll(&mut self, now: Instant) -> Option<String> {
        match &self.pending {
            Some((_, due)) if now >= *due => self.pending.take().map(|(rfc, _)| rfc),
            _ => None,
        }
    }
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(DEFAULT_DELAY)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RfcOutcome {
    /// Known RFC, data to autofill.
    Found(RfcData),
    /// Unknown RFC, the user fills the form by hand.
    New,
}

pub fn lookup(backend: &dyn Backend, rfc: &str) -> AppResult<RfcOutcome> {
    let outcome = match backend.lookup_rfc(rfc)? {
        Some(data) => RfcOutcome::Found(data),
        None => RfcOutcome::New,
    };
    debug!(rfc, found = matches!(outcome, RfcOutcome::Found(_)), "RFC lookup");
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_pasted_rfcs() {
        assert_eq!(normalize_rfc(" abc-010101 xy1 "), "ABC010101XY1");
        assert_eq!(normalize_rfc("ñaz&010101a1b"), "ÑAZ&010101A1B");
    }

    #[test]
    fn short_values_never_schedule() {
        let mut d = Debouncer::default();
        let t0 = Instant::now();
        assert!(!d.input("ABC0101", t0));
        assert_eq!(d.deadline(), None);
        assert_eq!(d.poll(t0 + Duration::from_secs(5)), None);
    }

    #[test]
    fn only_last_keystroke_fires() {
        let mut d = Debouncer::new(Duration::from_millis(800));
        let t0 = Instant::now();
        assert!(!d.input("ABC010101XY", t0)); // 11 chars
        assert!(d.input("ABC010101XY1", t0));
        d.input("ABC010101XY12", t0 + Duration::from_millis(500));

        // first deadline would have been t0+800ms; it was cancelled
        assert_eq!(d.poll(t0 + Duration::from_millis(900)), None);
        assert_eq!(
            d.poll(t0 + Duration::from_millis(1300)).as_deref(),
            Some("ABC010101XY12")
        );
        // single shot
        assert_eq!(d.poll(t0 + Duration::from_secs(10)), None);
    }

    #[test]
    fn shortening_the_input_cancels_pending_lookup() {
        let mut d = Debouncer::default();
        let t0 = Instant::now();
        d.input("ABC010101XY1", t0);
        d.input("ABC01", t0 + Duration::from_millis(100));
        assert_eq!(d.poll(t0 + Duration::from_secs(2)), None);
    }
}
