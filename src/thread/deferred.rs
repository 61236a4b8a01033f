//! Deferred Module
//!
//! Holds a raw value and lazily derives a parsed value from it.

use std::fmt;

// == Deferred ==
/// A raw value parsed on first read.
///
/// The parse runs at most once per raw assignment and consumes the raw form.
/// Assigning a new raw value drops the previously parsed one.
#[derive(Clone)]
pub struct Deferred<R, P> {
    raw: Option<R>,
    parsed: Option<P>,
    computed: bool,
    parse: fn(R) -> P,
}

impl<R, P> Deferred<R, P> {
    /// Wraps a raw value to be parsed with `parse` on first access.
    pub fn new(raw: R, parse: fn(R) -> P) -> Self {
        Self {
            raw: Some(raw),
            parsed: None,
            computed: false,
            parse,
        }
    }

    /// Wraps an already parsed value.
    pub fn parsed(value: P, parse: fn(R) -> P) -> Self {
        Self {
            raw: None,
            parsed: Some(value),
            computed: true,
            parse,
        }
    }

    /// Replaces the raw value; the next read parses it again.
    pub fn set_raw(&mut self, raw: R) {
        self.raw = Some(raw);
        self.parsed = None;
        self.computed = false;
    }

    /// Returns the parsed value, parsing the pending raw value first.
    pub fn get(&mut self) -> Option<&P> {
        if !self.computed {
            if let Some(raw) = self.raw.take() {
                self.parsed = Some((self.parse)(raw));
            }
            self.computed = true;
        }
        self.parsed.as_ref()
    }

    /// Whether the raw value has already been parsed.
    pub fn is_computed(&self) -> bool {
        self.computed
    }
}

impl<R, P: fmt::Debug> fmt::Debug for Deferred<R, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred")
            .field("pending_raw", &self.raw.is_some())
            .field("parsed", &self.parsed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static PARSES: AtomicUsize = AtomicUsize::new(0);

    fn counted_len(raw: String) -> usize {
        PARSES.fetch_add(1, Ordering::SeqCst);
        raw.len()
    }

    #[test]
    fn test_parses_once_per_assignment() {
        let mut value = Deferred::new("abc".to_string(), counted_len);
        let before = PARSES.load(Ordering::SeqCst);

        assert!(!value.is_computed());
        assert_eq!(value.get(), Some(&3));
        assert_eq!(value.get(), Some(&3));
        assert_eq!(PARSES.load(Ordering::SeqCst), before + 1);

        value.set_raw("abcdef".to_string());
        assert!(!value.is_computed());
        assert_eq!(value.get(), Some(&6));
        assert_eq!(PARSES.load(Ordering::SeqCst), before + 2);
    }

    #[test]
    fn test_pre_parsed_value() {
        fn len(raw: String) -> usize {
            raw.len()
        }
        let mut value = Deferred::parsed(7usize, len);
        assert!(value.is_computed());
        assert_eq!(value.get(), Some(&7));
    }
}
