//! Current-language oracle.
//!
//! Locale negotiation belongs to the host application. tof only asks "what
//! is the current language?" through [`LocaleOracle`]. The host activates a
//! language per request (or per worker thread) and tof reads it.

use std::cell::RefCell;
use std::marker::PhantomData;

/// Source of the current language code for the running execution context.
pub trait LocaleOracle: Send + Sync {
    /// The language code in effect for the caller.
    fn current_language(&self) -> String;
}

thread_local! {
    static ACTIVE_LANGUAGE: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Oracle backed by a thread-local activation, falling back to a default.
#[derive(Debug, Clone)]
pub struct ThreadLocale {
    default_language: String,
}

impl ThreadLocale {
    pub fn new(default_language: impl Into<String>) -> Self {
        Self {
            default_language: default_language.into(),
        }
    }

    /// Activate `code` on this thread until the returned guard drops.
    ///
    /// Guards nest: dropping one restores whatever was active before it.
    pub fn activate(code: &str) -> LanguageGuard {
        let previous = ACTIVE_LANGUAGE.with(|cell| cell.replace(Some(code.to_string())));
        LanguageGuard {
            previous,
            _thread_bound: PhantomData,
        }
    }

    /// The language activated on this thread, if any.
    pub fn active() -> Option<String> {
        ACTIVE_LANGUAGE.with(|cell| cell.borrow().clone())
    }
}

impl LocaleOracle for ThreadLocale {
    fn current_language(&self) -> String {
        Self::active().unwrap_or_else(|| self.default_language.clone())
    }
}

/// Restores the previously active language on drop.
///
/// Activation is per thread, so the guard is neither `Send` nor `Sync`.
/// Hold it in synchronous scopes only: a task resumed on another worker
/// after an `.await` would restore the language into the wrong thread.
///
/// ```compile_fail
/// fn require_send<T: Send>(_: T) {}
/// require_send(tof::ThreadLocale::activate("fr"));
/// ```
#[must_use = "the language is deactivated when the guard drops"]
#[derive(Debug)]
pub struct LanguageGuard {
    previous: Option<String>,
    _thread_bound: PhantomData<*const ()>,
}

impl Drop for LanguageGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        ACTIVE_LANGUAGE.with(|cell| {
            *cell.borrow_mut() = previous;
        });
    }
}

/// Oracle that always answers the same language.
#[derive(Debug, Clone)]
pub struct FixedLocale(pub String);

impl LocaleOracle for FixedLocale {
    fn current_language(&self) -> String {
        self.0.clone()
    }
}
