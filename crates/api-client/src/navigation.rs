//! Login redirect hook.

use tracing::info;

/// Invoked when the session has ended and the user must log in again.
pub trait Navigator: Send + Sync {
    fn redirect_to_login(&self);
}

/// Navigator that only records the redirect in the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNavigator;

impl Navigator for LogNavigator {
    fn redirect_to_login(&self) {
        info!("Session ended, login required");
    }
}

/// Navigator backed by a closure.
pub struct FnNavigator<F>(F);

impl<F> FnNavigator<F>
where
    F: Fn() + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> Navigator for FnNavigator<F>
where
    F: Fn() + Send + Sync,
{
    fn redirect_to_login(&self) {
        (self.0)()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_fn_navigator_invokes_closure() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let navigator = FnNavigator::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        navigator.redirect_to_login();
        navigator.redirect_to_login();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_log_navigator_is_object_safe() {
        let navigator: Arc<dyn Navigator> = Arc::new(LogNavigator);
        navigator.redirect_to_login();
    }
}
