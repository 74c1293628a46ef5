//! Foreground/visibility source

use std::sync::Arc;

use futures::future;
use tokio::sync::watch;

/// Whether this peer's execution context is in the foreground. Clones share
/// one flag; changes wake the coordinator.
#[derive(Debug, Clone)]
pub struct Visibility {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for Visibility {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Visibility {
    pub fn new(visible: bool) -> Self {
        let (tx, _) = watch::channel(visible);
        Self { tx: Arc::new(tx) }
    }

    pub fn set(&self, visible: bool) {
        self.tx.send_if_modified(|current| {
            if *current == visible {
                return false;
            }
            *current = visible;
            true
        });
    }

    pub fn is_visible(&self) -> bool {
        *self.tx.borrow()
    }

    pub(crate) fn watch(&self) -> VisibilityWatch {
        VisibilityWatch {
            rx: self.tx.subscribe(),
            open: true,
        }
    }
}

/// Coordinator-side view of a [`Visibility`]
#[derive(Debug)]
pub(crate) struct VisibilityWatch {
    rx: watch::Receiver<bool>,
    open: bool,
}

impl VisibilityWatch {
    pub(crate) fn is_visible(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves with the new value after each change. Never resolves once
    /// every [`Visibility`] handle is gone.
    pub(crate) async fn changed(&mut self) -> bool {
        if self.open && self.rx.changed().await.is_ok() {
            return *self.rx.borrow_and_update();
        }
        self.open = false;
        future::pending().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_change_is_observed() {
        let visibility = Visibility::new(true);
        let mut watch = visibility.watch();
        assert!(watch.is_visible());

        visibility.set(false);
        assert!(!watch.changed().await);
        assert!(!visibility.is_visible());
    }

    #[tokio::test]
    async fn test_same_value_is_not_a_change() {
        let visibility = Visibility::new(true);
        let mut watch = visibility.watch();
        visibility.set(true);

        let changed = tokio::time::timeout(Duration::from_millis(10), watch.changed()).await;
        assert!(changed.is_err());
    }

    #[tokio::test]
    async fn test_dropped_source_goes_quiet() {
        let visibility = Visibility::new(false);
        let mut watch = visibility.watch();
        drop(visibility);

        let changed = tokio::time::timeout(Duration::from_millis(10), watch.changed()).await;
        assert!(changed.is_err());
        assert!(!watch.is_visible());
    }
}
