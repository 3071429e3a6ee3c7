use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Monotonic request tokens. Only the most recently issued token is current,
/// so a response carrying an older token must be dropped.
#[derive(Debug, Default)]
pub struct Generation {
    latest: AtomicU64,
}

impl Generation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&self) -> u64 {
        self.latest.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn is_current(&self, token: u64) -> bool {
        self.latest.load(Ordering::SeqCst) == token
    }
}

/// Search-as-you-type debouncing: each keystroke waits for the delay and only
/// proceeds if no newer keystroke arrived meanwhile.
#[derive(Debug)]
pub struct SearchDebouncer {
    delay: Duration,
    keystrokes: Generation,
}

impl SearchDebouncer {
    pub fn new(delay: Duration) -> Self {
        SearchDebouncer {
            delay,
            keystrokes: Generation::new(),
        }
    }

    pub fn from_millis(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Returns `true` when this call is still the latest one after the delay.
    pub async fn settle(&self) -> bool {
        let token = self.keystrokes.issue();
        tokio::time::sleep(self.delay).await;
        self.keystrokes.is_current(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn only_latest_token_is_current() {
        let generation = Generation::new();
        let first = generation.issue();
        let second = generation.issue();
        assert!(!generation.is_current(first));
        assert!(generation.is_current(second));
        assert!(!generation.is_current(0));
    }

    #[tokio::test]
    async fn single_keystroke_settles() {
        let debouncer = SearchDebouncer::from_millis(5);
        assert!(debouncer.settle().await);
    }

    #[tokio::test]
    async fn burst_of_keystrokes_settles_once() {
        let debouncer = Arc::new(SearchDebouncer::from_millis(60));

        let early = {
            let debouncer = debouncer.clone();
            tokio::spawn(async move { debouncer.settle().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        let late = {
            let debouncer = debouncer.clone();
            tokio::spawn(async move { debouncer.settle().await })
        };

        assert!(!early.await.unwrap());
        assert!(late.await.unwrap());
    }
}
