use std::sync::atomic::{AtomicBool, Ordering};

/// A guard that lets exactly one caller through, ever.
///
/// The orchestrator claims it from its own loop only, but the guard is safe to
/// share across tasks if a caller wants to gate something else on it.
#[derive(Debug, Default)]
pub struct SingleFlight {
    claimed: AtomicBool,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` for the first caller and `false` for everyone after.
    pub fn try_claim(&self) -> bool {
        self.claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn is_claimed(&self) -> bool {
        self.claimed.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[test]
    fn first_claim_wins() {
        let guard = SingleFlight::new();
        assert!(!guard.is_claimed());
        assert!(guard.try_claim());
        assert!(guard.is_claimed());
        assert!(!guard.try_claim());
        assert!(!guard.try_claim());
    }

    #[test]
    fn concurrent_claims_admit_one() {
        let guard = Arc::new(SingleFlight::new());
        let wins = Arc::new(AtomicUsize::new(0));

        let threads: Vec<_> = (0..16)
            .map(|_| {
                let guard = Arc::clone(&guard);
                let wins = Arc::clone(&wins);
                std::thread::spawn(move || {
                    if guard.try_claim() {
                        wins.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }

        assert_eq!(wins.load(Ordering::SeqCst), 1);
    }
}
