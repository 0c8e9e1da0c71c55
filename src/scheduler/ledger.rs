//! Hydration Ledger
//!
//! Session-wide record of which keys have been admitted for hydration and
//! how much of the lazy budget is spent. Admission is a single critical
//! section so two instances can never both admit the same key.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;

use crate::scheduler::HydrationMode;

// == Admission ==
/// Outcome of asking to hydrate a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The caller now owns the lookup and must schedule it.
    Admitted,
    /// Another caller has it in flight, or its result is still cached.
    AlreadyOwned,
    /// The lazy budget for this session is spent.
    BudgetExhausted,
}

// == Ledger Stats ==
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LedgerStats {
    /// Admissions so far, re-admissions included
    pub hydration_count: usize,
    /// Distinct keys ever admitted
    pub hydrated_keys: usize,
    /// Admitted keys still waiting for their result
    pub in_flight_keys: usize,
    /// Lazy admissions left before the budget is spent
    pub budget_remaining: usize,
}

#[derive(Debug, Default)]
struct LedgerState {
    hydrated_keys: HashSet<String>,
    in_flight: HashSet<String>,
    hydration_count: usize,
}

// == Hydration Ledger ==
#[derive(Debug)]
pub struct HydrationLedger {
    state: Mutex<LedgerState>,
    max_hydrate_limit: usize,
}

impl HydrationLedger {
    // == Constructor ==
    /// Creates an empty ledger allowing `max_hydrate_limit` lazy admissions.
    pub fn new(max_hydrate_limit: usize) -> Self {
        Self {
            state: Mutex::new(LedgerState::default()),
            max_hydrate_limit,
        }
    }

    // == Try Admit ==
    /// Admits `key` unless it is owned or the lazy budget is spent.
    ///
    /// A key is owned while its lookup is in flight, or once settled for as
    /// long as `still_cached` reports a valid cache entry. Eager requests skip
    /// the budget check but still count against it.
    pub fn try_admit(
        &self,
        key: &str,
        mode: HydrationMode,
        still_cached: impl FnOnce() -> bool,
    ) -> Admission {
        let mut state = self.lock();

        if state.in_flight.contains(key) {
            return Admission::AlreadyOwned;
        }
        if state.hydrated_keys.contains(key) && still_cached() {
            return Admission::AlreadyOwned;
        }
        if mode == HydrationMode::Lazy && state.hydration_count >= self.max_hydrate_limit {
            return Admission::BudgetExhausted;
        }

        state.hydrated_keys.insert(key.to_string());
        state.in_flight.insert(key.to_string());
        state.hydration_count += 1;
        Admission::Admitted
    }

    // == Is Owned ==
    /// Reports whether `key` would currently be refused as already owned.
    pub fn is_owned(&self, key: &str, still_cached: impl FnOnce() -> bool) -> bool {
        let state = self.lock();
        state.in_flight.contains(key) || (state.hydrated_keys.contains(key) && still_cached())
    }

    // == Settle ==
    /// Marks the lookup for `key` as finished.
    pub fn settle(&self, key: &str) {
        self.lock().in_flight.remove(key);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lock().hydrated_keys.contains(key)
    }

    pub fn hydration_count(&self) -> usize {
        self.lock().hydration_count
    }

    /// Returns every key admitted this session.
    pub fn hydrated_keys(&self) -> HashSet<String> {
        self.lock().hydrated_keys.clone()
    }

    pub fn stats(&self) -> LedgerStats {
        let state = self.lock();
        LedgerStats {
            hydration_count: state.hydration_count,
            hydrated_keys: state.hydrated_keys.len(),
            in_flight_keys: state.in_flight.len(),
            budget_remaining: self.max_hydrate_limit.saturating_sub(state.hydration_count),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admits_once_while_in_flight() {
        let ledger = HydrationLedger::new(10);

        assert_eq!(ledger.try_admit("a", HydrationMode::Lazy, || false), Admission::Admitted);
        assert_eq!(
            ledger.try_admit("a", HydrationMode::Eager, || false),
            Admission::AlreadyOwned
        );
        assert_eq!(ledger.hydration_count(), 1);
    }

    #[test]
    fn test_settled_key_owned_while_cached() {
        let ledger = HydrationLedger::new(10);
        ledger.try_admit("a", HydrationMode::Lazy, || false);
        ledger.settle("a");

        assert_eq!(
            ledger.try_admit("a", HydrationMode::Lazy, || true),
            Admission::AlreadyOwned
        );
        assert!(ledger.is_owned("a", || true));
    }

    #[test]
    fn test_settled_key_readmitted_after_expiry() {
        let ledger = HydrationLedger::new(10);
        ledger.try_admit("a", HydrationMode::Lazy, || false);
        ledger.settle("a");

        assert_eq!(ledger.try_admit("a", HydrationMode::Lazy, || false), Admission::Admitted);
        assert_eq!(ledger.hydration_count(), 2);
        assert_eq!(ledger.hydrated_keys().len(), 1);
    }

    #[test]
    fn test_lazy_budget_enforced() {
        let ledger = HydrationLedger::new(2);

        assert_eq!(ledger.try_admit("a", HydrationMode::Lazy, || false), Admission::Admitted);
        assert_eq!(ledger.try_admit("b", HydrationMode::Lazy, || false), Admission::Admitted);
        assert_eq!(
            ledger.try_admit("c", HydrationMode::Lazy, || false),
            Admission::BudgetExhausted
        );
        assert!(!ledger.contains("c"));
        assert_eq!(ledger.stats().budget_remaining, 0);
    }

    #[test]
    fn test_eager_exempt_from_budget_but_counted() {
        let ledger = HydrationLedger::new(1);
        ledger.try_admit("a", HydrationMode::Lazy, || false);

        assert_eq!(ledger.try_admit("b", HydrationMode::Eager, || false), Admission::Admitted);
        assert_eq!(ledger.hydration_count(), 2);
        assert_eq!(
            ledger.try_admit("c", HydrationMode::Lazy, || false),
            Admission::BudgetExhausted
        );
    }

    #[test]
    fn test_cache_check_skipped_for_unknown_key() {
        let ledger = HydrationLedger::new(10);

        let admission = ledger.try_admit("fresh", HydrationMode::Lazy, || {
            panic!("cache should not be consulted for a never-admitted key")
        });
        assert_eq!(admission, Admission::Admitted);
    }
}
