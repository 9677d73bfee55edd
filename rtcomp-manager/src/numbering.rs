//! Instance numbering policies. A factory asks its policy for
//! a number on `create`, composes `instance_name = type_name + number`, and
//! releases the number back on `destroy`.

use parking_lot::Mutex;

/// Hands out instance numbers for one component type. Implementations must
/// be safe to share across threads — a factory's `create`/`destroy` can race.
pub trait NumberingPolicy: Send + Sync {
    fn acquire(&self) -> u32;
    fn release(&self, number: u32);
}

/// The default policy: a free-list of released integers plus a
/// high-water mark. `acquire` returns the smallest free integer, reusing a
/// released one before minting a new high-water mark.
#[derive(Default)]
pub struct DefaultNumberingPolicy {
    state: Mutex<FreeListState>,
}

#[derive(Default)]
struct FreeListState {
    free: Vec<u32>,
    high_water: u32,
}

impl DefaultNumberingPolicy {
    pub fn new() -> Self {
        Self::default()
    }
}

impl NumberingPolicy for DefaultNumberingPolicy {
    fn acquire(&self) -> u32 {
        let mut state = self.state.lock();
        if let Some(min_index) = state.free.iter().enumerate().min_by_key(|(_, &v)| v).map(|(i, _)| i) {
            return state.free.swap_remove(min_index);
        }
        let number = state.high_water;
        state.high_water += 1;
        number
    }

    fn release(&self, number: u32) {
        self.state.lock().free.push(number);
    }
}

/// Never reuses a released number; every `acquire` mints a fresh one. Useful
/// when stale references to a destroyed instance's number must never be
/// mistaken for a live one.
#[derive(Default)]
pub struct MonotonicNumberingPolicy {
    next: Mutex<u32>,
}

impl MonotonicNumberingPolicy {
    pub fn new() -> Self {
        Self::default()
    }
}

impl NumberingPolicy for MonotonicNumberingPolicy {
    fn acquire(&self) -> u32 {
        let mut next = self.next.lock();
        let number = *next;
        *next += 1;
        number
    }

    fn release(&self, _number: u32) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn default_policy_reuses_the_smallest_released_number() {
        let policy = DefaultNumberingPolicy::new();
        assert_eq!(policy.acquire(), 0);
        assert_eq!(policy.acquire(), 1);
        assert_eq!(policy.acquire(), 2);
        policy.release(1);
        assert_eq!(policy.acquire(), 1);
        assert_eq!(policy.acquire(), 3);
    }

    #[test]
    fn monotonic_policy_never_reuses() {
        let policy = MonotonicNumberingPolicy::new();
        assert_eq!(policy.acquire(), 0);
        assert_eq!(policy.acquire(), 1);
        policy.release(0);
        assert_eq!(policy.acquire(), 2);
    }

    proptest! {
        #[test]
        fn default_policy_next_create_after_destroy_k_is_never_above_k(
            creates_before_destroy in 1usize..20,
        ) {
            let policy = DefaultNumberingPolicy::new();
            let numbers: Vec<u32> = (0..creates_before_destroy).map(|_| policy.acquire()).collect();
            let k = *numbers.iter().max().unwrap();
            policy.release(k);
            let next = policy.acquire();
            prop_assert!(next <= k);
        }
    }
}
