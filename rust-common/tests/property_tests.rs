//! Property-based tests for rust-common crate.
//!
//! These tests verify universal properties across all inputs using proptest.

use proptest::prelude::*;
use rust_common::{RetryConfig, RetryError, RetryPolicy, Retryable};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Flaky(bool);

impl std::fmt::Display for Flaky {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "flaky(retryable={})", self.0)
    }
}

impl Retryable for Flaky {
    fn is_retryable(&self) -> bool {
        self.0
    }
}

// Backoff never shrinks from one attempt to the next and never exceeds the cap.
proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_backoff_is_monotonic_and_capped(
        initial_ms in 1u64..2_000,
        cap_ms in 1u64..120_000,
        attempt in 0u32..40,
    ) {
        let policy = RetryPolicy::new(
            RetryConfig::default()
                .with_initial_delay(Duration::from_millis(initial_ms))
                .with_max_delay(Duration::from_millis(cap_ms)),
        );

        let current = policy.delay_for_attempt(attempt);
        let next = policy.delay_for_attempt(attempt + 1);

        prop_assert!(current <= Duration::from_millis(cap_ms));
        prop_assert!(next >= current, "delay shrank: {:?} -> {:?}", current, next);
    }

    #[test]
    fn prop_should_retry_respects_attempt_budget(
        max_attempts in 1u32..10,
        attempt in 0u32..12,
        retryable in any::<bool>(),
    ) {
        let policy = RetryPolicy::new(RetryConfig::default().with_max_attempts(max_attempts));
        let expected = retryable && attempt + 1 < max_attempts;

        prop_assert_eq!(policy.should_retry(&Flaky(retryable), attempt), expected);
    }
}

// An operation that fails transiently `failures` times succeeds exactly when
// the attempt budget covers one more call.
proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_retry_boundary(max_attempts in 1u32..6, failures in 0u32..7) {
        let policy = RetryPolicy::new(
            RetryConfig::default()
                .with_max_attempts(max_attempts)
                .with_initial_delay(Duration::from_micros(10)),
        );

        let result = tokio_test::block_on(policy.execute(|attempt| async move {
            if attempt < failures { Err(Flaky(true)) } else { Ok(attempt) }
        }));

        if failures < max_attempts {
            prop_assert_eq!(result.ok(), Some(failures));
        } else {
            let exhausted = matches!(
                result,
                Err(RetryError::Exhausted { attempts, .. }) if attempts == max_attempts
            );
            prop_assert!(exhausted);
        }
    }
}
