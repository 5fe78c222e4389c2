//! Bounded convergence polling against the platform.
//!
//! One tick per interval: a transport health probe, then a per-unit status
//! fetch. Each check keeps its own consecutive-failure counter; a success
//! resets that counter to zero, and reaching the threshold fails the wait
//! with the exact count. The overall deadline is the only other exit besides
//! success.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::platform::PlatformClient;

use super::error::{OrchestrationError, Result};

/// Fixed poll interval between ticks.
pub const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Consecutive failures of one check that fail the wait.
pub const FAILURE_THRESHOLD: u32 = 5;

/// Polls the platform until all named units converge, a failure counter
/// reaches the threshold, or the deadline elapses.
pub struct ConvergenceWaiter<'a> {
    client: &'a dyn PlatformClient,
    poll_interval: Duration,
    failure_threshold: u32,
}

impl<'a> ConvergenceWaiter<'a> {
    pub fn new(client: &'a dyn PlatformClient) -> Self {
        Self {
            client,
            poll_interval: POLL_INTERVAL,
            failure_threshold: FAILURE_THRESHOLD,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Blocks until every named unit reports ready.
    pub fn wait_ready(&self, names: &[String], timeout: Duration) -> Result<()> {
        self.poll(names, timeout, |ready, names| {
            names.iter().all(|n| ready.get(n).copied().unwrap_or(false))
        })
    }

    /// Blocks until none of the named units exist on the platform any more.
    pub fn wait_deleted(&self, names: &[String], timeout: Duration) -> Result<()> {
        self.poll(names, timeout, |ready, names| {
            names.iter().all(|n| !ready.contains_key(n))
        })
    }

    fn poll(
        &self,
        names: &[String],
        timeout: Duration,
        done: impl Fn(&BTreeMap<String, bool>, &[String]) -> bool,
    ) -> Result<()> {
        if names.is_empty() {
            return Ok(());
        }
        let started = Instant::now();
        let mut health_failures = 0u32;
        let mut status_failures = 0u32;
        loop {
            if started.elapsed() >= timeout {
                return Err(OrchestrationError::Timeout {
                    waited: started.elapsed(),
                });
            }

            match self.client.transport_health() {
                Ok(()) => health_failures = 0,
                Err(e) => {
                    health_failures += 1;
                    warn!(
                        "Transport health probe failed ({} consecutive): {}",
                        health_failures, e
                    );
                    if health_failures >= self.failure_threshold {
                        return Err(OrchestrationError::TransportFailures {
                            count: health_failures,
                        });
                    }
                    std::thread::sleep(self.poll_interval);
                    continue;
                }
            }

            match self.client.unit_ready_map(names) {
                Ok(ready) => {
                    status_failures = 0;
                    if done(&ready, names) {
                        return Ok(());
                    }
                    let pending = names
                        .iter()
                        .filter(|n| !ready.get(*n).copied().unwrap_or(false))
                        .count();
                    debug!("Waiting on {} of {} units", pending, names.len());
                }
                Err(e) => {
                    status_failures += 1;
                    warn!(
                        "Unit status fetch failed ({} consecutive): {}",
                        status_failures, e
                    );
                    if status_failures >= self.failure_threshold {
                        return Err(OrchestrationError::StatusFailures {
                            count: status_failures,
                        });
                    }
                }
            }

            std::thread::sleep(self.poll_interval);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{GitSourceSpec, OciSourceSpec, PlatformError, UnitSpec};
    use std::collections::VecDeque;
    // Shadow the glob-imported `super::error::Result` alias: the mock client
    // signatures below need the two-parameter std form.
    use std::result::Result;
    use std::sync::Mutex;

    /// Scripted client: health and status results are consumed from queues;
    /// an empty queue means healthy / all-ready.
    #[derive(Default)]
    struct ScriptedClient {
        health: Mutex<VecDeque<bool>>,
        ready: Mutex<VecDeque<ReadyStep>>,
    }

    enum ReadyStep {
        Fail,
        Pending,
        Ready,
    }

    impl ScriptedClient {
        fn with_health(self, steps: &[bool]) -> Self {
            *self.health.lock().unwrap() = steps.iter().copied().collect();
            self
        }

        fn with_ready(self, steps: Vec<ReadyStep>) -> Self {
            *self.ready.lock().unwrap() = steps.into_iter().collect();
            self
        }
    }

    impl PlatformClient for ScriptedClient {
        fn create_namespace(&self, _name: &str) -> Result<(), PlatformError> {
            Ok(())
        }
        fn delete_namespace(&self, _name: &str) -> Result<(), PlatformError> {
            Ok(())
        }
        fn apply_git_source(&self, _spec: &GitSourceSpec) -> Result<(), PlatformError> {
            Ok(())
        }
        fn apply_oci_source(&self, _spec: &OciSourceSpec) -> Result<(), PlatformError> {
            Ok(())
        }
        fn apply_config_values(
            &self,
            _name: &str,
            _namespace: &str,
            _values: &std::collections::BTreeMap<String, String>,
        ) -> Result<(), PlatformError> {
            Ok(())
        }
        fn apply_unit(&self, _spec: &UnitSpec) -> Result<(), PlatformError> {
            Ok(())
        }
        fn delete_unit(&self, _name: &str, _namespace: &str) -> Result<(), PlatformError> {
            Ok(())
        }
        fn suspend_unit(&self, _name: &str, _namespace: &str) -> Result<(), PlatformError> {
            Ok(())
        }
        fn suspend_dependent(&self, _name: &str, _namespace: &str) -> Result<(), PlatformError> {
            Ok(())
        }
        fn list_dependents(
            &self,
            _name: &str,
            _namespace: &str,
        ) -> Result<Vec<String>, PlatformError> {
            Ok(Vec::new())
        }
        fn unit_ready_map(
            &self,
            names: &[String],
        ) -> Result<BTreeMap<String, bool>, PlatformError> {
            let step = self.ready.lock().unwrap().pop_front();
            match step.unwrap_or(ReadyStep::Ready) {
                ReadyStep::Fail => Err(PlatformError::Transport("status fetch".to_string())),
                ReadyStep::Pending => {
                    Ok(names.iter().map(|n| (n.clone(), false)).collect())
                }
                ReadyStep::Ready => Ok(names.iter().map(|n| (n.clone(), true)).collect()),
            }
        }
        fn transport_health(&self) -> Result<(), PlatformError> {
            let healthy = self.health.lock().unwrap().pop_front().unwrap_or(true);
            if healthy {
                Ok(())
            } else {
                Err(PlatformError::Transport("probe".to_string()))
            }
        }
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn fast_waiter(client: &ScriptedClient) -> ConvergenceWaiter<'_> {
        ConvergenceWaiter::new(client).with_poll_interval(Duration::from_millis(1))
    }

    #[test]
    fn test_wait_ready_succeeds_without_sleeping_when_all_ready() {
        let client = ScriptedClient::default();
        let waiter = ConvergenceWaiter::new(&client);
        waiter
            .wait_ready(&names(&["dns", "ingress"]), Duration::from_secs(60))
            .unwrap();
    }

    #[test]
    fn test_empty_name_list_is_an_immediate_success() {
        let client = ScriptedClient::default();
        ConvergenceWaiter::new(&client)
            .wait_ready(&[], Duration::from_secs(0))
            .unwrap();
    }

    #[test]
    fn test_health_failures_below_threshold_reset_on_success() {
        // Three failures, a success, then four more failures: the counter
        // never reaches five consecutive, so the wait still converges.
        let client = ScriptedClient::default()
            .with_health(&[false, false, false, true, false, false, false, false])
            .with_ready(vec![ReadyStep::Pending, ReadyStep::Ready]);
        fast_waiter(&client)
            .wait_ready(&names(&["dns"]), Duration::from_secs(60))
            .unwrap();
    }

    #[test]
    fn test_health_failures_at_threshold_name_the_exact_count() {
        let client = ScriptedClient::default()
            .with_health(&[false, false, false, false, false]);
        let err = fast_waiter(&client)
            .wait_ready(&names(&["dns"]), Duration::from_secs(60))
            .unwrap_err();
        match err {
            OrchestrationError::TransportFailures { count } => assert_eq!(count, 5),
            other => panic!("expected TransportFailures, got {}", other),
        }
        assert!(format!(
            "{}",
            OrchestrationError::TransportFailures { count: 5 }
        )
        .contains("5 consecutive"));
    }

    #[test]
    fn test_status_failures_have_their_own_counter() {
        // Health stays green; only the status fetch fails.
        let client = ScriptedClient::default().with_ready(vec![
            ReadyStep::Fail,
            ReadyStep::Fail,
            ReadyStep::Fail,
            ReadyStep::Fail,
            ReadyStep::Fail,
        ]);
        let err = fast_waiter(&client)
            .wait_ready(&names(&["dns"]), Duration::from_secs(60))
            .unwrap_err();
        match err {
            OrchestrationError::StatusFailures { count } => assert_eq!(count, 5),
            other => panic!("expected StatusFailures, got {}", other),
        }
    }

    #[test]
    fn test_status_failure_counter_resets_on_successful_fetch() {
        let client = ScriptedClient::default().with_ready(vec![
            ReadyStep::Fail,
            ReadyStep::Fail,
            ReadyStep::Fail,
            ReadyStep::Pending,
            ReadyStep::Fail,
            ReadyStep::Fail,
            ReadyStep::Ready,
        ]);
        fast_waiter(&client)
            .wait_ready(&names(&["dns"]), Duration::from_secs(60))
            .unwrap();
    }

    #[test]
    fn test_timeout_is_distinct_from_transport_failure() {
        let client = ScriptedClient::default().with_ready(
            std::iter::repeat_with(|| ReadyStep::Pending).take(64).collect(),
        );
        let err = fast_waiter(&client)
            .wait_ready(&names(&["dns"]), Duration::from_millis(5))
            .unwrap_err();
        match &err {
            OrchestrationError::Timeout { .. } => {}
            other => panic!("expected Timeout, got {}", other),
        }
        assert!(err.to_string().contains("Timed out"));
    }

    #[test]
    fn test_wait_deleted_succeeds_when_names_are_absent() {
        // The default ready map echoes the requested names back, so ask a
        // client scripted to report nothing.
        struct EmptyMap;
        impl PlatformClient for EmptyMap {
            fn create_namespace(&self, _: &str) -> Result<(), PlatformError> {
                Ok(())
            }
            fn delete_namespace(&self, _: &str) -> Result<(), PlatformError> {
                Ok(())
            }
            fn apply_git_source(&self, _: &GitSourceSpec) -> Result<(), PlatformError> {
                Ok(())
            }
            fn apply_oci_source(&self, _: &OciSourceSpec) -> Result<(), PlatformError> {
                Ok(())
            }
            fn apply_config_values(
                &self,
                _: &str,
                _: &str,
                _: &std::collections::BTreeMap<String, String>,
            ) -> Result<(), PlatformError> {
                Ok(())
            }
            fn apply_unit(&self, _: &UnitSpec) -> Result<(), PlatformError> {
                Ok(())
            }
            fn delete_unit(&self, _: &str, _: &str) -> Result<(), PlatformError> {
                Ok(())
            }
            fn suspend_unit(&self, _: &str, _: &str) -> Result<(), PlatformError> {
                Ok(())
            }
            fn suspend_dependent(&self, _: &str, _: &str) -> Result<(), PlatformError> {
                Ok(())
            }
            fn list_dependents(&self, _: &str, _: &str) -> Result<Vec<String>, PlatformError> {
                Ok(Vec::new())
            }
            fn unit_ready_map(
                &self,
                _names: &[String],
            ) -> Result<BTreeMap<String, bool>, PlatformError> {
                Ok(BTreeMap::new())
            }
            fn transport_health(&self) -> Result<(), PlatformError> {
                Ok(())
            }
        }

        ConvergenceWaiter::new(&EmptyMap)
            .wait_deleted(&names(&["dns", "dns-cleanup"]), Duration::from_secs(60))
            .unwrap();
    }

    #[test]
    fn test_wait_deleted_pends_while_names_remain() {
        let client = ScriptedClient::default();
        let err = fast_waiter(&client)
            .wait_deleted(&names(&["dns"]), Duration::from_millis(5))
            .unwrap_err();
        assert!(matches!(err, OrchestrationError::Timeout { .. }));
    }
}
