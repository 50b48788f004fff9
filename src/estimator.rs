//! Duration estimates and simulated waiting.
//!
//! Every registered operation carries an estimator. `EstimateDuration` reports it
//! directly; simulated `ExecuteCommand` calls wait for it (scaled by
//! `simulation.time_scale`) so callers observe realistic wall-clock timing during dry
//! runs.

use crate::command::{EstimateReply, ResultCode};
use crate::error::panic_message;
use crate::registry::PreparedOperation;
use anyhow::{anyhow, Context};
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

/// Looks up and applies per-operation duration estimates.
#[derive(Debug, Clone, Copy)]
pub struct DurationEstimator {
    time_scale: f64,
}

impl Default for DurationEstimator {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl DurationEstimator {
    /// Create an estimator whose simulated waits are `estimate * time_scale`.
    ///
    /// Negative or non-finite scales are treated as 0 (no waiting).
    pub fn new(time_scale: f64) -> Self {
        let time_scale = if time_scale.is_finite() && time_scale > 0.0 {
            time_scale
        } else {
            0.0
        };
        Self { time_scale }
    }

    /// Scale applied to simulated waits.
    pub fn time_scale(&self) -> f64 {
        self.time_scale
    }

    /// Ask the operation's estimator for its duration in seconds.
    ///
    /// A panicking estimator is reported as an error like any other estimator fault.
    pub fn estimate<D>(&self, operation: &PreparedOperation<D>) -> anyhow::Result<u64> {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| operation.estimate()))
            .unwrap_or_else(|payload| {
                Err(anyhow!("estimator panicked: {}", panic_message(&*payload)))
            });
        outcome.with_context(|| format!("duration estimate for '{}' failed", operation.name()))
    }

    /// Estimate packaged as an `EstimateDuration` reply.
    pub fn estimate_reply<D>(&self, operation: &PreparedOperation<D>) -> EstimateReply {
        match self.estimate(operation) {
            Ok(seconds) => EstimateReply::seconds(seconds),
            Err(e) => EstimateReply::failed(ResultCode::DriverError, format!("{e:#}")),
        }
    }

    /// Wall-clock time a simulated run of `seconds` should take.
    ///
    /// Fails when the scaled estimate does not fit in a [`Duration`].
    pub fn simulated_wait(&self, seconds: u64) -> anyhow::Result<Duration> {
        if self.time_scale == 0.0 {
            return Ok(Duration::ZERO);
        }
        Duration::try_from_secs_f64(seconds as f64 * self.time_scale).map_err(|e| {
            anyhow!(
                "simulated wait of {seconds} s at scale {} is not representable: {e}",
                self.time_scale
            )
        })
    }

    /// Sleep for the simulated duration of an operation.
    pub async fn wait(&self, seconds: u64) -> anyhow::Result<()> {
        let wait = self.simulated_wait(seconds)?;
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::OperationCall;
    use crate::registry::{NoArgs, OperationRegistry};
    use std::sync::Arc;

    struct Heater;

    fn registry() -> OperationRegistry<Heater> {
        let mut ops = OperationRegistry::new();
        ops.register("warm_up", |_: Arc<Heater>, _: NoArgs| async { Ok(None) }, |_| Ok(90))
            .register(
                "hold",
                |_: Arc<Heater>, _: NoArgs| async { Ok(None) },
                |_| Err(anyhow::anyhow!("setpoint unknown")),
            )
            .register(
                "purge",
                |_: Arc<Heater>, _: NoArgs| async { Ok(None) },
                |_| panic!("purge table corrupted"),
            );
        ops
    }

    #[test]
    fn reports_registered_estimate() {
        let ops = registry();
        let prepared = ops.prepare(&OperationCall::bare("warm_up")).unwrap();
        let reply = DurationEstimator::default().estimate_reply(&prepared);
        assert_eq!(reply, EstimateReply::seconds(90));
    }

    #[test]
    fn estimator_failure_is_a_driver_error() {
        let ops = registry();
        let prepared = ops.prepare(&OperationCall::bare("hold")).unwrap();
        let reply = DurationEstimator::default().estimate_reply(&prepared);

        assert_eq!(reply.result, ResultCode::DriverError);
        assert!(reply.error_message.contains("hold"));
        assert!(reply.error_message.contains("setpoint unknown"));
    }

    #[test]
    fn panicking_estimator_is_a_driver_error() {
        let ops = registry();
        let prepared = ops.prepare(&OperationCall::bare("purge")).unwrap();
        let reply = DurationEstimator::default().estimate_reply(&prepared);

        assert_eq!(reply.result, ResultCode::DriverError);
        assert!(reply.error_message.contains("purge table corrupted"));
        assert_eq!(reply.estimated_duration_seconds, 0);
    }

    #[test]
    fn simulated_wait_is_scaled() {
        assert_eq!(
            DurationEstimator::new(0.5).simulated_wait(10).unwrap(),
            Duration::from_secs(5)
        );
        assert_eq!(
            DurationEstimator::new(0.0).simulated_wait(u64::MAX).unwrap(),
            Duration::ZERO
        );
        assert_eq!(DurationEstimator::new(-1.0).time_scale(), 0.0);
        assert_eq!(DurationEstimator::new(f64::NAN).time_scale(), 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_sleeps_for_the_estimate() {
        let start = tokio::time::Instant::now();
        DurationEstimator::default().wait(3).await.unwrap();
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(3), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(3_100), "{elapsed:?}");
    }

    #[test]
    fn unrepresentable_wait_is_an_error() {
        let err = DurationEstimator::default()
            .simulated_wait(u64::MAX)
            .unwrap_err();
        assert!(err.to_string().contains("not representable"));
        assert!(DurationEstimator::new(2.0).simulated_wait(u64::MAX / 2).is_err());
    }
}
