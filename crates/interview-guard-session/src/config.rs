//! Session tunables.

use std::time::Duration;

use interview_guard_evidence::{DEFAULT_JPEG_QUALITY, RetryPolicy};

use crate::error::SessionError;
use crate::machine::EscalationPolicy;

/// Every tunable of one proctored session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Countdown length.
    pub session_length_secs: u64,
    /// Countdown tick period.
    pub clock_tick_ms: u64,
    /// Display sentinel poll period.
    pub display_poll_ms: u64,
    /// Presence sampling period.
    pub presence_sample_ms: u64,
    /// Recorder chunk period.
    pub recorder_chunk_ms: u64,
    /// Continuous away time before a `LookingAway` violation.
    pub away_threshold_ms: u64,
    /// Minimum spacing of `PhoneUsage` violations.
    pub phone_usage_cooldown_ms: u64,
    /// Minimum spacing of `MultiplePeople` violations.
    pub multiple_people_cooldown_ms: u64,
    /// Warning count that ends the session with `ViolationLimit`.
    pub max_warnings: u32,
    /// Upload retries after the first attempt.
    pub upload_max_retries: u32,
    /// Delay before an upload retry.
    pub upload_backoff_ms: u64,
    /// JPEG quality of evidence images.
    pub jpeg_quality: u8,
    /// Seed for the probabilistic presence surfacing. `None` derives one from
    /// the session start time.
    pub presence_seed: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_length_secs: 30 * 60,
            clock_tick_ms: 1_000,
            display_poll_ms: 1_000,
            presence_sample_ms: 1_000,
            recorder_chunk_ms: 3_000,
            away_threshold_ms: 10_000,
            phone_usage_cooldown_ms: 15_000,
            multiple_people_cooldown_ms: 15_000,
            max_warnings: 5,
            upload_max_retries: 1,
            upload_backoff_ms: 1_000,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            presence_seed: None,
        }
    }
}

impl SessionConfig {
    /// Checks that every period and limit is usable.
    ///
    /// # Errors
    /// Returns [`SessionError::InvalidConfig`] naming the first bad field.
    pub fn validate(&self) -> Result<(), SessionError> {
        let periods = [
            ("session_length_secs", self.session_length_secs),
            ("clock_tick_ms", self.clock_tick_ms),
            ("display_poll_ms", self.display_poll_ms),
            ("presence_sample_ms", self.presence_sample_ms),
            ("recorder_chunk_ms", self.recorder_chunk_ms),
            ("away_threshold_ms", self.away_threshold_ms),
        ];
        if let Some((field, _)) = periods.iter().find(|(_, value)| *value == 0) {
            return Err(SessionError::InvalidConfig(format!("{field} must be non-zero")));
        }
        if self.max_warnings == 0 {
            return Err(SessionError::InvalidConfig(
                "max_warnings must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Upload retry policy.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.upload_max_retries,
            base_delay_ms: self.upload_backoff_ms,
            max_delay_ms: self.upload_backoff_ms.saturating_mul(4),
        }
    }

    /// Presence escalation thresholds.
    pub fn escalation(&self) -> EscalationPolicy {
        EscalationPolicy {
            away_threshold_ms: self.away_threshold_ms,
            phone_usage_cooldown_ms: self.phone_usage_cooldown_ms,
            multiple_people_cooldown_ms: self.multiple_people_cooldown_ms,
        }
    }

    pub(crate) fn period(ms: u64) -> Duration {
        Duration::from_millis(ms)
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for configuration validation.

    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = SessionConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.session_length_secs, 1_800);
        assert_eq!(config.retry_policy().max_retries, 1);
    }

    #[test]
    fn zero_interval_is_rejected() {
        let config = SessionConfig {
            presence_sample_ms: 0,
            ..SessionConfig::default()
        };
        let error = config.validate().expect_err("zero period must fail");
        assert!(error.to_string().contains("presence_sample_ms"));
    }
}
