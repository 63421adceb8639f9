use {super::SessionStatus, std::time::Duration};

/// Exponential poll delay policy.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Backoff {
    /// Base delay while the job is processing.
    pub processing: Duration,

    /// Base delay for any other non-terminal status.
    pub idle: Duration,

    pub multiplier: f64,
    pub max: Duration,
}

impl Backoff {
    pub fn base(&self, status: SessionStatus) -> Duration {
        match status {
            SessionStatus::Processing => self.processing,
            _ => self.idle,
        }
    }

    /// Delay before retry number `attempt` (zero based).
    pub fn delay(&self, status: SessionStatus, attempt: u32) -> Duration {
        let base = self.base(status).as_millis() as f64;
        let max = self.max.as_millis() as f64;

        // Anything past this exponent is capped anyway.
        let exponent = attempt.min(64) as i32;
        let millis = (base * self.multiplier.powi(exponent)).min(max);

        Duration::from_millis(millis.round() as u64)
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Backoff {
            processing: Duration::from_millis(3000),
            idle: Duration::from_millis(4000),
            multiplier: 1.5,
            max: Duration::from_millis(15000),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delays(status: SessionStatus) -> Vec<u64> {
        let backoff = Backoff::default();
        (0..7)
            .map(|attempt| backoff.delay(status, attempt).as_millis() as u64)
            .collect()
    }

    #[test]
    fn processing_sequence_is_capped() {
        assert_eq!(
            delays(SessionStatus::Processing),
            [3000, 4500, 6750, 10125, 15000, 15000, 15000]
        );
    }

    #[test]
    fn other_statuses_start_from_idle_base() {
        assert_eq!(
            delays(SessionStatus::Queued),
            [4000, 6000, 9000, 13500, 15000, 15000, 15000]
        );
        assert_eq!(delays(SessionStatus::Unknown)[0], 4000);
        assert_eq!(delays(SessionStatus::Completed)[0], 4000);
    }

    #[test]
    fn huge_attempt_does_not_overflow() {
        let backoff = Backoff::default();
        assert_eq!(
            backoff.delay(SessionStatus::Processing, u32::MAX),
            Duration::from_millis(15000)
        );
    }
}
