use chrono::Duration;

/// Time windows that drive the reservation lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReservationPolicy {
    /// How long a PENDING hold lives before the sweep expires it
    pub hold_duration: Duration,
    /// Lead time before expiry at which the passenger gets a warning
    pub warning_lead: Duration,
    /// Driver must have been seen within this window to count as responsive
    pub response_timeout: Duration,
    /// Period of the expiry sweep
    pub sweep_interval: Duration,
}

impl Default for ReservationPolicy {
    fn default() -> Self {
        Self {
            hold_duration: Duration::minutes(10),
            warning_lead: Duration::minutes(2),
            response_timeout: Duration::minutes(2),
            sweep_interval: Duration::seconds(60),
        }
    }
}
