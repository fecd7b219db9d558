use std::time::Duration;

use crate::error::{Result, TransportError};

/// Baud rates selectable on the controller, indexed by the SetBaudrate payload.
pub const BAUD_RATES: [u32; 8] = [9600, 14400, 19200, 28800, 38400, 57600, 76800, 115200];

/// Rate every line is opened at. Changed afterwards only by a SetBaudrate request.
pub const DEFAULT_BAUD_RATE: u32 = BAUD_RATES[0];

/// Upper bound for a single blocking read while waiting for reply bytes.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Parameters applied when a line is opened.
///
/// Framing is fixed to 8 data bits, no parity, one stop bit and no flow
/// control; only the rate and the read poll interval are configurable.
#[derive(Debug, Clone)]
pub struct LineConfig {
    /// Line speed in bits per second.
    pub baud_rate: u32,
    /// Read timeout; a read returns `TimedOut` if no byte arrives within it.
    pub poll_interval: Duration,
}

impl Default for LineConfig {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Look up the rate for a SetBaudrate index.
pub fn baud_rate_for_index(index: usize) -> Result<u32> {
    BAUD_RATES
        .get(index)
        .copied()
        .ok_or(TransportError::InvalidBaudIndex(index))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn baud_table_bounds() {
        assert_eq!(baud_rate_for_index(0).unwrap(), 9600);
        assert_eq!(baud_rate_for_index(6).unwrap(), 76800);
        assert_eq!(baud_rate_for_index(7).unwrap(), 115200);
        assert!(matches!(
            baud_rate_for_index(8),
            Err(TransportError::InvalidBaudIndex(8))
        ));
    }

    #[test]
    fn default_config_opens_at_9600() {
        let config = LineConfig::default();
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.poll_interval, Duration::from_millis(25));
    }
}
