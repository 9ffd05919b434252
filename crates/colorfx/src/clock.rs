use std::fmt;
use std::str::FromStr;
use std::time::Instant;

use serde::{Deserialize, Serialize};

/// Sign applied to the elapsed time a time-varying effect forwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClockSign {
    /// `frame - activation`, growing from zero.
    #[default]
    Forward,
    /// `activation - frame`, shrinking from zero.
    Reverse,
}

impl FromStr for ClockSign {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "forward" | "positive" | "since-activation" => Ok(Self::Forward),
            "reverse" | "negative" | "since-now" => Ok(Self::Reverse),
            _ => Err(format!(
                "unknown clock sign '{trimmed}'; expected forward or reverse"
            )),
        }
    }
}

impl fmt::Display for ClockSign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Forward => f.write_str("forward"),
            Self::Reverse => f.write_str("reverse"),
        }
    }
}

/// Elapsed time since an effect was activated.
///
/// The activation instant is the only state a time-varying effect carries
/// across frames. Frames stamped before activation report zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectClock {
    activated_at: Instant,
    sign: ClockSign,
}

impl EffectClock {
    pub fn activated_at(activated_at: Instant, sign: ClockSign) -> Self {
        Self { activated_at, sign }
    }

    pub fn reactivate(&mut self, now: Instant) {
        self.activated_at = now;
    }

    /// Seconds between activation and `now`, signed per [`ClockSign`].
    pub fn elapsed_at(&self, now: Instant) -> f32 {
        let seconds = now
            .saturating_duration_since(self.activated_at)
            .as_secs_f32();
        match self.sign {
            ClockSign::Forward => seconds,
            ClockSign::Reverse => -seconds,
        }
    }
}
