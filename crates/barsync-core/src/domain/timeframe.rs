use std::fmt::{Display, Formatter};
use std::str::FromStr;

use barsync_warehouse::BarTable;
use serde::{Deserialize, Serialize};
use time::Duration;

use crate::ValidationError;

/// Bucket granularity of a bar series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1m")]
    Minute,
    #[serde(rename = "1h")]
    Hourly,
    #[serde(rename = "1d")]
    Daily,
}

impl Timeframe {
    /// Order in which a sync run queues timeframes for each symbol.
    pub const SYNC_ORDER: [Self; 3] = [Self::Hourly, Self::Daily, Self::Minute];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Minute => "1m",
            Self::Hourly => "1h",
            Self::Daily => "1d",
        }
    }

    pub const fn bucket(self) -> Duration {
        match self {
            Self::Minute => Duration::MINUTE,
            Self::Hourly => Duration::HOUR,
            Self::Daily => Duration::DAY,
        }
    }

    /// Histo endpoint serving this timeframe.
    pub const fn endpoint(self) -> &'static str {
        match self {
            Self::Minute => "histominute",
            Self::Hourly => "histohour",
            Self::Daily => "histoday",
        }
    }

    /// Sub-hour series may end in a bucket that is still accumulating.
    pub const fn is_sub_hour(self) -> bool {
        matches!(self, Self::Minute)
    }

    pub const fn table(self) -> BarTable {
        match self {
            Self::Minute => BarTable::Minute,
            Self::Hourly => BarTable::Hourly,
            Self::Daily => BarTable::Daily,
        }
    }
}

impl Display for Timeframe {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "1m" | "minute" => Ok(Self::Minute),
            "1h" | "hourly" => Ok(Self::Hourly),
            "1d" | "daily" => Ok(Self::Daily),
            other => Err(ValidationError::InvalidTimeframe {
                value: other.to_owned(),
            }),
        }
    }
}
