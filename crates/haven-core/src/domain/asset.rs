use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Fixed set of assets the capsule can chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetId {
    Sp500,
    Nasdaq,
    Gold,
    Bitcoin,
}

impl AssetId {
    pub const ALL: [Self; 4] = [Self::Sp500, Self::Nasdaq, Self::Gold, Self::Bitcoin];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sp500 => "sp500",
            Self::Nasdaq => "nasdaq",
            Self::Gold => "gold",
            Self::Bitcoin => "bitcoin",
        }
    }

    /// Human label shown next to the series.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Sp500 => "S&P 500",
            Self::Nasdaq => "Nasdaq 100",
            Self::Gold => "Gold Spot",
            Self::Bitcoin => "Bitcoin",
        }
    }

    pub const fn color(self) -> &'static str {
        match self {
            Self::Sp500 => "#6366f1",
            Self::Nasdaq => "#10b981",
            Self::Gold => "#f59e0b",
            Self::Bitcoin => "#f43f5e",
        }
    }

    /// Descriptive search text used when the caller supplies no query of its own.
    pub const fn query(self) -> &'static str {
        match self {
            Self::Sp500 => "S&P 500 Index monthly closing level",
            Self::Nasdaq => "Nasdaq 100 Index monthly closing level",
            Self::Gold => "Gold spot price in USD per troy ounce, monthly close",
            Self::Bitcoin => "Bitcoin (BTC) price in USD, monthly close",
        }
    }

    /// Lowercase abbreviations a generated response may use instead of the identifier.
    pub const fn aliases(self) -> &'static [&'static str] {
        match self {
            Self::Sp500 => &["s&p", "spx", "sp_500", "sp 500", "gspc"],
            Self::Nasdaq => &["ndx", "nasdaq100", "nasdaq_100", "qqq", "nas100"],
            Self::Gold => &["xau", "gold_spot", "gc=f"],
            Self::Bitcoin => &["btc", "xbt"],
        }
    }
}

impl Display for AssetId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetId {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "sp500" | "spx" | "s&p500" => Ok(Self::Sp500),
            "nasdaq" | "ndx" | "nasdaq100" => Ok(Self::Nasdaq),
            "gold" | "xau" => Ok(Self::Gold),
            "bitcoin" | "btc" => Ok(Self::Bitcoin),
            other => Err(ValidationError::InvalidAsset {
                value: other.to_owned(),
            }),
        }
    }
}
