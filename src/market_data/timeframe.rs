// =============================================================================
// Candle timeframes supported by the screener
// =============================================================================

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Candlestick timeframe. Variants are declared shortest first, so the derived
/// ordering follows the bucket duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1m")]
    M1,
    #[serde(rename = "3m")]
    M3,
    #[serde(rename = "5m")]
    M5,
    #[serde(rename = "10m")]
    M10,
    #[serde(rename = "15m")]
    M15,
    #[serde(rename = "20m")]
    M20,
    #[serde(rename = "30m")]
    M30,
    #[serde(rename = "1h")]
    H1,
    #[serde(rename = "2h")]
    H2,
    #[serde(rename = "4h")]
    H4,
    #[serde(rename = "6h")]
    H6,
    #[serde(rename = "8h")]
    H8,
    #[serde(rename = "10h")]
    H10,
    #[serde(rename = "12h")]
    H12,
    #[serde(rename = "16h")]
    H16,
    #[serde(rename = "1d")]
    D1,
    #[serde(rename = "1w")]
    W1,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown timeframe '{0}'")]
pub struct UnknownTimeframe(pub String);

impl Timeframe {
    const ALL: [Timeframe; 17] = [
        Timeframe::M1,
        Timeframe::M3,
        Timeframe::M5,
        Timeframe::M10,
        Timeframe::M15,
        Timeframe::M20,
        Timeframe::M30,
        Timeframe::H1,
        Timeframe::H2,
        Timeframe::H4,
        Timeframe::H6,
        Timeframe::H8,
        Timeframe::H10,
        Timeframe::H12,
        Timeframe::H16,
        Timeframe::D1,
        Timeframe::W1,
    ];

    /// Every supported timeframe, shortest first.
    pub fn all() -> &'static [Timeframe] {
        &Self::ALL
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::M1 => "1m",
            Self::M3 => "3m",
            Self::M5 => "5m",
            Self::M10 => "10m",
            Self::M15 => "15m",
            Self::M20 => "20m",
            Self::M30 => "30m",
            Self::H1 => "1h",
            Self::H2 => "2h",
            Self::H4 => "4h",
            Self::H6 => "6h",
            Self::H8 => "8h",
            Self::H10 => "10h",
            Self::H12 => "12h",
            Self::H16 => "16h",
            Self::D1 => "1d",
            Self::W1 => "1w",
        }
    }

    /// Bucket length in minutes.
    pub fn minutes(&self) -> u32 {
        match self {
            Self::M1 => 1,
            Self::M3 => 3,
            Self::M5 => 5,
            Self::M10 => 10,
            Self::M15 => 15,
            Self::M20 => 20,
            Self::M30 => 30,
            Self::H1 => 60,
            Self::H2 => 120,
            Self::H4 => 240,
            Self::H6 => 360,
            Self::H8 => 480,
            Self::H10 => 600,
            Self::H12 => 720,
            Self::H16 => 960,
            Self::D1 => 1440,
            Self::W1 => 10_080,
        }
    }

    pub fn seconds(&self) -> i64 {
        i64::from(self.minutes()) * 60
    }

    /// Parse a comma-separated list such as `"1h, 4h,1d"`. Blank entries are
    /// ignored; any unknown label fails the whole list.
    pub fn parse_list(s: &str) -> Result<Vec<Timeframe>, UnknownTimeframe> {
        s.split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::parse)
            .collect()
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Timeframe {
    type Err = UnknownTimeframe;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|tf| tf.label() == s)
            .ok_or_else(|| UnknownTimeframe(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_round_trip_through_from_str() {
        for tf in Timeframe::all() {
            assert_eq!(tf.label().parse::<Timeframe>().unwrap(), *tf);
        }
    }

    #[test]
    fn ordering_follows_duration() {
        let minutes: Vec<u32> = Timeframe::all().iter().map(Timeframe::minutes).collect();
        let mut sorted = minutes.clone();
        sorted.sort_unstable();
        assert_eq!(minutes, sorted);
        assert!(Timeframe::M1 < Timeframe::W1);
    }

    #[test]
    fn unknown_label_is_rejected() {
        let err = "2w".parse::<Timeframe>().unwrap_err();
        assert_eq!(err, UnknownTimeframe("2w".into()));
        // Labels are case sensitive: "1M" is not "1m".
        assert!("1M".parse::<Timeframe>().is_err());
    }

    #[test]
    fn parse_list_trims_and_skips_blanks() {
        let tfs = Timeframe::parse_list(" 1h, 4h ,,1d").unwrap();
        assert_eq!(tfs, vec![Timeframe::H1, Timeframe::H4, Timeframe::D1]);
        assert!(Timeframe::parse_list("1h,bogus").is_err());
    }

    #[test]
    fn serde_uses_labels() {
        let json = serde_json::to_string(&vec![Timeframe::M15, Timeframe::D1]).unwrap();
        assert_eq!(json, r#"["15m","1d"]"#);
        let back: Vec<Timeframe> = serde_json::from_str(r#"["16h","1w"]"#).unwrap();
        assert_eq!(back, vec![Timeframe::H16, Timeframe::W1]);
    }
}
