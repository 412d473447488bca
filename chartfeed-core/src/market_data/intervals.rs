//! Canonical chart resolutions and per-exchange interval codes

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::datafeed::error::FeedError;

/// Canonical bar resolution in the charting front end's vocabulary.
///
/// The enumerated set is the union of what the two exchanges serve. Each
/// exchange code mapping is total over this enum; where an exchange has no
/// native interval the mapping applies a single documented fallback
/// (see [`Resolution::binance_interval`] and [`Resolution::okx_bar`]).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Resolution {
    Min1,
    Min3,
    Min5,
    Min15,
    Min30,
    Min60,
    Min120,
    Min240,
    Min360,
    Min480,
    Min720,
    Day1,
    Day2,
    Day3,
    Week1,
    Month1,
}

impl Resolution {
    /// Every canonical resolution, coarsest last.
    pub const ALL: [Resolution; 16] = [
        Resolution::Min1,
        Resolution::Min3,
        Resolution::Min5,
        Resolution::Min15,
        Resolution::Min30,
        Resolution::Min60,
        Resolution::Min120,
        Resolution::Min240,
        Resolution::Min360,
        Resolution::Min480,
        Resolution::Min720,
        Resolution::Day1,
        Resolution::Day2,
        Resolution::Day3,
        Resolution::Week1,
        Resolution::Month1,
    ];

    /// Nominal bar length in minutes (a month counted as 30 days).
    pub fn minutes(self) -> u32 {
        match self {
            Resolution::Min1 => 1,
            Resolution::Min3 => 3,
            Resolution::Min5 => 5,
            Resolution::Min15 => 15,
            Resolution::Min30 => 30,
            Resolution::Min60 => 60,
            Resolution::Min120 => 120,
            Resolution::Min240 => 240,
            Resolution::Min360 => 360,
            Resolution::Min480 => 480,
            Resolution::Min720 => 720,
            Resolution::Day1 => 1_440,
            Resolution::Day2 => 2_880,
            Resolution::Day3 => 4_320,
            Resolution::Week1 => 10_080,
            Resolution::Month1 => 43_200,
        }
    }

    /// Binance kline interval code.
    ///
    /// Binance has no 2-day kline; `Day2` falls back to `"1d"` so the
    /// requested window stays dense instead of skipping bars.
    pub fn binance_interval(self) -> &'static str {
        match self {
            Resolution::Min1 => "1m",
            Resolution::Min3 => "3m",
            Resolution::Min5 => "5m",
            Resolution::Min15 => "15m",
            Resolution::Min30 => "30m",
            Resolution::Min60 => "1h",
            Resolution::Min120 => "2h",
            Resolution::Min240 => "4h",
            Resolution::Min360 => "6h",
            Resolution::Min480 => "8h",
            Resolution::Min720 => "12h",
            Resolution::Day1 | Resolution::Day2 => "1d",
            Resolution::Day3 => "3d",
            Resolution::Week1 => "1w",
            Resolution::Month1 => "1M",
        }
    }

    /// OKX candlestick bar code.
    ///
    /// OKX has no 8-hour bar; `Min480` falls back to `"12H"`, the nearest
    /// coarser supported interval.
    pub fn okx_bar(self) -> &'static str {
        match self {
            Resolution::Min1 => "1m",
            Resolution::Min3 => "3m",
            Resolution::Min5 => "5m",
            Resolution::Min15 => "15m",
            Resolution::Min30 => "30m",
            Resolution::Min60 => "1H",
            Resolution::Min120 => "2H",
            Resolution::Min240 => "4H",
            Resolution::Min360 => "6H",
            Resolution::Min480 | Resolution::Min720 => "12H",
            Resolution::Day1 => "1D",
            Resolution::Day2 => "2D",
            Resolution::Day3 => "3D",
            Resolution::Week1 => "1W",
            Resolution::Month1 => "1M",
        }
    }

    /// OKX WebSocket channel name for this resolution, e.g. `candle1H`.
    pub fn okx_channel(self) -> String {
        format!("candle{}", self.okx_bar())
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Resolution::Min1 => "1",
            Resolution::Min3 => "3",
            Resolution::Min5 => "5",
            Resolution::Min15 => "15",
            Resolution::Min30 => "30",
            Resolution::Min60 => "60",
            Resolution::Min120 => "120",
            Resolution::Min240 => "240",
            Resolution::Min360 => "360",
            Resolution::Min480 => "480",
            Resolution::Min720 => "720",
            Resolution::Day1 => "1D",
            Resolution::Day2 => "2D",
            Resolution::Day3 => "3D",
            Resolution::Week1 => "1W",
            Resolution::Month1 => "1M",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for Resolution {
    type Err = FeedError;

    /// Parses the charting vocabulary, including the bare `D`/`W`/`M`
    /// aliases the host library uses for daily and coarser resolutions.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1" => Ok(Resolution::Min1),
            "3" => Ok(Resolution::Min3),
            "5" => Ok(Resolution::Min5),
            "15" => Ok(Resolution::Min15),
            "30" => Ok(Resolution::Min30),
            "60" => Ok(Resolution::Min60),
            "120" => Ok(Resolution::Min120),
            "240" => Ok(Resolution::Min240),
            "360" => Ok(Resolution::Min360),
            "480" => Ok(Resolution::Min480),
            "720" => Ok(Resolution::Min720),
            "D" | "1D" => Ok(Resolution::Day1),
            "2D" => Ok(Resolution::Day2),
            "3D" => Ok(Resolution::Day3),
            "W" | "1W" => Ok(Resolution::Week1),
            "M" | "1M" => Ok(Resolution::Month1),
            other => Err(FeedError::UnsupportedInterval(other.to_string())),
        }
    }
}

/// Inverse of [`Resolution::binance_interval`]. Ambiguity from the `Day2`
/// fallback resolves to `Day1`, the interval Binance actually serves.
pub fn resolution_from_binance_interval(interval: &str) -> Result<Resolution, FeedError> {
    match interval {
        "1m" => Ok(Resolution::Min1),
        "3m" => Ok(Resolution::Min3),
        "5m" => Ok(Resolution::Min5),
        "15m" => Ok(Resolution::Min15),
        "30m" => Ok(Resolution::Min30),
        "1h" => Ok(Resolution::Min60),
        "2h" => Ok(Resolution::Min120),
        "4h" => Ok(Resolution::Min240),
        "6h" => Ok(Resolution::Min360),
        "8h" => Ok(Resolution::Min480),
        "12h" => Ok(Resolution::Min720),
        "1d" => Ok(Resolution::Day1),
        "3d" => Ok(Resolution::Day3),
        "1w" => Ok(Resolution::Week1),
        "1M" => Ok(Resolution::Month1),
        other => Err(FeedError::UnsupportedInterval(other.to_string())),
    }
}

/// Inverse of [`Resolution::okx_bar`]. `12H` resolves to `Min720`.
pub fn resolution_from_okx_bar(bar: &str) -> Result<Resolution, FeedError> {
    match bar {
        "1m" => Ok(Resolution::Min1),
        "3m" => Ok(Resolution::Min3),
        "5m" => Ok(Resolution::Min5),
        "15m" => Ok(Resolution::Min15),
        "30m" => Ok(Resolution::Min30),
        "1H" => Ok(Resolution::Min60),
        "2H" => Ok(Resolution::Min120),
        "4H" => Ok(Resolution::Min240),
        "6H" => Ok(Resolution::Min360),
        "12H" => Ok(Resolution::Min720),
        "1D" => Ok(Resolution::Day1),
        "2D" => Ok(Resolution::Day2),
        "3D" => Ok(Resolution::Day3),
        "1W" => Ok(Resolution::Week1),
        "1M" => Ok(Resolution::Month1),
        other => Err(FeedError::UnsupportedInterval(other.to_string())),
    }
}

/// Resolutions advertised to the charting front end for Binance.
/// `Day2` is served through the documented fallback but not advertised.
pub const BINANCE_RESOLUTIONS: &[Resolution] = &[
    Resolution::Min1,
    Resolution::Min3,
    Resolution::Min5,
    Resolution::Min15,
    Resolution::Min30,
    Resolution::Min60,
    Resolution::Min120,
    Resolution::Min240,
    Resolution::Min360,
    Resolution::Min480,
    Resolution::Min720,
    Resolution::Day1,
    Resolution::Day3,
    Resolution::Week1,
    Resolution::Month1,
];

/// Resolutions advertised for OKX. `Min480` is served through the
/// documented fallback but not advertised.
pub const OKX_RESOLUTIONS: &[Resolution] = &[
    Resolution::Min1,
    Resolution::Min3,
    Resolution::Min5,
    Resolution::Min15,
    Resolution::Min30,
    Resolution::Min60,
    Resolution::Min120,
    Resolution::Min240,
    Resolution::Min360,
    Resolution::Min720,
    Resolution::Day1,
    Resolution::Day2,
    Resolution::Day3,
    Resolution::Week1,
    Resolution::Month1,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_round_trips_through_from_str() {
        for resolution in Resolution::ALL {
            let text = resolution.to_string();
            assert_eq!(text.parse::<Resolution>().unwrap(), resolution);
        }
    }

    #[test]
    fn bare_aliases_parse() {
        assert_eq!("D".parse::<Resolution>().unwrap(), Resolution::Day1);
        assert_eq!("W".parse::<Resolution>().unwrap(), Resolution::Week1);
        assert_eq!("M".parse::<Resolution>().unwrap(), Resolution::Month1);
    }

    #[test]
    fn unknown_resolution_is_an_error() {
        assert!(matches!(
            "45".parse::<Resolution>(),
            Err(FeedError::UnsupportedInterval(_))
        ));
    }

    #[test]
    fn every_resolution_maps_on_both_exchanges() {
        for resolution in Resolution::ALL {
            assert!(!resolution.binance_interval().is_empty());
            assert!(!resolution.okx_bar().is_empty());
        }
    }

    #[test]
    fn documented_fallbacks() {
        assert_eq!(Resolution::Day2.binance_interval(), "1d");
        assert_eq!(Resolution::Min480.okx_bar(), "12H");
    }

    #[test]
    fn exchange_codes_round_trip_where_native() {
        for resolution in Resolution::ALL {
            if resolution != Resolution::Day2 {
                let back = resolution_from_binance_interval(resolution.binance_interval()).unwrap();
                assert_eq!(back, resolution);
            }
            if resolution != Resolution::Min480 {
                let back = resolution_from_okx_bar(resolution.okx_bar()).unwrap();
                assert_eq!(back, resolution);
            }
        }
    }

    #[test]
    fn okx_channel_names() {
        assert_eq!(Resolution::Min1.okx_channel(), "candle1m");
        assert_eq!(Resolution::Min60.okx_channel(), "candle1H");
        assert_eq!(Resolution::Day1.okx_channel(), "candle1D");
    }
}
