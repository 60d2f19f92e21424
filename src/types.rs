use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

// ---------------------------------------------------------------------------
// Scope
// ---------------------------------------------------------------------------

/// Whether a combination ranks individual instruments or whole sectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeKind {
    Instrument,
    Sector,
}

impl ScopeKind {
    #[cfg(test)]
    pub const ALL: [ScopeKind; 2] = [ScopeKind::Instrument, ScopeKind::Sector];

    /// Label stored in the `scope_kind` column and used as the table prefix.
    pub fn label(self) -> &'static str {
        match self {
            ScopeKind::Instrument => "Stock_Flow",
            ScopeKind::Sector => "Sector_Flow",
        }
    }

    /// Ranking windows the upstream offers for this scope. Sectors have no 3-day ranking.
    pub fn periods(self) -> &'static [Period] {
        match self {
            ScopeKind::Instrument => &[Period::Today, Period::ThreeDay, Period::FiveDay, Period::TenDay],
            ScopeKind::Sector => &[Period::Today, Period::FiveDay, Period::TenDay],
        }
    }
}

impl std::fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Market segment filter for instrument-level combinations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketSegment {
    AllStocks,
    ShSzAShares,
    ShAShares,
    StarMarket,
    SzAShares,
    ChiNextMarket,
    ShBShares,
    SzBShares,
}

impl MarketSegment {
    pub const ALL: [MarketSegment; 8] = [
        MarketSegment::AllStocks,
        MarketSegment::ShSzAShares,
        MarketSegment::ShAShares,
        MarketSegment::StarMarket,
        MarketSegment::SzAShares,
        MarketSegment::ChiNextMarket,
        MarketSegment::ShBShares,
        MarketSegment::SzBShares,
    ];

    pub fn label(self) -> &'static str {
        match self {
            MarketSegment::AllStocks => "All_Stocks",
            MarketSegment::ShSzAShares => "SH&SZ_A_Shares",
            MarketSegment::ShAShares => "SH_A_Shares",
            MarketSegment::StarMarket => "STAR_Market",
            MarketSegment::SzAShares => "SZ_A_Shares",
            MarketSegment::ChiNextMarket => "ChiNext_Market",
            MarketSegment::ShBShares => "SH_B_Shares",
            MarketSegment::SzBShares => "SZ_B_Shares",
        }
    }

    /// Identifier-safe form used in table names.
    pub fn slug(self) -> &'static str {
        match self {
            MarketSegment::ShSzAShares => "SH_SZ_A_Shares",
            other => other.label(),
        }
    }
}

/// Sector board category for sector-level combinations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectorCategory {
    Industry,
    Concept,
    Regional,
}

impl SectorCategory {
    pub const ALL: [SectorCategory; 3] =
        [SectorCategory::Industry, SectorCategory::Concept, SectorCategory::Regional];

    pub fn label(self) -> &'static str {
        match self {
            SectorCategory::Industry => "Industry_Flow",
            SectorCategory::Concept => "Concept_Flow",
            SectorCategory::Regional => "Regional_Flow",
        }
    }
}

/// The second coordinate of a combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Selector {
    Market(MarketSegment),
    Sector(SectorCategory),
}

impl Selector {
    pub fn label(self) -> &'static str {
        match self {
            Selector::Market(m) => m.label(),
            Selector::Sector(s) => s.label(),
        }
    }

    pub fn slug(self) -> &'static str {
        match self {
            Selector::Market(m) => m.slug(),
            Selector::Sector(s) => s.label(),
        }
    }

    /// The scope this selector belongs to.
    pub fn scope(self) -> ScopeKind {
        match self {
            Selector::Market(_) => ScopeKind::Instrument,
            Selector::Sector(_) => ScopeKind::Sector,
        }
    }
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

// ---------------------------------------------------------------------------
// Period
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Period {
    #[serde(rename = "today")]
    Today,
    #[serde(rename = "3d")]
    ThreeDay,
    #[serde(rename = "5d")]
    FiveDay,
    #[serde(rename = "10d")]
    TenDay,
}

impl Period {
    #[cfg(test)]
    pub const ALL: [Period; 4] = [Period::Today, Period::ThreeDay, Period::FiveDay, Period::TenDay];

    /// Label stored in the `period` column.
    pub fn label(self) -> &'static str {
        match self {
            Period::Today => "today",
            Period::ThreeDay => "3d",
            Period::FiveDay => "5d",
            Period::TenDay => "10d",
        }
    }

    /// Table-name suffix.
    pub fn slug(self) -> &'static str {
        match self {
            Period::Today => "Today",
            Period::ThreeDay => "3_Day",
            Period::FiveDay => "5_Day",
            Period::TenDay => "10_Day",
        }
    }
}

impl std::str::FromStr for Period {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "today" => Ok(Period::Today),
            "3d" => Ok(Period::ThreeDay),
            "5d" => Ok(Period::FiveDay),
            "10d" => Ok(Period::TenDay),
            other => Err(AppError::UnknownPeriod(other.to_string())),
        }
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

// ---------------------------------------------------------------------------
// Combination
// ---------------------------------------------------------------------------

/// One unit of acquisition work.
///
/// Fields are public so callers can express any triple; validity against the
/// fixed catalog is checked by [`crate::catalog::resolve_parameters`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Combination {
    pub scope_kind: ScopeKind,
    pub selector: Selector,
    pub period: Period,
}

impl Combination {
    pub fn new(scope_kind: ScopeKind, selector: Selector, period: Period) -> Self {
        Self { scope_kind, selector, period }
    }

    pub fn instrument(segment: MarketSegment, period: Period) -> Self {
        Self::new(ScopeKind::Instrument, Selector::Market(segment), period)
    }

    pub fn sector(category: SectorCategory, period: Period) -> Self {
        Self::new(ScopeKind::Sector, Selector::Sector(category), period)
    }
}

impl std::fmt::Display for Combination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.scope_kind, self.selector, self.period)
    }
}

// ---------------------------------------------------------------------------
// Output rows
// ---------------------------------------------------------------------------

/// Net flow for one order-size tier.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TierFlow {
    pub net_amount: f64,
    pub net_percentage: f64,
}

/// One canonical output row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowRecord {
    /// 1-based position in the upstream ranking, counted across pages.
    pub rank: u32,
    pub code: String,
    pub name: String,
    pub scope_kind: ScopeKind,
    pub scope_selector: String,
    pub period: Period,
    /// `None` for sector scope: the price is not tracked there, which is not the same as zero.
    pub latest_price: Option<f64>,
    pub change_percentage: f64,
    pub main: TierFlow,
    pub extra_large: TierFlow,
    pub large: TierFlow,
    pub medium: TierFlow,
    pub small: TierFlow,
    /// Beijing wall-clock time, `YYYY-MM-DD HH:MM:SS`.
    pub captured_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn period_parses_reference_labels() {
        for period in Period::ALL {
            assert_eq!(period.label().parse::<Period>().unwrap(), period);
        }
        assert_eq!(" TODAY ".parse::<Period>().unwrap(), Period::Today);
    }

    #[test]
    fn unknown_period_is_rejected() {
        match "7d".parse::<Period>() {
            Err(AppError::UnknownPeriod(p)) => assert_eq!(p, "7d"),
            other => panic!("expected UnknownPeriod, got {other:?}"),
        }
    }

    #[test]
    fn selector_slugs_differ_from_labels_only_where_needed() {
        assert_eq!(MarketSegment::ShSzAShares.label(), "SH&SZ_A_Shares");
        assert_eq!(MarketSegment::ShSzAShares.slug(), "SH_SZ_A_Shares");
        assert_eq!(MarketSegment::StarMarket.slug(), MarketSegment::StarMarket.label());
    }

    #[test]
    fn combination_display_names_all_three_coordinates() {
        let c = Combination::sector(SectorCategory::Concept, Period::FiveDay);
        assert_eq!(c.to_string(), "Sector_Flow/Concept_Flow/5d");
    }
}
