use serde::Serialize;

use crate::catalog::field_dictionary::FieldDictionary;
use crate::error::{AppError, Result};
use crate::types::{Combination, MarketSegment, ScopeKind, SectorCategory, Selector};

/// JSONP callback tokens the upstream associates with each scope.
const INSTRUMENT_CALLBACK: &str = "jquery112309245886249999282_1733396772298";
const SECTOR_CALLBACK: &str = "jQuery112309570655592067874_1733410054611";

/// Everything needed to query the upstream for one combination, minus the page number.
#[derive(Debug, Clone, Serialize)]
pub struct UpstreamQuery {
    pub combination: Combination,
    /// `cb`
    pub callback: &'static str,
    /// `fid`
    pub ranking_field: &'static str,
    /// `fs`
    pub filter: &'static str,
    /// `fields`
    pub fields: &'static str,
    #[serde(skip)]
    pub dictionary: &'static FieldDictionary,
}

/// Scope filter expression (`fs`) for a market segment.
fn market_filter(segment: MarketSegment) -> &'static str {
    match segment {
        MarketSegment::AllStocks => {
            "m:0+t:6+f:!2,m:0+t:13+f:!2,m:0+t:80+f:!2,m:1+t:2+f:!2,m:1+t:23+f:!2,m:0+t:7+f:!2,m:1+t:3+f:!2"
        }
        MarketSegment::ShSzAShares => "m:0+t:6+f:!2,m:0+t:13+f:!2,m:0+t:80+f:!2,m:1+t:2+f:!2,m:1+t:23+f:!2",
        MarketSegment::ShAShares => "m:1+t:2+f:!2,m:1+t:23+f:!2",
        MarketSegment::StarMarket => "m:1+t:23+f:!2",
        MarketSegment::SzAShares => "m:0+t:6+f:!2,m:0+t:13+f:!2,m:0+t:80+f:!2",
        MarketSegment::ChiNextMarket => "m:0+t:80+f:!2",
        MarketSegment::ShBShares => "m:1+t:3+f:!2",
        MarketSegment::SzBShares => "m:0+t:7+f:!2",
    }
}

fn sector_filter(category: SectorCategory) -> &'static str {
    match category {
        SectorCategory::Industry => "m:90+t:2",
        SectorCategory::Concept => "m:90+t:3",
        SectorCategory::Regional => "m:90+t:1",
    }
}

/// The full catalog: every market segment × instrument period, then every
/// sector category × sector period. Same order on every call.
pub fn enumerate() -> Vec<Combination> {
    let mut out = Vec::with_capacity(
        MarketSegment::ALL.len() * ScopeKind::Instrument.periods().len()
            + SectorCategory::ALL.len() * ScopeKind::Sector.periods().len(),
    );
    for segment in MarketSegment::ALL {
        for &period in ScopeKind::Instrument.periods() {
            out.push(Combination::instrument(segment, period));
        }
    }
    for category in SectorCategory::ALL {
        for &period in ScopeKind::Sector.periods() {
            out.push(Combination::sector(category, period));
        }
    }
    out
}

/// Check a triple against the fixed cross product without resolving it.
pub fn validate(c: &Combination) -> Result<()> {
    if c.selector.scope() != c.scope_kind {
        return Err(AppError::InvalidCombination(format!(
            "selector {} does not belong to scope {}",
            c.selector, c.scope_kind
        )));
    }
    if !c.scope_kind.periods().contains(&c.period) {
        return Err(AppError::InvalidCombination(format!(
            "period {} is not offered for scope {}",
            c.period, c.scope_kind
        )));
    }
    Ok(())
}

/// Upstream query parameters for a combination. Fails with `InvalidCombination`
/// for any triple outside the catalog, before anything touches the network.
pub fn resolve_parameters(c: &Combination) -> Result<UpstreamQuery> {
    validate(c)?;
    let dictionary = FieldDictionary::for_period(c.period);
    let (callback, filter) = match c.selector {
        Selector::Market(segment) => (INSTRUMENT_CALLBACK, market_filter(segment)),
        Selector::Sector(category) => (SECTOR_CALLBACK, sector_filter(category)),
    };
    Ok(UpstreamQuery {
        combination: *c,
        callback,
        ranking_field: dictionary.ranking_field,
        filter,
        fields: dictionary.requested_fields,
        dictionary,
    })
}
