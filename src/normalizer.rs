use chrono::{FixedOffset, Utc};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use crate::catalog::field_dictionary::{CODE_FIELD, NAME_FIELD, PRICE_FIELD};
use crate::catalog::{CanonicalField, FieldDictionary};
use crate::types::{Combination, FlowRecord, ScopeKind, TierFlow};

/// Capture timestamps are Beijing wall-clock time, matching the upstream's market clock.
const CAPTURE_UTC_OFFSET_SECS: i32 = 8 * 3600;

// ---------------------------------------------------------------------------
// RawRecord
// ---------------------------------------------------------------------------

/// Outcome of reading one numeric upstream field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue {
    Number(f64),
    /// Key absent or `null`.
    Missing,
    /// Present but not a number, e.g. the `"-"` placeholder for suspended instruments.
    NotNumeric,
}

impl FieldValue {
    pub fn or_zero(self) -> f64 {
        match self {
            FieldValue::Number(n) => n,
            FieldValue::Missing | FieldValue::NotNumeric => 0.0,
        }
    }

    pub fn is_number(self) -> bool {
        matches!(self, FieldValue::Number(_))
    }
}

/// One `diff` row as the upstream sent it, keyed by `fNNN` field codes.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    fields: Map<String, Value>,
}

impl RawRecord {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// String view of a field. Numbers are rendered, empty strings count as absent.
    pub fn text(&self, code: &str) -> Option<String> {
        match self.fields.get(code)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn number(&self, code: &str) -> FieldValue {
        match self.fields.get(code) {
            None | Some(Value::Null) => FieldValue::Missing,
            Some(Value::Number(n)) => n.as_f64().map_or(FieldValue::NotNumeric, FieldValue::Number),
            Some(Value::String(s)) => match s.trim().parse::<f64>() {
                Ok(n) if n.is_finite() => FieldValue::Number(n),
                _ => FieldValue::NotNumeric,
            },
            Some(_) => FieldValue::NotNumeric,
        }
    }
}

// ---------------------------------------------------------------------------
// Normalizer
// ---------------------------------------------------------------------------

#[derive(Debug, Error, PartialEq)]
pub enum NormalizeError {
    #[error("row has no usable {0} field")]
    MissingIdentity(&'static str),
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NormalizeStats {
    pub accepted: usize,
    pub skipped: usize,
    /// Numeric fields that were absent or unparseable and stored as zero.
    pub coerced: usize,
}

/// Applies one combination's field dictionary to raw rows.
pub struct Normalizer {
    combination: Combination,
    dictionary: &'static FieldDictionary,
    captured_at: String,
    stats: NormalizeStats,
}

impl Normalizer {
    pub fn new(combination: Combination, dictionary: &'static FieldDictionary, captured_at: String) -> Self {
        Self {
            combination,
            dictionary,
            captured_at,
            stats: NormalizeStats::default(),
        }
    }

    pub fn stats(&self) -> NormalizeStats {
        self.stats
    }

    /// Map one raw row to a `FlowRecord`.
    ///
    /// Only the identity fields (code and name) can reject a row. Numeric
    /// fields that are missing or unparseable become zero.
    pub fn normalize(&mut self, raw: &RawRecord, rank: u32) -> Result<FlowRecord, NormalizeError> {
        let code = raw.text(CODE_FIELD).ok_or(NormalizeError::MissingIdentity("code"))?;
        let name = raw.text(NAME_FIELD).ok_or(NormalizeError::MissingIdentity("name"))?;

        let latest_price = match self.combination.scope_kind {
            ScopeKind::Instrument => Some(self.read(raw, PRICE_FIELD)),
            ScopeKind::Sector => None,
        };

        Ok(FlowRecord {
            rank,
            code,
            name,
            scope_kind: self.combination.scope_kind,
            scope_selector: self.combination.selector.label().to_string(),
            period: self.combination.period,
            latest_price,
            change_percentage: self.field(raw, CanonicalField::ChangePercentage),
            main: self.tier(raw, CanonicalField::MainFlowNetAmount, CanonicalField::MainFlowNetPercentage),
            extra_large: self.tier(
                raw,
                CanonicalField::ExtraLargeOrderFlowNetAmount,
                CanonicalField::ExtraLargeOrderFlowNetPercentage,
            ),
            large: self.tier(raw, CanonicalField::LargeOrderFlowNetAmount, CanonicalField::LargeOrderFlowNetPercentage),
            medium: self.tier(raw, CanonicalField::MediumOrderFlowNetAmount, CanonicalField::MediumOrderFlowNetPercentage),
            small: self.tier(raw, CanonicalField::SmallOrderFlowNetAmount, CanonicalField::SmallOrderFlowNetPercentage),
            captured_at: self.captured_at.clone(),
        })
    }

    /// Normalize a whole ranking. Ranks are 1-based upstream positions, so a
    /// skipped row leaves a gap rather than renumbering the rest.
    pub fn normalize_all(&mut self, raws: &[RawRecord]) -> Vec<FlowRecord> {
        let mut out = Vec::with_capacity(raws.len());
        for (idx, raw) in raws.iter().enumerate() {
            match self.normalize(raw, idx as u32 + 1) {
                Ok(record) => {
                    self.stats.accepted += 1;
                    out.push(record);
                }
                Err(e) => {
                    self.stats.skipped += 1;
                    debug!(combination = %self.combination, rank = idx + 1, "Skipping row: {e}");
                }
            }
        }
        out
    }

    fn field(&mut self, raw: &RawRecord, field: CanonicalField) -> f64 {
        self.read(raw, self.dictionary.code(field))
    }

    fn tier(&mut self, raw: &RawRecord, amount: CanonicalField, percentage: CanonicalField) -> TierFlow {
        TierFlow {
            net_amount: self.field(raw, amount),
            net_percentage: self.field(raw, percentage),
        }
    }

    fn read(&mut self, raw: &RawRecord, code: &str) -> f64 {
        let value = raw.number(code);
        if !value.is_number() {
            self.stats.coerced += 1;
            debug!(combination = %self.combination, field = code, ?value, "Coerced field to zero");
        }
        value.or_zero()
    }
}

/// Current Beijing wall-clock time as `YYYY-MM-DD HH:MM:SS`.
pub fn capture_timestamp() -> String {
    let now = Utc::now();
    match FixedOffset::east_opt(CAPTURE_UTC_OFFSET_SECS) {
        Some(tz) => now.with_timezone(&tz).format("%Y-%m-%d %H:%M:%S").to_string(),
        None => now.format("%Y-%m-%d %H:%M:%S").to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::types::{MarketSegment, Period, SectorCategory};

    fn raw(v: Value) -> RawRecord {
        match v {
            Value::Object(m) => RawRecord::new(m),
            _ => panic!("test rows must be objects"),
        }
    }

    /// A row with a distinct value under every code the period's dictionary names.
    fn full_row(dict: &FieldDictionary) -> (RawRecord, Vec<(CanonicalField, f64)>) {
        let mut m = Map::new();
        m.insert(CODE_FIELD.into(), json!("600519"));
        m.insert(NAME_FIELD.into(), json!("Kweichow Moutai"));
        m.insert(PRICE_FIELD.into(), json!(1688.5));
        let mut expected = Vec::new();
        for (i, (field, code)) in dict.entries().enumerate() {
            let value = (i as f64 + 1.0) * 1.25;
            m.insert(code.into(), json!(value));
            expected.push((field, value));
        }
        (RawRecord::new(m), expected)
    }

    fn canonical_value(r: &FlowRecord, field: CanonicalField) -> f64 {
        match field {
            CanonicalField::ChangePercentage => r.change_percentage,
            CanonicalField::MainFlowNetAmount => r.main.net_amount,
            CanonicalField::MainFlowNetPercentage => r.main.net_percentage,
            CanonicalField::ExtraLargeOrderFlowNetAmount => r.extra_large.net_amount,
            CanonicalField::ExtraLargeOrderFlowNetPercentage => r.extra_large.net_percentage,
            CanonicalField::LargeOrderFlowNetAmount => r.large.net_amount,
            CanonicalField::LargeOrderFlowNetPercentage => r.large.net_percentage,
            CanonicalField::MediumOrderFlowNetAmount => r.medium.net_amount,
            CanonicalField::MediumOrderFlowNetPercentage => r.medium.net_percentage,
            CanonicalField::SmallOrderFlowNetAmount => r.small.net_amount,
            CanonicalField::SmallOrderFlowNetPercentage => r.small.net_percentage,
        }
    }

    #[test]
    fn every_dictionary_entry_lands_in_its_own_field() {
        for period in Period::ALL {
            let dict = FieldDictionary::for_period(period);
            let (row, expected) = full_row(dict);
            let combination = Combination::instrument(MarketSegment::AllStocks, period);
            let mut n = Normalizer::new(combination, dict, "2026-01-02 09:30:00".into());
            let record = n.normalize(&row, 1).unwrap();

            for (field, value) in expected {
                assert_eq!(canonical_value(&record, field), value, "{period} {field:?}");
            }
            assert_eq!(record.code, "600519");
            assert_eq!(record.name, "Kweichow Moutai");
            assert_eq!(record.latest_price, Some(1688.5));
            assert_eq!(record.period, period);
            assert_eq!(n.stats().coerced, 0);
        }
    }

    #[test]
    fn placeholders_and_gaps_become_zero() {
        let dict = FieldDictionary::for_period(Period::Today);
        let row = raw(json!({
            "f12": "000001", "f14": "Ping An Bank",
            "f2": "-", "f3": "1.5", "f62": null, "f184": "abc", "f66": 12345.0
        }));
        let mut n = Normalizer::new(Combination::instrument(MarketSegment::SzAShares, Period::Today), dict, String::new());
        let record = n.normalize(&row, 3).unwrap();

        assert_eq!(record.rank, 3);
        assert_eq!(record.latest_price, Some(0.0));
        assert_eq!(record.change_percentage, 1.5);
        assert_eq!(record.main, TierFlow::default());
        assert_eq!(record.extra_large.net_amount, 12345.0);
        // f2, f62, f184, and every absent tier code after f66
        assert_eq!(n.stats().coerced, 3 + 7);
    }

    #[test]
    fn sector_rows_have_no_price() {
        let dict = FieldDictionary::for_period(Period::FiveDay);
        let row = raw(json!({"f12": "BK0477", "f14": "Liquor", "f2": 1234.0, "f109": 2.0}));
        let combination = Combination::sector(SectorCategory::Industry, Period::FiveDay);
        let record = Normalizer::new(combination, dict, String::new()).normalize(&row, 1).unwrap();
        assert_eq!(record.latest_price, None);
        assert_eq!(record.change_percentage, 2.0);
        assert_eq!(record.scope_selector, "Industry_Flow");
    }

    #[test]
    fn numeric_codes_are_rendered_as_text() {
        let row = raw(json!({"f12": 600519, "f14": "x"}));
        assert_eq!(row.text("f12"), Some("600519".to_string()));
    }

    #[test]
    fn rows_without_identity_are_skipped_without_renumbering() {
        let dict = FieldDictionary::for_period(Period::Today);
        let rows = vec![
            raw(json!({"f12": "a", "f14": "A"})),
            raw(json!({"f14": "no code"})),
            raw(json!({"f12": "c", "f14": ""})),
            raw(json!({"f12": "d", "f14": "D"})),
        ];
        let mut n = Normalizer::new(Combination::instrument(MarketSegment::AllStocks, Period::Today), dict, String::new());
        let out = n.normalize_all(&rows);

        assert_eq!(out.iter().map(|r| r.rank).collect::<Vec<_>>(), vec![1, 4]);
        assert_eq!(n.stats().accepted, 2);
        assert_eq!(n.stats().skipped, 2);
        assert_eq!(
            n.normalize(&rows[1], 2),
            Err(NormalizeError::MissingIdentity("code"))
        );
    }

    #[test]
    fn capture_timestamp_has_fixed_shape() {
        let ts = capture_timestamp();
        assert_eq!(ts.len(), 19);
        assert!(chrono::NaiveDateTime::parse_from_str(&ts, "%Y-%m-%d %H:%M:%S").is_ok());
    }
}
