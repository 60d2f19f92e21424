//! Per-period mapping from canonical output fields to upstream field codes.
//!
//! The upstream reuses the same concept under a different `fNNN` code for each
//! ranking window, so every window gets one row in [`DICTIONARIES`] instead of
//! its own mapping function. Adding a window means adding a row.

use crate::error::Result;
use crate::types::Period;

/// Instrument or sector code. Same code for every period.
pub const CODE_FIELD: &str = "f12";
/// Instrument or sector display name.
pub const NAME_FIELD: &str = "f14";
/// Latest traded price; only meaningful for instrument scope.
pub const PRICE_FIELD: &str = "f2";

/// Output fields whose upstream code depends on the period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CanonicalField {
    ChangePercentage,
    MainFlowNetAmount,
    MainFlowNetPercentage,
    ExtraLargeOrderFlowNetAmount,
    ExtraLargeOrderFlowNetPercentage,
    LargeOrderFlowNetAmount,
    LargeOrderFlowNetPercentage,
    MediumOrderFlowNetAmount,
    MediumOrderFlowNetPercentage,
    SmallOrderFlowNetAmount,
    SmallOrderFlowNetPercentage,
}

impl CanonicalField {
    #[cfg(test)]
    pub const ALL: [CanonicalField; 11] = [
        CanonicalField::ChangePercentage,
        CanonicalField::MainFlowNetAmount,
        CanonicalField::MainFlowNetPercentage,
        CanonicalField::ExtraLargeOrderFlowNetAmount,
        CanonicalField::ExtraLargeOrderFlowNetPercentage,
        CanonicalField::LargeOrderFlowNetAmount,
        CanonicalField::LargeOrderFlowNetPercentage,
        CanonicalField::MediumOrderFlowNetAmount,
        CanonicalField::MediumOrderFlowNetPercentage,
        CanonicalField::SmallOrderFlowNetAmount,
        CanonicalField::SmallOrderFlowNetPercentage,
    ];

    /// Column name in the combination tables.
    #[cfg(test)]
    pub fn column(self) -> &'static str {
        match self {
            CanonicalField::ChangePercentage => "change_percentage",
            CanonicalField::MainFlowNetAmount => "main_flow_net_amount",
            CanonicalField::MainFlowNetPercentage => "main_flow_net_percentage",
            CanonicalField::ExtraLargeOrderFlowNetAmount => "extra_large_order_flow_net_amount",
            CanonicalField::ExtraLargeOrderFlowNetPercentage => "extra_large_order_flow_net_percentage",
            CanonicalField::LargeOrderFlowNetAmount => "large_order_flow_net_amount",
            CanonicalField::LargeOrderFlowNetPercentage => "large_order_flow_net_percentage",
            CanonicalField::MediumOrderFlowNetAmount => "medium_order_flow_net_amount",
            CanonicalField::MediumOrderFlowNetPercentage => "medium_order_flow_net_percentage",
            CanonicalField::SmallOrderFlowNetAmount => "small_order_flow_net_amount",
            CanonicalField::SmallOrderFlowNetPercentage => "small_order_flow_net_percentage",
        }
    }
}

#[derive(Debug)]
pub struct FieldDictionary {
    pub period: Period,
    /// Upstream sort field (`fid`) for this window.
    pub ranking_field: &'static str,
    /// Comma-separated field list sent as `fields`.
    pub requested_fields: &'static str,
    /// Indexed by `CanonicalField as usize`.
    codes: [&'static str; 11],
}

impl FieldDictionary {
    /// Upstream code carrying `field` in this window.
    pub fn code(&self, field: CanonicalField) -> &'static str {
        self.codes[field as usize]
    }

    #[cfg(test)]
    pub fn entries(&self) -> impl Iterator<Item = (CanonicalField, &'static str)> + '_ {
        CanonicalField::ALL.into_iter().map(move |f| (f, self.code(f)))
    }

    pub fn for_period(period: Period) -> &'static FieldDictionary {
        match period {
            Period::Today => &DICTIONARIES[0],
            Period::ThreeDay => &DICTIONARIES[1],
            Period::FiveDay => &DICTIONARIES[2],
            Period::TenDay => &DICTIONARIES[3],
        }
    }

    /// Look up by period label (`today`, `3d`, ...). Fails with `UnknownPeriod`.
    pub fn lookup(period_label: &str) -> Result<&'static FieldDictionary> {
        let period = period_label.parse::<Period>()?;
        Ok(Self::for_period(period))
    }
}

pub static DICTIONARIES: [FieldDictionary; 4] = [
    FieldDictionary {
        period: Period::Today,
        ranking_field: "f62",
        requested_fields: "f12,f14,f2,f3,f62,f184,f66,f69,f72,f75,f78,f81,f84,f87,f204,f205,f124,f1,f13",
        codes: ["f3", "f62", "f184", "f66", "f69", "f72", "f75", "f78", "f81", "f84", "f87"],
    },
    FieldDictionary {
        period: Period::ThreeDay,
        ranking_field: "f267",
        requested_fields: "f12,f14,f2,f127,f267,f268,f269,f270,f271,f272,f273,f274,f275,f276,f257,f258,f124,f1,f13",
        codes: ["f127", "f267", "f268", "f269", "f270", "f271", "f272", "f273", "f274", "f275", "f276"],
    },
    FieldDictionary {
        period: Period::FiveDay,
        ranking_field: "f164",
        requested_fields: "f12,f14,f2,f109,f164,f165,f166,f167,f168,f169,f170,f171,f172,f173,f257,f258,f124,f1,f13",
        codes: ["f109", "f164", "f165", "f166", "f167", "f168", "f169", "f170", "f171", "f172", "f173"],
    },
    FieldDictionary {
        period: Period::TenDay,
        ranking_field: "f174",
        requested_fields: "f12,f14,f2,f160,f174,f175,f176,f177,f178,f179,f180,f181,f182,f183,f260,f261,f124,f1,f13",
        codes: ["f160", "f174", "f175", "f176", "f177", "f178", "f179", "f180", "f181", "f182", "f183"],
    },
];

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::error::AppError;

    #[test]
    fn every_period_has_a_dictionary_for_itself() {
        for period in Period::ALL {
            assert_eq!(FieldDictionary::for_period(period).period, period);
        }
    }

    #[test]
    fn every_canonical_field_is_requested_in_every_period() {
        for dict in &DICTIONARIES {
            let requested: HashSet<&str> = dict.requested_fields.split(',').collect();
            for shared in [CODE_FIELD, NAME_FIELD, PRICE_FIELD] {
                assert!(requested.contains(shared), "{} missing {shared}", dict.period);
            }
            for (field, code) in dict.entries() {
                assert!(requested.contains(code), "{} requests no {code} for {field:?}", dict.period);
            }
            assert!(requested.contains(dict.ranking_field));
        }
    }

    #[test]
    fn codes_are_unique_within_a_period() {
        for dict in &DICTIONARIES {
            let codes: HashSet<&str> = dict.entries().map(|(_, c)| c).collect();
            assert_eq!(codes.len(), CanonicalField::ALL.len(), "duplicate code in {}", dict.period);
        }
    }

    #[test]
    fn ranking_field_is_the_main_net_amount() {
        for dict in &DICTIONARIES {
            assert_eq!(dict.ranking_field, dict.code(CanonicalField::MainFlowNetAmount));
        }
    }

    #[test]
    fn today_matches_the_documented_layout() {
        let dict = FieldDictionary::for_period(Period::Today);
        assert_eq!(dict.code(CanonicalField::ChangePercentage), "f3");
        assert_eq!(dict.code(CanonicalField::MainFlowNetAmount), "f62");
        assert_eq!(dict.code(CanonicalField::MainFlowNetPercentage), "f184");
        assert_eq!(dict.code(CanonicalField::SmallOrderFlowNetPercentage), "f87");
    }

    #[test]
    fn lookup_rejects_unknown_labels() {
        assert_eq!(FieldDictionary::lookup("5d").unwrap().period, Period::FiveDay);
        assert!(matches!(FieldDictionary::lookup("1w"), Err(AppError::UnknownPeriod(_))));
    }
}
