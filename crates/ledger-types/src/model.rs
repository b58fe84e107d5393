//! Ledger data model.
//!
//! Wire names follow the camelCase JSON used by ledger exports; snake_case
//! spellings are accepted as aliases on input.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::amount::Amount;

/// Identity of a ledger: the registry NFT it is attached to.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerKey {
    #[serde(default, alias = "nft_id")]
    pub nft_id: String,
    #[serde(default, alias = "asset_class_id")]
    pub asset_class_id: String,
}

impl LedgerKey {
    pub fn new(asset_class_id: impl Into<String>, nft_id: impl Into<String>) -> Self {
        Self {
            nft_id: nft_id.into(),
            asset_class_id: asset_class_id.into(),
        }
    }

    /// Store encoding: `asset_class_id \0 nft_id`. Neither part may contain a null byte.
    pub fn storage_string(&self) -> String {
        format!("{}\0{}", self.asset_class_id, self.nft_id)
    }

    pub fn from_storage_string(s: &str) -> Option<Self> {
        let (asset_class_id, nft_id) = s.split_once('\0')?;
        if nft_id.contains('\0') {
            return None;
        }
        Some(Self::new(asset_class_id, nft_id))
    }
}

impl fmt::Display for LedgerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.asset_class_id, self.nft_id)
    }
}

macro_rules! ledger_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $prefix:literal {
            $($variant:ident = $value:literal => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
        pub enum $name {
            #[default]
            Unspecified,
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$name::Unspecified, $($name::$variant),+];

            pub fn value(self) -> i32 {
                match self {
                    $name::Unspecified => 0,
                    $($name::$variant => $value),+
                }
            }

            pub fn as_str(self) -> &'static str {
                match self {
                    $name::Unspecified => concat!($prefix, "_UNSPECIFIED"),
                    $($name::$variant => concat!($prefix, "_", $text)),+
                }
            }

            pub fn from_value(value: i64) -> Option<Self> {
                Self::ALL.iter().copied().find(|v| v.value() as i64 == value)
            }

            /// Accepts the full wire name or the name without its prefix.
            pub fn from_name(name: &str) -> Option<Self> {
                let short = name.strip_prefix(concat!($prefix, "_")).unwrap_or(name);
                Self::ALL.iter().copied().find(|v| {
                    v.as_str()
                        .strip_prefix(concat!($prefix, "_"))
                        .is_some_and(|s| s.eq_ignore_ascii_case(short))
                })
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                struct EnumVisitor;

                impl<'de> Visitor<'de> for EnumVisitor {
                    type Value = $name;

                    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                        write!(f, "a {} name or number", stringify!($name))
                    }

                    fn visit_str<E: de::Error>(self, v: &str) -> Result<$name, E> {
                        $name::from_name(v).ok_or_else(|| {
                            E::custom(format!("unknown {} {:?}", stringify!($name), v))
                        })
                    }

                    fn visit_i64<E: de::Error>(self, v: i64) -> Result<$name, E> {
                        $name::from_value(v).ok_or_else(|| {
                            E::custom(format!("unknown {} value {}", stringify!($name), v))
                        })
                    }

                    fn visit_u64<E: de::Error>(self, v: u64) -> Result<$name, E> {
                        let v = i64::try_from(v).map_err(|_| {
                            E::custom(format!("{} value {} out of range", stringify!($name), v))
                        })?;
                        self.visit_i64(v)
                    }
                }

                deserializer.deserialize_any(EnumVisitor)
            }
        }
    };
}

ledger_enum! {
    /// Day count convention used for interest accrual.
    DayCountConvention, "DAY_COUNT_CONVENTION" {
        Actual365 = 1 => "ACTUAL_365",
        Actual360 = 2 => "ACTUAL_360",
        Thirty360 = 3 => "THIRTY_360",
        ActualActual = 4 => "ACTUAL_ACTUAL",
        Days365 = 5 => "DAYS_365",
        Days360 = 6 => "DAYS_360",
    }
}

ledger_enum! {
    InterestAccrualMethod, "INTEREST_ACCRUAL_METHOD" {
        SimpleInterest = 1 => "SIMPLE_INTEREST",
        CompoundInterest = 2 => "COMPOUND_INTEREST",
        DailyCompounding = 3 => "DAILY_COMPOUNDING",
        MonthlyCompounding = 4 => "MONTHLY_COMPOUNDING",
        QuarterlyCompounding = 5 => "QUARTERLY_COMPOUNDING",
        AnnualCompounding = 6 => "ANNUAL_COMPOUNDING",
        ContinuousCompounding = 7 => "CONTINUOUS_COMPOUNDING",
    }
}

ledger_enum! {
    PaymentFrequency, "PAYMENT_FREQUENCY" {
        Daily = 1 => "DAILY",
        Weekly = 2 => "WEEKLY",
        Monthly = 3 => "MONTHLY",
        Quarterly = 4 => "QUARTERLY",
        Annually = 5 => "ANNUALLY",
    }
}

/// Ledger configuration and payment/interest schedule.
///
/// `key` may be omitted inside an import record, where the record's
/// `ledgerKey` supplies it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Ledger {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<LedgerKey>,
    #[serde(alias = "ledger_class_id")]
    pub ledger_class_id: String,
    #[serde(alias = "status_type_id")]
    pub status_type_id: i32,
    #[serde(alias = "next_pmt_date")]
    pub next_pmt_date: i32,
    #[serde(alias = "next_pmt_amt")]
    pub next_pmt_amt: Amount,
    /// Basis points scaled by 10^4 (100_000_000 == 100%).
    #[serde(alias = "interest_rate")]
    pub interest_rate: i32,
    #[serde(alias = "maturity_date")]
    pub maturity_date: i32,
    #[serde(alias = "interest_day_count_convention")]
    pub interest_day_count_convention: DayCountConvention,
    #[serde(alias = "interest_accrual_method")]
    pub interest_accrual_method: InterestAccrualMethod,
    #[serde(alias = "payment_frequency")]
    pub payment_frequency: PaymentFrequency,
}

/// Amount applied to one bucket by an entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerBucketAmount {
    #[serde(default, alias = "bucket_type_id")]
    pub bucket_type_id: i32,
    #[serde(default, alias = "applied_amt")]
    pub applied_amt: Amount,
}

/// Resulting balance of one bucket after an entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketBalance {
    #[serde(default, alias = "bucket_type_id")]
    pub bucket_type_id: i32,
    #[serde(default, alias = "balance_amt")]
    pub balance_amt: Amount,
}

impl BucketBalance {
    pub fn new(bucket_type_id: i32, balance_amt: impl Into<Amount>) -> Self {
        Self {
            bucket_type_id,
            balance_amt: balance_amt.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LedgerEntry {
    #[serde(alias = "correlation_id")]
    pub correlation_id: String,
    #[serde(alias = "reverses_correlation_id", skip_serializing_if = "String::is_empty")]
    pub reverses_correlation_id: String,
    #[serde(alias = "is_void", skip_serializing_if = "std::ops::Not::not")]
    pub is_void: bool,
    pub sequence: u32,
    #[serde(alias = "entry_type_id")]
    pub entry_type_id: i32,
    #[serde(alias = "posted_date")]
    pub posted_date: i32,
    #[serde(alias = "effective_date")]
    pub effective_date: i32,
    #[serde(alias = "total_amt")]
    pub total_amt: Amount,
    #[serde(alias = "applied_amounts")]
    pub applied_amounts: Vec<LedgerBucketAmount>,
    #[serde(alias = "balance_amounts")]
    pub balance_amounts: Vec<BucketBalance>,
}

impl LedgerEntry {
    /// Chronological order: effective date, then sequence.
    pub fn chronological_cmp(&self, other: &LedgerEntry) -> std::cmp::Ordering {
        (self.effective_date, self.sequence).cmp(&(other.effective_date, other.sequence))
    }
}

/// A ledger class groups ledgers of one asset class and owns their type tables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LedgerClass {
    #[serde(alias = "ledger_class_id")]
    pub ledger_class_id: String,
    #[serde(alias = "asset_class_id")]
    pub asset_class_id: String,
    pub denom: String,
    #[serde(alias = "maintainer_address")]
    pub maintainer_address: String,
}

/// Entry, status and bucket types share one shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerClassType {
    pub id: i32,
    pub code: String,
    pub description: String,
}

impl LedgerClassType {
    pub fn new(id: i32, code: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id,
            code: code.into(),
            description: description.into(),
        }
    }
}

pub type LedgerClassEntryType = LedgerClassType;
pub type LedgerClassStatusType = LedgerClassType;
pub type LedgerClassBucketType = LedgerClassType;
