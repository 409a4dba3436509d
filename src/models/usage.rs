use chrono::NaiveDate;
use serde::{de, Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;

/// Messages consumed by one account on one UTC calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyQuotaEntry {
    pub email: String,
    #[serde(deserialize_with = "day_or_legacy")]
    pub date: NaiveDate,
    pub count: u32,
}

// Older databases stored `Date.toDateString()` values ("Sun Oct 18 2026").
const LEGACY_DAY_FORMAT: &str = "%a %b %d %Y";

fn day_or_legacy<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    raw.parse::<NaiveDate>()
        .or_else(|_| NaiveDate::parse_from_str(raw.trim(), LEGACY_DAY_FORMAT))
        .map_err(|_| de::Error::custom(format!("unrecognised day {:?}", raw)))
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DailyCountResponse {
    pub count: u32,
    pub limit: u32,
    pub remaining: u32,
    pub premium: bool,
}
