use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Datelike, Duration, NaiveTime, TimeZone, Utc};
use dishdash_common::Cents;
use serde::{Deserialize, Serialize};

use crate::db_types::{Delivery, DeliveryStatus};

/// A window of time over which courier earnings are summed. Windows always end "now" and start on a UTC calendar
/// boundary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EarningsPeriod {
    /// Since midnight
    #[default]
    Today,
    /// Since midnight on Monday of the current ISO week
    Week,
    /// Since midnight on the first day of the month
    Month,
}

impl EarningsPeriod {
    pub fn start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let today = now.date_naive();
        let day = match self {
            EarningsPeriod::Today => today,
            EarningsPeriod::Week => today - Duration::days(i64::from(today.weekday().num_days_from_monday())),
            EarningsPeriod::Month => today.with_day(1).unwrap_or(today),
        };
        Utc.from_utc_datetime(&day.and_time(NaiveTime::MIN))
    }
}

impl Display for EarningsPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EarningsPeriod::Today => f.write_str("today"),
            EarningsPeriod::Week => f.write_str("week"),
            EarningsPeriod::Month => f.write_str("month"),
        }
    }
}

impl FromStr for EarningsPeriod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "today" | "day" => Ok(EarningsPeriod::Today),
            "week" => Ok(EarningsPeriod::Week),
            "month" => Ok(EarningsPeriod::Month),
            _ => Err(format!("Unknown earnings period: {s}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EarningsSummary {
    pub courier_id: String,
    pub period: EarningsPeriod,
    pub since: DateTime<Utc>,
    pub deliveries: usize,
    pub total_fees: Cents,
    pub total_earnings: Cents,
    pub total_tips: Cents,
    /// Earnings plus tips
    pub total: Cents,
}

impl EarningsSummary {
    pub fn from_deliveries(courier_id: &str, period: EarningsPeriod, since: DateTime<Utc>, deliveries: &[Delivery]) -> Self {
        let total_fees: Cents = deliveries.iter().map(|d| d.delivery_fee).sum();
        let total_earnings: Cents = deliveries.iter().map(|d| d.courier_earnings).sum();
        let total_tips: Cents = deliveries.iter().map(|d| d.tip).sum();
        Self {
            courier_id: courier_id.to_string(),
            period,
            since,
            deliveries: deliveries.len(),
            total_fees,
            total_earnings,
            total_tips,
            total: total_earnings + total_tips,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignDeliveryRequest {
    pub order_id: i64,
    pub user_id: String,
    pub delivery_address: String,
    #[serde(default)]
    pub delivery_fee: Option<Cents>,
    #[serde(default)]
    pub delivery_person_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryStatusRequest {
    pub status: DeliveryStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateDeliveryRequest {
    pub rating: i64,
    #[serde(default)]
    pub feedback: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EarningsRequest {
    pub earnings: Cents,
    #[serde(default)]
    pub tip: Cents,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignCourierRequest {
    pub courier_id: String,
}
