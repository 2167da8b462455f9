use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

use crate::CoreError;

/// Subscription tiers, cheapest first.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Plan {
    Starter,
    Pro,
    Agency,
}

impl Plan {
    /// Credits granted at the start of every billing period.
    pub fn monthly_credits(self) -> i64 {
        match self {
            Plan::Starter => 10,
            Plan::Pro => 30,
            Plan::Agency => 100,
        }
    }

    /// Position in the tier ladder; higher is more expensive.
    pub fn rank(self) -> u8 {
        match self {
            Plan::Starter => 0,
            Plan::Pro => 1,
            Plan::Agency => 2,
        }
    }

    pub fn is_upgrade_from(self, current: Plan) -> bool {
        self.rank() > current.rank()
    }

    pub fn parse(name: &str) -> Result<Plan, CoreError> {
        name.trim()
            .parse()
            .map_err(|_| CoreError::UnknownPlan(name.to_owned()))
    }

    pub fn all() -> impl Iterator<Item = Plan> {
        Plan::iter()
    }
}

/// Payment-provider price ids for each plan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanPrices {
    pub starter: Option<String>,
    pub pro: Option<String>,
    pub agency: Option<String>,
}

impl PlanPrices {
    pub fn price_for(&self, plan: Plan) -> Option<&str> {
        match plan {
            Plan::Starter => self.starter.as_deref(),
            Plan::Pro => self.pro.as_deref(),
            Plan::Agency => self.agency.as_deref(),
        }
    }

    pub fn plan_for_price(&self, price_id: &str) -> Option<Plan> {
        Plan::all().find(|plan| self.price_for(*plan) == Some(price_id))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!(Plan::parse("PRO").unwrap(), Plan::Pro);
        assert_eq!(Plan::parse(" agency ").unwrap(), Plan::Agency);
        assert_eq!(Plan::parse("enterprise"), Err(CoreError::UnknownPlan("enterprise".into())));
    }

    #[test]
    fn ranks_follow_price() {
        assert!(Plan::Pro.is_upgrade_from(Plan::Starter));
        assert!(!Plan::Starter.is_upgrade_from(Plan::Agency));
        assert!(Plan::Agency.monthly_credits() > Plan::Pro.monthly_credits());
    }

    #[test]
    fn price_lookup_both_ways() {
        let prices = PlanPrices {
            starter: Some("price_s".into()),
            pro: Some("price_p".into()),
            agency: None,
        };
        assert_eq!(prices.price_for(Plan::Pro), Some("price_p"));
        assert_eq!(prices.plan_for_price("price_s"), Some(Plan::Starter));
        assert_eq!(prices.plan_for_price("price_unknown"), None);
        assert_eq!(prices.price_for(Plan::Agency), None);
    }
}
