//! Threshold rules turning cluster profiles into business recommendations

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::profile::ClusterProfile;

/// Average extras above which a segment is a premium-package opportunity
pub const HIGH_EXTRAS_THRESHOLD: f64 = 1.5;
/// Completion rate (%) below which a segment is flagged as a risk
pub const LOW_COMPLETION_THRESHOLD: f64 = 85.0;
/// Average lead time (days) below which a segment books last minute
pub const LAST_MINUTE_LEAD_DAYS: f64 = 30.0;
/// Average lead time (days) above which a segment plans early
pub const EARLY_PLANNER_LEAD_DAYS: f64 = 100.0;
/// Average party size above which a segment travels as families
pub const FAMILY_PASSENGERS_THRESHOLD: f64 = 2.0;

/// Kind of business recommendation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightCategory {
    RevenueOpportunity,
    MarketingStrategy,
    OperationalImprovement,
    RiskFactor,
}

impl fmt::Display for InsightCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::RevenueOpportunity => "revenue_opportunity",
            Self::MarketingStrategy => "marketing_strategy",
            Self::OperationalImprovement => "operational_improvement",
            Self::RiskFactor => "risk_factor",
        })
    }
}

/// One recommendation tied to a cluster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub cluster: usize,
    pub category: InsightCategory,
    pub message: String,
}

/// Insights grouped by category
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BusinessInsights {
    pub revenue_opportunities: Vec<String>,
    pub marketing_strategies: Vec<String>,
    pub operational_improvements: Vec<String>,
    pub risk_factors: Vec<String>,
}

impl BusinessInsights {
    /// Group messages by category, keeping their order
    pub fn from_insights(insights: &[Insight]) -> Self {
        let mut grouped = Self::default();
        for insight in insights {
            let bucket = match insight.category {
                InsightCategory::RevenueOpportunity => &mut grouped.revenue_opportunities,
                InsightCategory::MarketingStrategy => &mut grouped.marketing_strategies,
                InsightCategory::OperationalImprovement => &mut grouped.operational_improvements,
                InsightCategory::RiskFactor => &mut grouped.risk_factors,
            };
            bucket.push(insight.message.clone());
        }
        grouped
    }

    /// No category holds a message
    pub fn is_empty(&self) -> bool {
        self.revenue_opportunities.is_empty()
            && self.marketing_strategies.is_empty()
            && self.operational_improvements.is_empty()
            && self.risk_factors.is_empty()
    }
}

/// Default display name of a cluster
pub fn segment_name(cluster: usize) -> String {
    format!("Segment {cluster}")
}

/// Apply every rule to one profile; zero, one or several insights may result
pub fn insights_for_cluster(cluster: usize, profile: &ClusterProfile, name: &str) -> Vec<Insight> {
    let mut insights = Vec::new();
    let mut push = |category, message: String| {
        insights.push(Insight {
            cluster,
            category,
            message,
        })
    };

    if profile.avg_extras > HIGH_EXTRAS_THRESHOLD {
        push(
            InsightCategory::RevenueOpportunity,
            format!(
                "{name}: High extras adoption ({:.1} avg) - Focus on premium service packages",
                profile.avg_extras
            ),
        );
    }

    if profile.completion_rate < LOW_COMPLETION_THRESHOLD {
        push(
            InsightCategory::RiskFactor,
            format!(
                "{name}: Low completion rate ({:.1}%) - Implement retention strategies",
                profile.completion_rate
            ),
        );
    }

    // leads between the two thresholds get no marketing insight
    if profile.avg_lead_time < LAST_MINUTE_LEAD_DAYS {
        push(
            InsightCategory::MarketingStrategy,
            format!(
                "{name}: Last-minute bookers ({:.0} days) - Target with urgent deals and limited-time offers",
                profile.avg_lead_time
            ),
        );
    } else if profile.avg_lead_time > EARLY_PLANNER_LEAD_DAYS {
        push(
            InsightCategory::MarketingStrategy,
            format!(
                "{name}: Early planners ({:.0} days) - Offer early bird discounts and flexible booking options",
                profile.avg_lead_time
            ),
        );
    }

    if profile.avg_passengers > FAMILY_PASSENGERS_THRESHOLD {
        push(
            InsightCategory::OperationalImprovement,
            format!(
                "{name}: Family travelers ({:.1} avg passengers) - Optimize family check-in processes and group services",
                profile.avg_passengers
            ),
        );
    }

    insights
}

/// Insights for every populated cluster in ascending id order
///
/// `names` overrides the default `Segment {id}` label per cluster. Clusters
/// without members describe no customers and yield nothing.
pub fn generate_insights(
    profiles: &BTreeMap<usize, ClusterProfile>,
    names: Option<&BTreeMap<usize, String>>,
) -> Vec<Insight> {
    profiles
        .iter()
        .filter(|(_, profile)| profile.size > 0)
        .flat_map(|(&cluster, profile)| {
            let name = names
                .and_then(|n| n.get(&cluster).cloned())
                .unwrap_or_else(|| segment_name(cluster));
            insights_for_cluster(cluster, profile, &name)
        })
        .collect()
}
