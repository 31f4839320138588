//! Budget planning: request validation and the post-filter applied to the
//! model's proposal before it reaches the client.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::errors::AppError;

/// Share of the total a `Both` plan reserves for college fees.
pub const COLLEGE_SHARE: f64 = 0.7;
/// Share of the total a `Both` plan reserves for a year of PG rent.
pub const PG_SHARE: f64 = 0.3;
const MONTHS_PER_YEAR: f64 = 12.0;
const MAX_PACKAGES: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BudgetType {
    College,
    #[serde(rename = "PG")]
    Pg,
    Both,
}

impl BudgetType {
    pub fn as_str(self) -> &'static str {
        match self {
            BudgetType::College => "College",
            BudgetType::Pg => "PG",
            BudgetType::Both => "Both",
        }
    }

    pub fn includes_colleges(self) -> bool {
        matches!(self, BudgetType::College | BudgetType::Both)
    }

    pub fn includes_pgs(self) -> bool {
        matches!(self, BudgetType::Pg | BudgetType::Both)
    }

    fn college_allocation(self, total: f64) -> f64 {
        match self {
            BudgetType::Both => total * COLLEGE_SHARE,
            _ => total,
        }
    }

    fn pg_allocation(self, total: f64) -> f64 {
        match self {
            BudgetType::Both => total * PG_SHARE,
            _ => total,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetRequest {
    pub budget_type: BudgetType,
    pub total_budget: f64,
    pub city: Option<String>,
    pub state: Option<String>,
}

impl BudgetRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        if !(self.total_budget.is_finite() && self.total_budget > 0.0) {
            return Err(AppError::Validation(
                "totalBudget must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// `"City, State"`, whichever half is present, or `"India"`.
    pub fn location(&self) -> String {
        let city = self.city.as_deref().map(str::trim).filter(|s| !s.is_empty());
        let state = self.state.as_deref().map(str::trim).filter(|s| !s.is_empty());
        match (city, state) {
            (Some(city), Some(state)) => format!("{city}, {state}"),
            (Some(one), None) | (None, Some(one)) => one.to_string(),
            (None, None) => "India".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollegeOption {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub fees: Option<f64>,
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PgOption {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub monthly_rent: Option<f64>,
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

impl PgOption {
    fn annual_cost(&self) -> f64 {
        self.monthly_rent.unwrap_or(0.0) * MONTHS_PER_YEAR
    }
}

/// A college + PG combination.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Package {
    #[serde(default)]
    pub college: Option<Map<String, Value>>,
    #[serde(default)]
    pub pg: Option<Map<String, Value>>,
    #[serde(default)]
    pub total_cost: Option<f64>,
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

impl Package {
    fn computed_cost(&self) -> f64 {
        let number = |side: &Option<Map<String, Value>>, field: &str| {
            side.as_ref()
                .and_then(|m| m.get(field))
                .and_then(Value::as_f64)
                .unwrap_or(0.0)
        };
        number(&self.college, "fees") + number(&self.pg, "monthlyRent") * MONTHS_PER_YEAR
    }
}

/// What the model proposed. Sections that are missing or not arrays read as
/// empty; entries that are not objects are skipped.
#[derive(Debug, Default, Deserialize)]
pub struct BudgetProposal {
    #[serde(default, deserialize_with = "lenient_list")]
    pub colleges: Vec<CollegeOption>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub pgs: Vec<PgOption>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub recommendations: Vec<Package>,
}

fn lenient_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: serde::de::DeserializeOwned,
{
    let items = match Value::deserialize(deserializer)? {
        Value::Array(items) => items,
        _ => return Ok(Vec::new()),
    };
    Ok(items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetPlan {
    pub budget_type: BudgetType,
    pub total_budget: f64,
    pub colleges: Vec<CollegeOption>,
    pub pgs: Vec<PgOption>,
    pub recommendations: Vec<Package>,
}

/// Keeps only what fits the budget.
///
/// Colleges need a positive fee within the college allocation. PGs need a
/// year of rent within the PG allocation. Packages are only kept for `Both`:
/// their total is recomputed from fees plus a year of rent, must fit the
/// whole budget, and at most the cheapest twenty are returned. Entries
/// without an id get a positional one.
pub fn settle_budget(req: &BudgetRequest, proposal: BudgetProposal) -> BudgetPlan {
    let total = req.total_budget;
    let kind = req.budget_type;

    let colleges = if kind.includes_colleges() {
        let cap = kind.college_allocation(total);
        proposal
            .colleges
            .into_iter()
            .enumerate()
            .map(|(i, mut college)| {
                fill_id(&mut college.id, "college", i);
                college
            })
            .filter(|c| c.fees.is_some_and(|fees| fees > 0.0 && fees <= cap))
            .collect()
    } else {
        Vec::new()
    };

    let pgs = if kind.includes_pgs() {
        let cap = kind.pg_allocation(total);
        proposal
            .pgs
            .into_iter()
            .enumerate()
            .map(|(i, mut pg)| {
                fill_id(&mut pg.id, "pg", i);
                pg
            })
            .filter(|pg| pg.annual_cost() <= cap)
            .collect()
    } else {
        Vec::new()
    };

    let recommendations = if kind == BudgetType::Both {
        let mut packages: Vec<Package> = proposal
            .recommendations
            .into_iter()
            .filter_map(|mut package| {
                let cost = package.computed_cost();
                (cost <= total).then(|| {
                    package.total_cost = Some(cost);
                    package
                })
            })
            .collect();
        packages.sort_by(|a, b| {
            a.total_cost
                .unwrap_or(0.0)
                .total_cmp(&b.total_cost.unwrap_or(0.0))
        });
        packages.truncate(MAX_PACKAGES);
        packages
    } else {
        Vec::new()
    };

    BudgetPlan {
        budget_type: kind,
        total_budget: total,
        colleges,
        pgs,
        recommendations,
    }
}

fn fill_id(id: &mut Option<String>, prefix: &str, index: usize) {
    if id.as_deref().map_or(true, |s| s.trim().is_empty()) {
        *id = Some(format!("{prefix}-{index}"));
    }
}
