use std::collections::BTreeMap;

use crate::models::catalog::{AggregatedInsight, SalaryInsight};

#[derive(Default)]
struct YearTotals {
    min: f64,
    avg: f64,
    max: f64,
    n: u32,
}

/// Averages min/avg/max salary per experience year across several careers.
/// Output is sorted by ascending year.
pub fn aggregate_by_year<'a>(
    insights: impl IntoIterator<Item = &'a SalaryInsight>,
) -> Vec<AggregatedInsight> {
    let mut by_year: BTreeMap<i32, YearTotals> = BTreeMap::new();
    for insight in insights {
        let totals = by_year.entry(insight.year).or_default();
        totals.min += insight.min_salary;
        totals.avg += insight.avg_salary;
        totals.max += insight.max_salary;
        totals.n += 1;
    }

    by_year
        .into_iter()
        .map(|(year, t)| {
            let n = f64::from(t.n);
            AggregatedInsight {
                year,
                min_salary: t.min / n,
                avg_salary: t.avg / n,
                max_salary: t.max / n,
            }
        })
        .collect()
}
