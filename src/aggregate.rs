use std::collections::{BTreeMap, HashMap};
use std::fmt;

use time::Date;

use crate::columns::SaleRecord;

/// A calendar month, the grain every table in the pipeline is keyed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    pub year: i32,
    pub month: u8,
}

impl From<Date> for YearMonth {
    fn from(date: Date) -> Self {
        Self {
            year: date.year(),
            month: u8::from(date.month()),
        }
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Totals for one (month, category) key.
#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyTotal {
    pub month: YearMonth,
    pub category: String,
    pub total_amount: f64,
    pub total_quantity: f64,
    pub orders: u64,
}

/// Groups canonical rows by (month, category) and sums amounts and
/// quantities. Output is ordered by month, then category.
pub fn aggregate(records: &[SaleRecord]) -> Vec<MonthlyTotal> {
    let mut totals: BTreeMap<(YearMonth, String), (f64, f64, u64)> = BTreeMap::new();
    for r in records {
        let key = (YearMonth::from(r.date), r.category.clone());
        let entry = totals.entry(key).or_insert((0.0, 0.0, 0));
        entry.0 += r.amount;
        entry.1 += r.quantity;
        entry.2 += 1;
    }
    totals
        .into_iter()
        .map(|((month, category), (total_amount, total_quantity, orders))| MonthlyTotal {
            month,
            category,
            total_amount,
            total_quantity,
            orders,
        })
        .collect()
}

/// Month × category matrix of summed amounts.
///
/// Months ascend. Categories are ordered by whole-range total, descending,
/// with alphabetical tie-break; the same order drives the change matrix,
/// the chart legend and the report.
#[derive(Debug, Clone, PartialEq)]
pub struct Pivot {
    pub months: Vec<YearMonth>,
    pub categories: Vec<String>,
    /// `cells[month_idx][category_idx]`, 0.0 where the key is absent.
    pub cells: Vec<Vec<f64>>,
}

impl Pivot {
    pub fn build(totals: &[MonthlyTotal]) -> Self {
        let mut months: Vec<YearMonth> = totals.iter().map(|t| t.month).collect();
        months.sort_unstable();
        months.dedup();

        let mut by_category: BTreeMap<&str, f64> = BTreeMap::new();
        for t in totals {
            *by_category.entry(t.category.as_str()).or_insert(0.0) += t.total_amount;
        }
        let mut categories: Vec<(String, f64)> = by_category
            .into_iter()
            .map(|(c, v)| (c.to_string(), v))
            .collect();
        categories.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        let categories: Vec<String> = categories.into_iter().map(|(c, _)| c).collect();

        let month_pos: HashMap<YearMonth, usize> = months
            .iter()
            .enumerate()
            .map(|(i, m)| (*m, i))
            .collect();
        let category_pos: HashMap<&str, usize> = categories
            .iter()
            .enumerate()
            .map(|(i, c)| (c.as_str(), i))
            .collect();

        let mut cells = vec![vec![0.0; categories.len()]; months.len()];
        for t in totals {
            if let (Some(&mi), Some(&ci)) = (
                month_pos.get(&t.month),
                category_pos.get(t.category.as_str()),
            ) {
                cells[mi][ci] = t.total_amount;
            }
        }

        Self {
            months,
            categories,
            cells,
        }
    }

    pub fn value(&self, month_idx: usize, category_idx: usize) -> f64 {
        self.cells[month_idx][category_idx]
    }

    /// Whole-range total per category, in column order.
    pub fn category_totals(&self) -> Vec<f64> {
        (0..self.categories.len())
            .map(|ci| self.cells.iter().map(|row| row[ci]).sum())
            .collect()
    }

    /// The first `n` category columns. Columns are already ranked by total,
    /// so this is the top-N selection.
    pub fn top_categories(&self, n: usize) -> &[String] {
        &self.categories[..self.categories.len().min(n)]
    }

    /// Month-over-month percentage change per category column.
    ///
    /// The first month is undefined, as is any cell whose previous-month
    /// value is zero; both render as empty.
    pub fn pct_change(&self) -> ChangeMatrix {
        let mut cells = vec![vec![None; self.categories.len()]; self.months.len()];
        for mi in 1..self.months.len() {
            for ci in 0..self.categories.len() {
                let prev = self.cells[mi - 1][ci];
                if prev != 0.0 {
                    cells[mi][ci] = Some((self.cells[mi][ci] - prev) / prev);
                }
            }
        }
        ChangeMatrix {
            months: self.months.clone(),
            categories: self.categories.clone(),
            cells,
        }
    }
}

/// Month-over-month relative change, same shape as the pivot.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeMatrix {
    pub months: Vec<YearMonth>,
    pub categories: Vec<String>,
    pub cells: Vec<Vec<Option<f64>>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    fn record(date: Date, category: &str, amount: f64) -> SaleRecord {
        SaleRecord {
            date,
            category: category.to_string(),
            amount,
            quantity: 1.0,
        }
    }

    #[test]
    fn aggregate_sums_by_month_and_category() {
        let records = vec![
            record(date!(2025 - 10 - 01), "Electronics", 60.0),
            record(date!(2025 - 10 - 20), "Electronics", 40.0),
            record(date!(2025 - 10 - 05), "Toys", 10.0),
            record(date!(2025 - 11 - 01), "Electronics", 150.0),
        ];
        let totals = aggregate(&records);
        assert_eq!(totals.len(), 3);
        assert_eq!(totals[0].month.to_string(), "2025-10");
        assert_eq!(totals[0].category, "Electronics");
        assert_eq!(totals[0].total_amount, 100.0);
        assert_eq!(totals[0].orders, 2);
        assert_eq!(totals[1].category, "Toys");
        assert_eq!(totals[2].month.to_string(), "2025-11");
    }

    #[test]
    fn pivot_matches_single_category_scenario() {
        let records = vec![
            record(date!(2025 - 10 - 01), "Electronics", 100.0),
            record(date!(2025 - 11 - 01), "Electronics", 150.0),
        ];
        let pivot = Pivot::build(&aggregate(&records));
        assert_eq!(
            pivot.months,
            vec![
                YearMonth {
                    year: 2025,
                    month: 10
                },
                YearMonth {
                    year: 2025,
                    month: 11
                }
            ]
        );
        assert_eq!(pivot.cells, vec![vec![100.0], vec![150.0]]);

        let change = pivot.pct_change();
        assert_eq!(change.cells[0][0], None);
        assert_eq!(change.cells[1][0], Some(0.5));
    }

    #[test]
    fn pivot_fills_missing_combinations_with_zero() {
        let records = vec![
            record(date!(2025 - 10 - 01), "A", 5.0),
            record(date!(2025 - 11 - 01), "B", 7.0),
        ];
        let pivot = Pivot::build(&aggregate(&records));
        assert_eq!(pivot.value(0, pivot.categories.iter().position(|c| c == "A").unwrap()), 5.0);
        assert_eq!(pivot.value(1, pivot.categories.iter().position(|c| c == "A").unwrap()), 0.0);
        assert_eq!(pivot.value(0, pivot.categories.iter().position(|c| c == "B").unwrap()), 0.0);
    }

    #[test]
    fn categories_rank_by_total_then_alphabetically() {
        let records = vec![
            record(date!(2025 - 10 - 01), "Books", 50.0),
            record(date!(2025 - 10 - 01), "Apples", 50.0),
            record(date!(2025 - 10 - 01), "Cameras", 200.0),
        ];
        let pivot = Pivot::build(&aggregate(&records));
        assert_eq!(pivot.categories, vec!["Cameras", "Apples", "Books"]);
        assert_eq!(pivot.top_categories(2), &["Cameras", "Apples"]);
    }

    #[test]
    fn change_is_undefined_when_previous_month_is_zero() {
        let records = vec![
            record(date!(2025 - 10 - 01), "A", 0.0),
            record(date!(2025 - 11 - 01), "A", 10.0),
            record(date!(2025 - 12 - 01), "A", 5.0),
        ];
        let pivot = Pivot::build(&aggregate(&records));
        let change = pivot.pct_change();
        assert_eq!(change.cells[0][0], None);
        assert_eq!(change.cells[1][0], None);
        assert_eq!(change.cells[2][0], Some(-0.5));
    }

    #[test]
    fn every_total_lands_in_its_pivot_cell() {
        let records = vec![
            record(date!(2025 - 10 - 02), "A", 1.0),
            record(date!(2025 - 11 - 02), "A", 2.0),
            record(date!(2025 - 12 - 02), "A", 3.0),
            record(date!(2025 - 10 - 02), "B", 4.0),
            record(date!(2025 - 12 - 02), "B", 5.0),
        ];
        let totals = aggregate(&records);
        let pivot = Pivot::build(&totals);
        for t in &totals {
            let mi = pivot.months.iter().position(|m| *m == t.month).unwrap();
            let ci = pivot
                .categories
                .iter()
                .position(|c| c == &t.category)
                .unwrap();
            assert_eq!(pivot.value(mi, ci), t.total_amount);
        }
        let placed: f64 = pivot.cells.iter().flatten().sum();
        assert_eq!(placed, 15.0);
    }

    #[test]
    fn pivot_month_set_equals_distinct_record_months() {
        let records = vec![
            record(date!(2025 - 10 - 03), "A", 1.0),
            record(date!(2025 - 10 - 29), "B", 1.0),
            record(date!(2026 - 01 - 15), "A", 1.0),
        ];
        let pivot = Pivot::build(&aggregate(&records));
        let months: Vec<String> = pivot.months.iter().map(|m| m.to_string()).collect();
        assert_eq!(months, vec!["2025-10", "2026-01"]);
    }

    #[test]
    fn pivot_row_sum_equals_month_total() {
        let records = vec![
            record(date!(2025 - 10 - 01), "A", 3.0),
            record(date!(2025 - 10 - 02), "B", 4.0),
            record(date!(2025 - 10 - 03), "A", 5.0),
        ];
        let pivot = Pivot::build(&aggregate(&records));
        let row_sum: f64 = pivot.cells[0].iter().sum();
        assert_eq!(row_sum, 12.0);
    }
}
