use time::{format_description::BorrowedFormatItem, macros::format_description, Date};
use tracing::{debug, warn};

use crate::error::{AnalysisError, Result};
use crate::loader::{Cell, RawTable};

/// Label given to rows whose category cell is blank, and to every row when
/// no category column exists in the input.
pub const UNKNOWN_CATEGORY: &str = "Unknown";

/// Ordered synonym lists per canonical field. Detection walks each list in
/// order and the first matching header wins, so adding a synonym at the end
/// never changes the outcome for existing inputs.
const DATE_SYNONYMS: &[&str] = &[
    "日期",
    "出库日期",
    "单据日期",
    "销售日期",
    "出库时间",
    "date",
    "sale date",
    "transaction date",
];

const CATEGORY_SYNONYMS: &[&str] = &[
    "产品类别",
    "类别",
    "类别名称",
    "商品类别",
    "产品分类",
    "商品大类",
    "类别ID",
    "category",
    "product category",
];

const AMOUNT_SYNONYMS: &[&str] = &[
    "金额",
    "销售额",
    "实收金额",
    "金额(元)",
    "总额",
    "金额合计",
    "销售金额",
    "amount",
    "sales amount",
    "total",
];

const QUANTITY_SYNONYMS: &[&str] = &[
    "数量",
    "数量(件)",
    "数量(kg)",
    "qty",
    "quantity",
];

static DATE_FORMATS: &[&[BorrowedFormatItem<'static>]] = &[
    format_description!("[year]-[month]-[day]"),
    format_description!("[year]/[month]/[day]"),
    format_description!("[month]/[day]/[year]"),
    format_description!("[year]年[month]月[day]日"),
];

/// Resolved header positions for the canonical schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMap {
    pub date: usize,
    pub category: Option<usize>,
    pub amount: usize,
    pub quantity: Option<usize>,
}

/// One canonical sales row. `quantity` is zero when the input has no
/// quantity column.
#[derive(Debug, Clone, PartialEq)]
pub struct SaleRecord {
    pub date: Date,
    pub category: String,
    pub amount: f64,
    pub quantity: f64,
}

/// Counters for rows dropped during coercion. Dropped rows are warnings,
/// never fatal.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CoercionStats {
    pub rows_read: usize,
    pub rows_kept: usize,
    pub bad_dates: usize,
    pub bad_amounts: usize,
    pub out_of_range: usize,
}

fn find_column(headers: &[String], candidates: &[&str]) -> Option<usize> {
    for candidate in candidates {
        if let Some(pos) = headers.iter().position(|h| h == candidate) {
            return Some(pos);
        }
    }
    // Second pass: case-insensitive, for latin-script headers.
    for candidate in candidates {
        if let Some(pos) = headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case(candidate))
        {
            return Some(pos);
        }
    }
    None
}

/// Maps the input headers onto the canonical schema.
///
/// Date is always required. When no amount header matches, a detected
/// quantity column stands in for it. A missing category column is tolerated;
/// every row then lands in [`UNKNOWN_CATEGORY`].
pub fn detect_columns(headers: &[String]) -> Result<ColumnMap> {
    let date =
        find_column(headers, DATE_SYNONYMS).ok_or(AnalysisError::ColumnDetection {
            field: "date",
        })?;
    let category = find_column(headers, CATEGORY_SYNONYMS);
    let quantity = find_column(headers, QUANTITY_SYNONYMS);

    let amount = match find_column(headers, AMOUNT_SYNONYMS) {
        Some(pos) => pos,
        None => {
            let pos = quantity.ok_or(AnalysisError::ColumnDetection { field: "amount" })?;
            warn!("no amount column found; using the quantity column as the amount");
            pos
        }
    };

    if category.is_none() {
        warn!(
            "no category column found; all rows will be reported under \"{}\"",
            UNKNOWN_CATEGORY
        );
    }

    debug!(
        date_column = headers[date].as_str(),
        category_column = category.map(|i| headers[i].as_str()),
        amount_column = headers[amount].as_str(),
        quantity_column = quantity.map(|i| headers[i].as_str()),
        "detected columns"
    );

    Ok(ColumnMap {
        date,
        category,
        amount,
        quantity,
    })
}

fn coerce_date(cell: &Cell) -> Option<Date> {
    match cell {
        Cell::Date(d) => Some(*d),
        Cell::Number(serial) => crate::loader::excel_serial_to_date(*serial),
        Cell::Text(s) => parse_date_text(s),
        Cell::Empty => None,
    }
}

fn parse_date_text(s: &str) -> Option<Date> {
    // Strip a trailing time component ("2025-10-01 12:34:56", ISO "T...").
    let day_part = s
        .split(|c| c == ' ' || c == 'T')
        .next()
        .unwrap_or(s)
        .trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| Date::parse(day_part, fmt).ok())
}

fn coerce_amount(cell: &Cell) -> Option<f64> {
    // Non-finite values would poison every downstream sum, so they fail
    // coercion like any other unusable amount.
    match cell {
        Cell::Number(n) if n.is_finite() => Some(*n),
        Cell::Number(_) => None,
        Cell::Text(s) => {
            let cleaned: String = s
                .chars()
                .filter(|c| !matches!(c, ',' | '¥' | '￥' | '$' | '€') && !c.is_whitespace())
                .collect();
            cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
        }
        Cell::Date(_) | Cell::Empty => None,
    }
}

fn coerce_category(cell: Option<&Cell>) -> String {
    match cell {
        Some(Cell::Text(s)) if !s.is_empty() => s.clone(),
        Some(Cell::Number(n)) => n.to_string(),
        _ => UNKNOWN_CATEGORY.to_string(),
    }
}

/// Converts raw rows into canonical [`SaleRecord`]s.
///
/// Rows whose date or amount cannot be coerced are dropped and counted.
/// `start`/`end` apply an inclusive date filter when present.
pub fn normalize(
    table: &RawTable,
    map: &ColumnMap,
    start: Option<Date>,
    end: Option<Date>,
) -> (Vec<SaleRecord>, CoercionStats) {
    let mut stats = CoercionStats {
        rows_read: table.rows.len(),
        ..CoercionStats::default()
    };
    let mut records = Vec::with_capacity(table.rows.len());

    for row in &table.rows {
        let Some(date) = row.get(map.date).and_then(coerce_date) else {
            stats.bad_dates += 1;
            continue;
        };
        if start.is_some_and(|s| date < s) || end.is_some_and(|e| date > e) {
            stats.out_of_range += 1;
            continue;
        }
        let Some(amount) = row.get(map.amount).and_then(|c| coerce_amount(c)) else {
            stats.bad_amounts += 1;
            continue;
        };
        let category = coerce_category(map.category.and_then(|i| row.get(i)));
        let quantity = map
            .quantity
            .and_then(|i| row.get(i))
            .and_then(coerce_amount)
            .unwrap_or(0.0);

        records.push(SaleRecord {
            date,
            category,
            amount,
            quantity,
        });
    }

    stats.rows_kept = records.len();
    if stats.bad_dates > 0 || stats.bad_amounts > 0 {
        warn!(
            bad_dates = stats.bad_dates,
            bad_amounts = stats.bad_amounts,
            "dropped rows that failed numeric or date coercion"
        );
    }
    (records, stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn detects_english_headers() {
        let map = detect_columns(&headers(&["id", "Date", "Category", "Amount"])).unwrap();
        assert_eq!(map.date, 1);
        assert_eq!(map.category, Some(2));
        assert_eq!(map.amount, 3);
        assert_eq!(map.quantity, None);
    }

    #[test]
    fn detects_chinese_headers() {
        let map = detect_columns(&headers(&["单号", "日期", "产品类别", "数量", "金额"])).unwrap();
        assert_eq!(map.date, 1);
        assert_eq!(map.category, Some(2));
        assert_eq!(map.quantity, Some(3));
        assert_eq!(map.amount, 4);
    }

    #[test]
    fn earlier_synonyms_win() {
        // Both 日期 and 出库日期 are present; 日期 is listed first.
        let map = detect_columns(&headers(&["出库日期", "日期", "金额"])).unwrap();
        assert_eq!(map.date, 1);
    }

    #[test]
    fn quantity_substitutes_for_missing_amount() {
        let map = detect_columns(&headers(&["date", "category", "qty"])).unwrap();
        assert_eq!(map.amount, 2);
        assert_eq!(map.quantity, Some(2));
    }

    #[test]
    fn missing_date_column_is_fatal() {
        let err = detect_columns(&headers(&["category", "amount"])).unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::ColumnDetection { field: "date" }
        ));
    }

    #[test]
    fn missing_amount_and_quantity_is_fatal() {
        let err = detect_columns(&headers(&["date", "category", "notes"])).unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::ColumnDetection { field: "amount" }
        ));
    }

    #[test]
    fn parses_common_date_texts() {
        assert_eq!(parse_date_text("2025-10-01"), Some(date!(2025 - 10 - 01)));
        assert_eq!(parse_date_text("2025/10/01"), Some(date!(2025 - 10 - 01)));
        assert_eq!(parse_date_text("10/01/2025"), Some(date!(2025 - 10 - 01)));
        assert_eq!(
            parse_date_text("2025年10月01日"),
            Some(date!(2025 - 10 - 01))
        );
        assert_eq!(
            parse_date_text("2025-10-01 08:30:00"),
            Some(date!(2025 - 10 - 01))
        );
        assert_eq!(parse_date_text("October-ish"), None);
    }

    #[test]
    fn amount_coercion_strips_separators_and_currency() {
        assert_eq!(coerce_amount(&Cell::Text("1,234.5".into())), Some(1234.5));
        assert_eq!(coerce_amount(&Cell::Text("¥ 99".into())), Some(99.0));
        assert_eq!(coerce_amount(&Cell::Text("n/a".into())), None);
        assert_eq!(coerce_amount(&Cell::Number(7.25)), Some(7.25));
        assert_eq!(coerce_amount(&Cell::Empty), None);
    }

    #[test]
    fn non_finite_amounts_fail_coercion() {
        assert_eq!(coerce_amount(&Cell::Text("NaN".into())), None);
        assert_eq!(coerce_amount(&Cell::Text("inf".into())), None);
        assert_eq!(coerce_amount(&Cell::Text("-inf".into())), None);
        assert_eq!(coerce_amount(&Cell::Text("infinity".into())), None);
        assert_eq!(coerce_amount(&Cell::Number(f64::NAN)), None);
        assert_eq!(coerce_amount(&Cell::Number(f64::INFINITY)), None);
    }

    #[test]
    fn non_finite_amount_rows_count_as_bad() {
        let table = RawTable {
            headers: headers(&["date", "category", "amount"]),
            rows: vec![
                text_row(&["2025-10-01", "Electronics", "100"]),
                text_row(&["2025-10-02", "Electronics", "NaN"]),
                text_row(&["2025-10-03", "Electronics", "-inf"]),
            ],
        };
        let map = detect_columns(&table.headers).unwrap();
        let (records, stats) = normalize(&table, &map, None, None);
        assert_eq!(stats.bad_amounts, 2);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].amount, 100.0);
    }

    fn text_row(cells: &[&str]) -> Vec<Cell> {
        cells
            .iter()
            .map(|s| {
                if s.is_empty() {
                    Cell::Empty
                } else {
                    Cell::Text(s.to_string())
                }
            })
            .collect()
    }

    #[test]
    fn normalize_drops_and_counts_bad_rows() {
        let table = RawTable {
            headers: headers(&["date", "category", "amount"]),
            rows: vec![
                text_row(&["2025-10-01", "Electronics", "100"]),
                text_row(&["not a date", "Electronics", "50"]),
                text_row(&["2025-10-02", "Toys", "oops"]),
                text_row(&["2025-10-03", "", "20"]),
            ],
        };
        let map = detect_columns(&table.headers).unwrap();
        let (records, stats) = normalize(&table, &map, None, None);

        assert_eq!(stats.rows_read, 4);
        assert_eq!(stats.rows_kept, 2);
        assert_eq!(stats.bad_dates, 1);
        assert_eq!(stats.bad_amounts, 1);
        assert_eq!(records[0].category, "Electronics");
        assert_eq!(records[1].category, UNKNOWN_CATEGORY);
    }

    #[test]
    fn normalize_applies_inclusive_date_range() {
        let table = RawTable {
            headers: headers(&["date", "category", "amount"]),
            rows: vec![
                text_row(&["2025-09-30", "A", "1"]),
                text_row(&["2025-10-01", "A", "2"]),
                text_row(&["2026-01-31", "A", "3"]),
                text_row(&["2026-02-01", "A", "4"]),
            ],
        };
        let map = detect_columns(&table.headers).unwrap();
        let (records, stats) = normalize(
            &table,
            &map,
            Some(date!(2025 - 10 - 01)),
            Some(date!(2026 - 01 - 31)),
        );
        assert_eq!(records.len(), 2);
        assert_eq!(stats.out_of_range, 2);
        assert_eq!(records[0].amount, 2.0);
        assert_eq!(records[1].amount, 3.0);
    }
}
