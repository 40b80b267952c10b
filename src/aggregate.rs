//! Turns survey rows into `{name, value}` chart series.
//!
//! Every transform returns an empty series when it lacks the data it needs;
//! none of them fail.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use crate::advisor::humanize;
use crate::models::{ChartKind, ChartPoint, MultiSelectField, RatingField, SurveyResponse};
use crate::schema::is_numeric;
use crate::table::Table;

const PIE_MULTI_SELECT_LIMIT: usize = 8;
const PIE_CATEGORY_LIMIT: usize = 6;
const SURVEY_TOP_N: usize = 5;

/// Counts keyed by value, remembering first-seen order so ties stay stable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tally {
    order: Vec<String>,
    counts: HashMap<String, usize>,
}

impl Tally {
    pub fn add(&mut self, key: &str) {
        match self.counts.get_mut(key) {
            Some(count) => *count += 1,
            None => {
                self.order.push(key.to_string());
                self.counts.insert(key.to_string(), 1);
            }
        }
    }

    pub fn get(&self, key: &str) -> usize {
        self.counts.get(key).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Entries in first-seen order.
    pub fn into_points(self) -> Vec<ChartPoint> {
        let Tally { order, counts } = self;
        order
            .into_iter()
            .map(|key| {
                let value = counts.get(&key).copied().unwrap_or(0) as f64;
                ChartPoint::new(key, value)
            })
            .collect()
    }
}

fn by_value_desc(a: &ChartPoint, b: &ChartPoint) -> Ordering {
    b.value.partial_cmp(&a.value).unwrap_or(Ordering::Equal)
}

fn sorted_desc(tally: Tally, limit: Option<usize>) -> Vec<ChartPoint> {
    let mut points = tally.into_points();
    points.sort_by(by_value_desc);
    if let Some(limit) = limit {
        points.truncate(limit);
    }
    points
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Integral values print without a fractional part, the way chart labels expect.
fn number_label(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

/// Builds the series for `column` as `kind`. The first row decides whether
/// the column is treated as numeric or multi-select.
pub fn transform(table: &Table, column: &str, kind: ChartKind) -> Vec<ChartPoint> {
    let Some(first) = table.rows.first() else {
        return Vec::new();
    };
    let first_value = first.get(column).map(|s| s.trim()).unwrap_or("");

    match kind {
        ChartKind::Bar if !first_value.is_empty() && is_numeric(first_value) => {
            numeric_distribution(table, column)
        }
        ChartKind::Bar => category_counts(table, column, None),
        ChartKind::Pie if first_value.contains(';') => {
            multi_select_counts(table, column, PIE_MULTI_SELECT_LIMIT)
        }
        ChartKind::Pie => category_counts(table, column, Some(PIE_CATEGORY_LIMIT)),
        ChartKind::BarByWardAvg => {
            let first_ward = first.get("ward").map(|s| s.trim()).unwrap_or("");
            if first_ward.is_empty() || first_value.is_empty() || !is_numeric(first_value) {
                return Vec::new();
            }
            ward_averages(table, column)
        }
    }
}

fn numeric_distribution(table: &Table, column: &str) -> Vec<ChartPoint> {
    let mut counts: BTreeMap<String, (f64, usize)> = BTreeMap::new();
    for cell in table.column(column) {
        if let Ok(value) = cell.trim().parse::<f64>() {
            if value.is_nan() {
                continue;
            }
            counts.entry(number_label(value)).or_insert((value, 0)).1 += 1;
        }
    }
    let mut points: Vec<(f64, ChartPoint)> = counts
        .into_iter()
        .map(|(label, (value, count))| (value, ChartPoint::new(label, count as f64)))
        .collect();
    points.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));
    points.into_iter().map(|(_, point)| point).collect()
}

fn category_counts(table: &Table, column: &str, limit: Option<usize>) -> Vec<ChartPoint> {
    let mut tally = Tally::default();
    for cell in table.column(column).map(str::trim).filter(|c| !c.is_empty()) {
        tally.add(cell);
    }
    sorted_desc(tally, limit)
}

fn multi_select_counts(table: &Table, column: &str, limit: usize) -> Vec<ChartPoint> {
    let mut tally = Tally::default();
    for cell in table.column(column) {
        for token in cell.split(';').map(str::trim).filter(|t| !t.is_empty()) {
            tally.add(token);
        }
    }
    sorted_desc(tally, Some(limit))
}

fn ward_averages(table: &Table, column: &str) -> Vec<ChartPoint> {
    let mut order: Vec<&str> = Vec::new();
    let mut sums: HashMap<&str, (f64, usize)> = HashMap::new();
    for row in &table.rows {
        let ward = row.get("ward").map(|s| s.trim()).unwrap_or("");
        let value = row
            .get(column)
            .and_then(|v| v.trim().parse::<f64>().ok())
            .filter(|v| !v.is_nan());
        let Some(value) = value else {
            continue;
        };
        if ward.is_empty() {
            continue;
        }
        let entry = sums.entry(ward).or_insert_with(|| {
            order.push(ward);
            (0.0, 0)
        });
        entry.0 += value;
        entry.1 += 1;
    }

    let mut points: Vec<ChartPoint> = order
        .into_iter()
        .map(|ward| {
            let (sum, count) = sums[ward];
            ChartPoint::new(ward, round_to(sum / count as f64, 2))
        })
        .collect();
    points.sort_by(by_value_desc);
    points
}

pub fn tally_frequencies<I, S>(items: I) -> Tally
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut tally = Tally::default();
    for item in items {
        tally.add(item.as_ref());
    }
    tally
}

pub fn tally_multi_select(responses: &[SurveyResponse], field: MultiSelectField) -> Tally {
    tally_frequencies(responses.iter().flat_map(|r| r.answers(field)))
}

pub fn top_n(tally: Tally, n: usize) -> Vec<ChartPoint> {
    sorted_desc(tally, Some(n))
}

/// `(rating, count)` pairs in ascending rating order.
pub fn condition_distribution(responses: &[SurveyResponse], field: RatingField) -> Vec<(u8, usize)> {
    let mut counts: BTreeMap<u8, usize> = BTreeMap::new();
    for response in responses {
        *counts.entry(response.rating(field)).or_insert(0) += 1;
    }
    counts.into_iter().collect()
}

/// Mean rating per ward, to one decimal, in first-seen ward order.
pub fn average_by_ward(responses: &[SurveyResponse], field: RatingField) -> Vec<ChartPoint> {
    let mut order: Vec<&str> = Vec::new();
    let mut sums: HashMap<&str, (u32, u32)> = HashMap::new();
    for response in responses {
        let entry = sums.entry(response.ward.as_str()).or_insert_with(|| {
            order.push(response.ward.as_str());
            (0, 0)
        });
        entry.0 += u32::from(response.rating(field));
        entry.1 += 1;
    }
    order
        .into_iter()
        .map(|ward| {
            let (sum, count) = sums[ward];
            ChartPoint::new(ward, round_to(f64::from(sum) / f64::from(count), 1))
        })
        .collect()
}

fn titled(points: Vec<ChartPoint>) -> Vec<ChartPoint> {
    points
        .into_iter()
        .map(|p| ChartPoint::new(humanize(&p.name), p.value))
        .collect()
}

/// Series for a member page's configured chart on normalized responses.
/// Unsupported kind/metric pairs yield an empty series.
pub fn survey_chart(responses: &[SurveyResponse], kind: ChartKind, metric: &str) -> Vec<ChartPoint> {
    if let (ChartKind::Bar, Some(field)) = (kind, RatingField::from_column(metric)) {
        return condition_distribution(responses, field)
            .into_iter()
            .map(|(rating, count)| ChartPoint::new(format!("Rating {rating}"), count as f64))
            .collect();
    }
    match (kind, metric) {
        (ChartKind::Bar, "improvements") => titled(top_n(
            tally_multi_select(responses, MultiSelectField::Improvements),
            SURVEY_TOP_N,
        )),
        (ChartKind::Pie, "walking_frequency") => {
            tally_frequencies(responses.iter().map(|r| r.walking_frequency.label())).into_points()
        }
        (ChartKind::Pie, "obstacles" | "reasons_not_walking") => {
            let field = MultiSelectField::from_column(metric).unwrap_or(MultiSelectField::Obstacles);
            titled(top_n(tally_multi_select(responses, field), SURVEY_TOP_N))
        }
        (ChartKind::BarByWardAvg, "footpath_condition") => {
            average_by_ward(responses, RatingField::FootpathCondition)
        }
        _ => Vec::new(),
    }
}
