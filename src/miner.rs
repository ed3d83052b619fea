//! Frequent itemset mining and association rule generation

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::basket::{ItemKey, OccurrenceMatrix};
use crate::config::ConfigError;
use crate::error::Error;

pub const ANTECEDENTS: &str = "antecedents";
pub const CONSEQUENTS: &str = "consequents";
pub const ANTECEDENT_SUPPORT: &str = "antecedent_support";
pub const CONSEQUENT_SUPPORT: &str = "consequent_support";
pub const SUPPORT: &str = "support";
pub const CONFIDENCE: &str = "confidence";
pub const LIFT: &str = "lift";
pub const LEVERAGE: &str = "leverage";
pub const CONVICTION: &str = "conviction";

/// Separator between item keys when an itemset is rendered as one cell
pub const ITEM_SEPARATOR: char = ',';

/// Rule measure a minimum threshold can be applied to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Support,
    Confidence,
    Lift,
    Leverage,
    Conviction,
}

impl Metric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Support => SUPPORT,
            Self::Confidence => CONFIDENCE,
            Self::Lift => LIFT,
            Self::Leverage => LEVERAGE,
            Self::Conviction => CONVICTION,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Metric {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "support" => Ok(Self::Support),
            "confidence" => Ok(Self::Confidence),
            "lift" => Ok(Self::Lift),
            "leverage" => Ok(Self::Leverage),
            "conviction" => Ok(Self::Conviction),
            other => Err(ConfigError::Validation(format!(
                "unsupported metric `{other}` (expected support|confidence|lift|leverage|conviction)"
            ))),
        }
    }
}

/// Cut-offs applied while mining
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Thresholds {
    /// Minimum fraction of baskets an itemset must appear in to be frequent
    pub min_support: f64,
    pub metric: Metric,
    /// Rules with `metric < min_threshold` are dropped
    pub min_threshold: f64,
}

impl Thresholds {
    pub fn new(min_support: f64, metric: Metric, min_threshold: f64) -> Self {
        Self { min_support, metric, min_threshold }
    }

    pub fn validate(&self) -> crate::Result<()> {
        if !(self.min_support > 0.0 && self.min_support <= 1.0) {
            return Err(Error::InvalidThreshold(format!(
                "min_support must be in (0, 1], got {}",
                self.min_support
            )));
        }
        if self.min_threshold.is_nan() {
            return Err(Error::InvalidThreshold("min_threshold must be a number".to_string()));
        }
        Ok(())
    }
}

/// An itemset that met the support threshold
#[derive(Debug, Clone, PartialEq)]
pub struct FrequentItemset {
    pub items: Vec<ItemKey>,
    pub support: f64,
}

/// Association rule `antecedents -> consequents` with its measures
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub antecedents: Vec<ItemKey>,
    pub consequents: Vec<ItemKey>,
    pub antecedent_support: f64,
    pub consequent_support: f64,
    pub support: f64,
    pub confidence: f64,
    pub lift: f64,
    pub leverage: f64,
    pub conviction: f64,
}

impl Rule {
    /// Derive every measure from the three supports
    pub fn from_supports(
        antecedents: Vec<ItemKey>,
        consequents: Vec<ItemKey>,
        antecedent_support: f64,
        consequent_support: f64,
        support: f64,
    ) -> Self {
        let confidence = support / antecedent_support;
        let lift = confidence / consequent_support;
        let leverage = support - antecedent_support * consequent_support;
        let conviction = if confidence >= 1.0 {
            f64::INFINITY
        } else {
            (1.0 - consequent_support) / (1.0 - confidence)
        };

        Self {
            antecedents,
            consequents,
            antecedent_support,
            consequent_support,
            support,
            confidence,
            lift,
            leverage,
            conviction,
        }
    }

    pub fn metric(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Support => self.support,
            Metric::Confidence => self.confidence,
            Metric::Lift => self.lift,
            Metric::Leverage => self.leverage,
            Metric::Conviction => self.conviction,
        }
    }
}

/// Mined rules in generation order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleTable {
    rules: Vec<Rule>,
}

impl RuleTable {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Rule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Rules by descending lift; equal lifts keep generation order
    pub fn sorted_by_lift(&self) -> Vec<&Rule> {
        let mut sorted: Vec<&Rule> = self.rules.iter().collect();
        sorted.sort_by(|a, b| b.lift.total_cmp(&a.lift));
        sorted
    }

    /// Render the table with one row per rule and itemsets joined by `,`
    pub fn to_dataframe(&self) -> crate::Result<DataFrame> {
        let column = |measure: fn(&Rule) -> f64| self.rules.iter().map(measure).collect::<Vec<f64>>();
        let antecedents: Vec<String> = self.rules.iter().map(|r| join_items(&r.antecedents)).collect();
        let consequents: Vec<String> = self.rules.iter().map(|r| join_items(&r.consequents)).collect();

        let df = df!(
            ANTECEDENTS => antecedents,
            CONSEQUENTS => consequents,
            ANTECEDENT_SUPPORT => column(|r| r.antecedent_support),
            CONSEQUENT_SUPPORT => column(|r| r.consequent_support),
            SUPPORT => column(|r| r.support),
            CONFIDENCE => column(|r| r.confidence),
            LIFT => column(|r| r.lift),
            LEVERAGE => column(|r| r.leverage),
            CONVICTION => column(|r| r.conviction),
        )?;
        Ok(df)
    }

    /// Rebuild a table from its tabular form.
    ///
    /// `antecedents`, `consequents` and `lift` are required; any other measure
    /// that is absent reads as NaN.
    pub fn try_from_dataframe(df: &DataFrame) -> crate::Result<Self> {
        let antecedents = itemset_values(df, ANTECEDENTS)?;
        let consequents = itemset_values(df, CONSEQUENTS)?;
        let lift = float_values(df, LIFT)?;
        let antecedent_support = optional_float_values(df, ANTECEDENT_SUPPORT)?;
        let consequent_support = optional_float_values(df, CONSEQUENT_SUPPORT)?;
        let support = optional_float_values(df, SUPPORT)?;
        let confidence = optional_float_values(df, CONFIDENCE)?;
        let leverage = optional_float_values(df, LEVERAGE)?;
        let conviction = optional_float_values(df, CONVICTION)?;

        let rules = antecedents
            .into_iter()
            .zip(consequents)
            .enumerate()
            .map(|(row, (antecedents, consequents))| Rule {
                antecedents,
                consequents,
                antecedent_support: antecedent_support[row],
                consequent_support: consequent_support[row],
                support: support[row],
                confidence: confidence[row],
                lift: lift[row],
                leverage: leverage[row],
                conviction: conviction[row],
            })
            .collect();

        Ok(Self { rules })
    }
}

impl<'a> IntoIterator for &'a RuleTable {
    type Item = &'a Rule;
    type IntoIter = std::slice::Iter<'a, Rule>;

    fn into_iter(self) -> Self::IntoIter {
        self.rules.iter()
    }
}

fn join_items(items: &[ItemKey]) -> String {
    items.iter().map(ItemKey::as_str).collect::<Vec<_>>().join(&ITEM_SEPARATOR.to_string())
}

fn split_items(cell: &str) -> Vec<ItemKey> {
    cell.split(ITEM_SEPARATOR).map(str::trim).filter(|s| !s.is_empty()).map(ItemKey::new).collect()
}

fn itemset_values(df: &DataFrame, name: &'static str) -> crate::Result<Vec<Vec<ItemKey>>> {
    let invalid = || Error::InvalidColumn { column: name, expected: "a string column without nulls" };
    let column = df.column(name).map_err(|_| Error::MissingColumn(name))?;
    let values = column.str().map_err(|_| invalid())?;
    values.into_iter().map(|cell| cell.map(split_items).ok_or_else(invalid)).collect()
}

fn float_values(df: &DataFrame, name: &'static str) -> crate::Result<Vec<f64>> {
    let invalid = || Error::InvalidColumn { column: name, expected: "a numeric column without nulls" };
    let column = df.column(name).map_err(|_| Error::MissingColumn(name))?;
    let values = column.cast(&DataType::Float64).map_err(|_| invalid())?;
    let values = values.f64().map_err(|_| invalid())?;
    values.into_iter().map(|value| value.ok_or_else(invalid)).collect()
}

fn optional_float_values(df: &DataFrame, name: &'static str) -> crate::Result<Vec<f64>> {
    match float_values(df, name) {
        Err(Error::MissingColumn(_)) => Ok(vec![f64::NAN; df.height()]),
        other => other,
    }
}

/// Capability that turns an occurrence matrix into association rules
pub trait RuleMiner {
    fn mine(&self, matrix: &OccurrenceMatrix, thresholds: &Thresholds) -> crate::Result<RuleTable>;
}

/// Level-wise frequent itemset search with candidate pruning
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Apriori {
    /// Largest itemset size to enumerate; unbounded when `None`
    pub max_len: Option<usize>,
}

/// Item column indices of a frequent itemset and its basket count
type CountedItemset = (Vec<usize>, usize);

impl Apriori {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_len(max_len: Option<usize>) -> Self {
        Self { max_len }
    }

    /// Every itemset whose support reaches `min_support`, smallest first
    pub fn frequent_itemsets(
        &self,
        matrix: &OccurrenceMatrix,
        min_support: f64,
    ) -> crate::Result<Vec<FrequentItemset>> {
        Thresholds::new(min_support, Metric::Support, 0.0).validate()?;

        let n_baskets = matrix.n_baskets();
        let itemsets = self
            .count_frequent(matrix, min_support)
            .into_iter()
            .map(|(indices, count)| FrequentItemset {
                items: indices.iter().map(|&i| matrix.item_keys()[i].clone()).collect(),
                support: count as f64 / n_baskets as f64,
            })
            .collect();
        Ok(itemsets)
    }

    fn count_frequent(&self, matrix: &OccurrenceMatrix, min_support: f64) -> Vec<CountedItemset> {
        let n_baskets = matrix.n_baskets();
        if n_baskets == 0 {
            return Vec::new();
        }

        let is_frequent = |count: usize| count as f64 / n_baskets as f64 >= min_support;
        let cells = matrix.cells();

        let mut level: Vec<CountedItemset> = cells
            .columns()
            .into_iter()
            .enumerate()
            .map(|(column, values)| (vec![column], values.iter().map(|&c| c as usize).sum::<usize>()))
            .filter(|&(_, count)| is_frequent(count))
            .collect();
        debug!(size = 1, frequent = level.len(), "apriori level");

        let mut frequent = Vec::new();
        let mut size = 1;

        while !level.is_empty() {
            let previous: Vec<Vec<usize>> = level.iter().map(|(items, _)| items.clone()).collect();
            frequent.append(&mut level);

            size += 1;
            if self.max_len.is_some_and(|max_len| size > max_len) {
                break;
            }

            let candidates = generate_candidates(&previous);
            let mut counts = vec![0usize; candidates.len()];
            for row in cells.outer_iter() {
                for (candidate, count) in candidates.iter().zip(counts.iter_mut()) {
                    if candidate.iter().all(|&column| row[column] == 1) {
                        *count += 1;
                    }
                }
            }

            level = candidates
                .into_iter()
                .zip(counts)
                .filter(|&(_, count)| is_frequent(count))
                .collect();
            debug!(size, frequent = level.len(), "apriori level");
        }

        frequent
    }
}

/// Join itemsets sharing all but their last item, then drop any candidate
/// with an infrequent subset. Inputs and outputs are sorted.
fn generate_candidates(previous: &[Vec<usize>]) -> Vec<Vec<usize>> {
    let known: BTreeSet<&[usize]> = previous.iter().map(Vec::as_slice).collect();
    let mut candidates = Vec::new();

    for (i, left) in previous.iter().enumerate() {
        let prefix = &left[..left.len() - 1];
        for right in &previous[i + 1..] {
            if &right[..right.len() - 1] != prefix {
                break;
            }

            let mut candidate = left.clone();
            candidate.push(right[right.len() - 1]);

            let all_subsets_frequent = (0..candidate.len()).all(|skip| {
                let subset: Vec<usize> = candidate
                    .iter()
                    .enumerate()
                    .filter(|&(position, _)| position != skip)
                    .map(|(_, &item)| item)
                    .collect();
                known.contains(subset.as_slice())
            });

            if all_subsets_frequent {
                candidates.push(candidate);
            }
        }
    }

    candidates
}

/// All `k`-sized combinations of `items`, in lexicographic position order
fn combinations(items: &[usize], k: usize) -> Vec<Vec<usize>> {
    if k == 0 {
        return vec![Vec::new()];
    }
    if items.len() < k {
        return Vec::new();
    }

    let mut result = Vec::new();
    for (i, &first) in items.iter().enumerate() {
        for mut rest in combinations(&items[i + 1..], k - 1) {
            rest.insert(0, first);
            result.push(rest);
        }
    }
    result
}

impl RuleMiner for Apriori {
    fn mine(&self, matrix: &OccurrenceMatrix, thresholds: &Thresholds) -> crate::Result<RuleTable> {
        thresholds.validate()?;

        let frequent = self.count_frequent(matrix, thresholds.min_support);
        let n_baskets = matrix.n_baskets() as f64;
        let support_of: HashMap<&[usize], f64> = frequent
            .iter()
            .map(|(items, count)| (items.as_slice(), *count as f64 / n_baskets))
            .collect();
        let keys = |indices: &[usize]| -> Vec<ItemKey> {
            indices.iter().map(|&i| matrix.item_keys()[i].clone()).collect()
        };

        let mut rules = Vec::new();
        for (itemset, count) in frequent.iter().filter(|(items, _)| items.len() >= 2) {
            let support = *count as f64 / n_baskets;

            for antecedent_len in 1..itemset.len() {
                for antecedent in combinations(itemset, antecedent_len) {
                    let consequent: Vec<usize> =
                        itemset.iter().copied().filter(|item| !antecedent.contains(item)).collect();

                    // Subsets of a frequent itemset are frequent, so both lookups hit.
                    let (Some(&antecedent_support), Some(&consequent_support)) =
                        (support_of.get(antecedent.as_slice()), support_of.get(consequent.as_slice()))
                    else {
                        continue;
                    };

                    let rule = Rule::from_supports(
                        keys(&antecedent),
                        keys(&consequent),
                        antecedent_support,
                        consequent_support,
                        support,
                    );
                    if rule.metric(thresholds.metric) >= thresholds.min_threshold {
                        rules.push(rule);
                    }
                }
            }
        }

        info!(
            baskets = matrix.n_baskets(),
            frequent_itemsets = frequent.len(),
            rules = rules.len(),
            metric = %thresholds.metric,
            "mined association rules"
        );
        Ok(RuleTable::new(rules))
    }
}
