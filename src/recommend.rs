//! Item lookup over a mined rule table

use std::collections::HashSet;

use polars::prelude::DataFrame;
use tracing::debug;

use crate::basket::ItemKey;
use crate::miner::RuleTable;

/// Items most strongly associated with `item`, best first
///
/// Rules are walked in descending lift order (ties keep generation order).
/// Every rule whose antecedents contain `item` contributes its consequents;
/// an item is kept at its first, highest-lift position.
///
/// # Arguments
/// * `rules` - Mined rule table
/// * `item` - Item the customer bought
/// * `count` - Maximum number of recommendations
///
/// # Returns
/// * Up to `count` distinct items; empty when no rule mentions `item`
pub fn recommend(rules: &RuleTable, item: &ItemKey, count: usize) -> Vec<ItemKey> {
    let mut seen: HashSet<&ItemKey> = HashSet::new();
    let mut recommendations = Vec::new();

    let matching = rules.sorted_by_lift().into_iter().filter(|rule| rule.antecedents.contains(item));

    'rules: for rule in matching {
        for consequent in &rule.consequents {
            if recommendations.len() >= count {
                break 'rules;
            }
            if seen.insert(consequent) {
                recommendations.push(consequent.clone());
            }
        }
    }

    debug!(item = %item, requested = count, returned = recommendations.len(), "recommendation lookup");
    recommendations
}

/// [`recommend`] over a rule table held as a DataFrame
///
/// Fails when the frame lacks `antecedents`, `consequents` or `lift`.
pub fn recommend_from_frame(
    rules: &DataFrame,
    item: &ItemKey,
    count: usize,
) -> crate::Result<Vec<ItemKey>> {
    let table = RuleTable::try_from_dataframe(rules)?;
    Ok(recommend(&table, item, count))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::miner::{Rule, LIFT};
    use polars::prelude::*;

    fn rule(antecedents: &[&str], consequents: &[&str], lift: f64) -> Rule {
        Rule {
            antecedents: antecedents.iter().copied().map(ItemKey::new).collect(),
            consequents: consequents.iter().copied().map(ItemKey::new).collect(),
            antecedent_support: 0.1,
            consequent_support: 0.1,
            support: 0.05,
            confidence: 0.5,
            lift,
            leverage: 0.0,
            conviction: 1.0,
        }
    }

    fn keys(items: &[ItemKey]) -> Vec<&str> {
        items.iter().map(ItemKey::as_str).collect()
    }

    fn sample_rules() -> RuleTable {
        RuleTable::new(vec![
            rule(&["2_0"], &["15_1"], 1.2),
            rule(&["2_0", "13_11"], &["38_4", "15_1"], 3.5),
            rule(&["9_4"], &["2_0"], 9.0),
            rule(&["2_0"], &["22_0"], 2.1),
            rule(&["2_0"], &["25_0"], 2.1),
        ])
    }

    #[test]
    fn test_ranked_by_lift() {
        let result = recommend(&sample_rules(), &"2_0".into(), 10);
        assert_eq!(keys(&result), vec!["38_4", "15_1", "22_0", "25_0"]);
    }

    #[test]
    fn test_truncates_to_count() {
        let result = recommend(&sample_rules(), &"2_0".into(), 2);
        assert_eq!(keys(&result), vec!["38_4", "15_1"]);

        let result = recommend(&sample_rules(), &"2_0".into(), 0);
        assert!(result.is_empty());
    }

    #[test]
    fn test_no_duplicates() {
        let result = recommend(&sample_rules(), &"2_0".into(), 10);
        let unique: HashSet<&ItemKey> = result.iter().collect();
        assert_eq!(unique.len(), result.len());
    }

    #[test]
    fn test_unknown_item_is_empty() {
        assert!(recommend(&sample_rules(), &"99_9".into(), 5).is_empty());
        assert!(recommend(&RuleTable::default(), &"2_0".into(), 5).is_empty());
    }

    #[test]
    fn test_consequent_only_item_is_not_matched() {
        // 2_0 appears as a consequent of 9_4 but that must not make 9_4 a result.
        let result = recommend(&sample_rules(), &"2_0".into(), 10);
        assert!(!keys(&result).contains(&"9_4"));
    }

    #[test]
    fn test_from_frame_matches_table() {
        let table = sample_rules();
        let df = table.to_dataframe().unwrap();

        let from_frame = recommend_from_frame(&df, &"2_0".into(), 3).unwrap();
        assert_eq!(from_frame, recommend(&table, &"2_0".into(), 3));
    }

    #[test]
    fn test_from_frame_requires_lift() {
        let df = df!(
            "antecedents" => vec!["2_0".to_string()],
            "consequents" => vec!["15_1".to_string()],
        )
        .unwrap();

        let result = recommend_from_frame(&df, &"2_0".into(), 1);
        assert!(matches!(result, Err(Error::MissingColumn(LIFT))));
    }
}
