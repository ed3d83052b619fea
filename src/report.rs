//! Console summaries of the basket table and mined rules

use crate::basket::{ItemKey, OccurrenceMatrix};
use crate::miner::{Rule, RuleTable};

/// Render the basket table statistics
pub fn matrix_summary(matrix: &OccurrenceMatrix) -> String {
    format!(
        "=== Basket Statistics ===\n\
         Baskets (customer-months): {}\n\
         Distinct services: {}\n\
         Matrix density: {:.4}\n",
        matrix.n_baskets(),
        matrix.n_items(),
        matrix.density()
    )
}

/// Render the `limit` highest-lift rules as an aligned table
pub fn rules_table(rules: &RuleTable, limit: usize) -> String {
    let mut out = format!("=== Top Rules by Lift ({} of {}) ===\n", limit.min(rules.len()), rules.len());
    out.push_str(&format!(
        "  {:<24} | {:<24} | {:>8} | {:>10} | {:>8}\n",
        "Antecedents", "Consequents", "Support", "Confidence", "Lift"
    ));
    out.push_str(&format!("  {}\n", "-".repeat(86)));

    for rule in rules.sorted_by_lift().into_iter().take(limit) {
        out.push_str(&format!("  {}\n", rule_row(rule)));
    }
    out
}

fn rule_row(rule: &Rule) -> String {
    format!(
        "{:<24} | {:<24} | {:>8.4} | {:>10.4} | {:>8.3}",
        render_items(&rule.antecedents),
        render_items(&rule.consequents),
        rule.support,
        rule.confidence,
        rule.lift
    )
}

fn render_items(items: &[ItemKey]) -> String {
    format!("{{{}}}", items.iter().map(ItemKey::as_str).collect::<Vec<_>>().join(", "))
}

/// Print basket statistics and the top rules to stdout
pub fn print_mining_report(matrix: &OccurrenceMatrix, rules: &RuleTable, top_rules: usize) {
    println!("\n{}", matrix_summary(matrix));
    println!("Rules mined: {}", rules.len());
    if top_rules > 0 && !rules.is_empty() {
        println!("\n{}", rules_table(rules, top_rules));
    }
}
