use crate::report::{expected_path, ideal_path, load_report, results_path};
use crate::types::{ComparisonReport, ResultSet};
use anyhow::Result;
use colored::Colorize;
use std::path::Path;

/// Diff an actual ResultSet against an expected one. Pure; does no I/O.
///
/// Note the asymmetry: entries only in `actual` are "unexpected", entries
/// only in `expected` are "missing".
pub fn compare(expected: &ResultSet, actual: &ResultSet) -> ComparisonReport {
    let mut cmp = ComparisonReport::default();

    for (category, by_test) in actual {
        for (test_name, outcome) in by_test {
            match expected.get(category).and_then(|t| t.get(test_name)) {
                None => {
                    cmp.unexpected
                        .push((category.clone(), test_name.clone(), *outcome));
                }
                Some(exp) if exp != outcome => {
                    cmp.incorrect
                        .push((category.clone(), test_name.clone(), *exp, *outcome));
                }
                Some(_) => {}
            }
        }
    }

    for (category, by_test) in expected {
        for (test_name, outcome) in by_test {
            if actual.get(category).and_then(|t| t.get(test_name)).is_none() {
                cmp.missing
                    .push((category.clone(), test_name.clone(), *outcome));
            }
        }
    }

    cmp
}

/// Load the stored actual and expected results for (display, config) and
/// diff them.
pub fn compare_stored(results_root: &Path, display: &str, config: &str) -> Result<ComparisonReport> {
    let expected = load_report(&expected_path(results_root, display, config))?;
    let actual = load_report(&results_path(results_root, display, config))?;
    Ok(compare(&expected.results, &actual.results))
}

/// Same diff, but against the cross-backend ideal baseline instead of the
/// display-specific expectation.
pub fn compare_stored_to_ideal(
    results_root: &Path,
    display: &str,
    config: &str,
) -> Result<ComparisonReport> {
    let expected = load_report(&ideal_path(results_root))?;
    let actual = load_report(&results_path(results_root, display, config))?;
    Ok(compare(&expected.results, &actual.results))
}

pub fn render_human(cmp: &ComparisonReport, display: &str, config: &str) -> String {
    let mut out = String::new();
    if cmp.is_clean() {
        out.push_str(&format!(
            "{}\n",
            format!("Results for {display}-{config} are exactly as expected.").green()
        ));
        return out;
    }
    out.push_str(&format!("For {display}-{config}:\n"));
    if !cmp.unexpected.is_empty() {
        out.push_str(&format!("  {}\n", "Tests with no expected result:".yellow().bold()));
        for (cat, test, res) in &cmp.unexpected {
            out.push_str(&format!("    * {cat} / {test}: {res}\n"));
        }
    }
    if !cmp.incorrect.is_empty() {
        out.push_str(&format!("  {}\n", "Tests with incorrect results:".red().bold()));
        for (cat, test, exp, act) in &cmp.incorrect {
            out.push_str(&format!(
                "    * {cat} / {test}: expected: {} actual: {}\n",
                exp.to_string().green(),
                act.to_string().red()
            ));
        }
    }
    if !cmp.missing.is_empty() {
        out.push_str(&format!("  {}\n", "Expected tests not present:".red().bold()));
        for (cat, test, res) in &cmp.missing {
            out.push_str(&format!("    * {cat} / {test}: {res}\n"));
        }
    }
    out
}

pub fn print_human(cmp: &ComparisonReport, display: &str, config: &str) {
    print!("{}", render_human(cmp, display, config));
}
