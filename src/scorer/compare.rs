//! GAIA answer comparison.
//!
//! Three regimes, chosen by the shape of the ground truth:
//! - a number: the model answer is parsed as a float after dropping `$`, `%`
//!   and `,`
//! - a list (contains `,` or `;`): element-wise, numeric or string per
//!   ground-truth element
//! - anything else: normalized string equality

use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, warn};

fn list_separator() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[,;]").expect("Invalid regex for list separators"))
}

fn is_float(value: &str) -> bool {
    value.trim().parse::<f64>().is_ok()
}

/// Parse a numeric answer. Unparseable input maps to infinity so it never
/// equals a finite ground truth.
pub fn normalize_number_str(number: &str) -> f64 {
    let cleaned: String = number
        .chars()
        .filter(|c| !matches!(c, '$' | '%' | ','))
        .collect();
    match cleaned.trim().parse::<f64>() {
        Ok(value) => value,
        Err(_) => {
            debug!(input = %number, "Answer is not a number");
            f64::INFINITY
        }
    }
}

/// Drop all whitespace, optionally ASCII punctuation, and lowercase.
pub fn normalize_str(input: &str, remove_punct: bool) -> String {
    input
        .chars()
        .filter(|c| !c.is_whitespace())
        .filter(|c| !(remove_punct && c.is_ascii_punctuation()))
        .flat_map(char::to_lowercase)
        .collect()
}

fn split_list(value: &str) -> Vec<&str> {
    list_separator().split(value).collect()
}

/// Whether `model_answer` matches `ground_truth` under GAIA rules.
pub fn question_scorer(model_answer: &str, ground_truth: &str) -> bool {
    if is_float(ground_truth) {
        return normalize_number_str(model_answer) == normalize_number_str(ground_truth);
    }

    if ground_truth.contains([',', ';']) {
        let gt_elems = split_list(ground_truth);
        let ma_elems = split_list(model_answer);
        if gt_elems.len() != ma_elems.len() {
            warn!(
                expected = gt_elems.len(),
                got = ma_elems.len(),
                "Answer lists have different lengths"
            );
            return false;
        }

        return ma_elems.iter().zip(&gt_elems).all(|(ma, gt)| {
            if is_float(gt) {
                normalize_number_str(ma) == normalize_number_str(gt)
            } else {
                normalize_str(ma, false) == normalize_str(gt, false)
            }
        });
    }

    normalize_str(model_answer, true) == normalize_str(ground_truth, true)
}
