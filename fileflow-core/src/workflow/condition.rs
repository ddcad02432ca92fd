//! Condition evaluation against file metadata
//!
//! Evaluation is pure and fail-closed: a value that cannot be parsed for the
//! operator in use, an invalid regex, or an operator that makes no sense for the
//! condition type all evaluate to `false`.

use super::{Condition, ConditionType, Operator};
use std::path::Path;
use std::time::SystemTime;
use tracing::{debug, trace};

const KB: i64 = 1024;
const MB: i64 = 1024 * KB;
const GB: i64 = 1024 * MB;

/// The subset of file metadata conditions look at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileMetadata {
    pub size: u64,
    pub modified: SystemTime,
}

impl From<&std::fs::Metadata> for FileMetadata {
    fn from(meta: &std::fs::Metadata) -> Self {
        Self {
            size: meta.len(),
            modified: meta.modified().unwrap_or_else(|_| SystemTime::now()),
        }
    }
}

/// Evaluates structured conditions
#[derive(Debug, Default, Clone, Copy)]
pub struct ConditionEvaluator;

impl ConditionEvaluator {
    pub fn new() -> Self {
        Self
    }

    /// Evaluate a single condition using the current time for age checks
    pub fn evaluate(&self, condition: &Condition, path: &Path, meta: &FileMetadata) -> bool {
        self.evaluate_at(condition, path, meta, SystemTime::now())
    }

    /// AND of every condition; an empty list matches
    pub fn evaluate_all(&self, conditions: &[Condition], path: &Path, meta: &FileMetadata) -> bool {
        let now = SystemTime::now();
        conditions.iter().all(|c| self.evaluate_at(c, path, meta, now))
    }

    /// Evaluate a single condition as of `now`
    pub fn evaluate_at(
        &self,
        condition: &Condition,
        path: &Path,
        meta: &FileMetadata,
        now: SystemTime,
    ) -> bool {
        let result = match condition.condition_type {
            ConditionType::FileSize => eval_size(condition, meta),
            ConditionType::FileName => eval_name(condition, path),
            ConditionType::FileType => eval_type(condition, path),
            ConditionType::FileAge => eval_age(condition, meta, now),
        };
        trace!(
            "Condition {:?} {:?} {:?} on {:?} => {}",
            condition.condition_type, condition.operator, condition.value, path, result
        );
        result
    }
}

fn size_multiplier(unit: Option<&str>) -> i64 {
    match unit.map(|u| u.trim().to_ascii_uppercase()).as_deref() {
        Some("KB") => KB,
        Some("MB") => MB,
        Some("GB") => GB,
        _ => 1,
    }
}

fn age_multiplier(unit: Option<&str>) -> f64 {
    match unit.map(|u| u.trim().to_ascii_lowercase()).as_deref() {
        Some("minutes") | Some("minute") => 60.0,
        Some("hours") | Some("hour") => 3600.0,
        Some("days") | Some("day") => 86400.0,
        _ => 1.0,
    }
}

fn eval_size(condition: &Condition, meta: &FileMetadata) -> bool {
    let Ok(value) = condition.value.trim().parse::<i64>() else {
        debug!("Unparsable size value {:?}", condition.value);
        return false;
    };
    let Some(threshold) = value.checked_mul(size_multiplier(condition.value_unit.as_deref())) else {
        return false;
    };
    let size = i64::try_from(meta.size).unwrap_or(i64::MAX);

    match condition.operator {
        Operator::Equals => size == threshold,
        Operator::NotEquals => size != threshold,
        Operator::GreaterThan => size > threshold,
        Operator::LessThan => size < threshold,
        _ => false,
    }
}

fn eval_name(condition: &Condition, path: &Path) -> bool {
    let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
    let value = condition.value.as_str();

    match condition.operator {
        Operator::Equals => name == value,
        Operator::NotEquals => name != value,
        Operator::Contains => name.contains(value),
        Operator::StartsWith => name.starts_with(value),
        Operator::EndsWith => name.ends_with(value),
        Operator::MatchesRegex => match regex_utils::dynamic::is_match(value, &name) {
            Some(matched) => matched,
            None => {
                debug!("Invalid regex in condition: {:?}", value);
                false
            }
        },
        _ => false,
    }
}

fn normalize_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_lowercase()
}

fn eval_type(condition: &Condition, path: &Path) -> bool {
    let ext = path.extension().map(|e| e.to_string_lossy().to_lowercase()).unwrap_or_default();
    let value = normalize_extension(&condition.value);

    match condition.operator {
        Operator::Equals => ext == value,
        Operator::NotEquals => ext != value,
        Operator::Contains => ext.contains(&value),
        _ => false,
    }
}

fn elapsed_seconds(modified: SystemTime, now: SystemTime) -> f64 {
    match now.duration_since(modified) {
        Ok(elapsed) => elapsed.as_secs_f64(),
        // modification time in the future
        Err(e) => -e.duration().as_secs_f64(),
    }
}

fn eval_age(condition: &Condition, meta: &FileMetadata, now: SystemTime) -> bool {
    let Ok(value) = condition.value.trim().parse::<f64>() else {
        debug!("Unparsable age value {:?}", condition.value);
        return false;
    };
    if !value.is_finite() {
        return false;
    }
    let threshold = value * age_multiplier(condition.value_unit.as_deref());
    let age = elapsed_seconds(meta.modified, now);

    // Equals/NotEquals compare elapsed seconds exactly and are practically never satisfied
    match condition.operator {
        Operator::Equals => age == threshold,
        Operator::NotEquals => age != threshold,
        Operator::GreaterThan => age > threshold,
        Operator::LessThan => age < threshold,
        _ => false,
    }
}
