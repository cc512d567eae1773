//! Custom filename rules, compiled once per run.
//!
//! Regex rules pass a complexity check before compilation so a bad
//! pattern in a config file cannot stall the pipeline.

use crate::config::{PatternKind, PatternRule};
use crate::error::{FlowError, Result};
use globset::{GlobBuilder, GlobMatcher};
use regex::Regex;
use std::path::{Path, PathBuf};

/// Maximum allowed regex pattern length
const MAX_PATTERN_LENGTH: usize = 500;

/// Maximum number of capturing groups allowed
const MAX_GROUPS: usize = 10;

#[derive(Debug, Clone)]
enum Matcher {
    Glob(GlobMatcher),
    Regex(Regex),
}

/// One compiled rule
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub pattern: String,
    pub destination: PathBuf,
    pub split_sensitivity: bool,
    matcher: Matcher,
}

impl CompiledRule {
    pub fn matches(&self, file_name: &str) -> bool {
        match &self.matcher {
            Matcher::Glob(glob) => glob.is_match(file_name),
            Matcher::Regex(re) => re.is_match(file_name),
        }
    }

    /// Relative destinations hang off the destination root
    pub fn resolve_destination(&self, destination_root: &Path) -> PathBuf {
        if self.destination.is_absolute() {
            self.destination.clone()
        } else {
            destination_root.join(&self.destination)
        }
    }
}

/// Ordered rules; first match wins
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<CompiledRule>,
}

impl RuleSet {
    pub fn compile(rules: &[PatternRule]) -> Result<Self> {
        let compiled = rules
            .iter()
            .enumerate()
            .map(|(index, rule)| compile_rule(index, rule))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rules: compiled })
    }

    pub fn first_match(&self, file_name: &str) -> Option<&CompiledRule> {
        self.rules.iter().find(|r| r.matches(file_name))
    }

    pub fn iter(&self) -> impl Iterator<Item = &CompiledRule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

fn compile_rule(index: usize, rule: &PatternRule) -> Result<CompiledRule> {
    let invalid = |reason: String| {
        FlowError::config(format!(
            "pattern rule #{} ({}): {}",
            index + 1,
            rule.pattern,
            reason
        ))
    };

    if rule.pattern.trim().is_empty() {
        return Err(invalid("empty pattern".to_string()));
    }
    if rule.destination.as_os_str().is_empty() {
        return Err(invalid("empty destination".to_string()));
    }

    let matcher = match rule.kind {
        PatternKind::Glob => {
            let glob = GlobBuilder::new(&rule.pattern)
                .case_insensitive(true)
                .build()
                .map_err(|e| invalid(format!("invalid glob: {}", e)))?;
            Matcher::Glob(glob.compile_matcher())
        }
        PatternKind::Regex => Matcher::Regex(safe_regex(&rule.pattern).map_err(invalid)?),
    };

    Ok(CompiledRule {
        pattern: rule.pattern.clone(),
        destination: rule.destination.clone(),
        split_sensitivity: rule.split_sensitivity,
        matcher,
    })
}

/// Compile a regex after rejecting patterns prone to catastrophic backtracking
pub fn safe_regex(pattern: &str) -> std::result::Result<Regex, String> {
    if pattern.len() > MAX_PATTERN_LENGTH {
        return Err(format!(
            "regex too long: {} chars (max {})",
            pattern.len(),
            MAX_PATTERN_LENGTH
        ));
    }

    let groups = count_capturing_groups(pattern);
    if groups > MAX_GROUPS {
        return Err(format!(
            "too many capturing groups: {} (max {})",
            groups, MAX_GROUPS
        ));
    }

    if has_nested_quantifiers(pattern) {
        return Err("nested quantifiers are not allowed".to_string());
    }

    Regex::new(pattern).map_err(|e| format!("invalid regex: {}", e))
}

fn count_capturing_groups(pattern: &str) -> usize {
    let mut count = 0;
    let mut chars = pattern.chars().peekable();
    let mut escaped = false;

    while let Some(c) = chars.next() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '(' if chars.peek() != Some(&'?') => count += 1,
            _ => {}
        }
    }

    count
}

/// `(...)+` where the group body itself has a quantifier
fn has_nested_quantifiers(pattern: &str) -> bool {
    let quantifiers = ['+', '*', '?', '{'];
    // one flag per open group
    let mut stack: Vec<bool> = Vec::new();
    let mut chars = pattern.chars().peekable();
    let mut escaped = false;

    while let Some(c) = chars.next() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '(' => {
                stack.push(false);
                // skip the `?` of `(?:` / `(?i)` so it is not read as a quantifier
                if chars.peek() == Some(&'?') {
                    chars.next();
                }
            }
            ')' => {
                let inner = stack.pop().unwrap_or(false);
                let quantified = chars.peek().is_some_and(|n| quantifiers.contains(n));
                if inner && quantified {
                    return true;
                }
                if let Some(parent) = stack.last_mut() {
                    *parent |= inner || quantified;
                }
            }
            c if quantifiers.contains(&c) => {
                if let Some(top) = stack.last_mut() {
                    *top = true;
                }
            }
            _ => {}
        }
    }

    false
}
