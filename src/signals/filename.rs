//! Keyword matching on the file name.

use super::SignalExtractor;
use crate::models::{Abstain, FileRecord, SignalScore, SignalSource};

/// Score when nothing matched
const NEUTRAL_SCORE: f64 = 0.5;
const MATCH_SCORE: f64 = 0.85;
const EXTRA_MATCH_STEP: f64 = 0.05;
const MAX_MATCH_SCORE: f64 = 0.95;

/// A compiled keyword: one or more tokens, the last optionally a prefix
#[derive(Debug, Clone, PartialEq)]
struct Keyword {
    raw: String,
    tokens: Vec<String>,
    prefix: bool,
}

impl Keyword {
    fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim().to_lowercase();
        let (body, prefix) = match trimmed.strip_suffix('*') {
            Some(body) => (body.to_string(), true),
            None => (trimmed.clone(), false),
        };
        let tokens = tokenize(&body);
        if tokens.is_empty() {
            return None;
        }
        Some(Self {
            raw: trimmed,
            tokens,
            prefix,
        })
    }

    fn matches(&self, name_tokens: &[String]) -> bool {
        let n = self.tokens.len();
        if name_tokens.len() < n {
            return false;
        }
        name_tokens.windows(n).any(|window| {
            window.iter().zip(&self.tokens).enumerate().all(|(i, (have, want))| {
                if self.prefix && i == n - 1 {
                    have.starts_with(want.as_str())
                } else {
                    have == want
                }
            })
        })
    }
}

/// Lowercase alphanumeric runs; everything else separates tokens
pub fn tokenize(name: &str) -> Vec<String> {
    name.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

pub struct FilenameExtractor {
    enabled: bool,
    sensitive: Vec<Keyword>,
    safe: Vec<Keyword>,
}

impl FilenameExtractor {
    pub fn new(enabled: bool, sensitive_keywords: &[String], safe_keywords: &[String]) -> Self {
        Self {
            enabled,
            sensitive: sensitive_keywords.iter().filter_map(|k| Keyword::parse(k)).collect(),
            safe: safe_keywords.iter().filter_map(|k| Keyword::parse(k)).collect(),
        }
    }

    fn matched<'a>(keywords: &'a [Keyword], tokens: &[String]) -> Vec<&'a str> {
        keywords
            .iter()
            .filter(|k| k.matches(tokens))
            .map(|k| k.raw.as_str())
            .collect()
    }
}

impl SignalExtractor for FilenameExtractor {
    fn source(&self) -> SignalSource {
        SignalSource::Filename
    }

    fn analyze(&self, record: &FileRecord) -> SignalScore {
        if !self.enabled {
            return SignalScore::abstain(SignalSource::Filename, Abstain::Disabled);
        }

        let tokens = tokenize(&record.file_stem());

        let safe_hits = Self::matched(&self.safe, &tokens);
        if !safe_hits.is_empty() {
            let mut score = SignalScore::new(SignalSource::Filename, 0.0, 1.0)
                .with_detail(format!("safe keyword: {}", safe_hits.join(", ")));
            score.safe_override = true;
            return score;
        }

        let sensitive_hits = Self::matched(&self.sensitive, &tokens);
        if sensitive_hits.is_empty() {
            return SignalScore::new(SignalSource::Filename, NEUTRAL_SCORE, 1.0)
                .with_detail("no keyword");
        }

        let extra = (sensitive_hits.len() - 1) as f64 * EXTRA_MATCH_STEP;
        SignalScore::new(
            SignalSource::Filename,
            (MATCH_SCORE + extra).min(MAX_MATCH_SCORE),
            1.0,
        )
        .with_detail(format!("{} sensitive keyword(s)", sensitive_hits.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FlowConfig;

    fn extractor() -> FilenameExtractor {
        let c = FlowConfig::default().classification;
        FilenameExtractor::new(true, &c.sensitive_keywords, &c.safe_keywords)
    }

    fn score(name: &str) -> SignalScore {
        extractor().analyze(&FileRecord::synthetic(format!("/drop/{}", name), "fp", 1))
    }

    #[test]
    fn test_tokenize() {
        assert_eq!(
            tokenize("Beach-Day_2024 (copy).final"),
            vec!["beach", "day", "2024", "copy", "final"]
        );
    }

    #[test]
    fn test_neutral_name() {
        let s = score("photo_IMG_0099.jpg");
        assert_eq!(s.sensitivity_score, NEUTRAL_SCORE);
        assert_eq!(s.confidence, 1.0);
        assert!(!s.safe_override);
    }

    #[test]
    fn test_sensitive_keyword() {
        let s = score("my_nsfw_clip.mp4");
        assert!(s.sensitivity_score >= MATCH_SCORE);
        assert_eq!(s.confidence, 1.0);
    }

    #[test]
    fn test_multiple_sensitive_keywords_capped() {
        let s = score("xxx porn nude naked nsfw.jpg");
        assert_eq!(s.sensitivity_score, MAX_MATCH_SCORE);
    }

    #[test]
    fn test_whole_token_matching() {
        // "sex" must not match inside "sussex"
        let s = score("sussex_coastline.jpg");
        assert_eq!(s.sensitivity_score, NEUTRAL_SCORE);
    }

    #[test]
    fn test_prefix_keyword() {
        let s = score("masturbation_notes.txt");
        assert!(s.sensitivity_score >= MATCH_SCORE);
    }

    #[test]
    fn test_safe_keyword_wins() {
        let s = score("family_nude_beach.jpg");
        assert!(s.safe_override);
        assert_eq!(s.sensitivity_score, 0.0);
        assert_eq!(s.confidence, 1.0);
    }

    #[test]
    fn test_multi_word_keyword() {
        let e = FilenameExtractor::new(true, &["hot tub".to_string()], &[]);
        let hit = e.analyze(&FileRecord::synthetic("/d/Hot-Tub party.jpg", "fp", 1));
        let miss = e.analyze(&FileRecord::synthetic("/d/hot coffee tub.jpg", "fp", 1));
        assert!(hit.sensitivity_score >= MATCH_SCORE);
        assert_eq!(miss.sensitivity_score, NEUTRAL_SCORE);
    }

    #[test]
    fn test_disabled_abstains() {
        let e = FilenameExtractor::new(false, &[], &[]);
        let s = e.analyze(&FileRecord::synthetic("/d/porn.jpg", "fp", 1));
        assert_eq!(s.confidence, 0.0);
    }
}
