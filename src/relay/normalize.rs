use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

pub const MAX_BULLETS: usize = 3;

static NUMBERED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+\.").unwrap());

/// How raw model output is cleaned before it reaches the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizationPolicy {
    /// Return the model text untouched.
    PassThrough,
    /// Keep the first three `-` or `N.` lines, dropping the numeric markers.
    #[default]
    BulletExtraction,
}

impl NormalizationPolicy {
    pub fn apply(self, raw: &str) -> String {
        match self {
            NormalizationPolicy::PassThrough => raw.to_string(),
            NormalizationPolicy::BulletExtraction => extract_bullets(raw),
        }
    }
}

fn extract_bullets(raw: &str) -> String {
    raw.lines()
        .map(str::trim)
        .filter(|line| line.starts_with('-') || NUMBERED.is_match(line))
        .take(MAX_BULLETS)
        .map(|line| NUMBERED.replace(line, "").trim().to_string())
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_numbered_lines_and_strips_markers() {
        let raw = "1. Use vaccine X [Chanjo]\n2. Feed Y\nRandom aside.";
        assert_eq!(
            NormalizationPolicy::BulletExtraction.apply(raw),
            "Use vaccine X [Chanjo]\nFeed Y"
        );
    }

    #[test]
    fn never_more_than_three_lines() {
        let raw = "Intro\n1. a\n- b\n2. c\n3. d\n- e\n4. f";
        let out = NormalizationPolicy::BulletExtraction.apply(raw);
        assert_eq!(out, "a\n- b\nc");
        assert!(out.lines().count() <= MAX_BULLETS);
    }

    #[test]
    fn indented_markers_qualify() {
        let raw = "Jibu:\n   1. Chanja kuku\n   - Safisha banda\n";
        assert_eq!(
            NormalizationPolicy::BulletExtraction.apply(raw),
            "Chanja kuku\n- Safisha banda"
        );
    }

    #[test]
    fn no_marker_lines_yield_empty_string() {
        let raw = "Kuku wako wanahitaji maji safi.\nAsante.";
        assert_eq!(NormalizationPolicy::BulletExtraction.apply(raw), "");
        assert_eq!(NormalizationPolicy::BulletExtraction.apply(""), "");
    }

    #[test]
    fn dash_output_is_a_fixed_point() {
        let once = NormalizationPolicy::BulletExtraction.apply("- a\n- b\n- c\n- d\nnoise");
        let twice = NormalizationPolicy::BulletExtraction.apply(&once);
        assert_eq!(once, "- a\n- b\n- c");
        assert_eq!(once, twice);
    }

    #[test]
    fn only_leading_number_is_stripped() {
        assert_eq!(
            NormalizationPolicy::BulletExtraction.apply("12. Give 1.5 kg feed"),
            "Give 1.5 kg feed"
        );
        assert_eq!(
            NormalizationPolicy::BulletExtraction.apply("Mix 2. parts\n1) not a marker"),
            ""
        );
    }

    #[test]
    fn pass_through_is_verbatim() {
        let raw = "  anything\n goes \n";
        assert_eq!(NormalizationPolicy::PassThrough.apply(raw), raw);
    }

    #[test]
    fn policy_parses_from_config_names() {
        let policy: NormalizationPolicy = serde_json::from_str("\"pass_through\"").unwrap();
        assert_eq!(policy, NormalizationPolicy::PassThrough);
        let policy: NormalizationPolicy = serde_json::from_str("\"bullet_extraction\"").unwrap();
        assert_eq!(policy, NormalizationPolicy::BulletExtraction);
    }
}
