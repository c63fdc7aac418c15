//! "Did you mean" hints for unknown names

use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;

/// Best fuzzy match for `needle` among `candidates`, if any scores at all
pub fn closest<'a, I>(needle: &str, candidates: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let matcher = SkimMatcherV2::default();
    candidates
        .into_iter()
        .filter(|c| *c != needle)
        .filter_map(|c| matcher.fuzzy_match(c, needle).map(|score| (score, c)))
        // ties go to the lexicographically smallest candidate
        .max_by(|(sa, ca), (sb, cb)| sa.cmp(sb).then_with(|| cb.cmp(ca)))
        .map(|(_, c)| c)
}

/// Context line for a diagnostic, or `None` when nothing is close
pub fn hint<'a, I>(needle: &str, candidates: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    closest(needle, candidates).map(|c| format!("did you mean '{}'?", c))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closest_prefers_best_score() {
        let names = ["base_skill", "text_classification", "text_generation"];
        assert_eq!(closest("text_gen", names), Some("text_generation"));
        assert_eq!(closest("zzz", names), None);
    }

    #[test]
    fn test_hint_format() {
        assert_eq!(
            hint("recrd", ["record", "locator"]).as_deref(),
            Some("did you mean 'record'?")
        );
    }
}
