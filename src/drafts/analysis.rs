//! Content-quality analysis for staged drafts.
//!
//! Pure function of the text and the platform's capability entry. The
//! same input always produces the same counts, score, and
//! recommendations, so analyses can be recomputed and compared safely.

use crate::capabilities::{CapabilityTable, Platform};
use crate::models::ContentAnalysis;

/// Utilization ratio above which content counts as near the limit.
const NEAR_LIMIT_RATIO: f64 = 0.9;

/// Below this many characters the content is flagged as thin.
const SHORT_CONTENT_CHARS: usize = 20;

const MAX_RECOMMENDED_HASHTAGS: usize = 5;
const MAX_RECOMMENDED_MENTIONS: usize = 3;
const MAX_RECOMMENDED_EMOJI: usize = 8;

/// Analyze draft text against the platform's limits.
pub fn analyze_content(platform: Platform, text: &str) -> ContentAnalysis {
    let character_count = text.chars().count();
    let character_limit = CapabilityTable::text_limit(platform);
    let hashtag_count = count_prefixed_tokens(text, '#');
    let mention_count = count_prefixed_tokens(text, '@');
    let emoji_count = text.chars().filter(|c| is_emoji(*c)).count();

    if character_count == 0 {
        return ContentAnalysis {
            character_count,
            character_limit,
            within_limit: true,
            hashtag_count,
            mention_count,
            emoji_count,
            quality_score: 0,
            recommendations: vec!["Content is empty".to_string()],
        };
    }

    let mut score: i32 = 100;
    let mut recommendations = Vec::new();

    if character_count > character_limit {
        score -= 40;
        recommendations.push(format!(
            "Exceeds the {} limit of {} characters; the text will be truncated at publish time",
            platform.as_str(),
            character_limit
        ));
    } else if character_count as f64 >= character_limit as f64 * NEAR_LIMIT_RATIO {
        score -= 10;
        recommendations.push(format!(
            "Close to the {} character limit ({}/{})",
            platform.as_str(),
            character_count,
            character_limit
        ));
    }

    if character_count < SHORT_CONTENT_CHARS {
        score -= 15;
        recommendations.push("Very short; consider adding more context".to_string());
    }

    if hashtag_count == 0 {
        score -= 10;
        recommendations.push("No hashtags; one or two improve discoverability".to_string());
    } else if hashtag_count > MAX_RECOMMENDED_HASHTAGS {
        score -= 10;
        recommendations.push(format!(
            "{hashtag_count} hashtags reads as spam on most feeds; keep it under {MAX_RECOMMENDED_HASHTAGS}"
        ));
    }

    if mention_count > MAX_RECOMMENDED_MENTIONS {
        score -= 5;
        recommendations.push("Heavy mention usage; tag only the accounts that matter".to_string());
    }

    if emoji_count == 0 {
        score -= 5;
        recommendations.push("No emoji; a light touch can lift engagement".to_string());
    } else if emoji_count > MAX_RECOMMENDED_EMOJI {
        score -= 5;
        recommendations.push("Emoji-heavy content can hurt readability".to_string());
    }

    ContentAnalysis {
        character_count,
        character_limit,
        within_limit: character_count <= character_limit,
        hashtag_count,
        mention_count,
        emoji_count,
        quality_score: score.clamp(0, 100) as u8,
        recommendations,
    }
}

fn count_prefixed_tokens(text: &str, prefix: char) -> usize {
    text.split_whitespace()
        .filter(|token| {
            token
                .strip_prefix(prefix)
                .is_some_and(|rest| rest.chars().next().is_some_and(char::is_alphanumeric))
        })
        .count()
}

/// Covers the common emoji blocks; flag characters and modifiers in
/// rarer planes are intentionally not chased.
fn is_emoji(c: char) -> bool {
    matches!(
        c as u32,
        0x1F300..=0x1F5FF // symbols & pictographs
            | 0x1F600..=0x1F64F // emoticons
            | 0x1F680..=0x1F6FF // transport & map
            | 0x1F900..=0x1F9FF // supplemental symbols
            | 0x1FA70..=0x1FAFF // extended-A
            | 0x2600..=0x26FF // miscellaneous symbols
            | 0x2700..=0x27BF // dingbats
    )
}
