//! Capability-table formatting fallback.
//!
//! Deterministic per-platform formatting used whenever no custom
//! [`FormatterAdapter`](crate::adapters::FormatterAdapter) is registered:
//! the base content is joined with normalized mention/hashtag and source
//! link lines, then shrunk to the platform character limit. Hashtags and
//! the link survive truncation ahead of body text; identical input always
//! yields identical output.

use crate::adapters::{FormatRequest, FormattedContent};
use crate::capabilities::{CapabilityTable, Platform};

/// Smallest body budget worth keeping before dropping suffix lines instead.
const MIN_BODY_CHARS: usize = 8;

/// Format a request using only the capability table.
pub fn format_with_capabilities(request: &FormatRequest) -> FormattedContent {
    let limit = CapabilityTable::text_limit(request.platform);

    let mentions = normalize_prefixed(&request.mentions, '@');
    let hashtags = normalize_prefixed(&request.hashtags, '#');

    let tag_line = {
        let mut parts = mentions.clone();
        parts.extend(hashtags.iter().cloned());
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    };
    let link = request.lien_source.as_deref();
    let base = request.base_content.trim();

    let full = compose(base, tag_line.as_deref(), link);
    let text = if char_count(&full) <= limit {
        full
    } else {
        shrink(base, tag_line.as_deref(), link, limit)
    };

    FormattedContent {
        platform: request.platform,
        character_count: char_count(&text),
        text,
        hashtags,
        mentions,
        lien_source: request.lien_source.clone(),
    }
}

/// Truncate adapter-produced text to the platform character limit.
pub fn clamp_to_limit(platform: Platform, text: &str) -> String {
    truncate_ellipsis(text, CapabilityTable::text_limit(platform))
}

fn shrink(base: &str, tag_line: Option<&str>, link: Option<&str>, limit: usize) -> String {
    let suffix_chars = char_count(&compose("", tag_line, link));
    if suffix_chars + MIN_BODY_CHARS <= limit {
        return compose(
            &truncate_ellipsis(base, limit - suffix_chars),
            tag_line,
            link,
        );
    }

    // The tag line does not fit; keep the link if that alone does.
    let link_chars = char_count(&compose("", None, link));
    if link.is_some() && link_chars + MIN_BODY_CHARS <= limit {
        return compose(&truncate_ellipsis(base, limit - link_chars), None, link);
    }

    truncate_ellipsis(base, limit)
}

fn compose(base: &str, tag_line: Option<&str>, link: Option<&str>) -> String {
    let mut out = String::from(base);
    if let Some(tags) = tag_line {
        out.push_str("\n\n");
        out.push_str(tags);
    }
    if let Some(link) = link {
        out.push_str("\n\n");
        out.push_str(link);
    }
    out
}

fn normalize_prefixed(values: &[String], prefix: char) -> Vec<String> {
    values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(|v| {
            if v.starts_with(prefix) {
                v.to_string()
            } else {
                format!("{prefix}{v}")
            }
        })
        .collect()
}

fn char_count(text: &str) -> usize {
    text.chars().count()
}

fn truncate_ellipsis(text: &str, max_chars: usize) -> String {
    if char_count(text) <= max_chars {
        return text.to_string();
    }
    if max_chars == 0 {
        return String::new();
    }
    let cut: String = text.chars().take(max_chars - 1).collect();
    // Prefer a word boundary when one sits in the back half of the cut.
    let trimmed = match cut.rfind(char::is_whitespace) {
        Some(idx) if idx > cut.len() / 2 => cut[..idx].trim_end().to_string(),
        _ => cut,
    };
    format!("{trimmed}…")
}
