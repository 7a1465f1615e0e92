//! Generated `## Links` section: rendering, extraction and stripping.
//!
//! # Invariants
//! - A line reading exactly `## Links` (trailing text after whitespace
//!   allowed) opens the section; the next `## ` heading closes it.
//! - Inside the section, `- <kind> [[<target>]] <description>` bullets are links.
//! - Malformed bullets are skipped and logged, never fatal.

use crate::model::kind::{Enumerated, KindPolicy, LinkKind};
use crate::model::link::{collapse_whitespace, normalize_description, Link};
use log::{debug, error};
use once_cell::sync::Lazy;
use regex::Regex;

pub const LINKS_HEADING: &str = "## Links";
const SECTION_HEADING_PREFIX: &str = "## ";

static LINK_BULLET_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[-*]\s+(?P<kind>.*?)\s*\[\[(?P<target>[^\[\]]*)\]\]\s*(?P<description>.*)$")
        .expect("valid link bullet regex")
});

/// Whether `content` already carries a links heading line.
pub fn has_links_heading(content: &str) -> bool {
    content
        .lines()
        .any(|line| is_links_heading(line.trim()))
}

/// `## Links`, optionally followed by whitespace and more text.
/// `## Linksheet` is an ordinary heading.
fn is_links_heading(trimmed: &str) -> bool {
    trimmed
        .strip_prefix(LINKS_HEADING)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with(char::is_whitespace))
}

/// Renders one bullet line for `link`.
pub fn render_link(link: &Link) -> String {
    let description = link
        .description
        .as_deref()
        .map(collapse_whitespace)
        .unwrap_or_default();
    if description.is_empty() {
        format!("- {} [[{}]]", link.kind.as_str(), link.target_id)
    } else {
        format!(
            "- {} [[{}]] {}",
            link.kind.as_str(),
            link.target_id,
            description
        )
    }
}

/// Renders the full section, heading included. Empty input renders nothing.
pub fn render_section(links: &[Link]) -> Option<String> {
    if links.is_empty() {
        return None;
    }
    let mut lines = Vec::with_capacity(links.len() + 1);
    lines.push(LINKS_HEADING.to_string());
    lines.extend(links.iter().map(render_link));
    Some(lines.join("\n"))
}

/// Extracts links from every links section of `body`.
///
/// Unrecognized kinds fall back to `reference` under the default policy.
/// With `KindPolicy::Strict` such bullets are skipped instead.
pub fn extract_links(source_id: &str, body: &str, policy: KindPolicy) -> Vec<Link> {
    let mut links = Vec::new();
    for line in section_lines(body) {
        if !(line.starts_with("- ") || line.starts_with("* ")) {
            continue;
        }
        match parse_bullet(source_id, line, policy) {
            Some(link) => links.push(link),
            None => error!(
                "event=link_parse module=codec status=error source_id={} line={}",
                source_id, line
            ),
        }
    }
    links
}

/// Removes links sections (heading and bullets) from `body`.
pub fn strip_section(body: &str) -> String {
    let mut in_section = false;
    let mut kept = Vec::new();
    for line in body.lines() {
        let trimmed = line.trim();
        if is_links_heading(trimmed) {
            in_section = true;
            continue;
        }
        if in_section && trimmed.starts_with(SECTION_HEADING_PREFIX) {
            in_section = false;
        }
        if !in_section {
            kept.push(line);
        }
    }
    kept.join("\n")
}

fn section_lines(body: &str) -> Vec<&str> {
    let mut in_section = false;
    let mut lines = Vec::new();
    for raw in body.lines() {
        let line = raw.trim();
        if is_links_heading(line) {
            in_section = true;
            continue;
        }
        if in_section && line.starts_with(SECTION_HEADING_PREFIX) {
            in_section = false;
            continue;
        }
        if in_section {
            lines.push(line);
        }
    }
    lines
}

fn parse_bullet(source_id: &str, line: &str, policy: KindPolicy) -> Option<Link> {
    let caps = LINK_BULLET_RE.captures(line)?;
    let target = caps.name("target")?.as_str().trim();
    if target.is_empty() {
        return None;
    }

    let raw_kind = caps.name("kind").map_or("", |m| m.as_str());
    let raw_kind = raw_kind
        .trim()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .trim();
    let kind = match policy.resolve(LinkKind::parse(raw_kind)) {
        Ok(resolved) => {
            if resolved.warning.is_some() {
                debug!(
                    "event=link_kind_default module=codec status=ok source_id={} kind={}",
                    source_id, raw_kind
                );
            }
            resolved.value
        }
        Err(_) => return None,
    };

    let mut link = Link::new(source_id, target, kind);
    link.description =
        normalize_description(caps.name("description").map(|m| m.as_str().to_string()));
    Some(link)
}

#[cfg(test)]
mod tests {
    use super::{extract_links, has_links_heading, render_section, strip_section};
    use crate::model::kind::{KindPolicy, LinkKind};
    use crate::model::link::Link;

    const BODY: &str = "Intro\n\n## Links\n- extends [[b]] builds on b\n- [supports] [[c]]\n- cites [[d]]\n- no wiki link here\n- reference [[ ]]\n\n## Notes\n- reference [[outside]]\nTail";

    #[test]
    fn extract_reads_only_the_links_section() {
        let links = extract_links("a", BODY, KindPolicy::SubstituteDefault);
        let summary = links
            .iter()
            .map(|l| (l.target_id.as_str(), l.kind, l.description.as_deref()))
            .collect::<Vec<_>>();
        assert_eq!(
            summary,
            vec![
                ("b", LinkKind::Extends, Some("builds on b")),
                ("c", LinkKind::Supports, None),
                ("d", LinkKind::Reference, None),
            ]
        );
        assert!(links.iter().all(|l| l.source_id == "a"));
    }

    #[test]
    fn strict_policy_skips_unknown_link_kinds() {
        let links = extract_links("a", BODY, KindPolicy::Strict);
        assert_eq!(links.len(), 2);
    }

    #[test]
    fn strip_removes_section_but_keeps_following_headings() {
        let stripped = strip_section(BODY);
        assert_eq!(stripped, "Intro\n\n## Notes\n- reference [[outside]]\nTail");
    }

    #[test]
    fn render_section_formats_bullets() {
        let links = vec![
            Link::new("a", "b", LinkKind::Refines).with_description("why"),
            Link::new("a", "c", LinkKind::Reference),
        ];
        assert_eq!(
            render_section(&links).unwrap(),
            "## Links\n- refines [[b]] why\n- reference [[c]]"
        );
        assert!(render_section(&[]).is_none());
    }

    #[test]
    fn heading_detection_requires_line_start() {
        assert!(has_links_heading("x\n## Links\n"));
        assert!(!has_links_heading("see ## Links inline"));
    }

    #[test]
    fn only_exact_links_heading_opens_section() {
        assert!(has_links_heading("a\n## Links\n"));
        assert!(has_links_heading("  ## Links  \n"));
        assert!(has_links_heading("## Links (outgoing)"));
        assert!(!has_links_heading("## Linksheet\nrow"));
        assert_eq!(strip_section("para\n## Linksheet\nrow"), "para\n## Linksheet\nrow");
    }
}
