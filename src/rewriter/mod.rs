//! # Status Link Rewriting
//!
//! Finds `twitter.com` and `x.com` status links in message text and points them
//! at mirror domains that Discord can render a preview for.
//!
//! | Source        | Mirror          |
//! |---------------|-----------------|
//! | `twitter.com` | `fxtwitter.com` |
//! | `x.com`       | `fixupx.com`    |
//!
//! Rewritten links always use `https://`, never carry `www.` and lose their
//! query string. A link wrapped in `<` and `>` is how Discord users suppress
//! previews, so those spans are left exactly as typed.

use regex::Regex;
use std::sync::LazyLock;

/// Cheap check used before any preview inspection happens.
static STATUS_LINK_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https?://(www\.)?(twitter\.com|x\.com)/[a-zA-Z0-9_]+/status/[0-9]+").unwrap()
});

/// Full link shape including an optional escape bracket, query string and
/// trailing path. Digits and whitespace are ASCII only; `\d` and `\s` would
/// also accept Unicode digits and spaces.
static REWRITE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(<)?https?://(www\.)?(twitter\.com|x\.com)/([^/]+)/status/([0-9]+)(\?[^\t\n\f\r <>]*)?([^<\t\n\f\r ]*)>?",
    )
    .unwrap()
});

/// Domain a status link was posted from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceDomain {
    Twitter,
    X,
}

impl SourceDomain {
    pub fn host(self) -> &'static str {
        match self {
            Self::Twitter => "twitter.com",
            Self::X => "x.com",
        }
    }

    /// Embed-friendly domain that replaces this one
    pub fn mirror(self) -> &'static str {
        match self {
            Self::Twitter => "fxtwitter.com",
            Self::X => "fixupx.com",
        }
    }

    fn from_host(host: &str) -> Option<Self> {
        match host {
            "twitter.com" => Some(Self::Twitter),
            "x.com" => Some(Self::X),
            _ => None,
        }
    }
}

/// A status link found in message text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLink<'a> {
    pub domain: SourceDomain,
    pub handle: &'a str,
    pub id: &'a str,
    /// Wrapped in `<...>` by the author
    pub escaped: bool,
}

impl StatusLink<'_> {
    /// Canonical mirror URL, without any trailing path the posted link carried
    pub fn mirror_url(&self) -> String {
        format!(
            "https://{}/{}/status/{}",
            self.domain.mirror(),
            self.handle,
            self.id
        )
    }
}

/// Returns `true` if `content` holds at least one status link.
pub fn contains_status_link(content: &str) -> bool {
    STATUS_LINK_REGEX.is_match(content)
}

/// Lists every status link in `content`, escaped ones included.
pub fn find_status_links(content: &str) -> Vec<StatusLink<'_>> {
    REWRITE_REGEX
        .captures_iter(content)
        .filter_map(|caps| {
            let whole = caps.get(0)?.as_str();
            Some(StatusLink {
                domain: SourceDomain::from_host(caps.get(3)?.as_str())?,
                handle: caps.get(4)?.as_str(),
                id: caps.get(5)?.as_str(),
                escaped: is_escaped(whole),
            })
        })
        .collect()
}

/// Replaces every non-escaped status link in `content` with its mirror link.
///
/// Text without a qualifying link comes back unchanged.
pub fn rewrite_links(content: &str) -> String {
    REWRITE_REGEX
        .replace_all(content, |caps: &regex::Captures<'_>| {
            let matched = &caps[0];
            if is_escaped(matched) {
                matched.to_string()
            } else {
                rewrite_single_link(matched)
            }
        })
        .into_owned()
}

fn is_escaped(matched: &str) -> bool {
    matched.starts_with('<') && matched.ends_with('>')
}

fn rewrite_single_link(link: &str) -> String {
    let link = link.split_once('?').map_or(link, |(before, _)| before);

    let stripped = link
        .strip_prefix("http://")
        .or_else(|| link.strip_prefix("https://"))
        .unwrap_or(link);
    let stripped = stripped.strip_prefix("www.").unwrap_or(stripped);

    for domain in [SourceDomain::Twitter, SourceDomain::X] {
        if let Some(rest) = stripped.strip_prefix(domain.host()) {
            return format!("https://{}{rest}", domain.mirror());
        }
    }

    // Only reachable for an unclosed `<` prefix, which is left as typed.
    link.to_string()
}
