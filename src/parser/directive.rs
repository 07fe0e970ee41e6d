use std::sync::LazyLock;

use regex::Regex;

use crate::metrics::Exclusion;

static GROUP_TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)group-title="([^"]*)""#).unwrap());

/// Lowercased `group-title` value of a directive line, or `""` when absent.
pub fn group_title(directive: &str) -> String {
    GROUP_TITLE_RE
        .captures(directive)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_lowercase())
        .unwrap_or_default()
}

/// Display title: trimmed text after the last comma, or `""` without one.
pub fn title(directive: &str) -> &str {
    directive
        .rsplit_once(',')
        .map(|(_, t)| t.trim())
        .unwrap_or("")
}

/// Excluded groups and language tokens, stored lowercased.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filters {
    groups: Vec<String>,
    languages: Vec<String>,
}

impl Filters {
    pub fn new<G, L>(groups: G, languages: L) -> Self
    where
        G: IntoIterator,
        G::Item: AsRef<str>,
        L: IntoIterator,
        L::Item: AsRef<str>,
    {
        Filters {
            groups: normalize(groups),
            languages: normalize(languages),
        }
    }

    pub fn is_excluded_group(&self, group: &str) -> bool {
        self.groups.iter().any(|g| g == group)
    }

    pub fn is_excluded_language(&self, title: &str) -> bool {
        let lower = title.to_lowercase();
        self.languages.iter().any(|lang| lower.contains(lang.as_str()))
    }

    /// Group is checked first; the title is only extracted when the group passes.
    pub fn check(&self, directive: &str) -> Option<Exclusion> {
        if self.is_excluded_group(&group_title(directive)) {
            return Some(Exclusion::Group);
        }
        if self.is_excluded_language(title(directive)) {
            return Some(Exclusion::Language);
        }
        None
    }
}

fn normalize<I>(tokens: I) -> Vec<String>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    tokens
        .into_iter()
        .map(|t| t.as_ref().trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}
