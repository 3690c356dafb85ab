//! Extension allow-list.
//! Decides whether a target URL may be relayed based on its file extension.

use std::collections::HashSet;

use crate::config::RelayPolicyConfig;

/// Text after the last `.` of `target`, lowercased.
///
/// The whole target is considered, query string included, so
/// `https://cdn/a.mp4?sig=x` yields `mp4?sig=x`. A target without any dot
/// yields itself.
pub fn extension_of(target: &str) -> String {
    target
        .rsplit('.')
        .next()
        .unwrap_or(target)
        .to_lowercase()
}

/// Set of permitted extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionFilter {
    allowed: HashSet<String>,
}

impl ExtensionFilter {
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            allowed: extensions
                .into_iter()
                .map(|ext| ext.as_ref().to_lowercase())
                .collect(),
        }
    }

    /// Build the filter for a policy, or `None` when the policy relays everything.
    pub fn from_config(config: &RelayPolicyConfig) -> Option<Self> {
        config
            .enforce_allow_list
            .then(|| Self::new(&config.allowed_extensions))
    }

    pub fn permits(&self, target: &str) -> bool {
        self.allowed.contains(&extension_of(target))
    }

    pub fn allowed(&self) -> impl Iterator<Item = &str> {
        self.allowed.iter().map(String::as_str)
    }
}
