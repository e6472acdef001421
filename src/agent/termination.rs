use crate::core::config::SentinelMatch;

/// Decides whether an assistant reply ends the conversation. Matching is
/// case-sensitive.
#[derive(Debug, Clone)]
pub struct TerminationPolicy {
    sentinel: String,
    mode: SentinelMatch,
}

impl TerminationPolicy {
    pub fn new(sentinel: impl Into<String>, mode: SentinelMatch) -> Self {
        Self {
            sentinel: sentinel.into(),
            mode,
        }
    }

    pub fn sentinel(&self) -> &str {
        &self.sentinel
    }

    pub fn is_terminal(&self, content: &str) -> bool {
        if self.sentinel.is_empty() {
            return false;
        }
        match self.mode {
            SentinelMatch::Contains => content.contains(&self.sentinel),
            SentinelMatch::Suffix => content.trim_end().ends_with(&self.sentinel),
        }
    }

    /// Removes every occurrence of the sentinel and trims the rest. Removal
    /// repeats until none is left, since dropping one occurrence can join its
    /// neighbours into a new one.
    pub fn strip(&self, content: &str) -> String {
        if self.sentinel.is_empty() {
            return content.trim().to_string();
        }
        let mut cleaned = content.replace(&self.sentinel, "");
        while cleaned.contains(&self.sentinel) {
            cleaned = cleaned.replace(&self.sentinel, "");
        }
        cleaned.trim().to_string()
    }
}

impl Default for TerminationPolicy {
    fn default() -> Self {
        Self::new("TERMINATE", SentinelMatch::Contains)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_matches_anywhere() {
        let policy = TerminationPolicy::default();
        assert!(policy.is_terminal("Paris. TERMINATE"));
        assert!(policy.is_terminal("TERMINATE then more text"));
        assert!(!policy.is_terminal("terminate"));
    }

    #[test]
    fn suffix_requires_trailing_sentinel() {
        let policy = TerminationPolicy::new("TERMINATE", SentinelMatch::Suffix);
        assert!(policy.is_terminal("Paris.\nTERMINATE  \n"));
        assert!(!policy.is_terminal("TERMINATE then more text"));
    }

    #[test]
    fn strip_removes_every_occurrence() {
        let policy = TerminationPolicy::default();
        assert_eq!(policy.strip("  TERMINATE Paris TERMINATE "), "Paris");
    }

    #[test]
    fn strip_removes_sentinels_formed_by_removal() {
        let policy = TerminationPolicy::default();
        assert_eq!(policy.strip("Paris. TERMTERMINATEINATE"), "Paris.");
        assert_eq!(policy.strip("TERTERMTERMINATEINATEMINATE"), "");
    }
}
