use regex::Regex;

/// Turns the captured token into a field value; `None` means "matched but unusable".
pub type PostProcess<T> = fn(&str) -> Option<T>;

/// One entry of an ordered extraction table: pattern, capture selector and
/// post-processor. The selected capture is the pattern's last group, so a
/// rule written with two groups (code + number) yields the second one.
pub struct PatternRule<T> {
    pub tier: &'static str,
    regex: Regex,
    group: usize,
    post: PostProcess<T>,
}

impl<T> PatternRule<T> {
    pub fn new(tier: &'static str, pattern: &str, post: PostProcess<T>) -> Self {
        let regex = Regex::new(pattern).expect("invalid regex");
        let group = regex.captures_len().saturating_sub(1);
        Self { tier, regex, group, post }
    }

    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }

    /// Only the first occurrence of the pattern is considered.
    pub fn apply(&self, text: &str) -> Option<T> {
        let caps = self.regex.captures(text)?;
        let token = caps.get(self.group)?.as_str();
        let value = (self.post)(token);
        if value.is_none() {
            tracing::trace!(tier = self.tier, token, "pattern matched but value rejected");
        }
        value
    }
}

/// Build one tier's rules sharing a post-processor.
pub fn tier<T>(tier: &'static str, patterns: &[&str], post: PostProcess<T>) -> Vec<PatternRule<T>> {
    patterns.iter().map(|p| PatternRule::new(tier, p, post)).collect()
}

/// Evaluate rules strictly in order; the first rule whose match and
/// post-processing both succeed wins.
pub fn first_match<'r, T>(rules: &'r [PatternRule<T>], text: &str) -> Option<(&'r PatternRule<T>, T)> {
    rules
        .iter()
        .find_map(|rule| rule.apply(text).map(|value| (rule, value)))
}
