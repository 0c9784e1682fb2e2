/// Include/exclude path patterns in glob syntax.
///
/// `*` matches within one segment and `**` across segments. A pattern ending
/// in `/**` also matches its bare prefix, so `/error-page/**` covers
/// `/error-page` itself. An empty include list matches every path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathPatterns {
    include: Vec<String>,
    exclude: Vec<String>,
}

impl PathPatterns {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn include<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include.extend(patterns.into_iter().map(Into::into));
        self
    }

    pub fn exclude<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude.extend(patterns.into_iter().map(Into::into));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }

    pub fn matches(&self, path: &str) -> bool {
        let included = self.include.is_empty() || self.include.iter().any(|p| pattern_matches(p, path));
        included && !self.exclude.iter().any(|p| pattern_matches(p, path))
    }
}

fn pattern_matches(pattern: &str, path: &str) -> bool {
    if let Some(prefix) = pattern.strip_suffix("/**") {
        if path == prefix || (prefix.is_empty() && path == "/") {
            return true;
        }
    }
    glob_match::glob_match(pattern, path)
}
