use url::Url;

/// The configured set of feed sources. Set semantics with insertion order
/// preserved for display; persistence across sessions is the caller's
/// concern.
#[derive(Debug, Default)]
pub struct SourceList {
    urls: Vec<Url>,
}

impl SourceList {
    pub fn new() -> Self {
        Self { urls: Vec::new() }
    }

    /// Add a source. Returns false if the URL is already configured.
    pub fn add(&mut self, url: Url) -> bool {
        if self.urls.contains(&url) {
            return false;
        }
        self.urls.push(url);
        true
    }

    /// Remove a source. Returns false if the URL was not configured.
    pub fn remove(&mut self, url: &Url) -> bool {
        let before = self.urls.len();
        self.urls.retain(|u| u != url);
        self.urls.len() != before
    }

    pub fn to_vec(&self) -> Vec<Url> {
        self.urls.clone()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Url> {
        self.urls.iter()
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }
}
