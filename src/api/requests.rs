use serde::Deserialize;

fn default_page() -> u32 {
    1
}

fn default_per_page() -> u32 {
    20
}

/// `?page=&per_page=` query parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page", alias = "perPage")]
    pub per_page: u32,
}

impl Default for PageQuery {
    fn default() -> Self {
        Self {
            page: default_page(),
            per_page: default_per_page(),
        }
    }
}

impl PageQuery {
    /// Number of items before this page; page 0 is treated as page 1.
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.per_page)
    }

    pub fn limit(&self) -> u64 {
        u64::from(self.per_page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let query: PageQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(query, PageQuery::default());
        assert_eq!(query.offset(), 0);
    }

    #[test]
    fn test_offset() {
        let query: PageQuery = serde_json::from_str(r#"{"page": 3, "perPage": 25}"#).unwrap();
        assert_eq!(query.offset(), 50);
        assert_eq!(query.limit(), 25);
    }
}
