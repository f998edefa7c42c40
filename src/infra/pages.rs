use std::collections::HashSet;

use async_trait::async_trait;

use crate::application::repos::{FormulaPages, PageLookupError};

/// Formula pages known up front, e.g. from configuration.
///
/// Titles compare with spaces and underscores treated alike, the way wiki
/// titles do.
#[derive(Debug, Clone, Default)]
pub struct StaticFormulaPages {
    titles: HashSet<String>,
}

impl StaticFormulaPages {
    pub fn new<I, S>(titles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            titles: titles
                .into_iter()
                .map(|title| normalize_title(title.as_ref()))
                .filter(|title| !title.is_empty())
                .collect(),
        }
    }
}

#[async_trait]
impl FormulaPages for StaticFormulaPages {
    async fn exists(&self, title: &str) -> Result<bool, PageLookupError> {
        Ok(self.titles.contains(&normalize_title(title)))
    }
}

fn normalize_title(title: &str) -> String {
    title.trim().replace(' ', "_")
}
