//! 🎁 Defaults — the source that makes exactly one row out of thin air.
//!
//! The row holds nothing but field defaults. Useful for entities that are all
//! calculated fields and parameters, and for checking that the defaults are what
//! you think they are.

use anyhow::Result;
use async_trait::async_trait;

use crate::backends::Source;

/// 🎁 One empty JSON object, once. The decoder fills every slot with its default.
#[derive(Debug, Default)]
pub(crate) struct DefaultsSource {
    has_yielded: bool,
}

#[async_trait]
impl Source for DefaultsSource {
    async fn next_page(&mut self) -> Result<Option<String>> {
        if self.has_yielded {
            return Ok(None);
        }
        self.has_yielded = true;
        Ok(Some("{}".to_string()))
    }
}
