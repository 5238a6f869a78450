//! Testing utilities.
//!
//! [`ScriptedSource`] stands in for the Claude API so chat sessions can be
//! tested deterministically, including streams that fail partway through.

use crate::gm::{FragmentStream, SourceError, TextSource};
use async_trait::async_trait;
use std::sync::Mutex;

/// A text source that replays fixed fragments.
///
/// Every call to [`TextSource::stream`] replays the same script, so one
/// source can serve several turns.
#[derive(Debug, Default)]
pub struct ScriptedSource {
    /// Fragments to yield, in order.
    fragments: Vec<String>,
    /// Yield this many fragments, then fail with the message.
    fail_after: Option<(usize, String)>,
    /// Refuse to open the stream at all.
    fail_on_open: Option<String>,
    /// Prompts received so far.
    prompts: Mutex<Vec<String>>,
}

impl ScriptedSource {
    pub fn new<I, T>(fragments: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            fragments: fragments.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Break the stream after `count` fragments.
    pub fn failing_after(mut self, count: usize, message: impl Into<String>) -> Self {
        self.fail_after = Some((count, message.into()));
        self
    }

    /// Fail before any fragment is produced.
    pub fn failing_on_open(mut self, message: impl Into<String>) -> Self {
        self.fail_on_open = Some(message.into());
        self
    }

    /// Every prompt this source was asked to answer, oldest first.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .map(|p| p.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    fn script(&self) -> Vec<Result<String, SourceError>> {
        match &self.fail_after {
            Some((count, message)) => self
                .fragments
                .iter()
                .take(*count)
                .cloned()
                .map(Ok)
                .chain(std::iter::once(Err(SourceError::Stream(message.clone()))))
                .collect(),
            None => self.fragments.iter().cloned().map(Ok).collect(),
        }
    }
}

#[async_trait]
impl TextSource for ScriptedSource {
    async fn stream(&self, prompt: &str) -> Result<FragmentStream, SourceError> {
        match self.prompts.lock() {
            Ok(mut prompts) => prompts.push(prompt.to_string()),
            Err(poisoned) => poisoned.into_inner().push(prompt.to_string()),
        }

        if let Some(message) = &self.fail_on_open {
            return Err(SourceError::Request(message.clone()));
        }

        Ok(Box::pin(futures::stream::iter(self.script())))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_replays_script() {
        let source = ScriptedSource::new(["a", "b"]);
        for _ in 0..2 {
            let fragments: Vec<_> = source.stream("p").await.unwrap().collect().await;
            assert_eq!(fragments, vec![Ok("a".to_string()), Ok("b".to_string())]);
        }
        assert_eq!(source.prompts(), vec!["p", "p"]);
    }

    #[tokio::test]
    async fn test_fails_after_count() {
        let source = ScriptedSource::new(["a", "b", "c"]).failing_after(2, "cut");
        let fragments: Vec<_> = source.stream("p").await.unwrap().collect().await;
        assert_eq!(
            fragments,
            vec![
                Ok("a".to_string()),
                Ok("b".to_string()),
                Err(SourceError::Stream("cut".to_string())),
            ]
        );
    }

    #[tokio::test]
    async fn test_fails_on_open() {
        let source = ScriptedSource::new(["a"]).failing_on_open("offline");
        assert!(matches!(
            source.stream("p").await,
            Err(SourceError::Request(m)) if m == "offline"
        ));
        assert_eq!(source.prompts().len(), 1);
    }
}
