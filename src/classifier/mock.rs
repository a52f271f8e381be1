use anyhow::Result;
use async_trait::async_trait;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{ClassificationRequest, Classifier, RawResponse};

/// One scripted reply.
#[derive(Debug, Clone)]
pub enum Scripted {
    Reply(RawResponse),
    /// Simulates a transport failure with the given message.
    Fail(String),
}

/// A scripted classifier for tests. Returns pre-defined replies in order,
/// then keeps repeating the last one.
pub struct MockClassifier {
    replies: Vec<Scripted>,
    index: AtomicUsize,
    seen: Mutex<Vec<ClassificationRequest>>,
}

impl MockClassifier {
    pub fn new(replies: Vec<Scripted>) -> Self {
        Self {
            replies,
            index: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Always answer with the same text.
    pub fn always(text: &str) -> Self {
        Self::new(vec![Scripted::Reply(RawResponse::Text(text.to_string()))])
    }

    /// Number of times `classify` was called.
    pub fn calls(&self) -> usize {
        self.index.load(Ordering::SeqCst)
    }

    /// Every request received, in order.
    pub fn requests(&self) -> Vec<ClassificationRequest> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Classifier for MockClassifier {
    async fn classify(&self, request: &ClassificationRequest) -> Result<RawResponse> {
        let i = self.index.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(request.clone());
        let scripted = self
            .replies
            .get(i)
            .or_else(|| self.replies.last())
            .ok_or_else(|| anyhow::anyhow!("MockClassifier: no replies scripted"))?;
        match scripted {
            Scripted::Reply(raw) => Ok(raw.clone()),
            Scripted::Fail(msg) => Err(anyhow::anyhow!("{msg}")),
        }
    }
}
