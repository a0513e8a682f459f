use crate::ports;
use crate::types::push::Subscription;

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

pub(crate) fn at(raw: &str) -> OffsetDateTime {
    OffsetDateTime::parse(raw, &Rfc3339).expect("parse timestamp")
}

#[derive(Clone)]
pub(crate) struct TestTime {
    now: Arc<Mutex<OffsetDateTime>>,
}

impl TestTime {
    pub(crate) fn fixed() -> Self {
        Self::new(at("2025-01-12T09:30:00Z"))
    }

    pub(crate) fn new(now: OffsetDateTime) -> Self {
        Self {
            now: Arc::new(Mutex::new(now)),
        }
    }

    pub(crate) fn advance(&self, by: time::Duration) {
        let mut now = self.now.lock().expect("now lock");
        *now += by;
    }
}

impl ports::time::TimeProvider for TestTime {
    type Sleep<'a>
        = std::future::Ready<()>
    where
        Self: 'a;

    fn now(&self) -> OffsetDateTime {
        *self.now.lock().expect("now lock")
    }

    fn sleep<'a>(&'a self, _duration: Duration) -> Self::Sleep<'a> {
        std::future::ready(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Scripted {
    Accept,
    Gone,
    Transient,
    Hang,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TestSendError {
    Gone,
    Transient,
}

impl std::fmt::Display for TestSendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TestSendError::Gone => f.write_str("endpoint gone"),
            TestSendError::Transient => f.write_str("provider timeout"),
        }
    }
}

/// Push sender double: outcomes are scripted per endpoint, every attempt is recorded.
#[derive(Clone, Default)]
pub(crate) struct TestSender {
    script: Arc<Mutex<HashMap<String, Scripted>>>,
    pub(crate) sent: Arc<Mutex<Vec<(String, String)>>>,
}

impl TestSender {
    pub(crate) fn script(&self, endpoint: &str, outcome: Scripted) {
        self.script
            .lock()
            .expect("script lock")
            .insert(endpoint.to_string(), outcome);
    }

    pub(crate) fn attempts(&self) -> Vec<(String, String)> {
        self.sent.lock().expect("sent lock").clone()
    }
}

impl ports::push::PushSender for TestSender {
    type Error = TestSendError;
    type Fut<'a>
        = Pin<Box<dyn Future<Output = Result<(), Self::Error>> + Send + 'a>>
    where
        Self: 'a;

    fn send<'a>(&'a self, subscription: &'a Subscription, payload: &'a str) -> Self::Fut<'a> {
        let outcome = self
            .script
            .lock()
            .expect("script lock")
            .get(&subscription.endpoint)
            .copied()
            .unwrap_or(Scripted::Accept);
        self.sent
            .lock()
            .expect("sent lock")
            .push((subscription.endpoint.clone(), payload.to_string()));
        Box::pin(async move {
            match outcome {
                Scripted::Accept => Ok(()),
                Scripted::Gone => Err(TestSendError::Gone),
                Scripted::Transient => Err(TestSendError::Transient),
                Scripted::Hang => {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Err(TestSendError::Transient)
                }
            }
        })
    }

    fn is_endpoint_gone(error: &Self::Error) -> bool {
        matches!(error, TestSendError::Gone)
    }
}
