use crate::types::push::Subscription;

pub trait PushSender: Clone + Send + Sync + 'static {
    type Error: std::fmt::Display + Send + Sync + 'static;
    type Fut<'a>: Future<Output = Result<(), Self::Error>> + Send + 'a
    where
        Self: 'a;

    fn send<'a>(&'a self, subscription: &'a Subscription, payload: &'a str) -> Self::Fut<'a>;

    /// True when the provider reported the endpoint as permanently gone
    /// (HTTP 404 or 410). Every other failure is treated as transient.
    fn is_endpoint_gone(error: &Self::Error) -> bool;
}
