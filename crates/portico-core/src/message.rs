//! The request message contract.
//!
//! Every request message that enters the interceptor chain implements
//! [`RequestMessage`]. The chain carries messages type-erased so that every
//! stage is a plain trait object; the terminal handler recovers the concrete
//! type through [`AnyMessage::into_any`].

use std::any::Any;

use crate::validate::FieldErrors;

/// Type-erasure helper implemented for every `'static` message.
pub trait AnyMessage: Any + Send + Sync {
    /// Converts the boxed message into a boxed [`Any`] for downcasting.
    fn into_any(self: Box<Self>) -> Box<dyn Any + Send>;

    /// Borrows the message as [`Any`].
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any + Send + Sync> AnyMessage for T {
    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A request message accepted by the interceptor chain.
///
/// # Example
///
/// ```
/// use portico_core::{FieldErrors, RequestMessage, Validator};
///
/// struct GetUser {
///     user_id: u64,
/// }
///
/// impl RequestMessage for GetUser {
///     fn validate(&self) -> Result<(), FieldErrors> {
///         Validator::new().positive("user_id", self.user_id).finish()
///     }
///
///     fn owner_id(&self) -> Option<String> {
///         Some(self.user_id.to_string())
///     }
/// }
///
/// assert!(GetUser { user_id: 0 }.validate().is_err());
/// ```
pub trait RequestMessage: AnyMessage {
    /// Checks the message's declared field rules.
    ///
    /// The error lists every violated rule, not just the first.
    fn validate(&self) -> Result<(), FieldErrors> {
        Ok(())
    }

    /// The user-id field this message targets.
    ///
    /// Messages used on self-only routes must return `Some`. A `None` on such a
    /// route is treated as a mismatch.
    fn owner_id(&self) -> Option<String> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Ping;

    impl RequestMessage for Ping {}

    #[test]
    fn test_defaults_accept_everything() {
        assert!(Ping.validate().is_ok());
        assert!(Ping.owner_id().is_none());
    }

    #[test]
    fn test_boxed_message_downcasts_to_concrete_type() {
        let boxed: Box<dyn RequestMessage> = Box::new(Ping);
        let borrowed: &dyn RequestMessage = boxed.as_ref();
        assert!(borrowed.as_any().is::<Ping>());
        let any = boxed.into_any();
        assert_eq!(*any.downcast::<Ping>().unwrap(), Ping);
    }
}
