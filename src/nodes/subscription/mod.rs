mod action;
mod models;

pub use action::SubscriptionNode;
pub use models::{Condition, EntitySelector, Expression, HttpTarget, Notification, Subject, Subscription};
