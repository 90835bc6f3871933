//! Value-change notifications
//!
//! The poller publishes a metric's new value here whenever it changes; live
//! connections subscribe listeners that forward those values to clients.

mod hub;

pub use hub::{
    HubConfig, HubError, Listener, ListenerError, NotificationHub, PublishReport,
    SubscriptionHandle,
};
