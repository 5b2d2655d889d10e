mod notifier;
mod registry;

pub use notifier::{BlockNotifier, DispatchReport};
pub use registry::SubscriptionRegistry;
