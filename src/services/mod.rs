pub mod detector;
pub mod notifier;
pub mod queue;
