pub mod event;
pub mod subscriber;

pub use event::DetectionEvent;
pub use subscriber::DetectionSubscriber;
