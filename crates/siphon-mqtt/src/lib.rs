mod connection;
mod subscriber;
mod topic;

pub use connection::{BrokerConfig, BrokerConnection};
pub use subscriber::TopicSubscriber;
pub use topic::{build_topic, recovered_topic, shared_subscription, TopicIndex};
