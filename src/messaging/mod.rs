mod queue;
mod rabbit;

pub use queue::{MessageQueue, MessageSink, QueueError, ReceivedMessage};
pub use rabbit::{build_pool, Pool, RabbitQueue, BROKER_OP_TIMEOUT};
