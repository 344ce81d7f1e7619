//! Outbound publisher for FxAgg
//!
//! Publishes calculated rates as `name|bid|ask|timestamp` records keyed by
//! rate name. The producer recovers on its own: send failures drop the sink
//! and a periodic health check builds a new one.
//!
//! # Core Components
//!
//! - [`service`] - `KafkaProducerService`, the producer state machine
//! - [`sink`] - `RecordSink` / `SinkFactory` seams
//! - `kafka` - `rdkafka` implementation (feature `kafka`, on by default)

pub mod error;
#[cfg(feature = "kafka")]
pub mod kafka;
pub mod service;
pub mod sink;

pub use error::PublishError;
#[cfg(feature = "kafka")]
pub use kafka::KafkaSinkFactory;
pub use service::KafkaProducerService;
pub use sink::{default_sink_factory, RecordSink, SinkFactory};
