use std::io::Write;

use log::{error, info};

use rdkafka::client::ClientContext;
use rdkafka::config::RDKafkaLogLevel;
use rdkafka::consumer::stream_consumer::StreamConsumer;
use rdkafka::consumer::{Consumer, ConsumerContext, Rebalance};
use rdkafka::error::{KafkaError, KafkaResult};
use rdkafka::message::Message;
use rdkafka::topic_partition_list::TopicPartitionList;
use rdkafka::util::get_rdkafka_version;
use rdkafka::ClientConfig;

use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use kafka_config::consumer::ConsumerOptions;
use kafka_config::KafkaConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicPartition {
    pub topic: String,
    pub partition: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedMessage {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub payload: Vec<u8>,
}

/// Everything the broker client can hand to the dispatch loop.
#[derive(Debug)]
pub enum ConsumerEvent {
    Assigned(Vec<TopicPartition>),
    Revoked(Vec<TopicPartition>),
    Message(ReceivedMessage),
    PartitionEof(i32),
    Error(String),
}

enum Flow {
    Continue,
    Stop,
}

enum Wakeup {
    Signal(&'static str),
    Broker(ConsumerEvent),
}

struct RebalanceContext {
    events: UnboundedSender<ConsumerEvent>,
}

impl ClientContext for RebalanceContext {}

impl ConsumerContext for RebalanceContext {
    fn pre_rebalance(&self, rebalance: &Rebalance) {
        let event = match rebalance {
            Rebalance::Assign(partitions) => ConsumerEvent::Assigned(topic_partitions(partitions)),
            Rebalance::Revoke(partitions) => ConsumerEvent::Revoked(topic_partitions(partitions)),
            Rebalance::Error(e) => ConsumerEvent::Error(e.to_string()),
        };
        // Called from a librdkafka thread; the send never blocks and only
        // fails once the dispatch loop is gone.
        let _ = self.events.send(event);
    }

    fn post_rebalance(&self, rebalance: &Rebalance) {
        info!("Post rebalance {:?}", rebalance);
    }

    fn commit_callback(&self, result: KafkaResult<()>, _offsets: &TopicPartitionList) {
        info!("Committing offsets: {:?}", result);
    }
}

type EventConsumer = StreamConsumer<RebalanceContext>;

fn topic_partitions(list: &TopicPartitionList) -> Vec<TopicPartition> {
    list.elements()
        .iter()
        .map(|elem| TopicPartition {
            topic: elem.topic().to_string(),
            partition: elem.partition(),
        })
        .collect()
}

// Fetch offsets stay with librdkafka (auto.offset.reset), so the list
// carries partitions only.
fn assignment_list(partitions: &[TopicPartition]) -> TopicPartitionList {
    let mut list = TopicPartitionList::with_capacity(partitions.len());
    for tp in partitions {
        list.add_partition(&tp.topic, tp.partition);
    }
    list
}

fn write_message(out: &mut impl Write, message: &ReceivedMessage) -> std::io::Result<()> {
    writeln!(
        out,
        "Message on {}[{}]@{}:",
        message.topic, message.partition, message.offset
    )?;
    out.write_all(&message.payload)?;
    writeln!(out)
}

pub struct KafkaConsumer {
    consumer: EventConsumer,
    rebalances: UnboundedReceiver<ConsumerEvent>,
}

impl KafkaConsumer {
    pub fn new(config: &KafkaConfig, options: &ConsumerOptions) -> anyhow::Result<Self> {
        let (events, rebalances) = mpsc::unbounded_channel();
        let context = RebalanceContext { events };

        let mut client: ClientConfig = config.clone().into();
        let consumer: EventConsumer = client
            .set("group.id", options.group_id.clone())
            .set("session.timeout.ms", "6000")
            .set("auto.offset.reset", "earliest")
            .set("enable.partition.eof", "true")
            .set_log_level(RDKafkaLogLevel::Info)
            .create_with_context(context)?;

        let topics: Vec<&str> = options.topics.iter().map(String::as_str).collect();
        consumer.subscribe(&topics)?;
        info!(
            "Subscribed to {:?} as group {} (librdkafka {})",
            options.topics,
            options.group_id,
            get_rdkafka_version().1
        );

        Ok(Self {
            consumer,
            rebalances,
        })
    }

    /// Merges the rebalance queue with the client's message stream,
    /// first-ready-wins.
    async fn next_event(&mut self) -> ConsumerEvent {
        tokio::select! {
            Some(event) = self.rebalances.recv() => event,
            result = self.consumer.recv() => match result {
                Ok(message) => ConsumerEvent::Message(ReceivedMessage {
                    topic: message.topic().to_string(),
                    partition: message.partition(),
                    offset: message.offset(),
                    payload: message.payload().unwrap_or_default().to_vec(),
                }),
                Err(KafkaError::PartitionEOF(partition)) => ConsumerEvent::PartitionEof(partition),
                Err(e) => ConsumerEvent::Error(e.to_string()),
            },
        }
    }

    fn handle(&self, event: ConsumerEvent, out: &mut impl Write) -> Flow {
        match event {
            ConsumerEvent::Assigned(partitions) => {
                info!("Partitions assigned: {:?}", partitions);
                if let Err(e) = self.consumer.assign(&assignment_list(&partitions)) {
                    error!("Failed to apply assignment: {}", e);
                    return Flow::Stop;
                }
                Flow::Continue
            }
            ConsumerEvent::Revoked(partitions) => {
                info!("Partitions revoked: {:?}", partitions);
                if let Err(e) = self.consumer.unassign() {
                    error!("Failed to release assignment: {}", e);
                    return Flow::Stop;
                }
                Flow::Continue
            }
            ConsumerEvent::Message(message) => {
                if let Err(e) = write_message(out, &message) {
                    error!("Failed to write message to output: {}", e);
                    return Flow::Stop;
                }
                Flow::Continue
            }
            ConsumerEvent::PartitionEof(partition) => {
                if let Err(e) = writeln!(out, "Reached end of partition {partition}") {
                    error!("Failed to write to output: {}", e);
                    return Flow::Stop;
                }
                Flow::Continue
            }
            ConsumerEvent::Error(e) => {
                error!("Consumer error: {}", e);
                Flow::Stop
            }
        }
    }

    pub async fn run(mut self) -> anyhow::Result<()> {
        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut stdout = std::io::stdout();

        let mut running = true;
        while running {
            let wakeup = tokio::select! {
                _ = sigint.recv() => Wakeup::Signal("SIGINT"),
                _ = sigterm.recv() => Wakeup::Signal("SIGTERM"),
                event = self.next_event() => Wakeup::Broker(event),
            };
            match wakeup {
                Wakeup::Signal(name) => {
                    println!("Caught {name}: terminating");
                    running = false;
                }
                Wakeup::Broker(event) => {
                    if let Flow::Stop = self.handle(event, &mut stdout) {
                        running = false;
                    }
                }
            }
        }

        // Dropping the consumer leaves the group.
        println!("Closing consumer");
        Ok(())
    }
}
