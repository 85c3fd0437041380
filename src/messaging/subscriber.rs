use crate::config::MessageBrokerConfig;
use crate::error::Error;
use crate::messaging::event::DetectionEvent;
use anyhow::Result;
use deadpool_lapin::{Config, Manager, Pool};
use futures_util::stream::StreamExt;
use lapin::{
    options::{
        BasicAckOptions, BasicConsumeOptions, ExchangeDeclareOptions, QueueBindOptions,
        QueueDeclareOptions,
    },
    types::FieldTable,
    Channel, ConnectionProperties, Consumer, ExchangeKind,
};
use log::{debug, error, info, warn};
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Capacity of the handoff channel between the consumer and the pipeline
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// AMQP subscriber for detection events.
///
/// The consumer task parses each delivery and hands it to the pipeline
/// through a bounded channel, so one event is fully processed before the
/// next is taken and a slow pipeline backpressures the consumer.
pub struct DetectionSubscriber {
    /// Connection pool
    pool: Pool,
    /// Configuration
    config: MessageBrokerConfig,
    /// Running consumer task
    consumer: Mutex<Option<JoinHandle<()>>>,
}

impl DetectionSubscriber {
    /// Create a new detection subscriber
    pub fn new(config: MessageBrokerConfig) -> Result<Self> {
        let pool_config = Config {
            url: Some(config.uri.clone()),
            pool: Some(deadpool_lapin::PoolConfig {
                max_size: config.pool_size as usize,
                queue_mode: deadpool::managed::QueueMode::Fifo,
                timeouts: deadpool::managed::Timeouts {
                    wait: Some(Duration::from_millis(config.timeout_ms)),
                    create: Some(Duration::from_millis(config.timeout_ms)),
                    recycle: Some(Duration::from_millis(config.timeout_ms)),
                },
            }),
            connection_properties: ConnectionProperties::default(),
        };
        let pool = pool_config.create_pool(Some(deadpool_lapin::Runtime::Tokio1))?;

        Ok(Self {
            pool,
            config,
            consumer: Mutex::new(None),
        })
    }

    /// Get a connection from the pool with retry
    async fn get_connection(&self) -> Result<deadpool::managed::Object<Manager>> {
        let mut attempts = 0;
        let max_attempts = self.config.retry_attempts;

        loop {
            attempts += 1;
            match self.pool.get().await {
                Ok(conn) => return Ok(conn),
                Err(err) => {
                    if attempts >= max_attempts {
                        return Err(Error::Service(format!(
                            "Failed to get broker connection after {} attempts: {}",
                            attempts, err
                        ))
                        .into());
                    }

                    warn!(
                        "Failed to get broker connection (attempt {}/{}): {}",
                        attempts, max_attempts, err
                    );

                    tokio::time::sleep(Duration::from_millis(self.config.retry_delay_ms)).await;
                }
            }
        }
    }

    /// Declare the exchange, bind a fresh queue and create a consumer
    async fn create_consumer(&self) -> Result<(Channel, Consumer)> {
        let conn = self.get_connection().await?;

        let channel = conn
            .create_channel()
            .await
            .map_err(|e| Error::Service(format!("Failed to create broker channel: {}", e)))?;

        channel
            .exchange_declare(
                &self.config.exchange,
                ExchangeKind::Topic,
                ExchangeDeclareOptions {
                    durable: true,
                    auto_delete: false,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| Error::Service(format!("Failed to declare exchange: {}", e)))?;

        let queue_name = format!("cam-alerter.{}", Uuid::new_v4());

        channel
            .queue_declare(
                &queue_name,
                QueueDeclareOptions {
                    exclusive: true,
                    auto_delete: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| Error::Service(format!("Failed to declare queue: {}", e)))?;

        debug!(
            "Created queue {} for routing key {}",
            queue_name, self.config.routing_key
        );

        channel
            .queue_bind(
                &queue_name,
                &self.config.exchange,
                &self.config.routing_key,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| Error::Service(format!("Failed to bind queue: {}", e)))?;

        let consumer = channel
            .basic_consume(
                &queue_name,
                &format!("consumer-{}", Uuid::new_v4()),
                BasicConsumeOptions {
                    no_ack: false,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| Error::Service(format!("Failed to create consumer: {}", e)))?;

        Ok((channel, consumer))
    }

    /// Start consuming detection events into the given channel
    pub async fn start(&self, events: mpsc::Sender<DetectionEvent>) -> Result<()> {
        let (channel, mut consumer) = self.create_consumer().await?;
        let routing_key = self.config.routing_key.clone();

        let handle = tokio::spawn(async move {
            // Keep the channel handle alive for the consumer's lifetime
            let _channel = channel;

            info!("Started detection consumer for routing key {}", routing_key);

            while let Some(delivery) = consumer.next().await {
                let delivery = match delivery {
                    Ok(delivery) => delivery,
                    Err(e) => {
                        error!("Error receiving message: {}", e);
                        // Short delay to avoid a tight loop on errors
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        continue;
                    }
                };

                match serde_json::from_slice::<DetectionEvent>(&delivery.data) {
                    Ok(event) => {
                        debug!(
                            "Received {} event for camera {}",
                            event.kind, event.before.camera
                        );

                        if events.send(event).await.is_err() {
                            warn!("Event channel closed, stopping consumer");
                            break;
                        }
                    }
                    Err(e) => {
                        // Malformed payloads are dropped, not retried
                        error!("Failed to parse detection event: {}", e);
                    }
                }

                if let Err(e) = delivery.ack(BasicAckOptions::default()).await {
                    error!("Failed to acknowledge message: {}", e);
                }
            }

            info!("Detection consumer stopped");
        });

        *self.consumer.lock().await = Some(handle);

        Ok(())
    }

    /// Stop consuming detection events
    pub async fn close(&self) {
        if let Some(handle) = self.consumer.lock().await.take() {
            handle.abort();
            info!("Detection subscriber closed");
        }
    }
}
