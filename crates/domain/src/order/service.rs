//! Order service providing a simplified API for order operations.

use common::{AggregateId, OrderId};
use event_store::EventStore;

use crate::command::{Command, CommandHandler, CommandResult, RetryPolicy};
use crate::error::DomainError;

use super::{ExpireOrder, MarkAsBooked, Order, OrderState, PlaceOrder, RejectOrder};

/// Service for managing orders.
///
/// Wraps the command handler and maps each command onto the aggregate's
/// decide method.
pub struct OrderService<S: EventStore> {
    handler: CommandHandler<S, Order>,
}

impl<S: EventStore> OrderService<S> {
    /// Creates a new order service with the given event store.
    pub fn new(store: S) -> Self {
        Self {
            handler: CommandHandler::new(store),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.handler = self.handler.with_retry_policy(retry);
        self
    }

    /// Returns a reference to the underlying command handler.
    pub fn handler(&self) -> &CommandHandler<S, Order> {
        &self.handler
    }

    /// Places a new order.
    ///
    /// The order stream is created conditionally. If it already exists, the
    /// command is checked against the stored order: identical details are a
    /// no-op, anything else is `AlreadyPlaced`.
    #[tracing::instrument(skip(self))]
    pub async fn place_order(&self, cmd: PlaceOrder) -> Result<CommandResult<Order>, DomainError> {
        let aggregate_id = cmd.aggregate_id();
        let PlaceOrder {
            order_id,
            conference_id,
            number_of_tickets,
        } = cmd;

        let created = self
            .handler
            .create(aggregate_id, |order| {
                order.place(order_id, conference_id, number_of_tickets)
            })
            .await;

        match created {
            Err(DomainError::AlreadyExists { .. }) => {
                self.handler
                    .execute(aggregate_id, |order| {
                        order.place(order_id, conference_id, number_of_tickets)
                    })
                    .await
            }
            Ok(result) => {
                metrics::counter!("orders_placed_total").increment(1);
                tracing::info!(%order_id, %conference_id, number_of_tickets, "order placed");
                Ok(result)
            }
            Err(e) => Err(e),
        }
    }

    /// Marks an order as booked.
    ///
    /// Both this and [`reject_order`](Self::reject_order) are resent by the
    /// process manager when it recovers from a failed delivery, so an order
    /// already in the target state records nothing.
    #[tracing::instrument(skip(self))]
    pub async fn mark_as_booked(
        &self,
        cmd: MarkAsBooked,
    ) -> Result<CommandResult<Order>, DomainError> {
        self.handler
            .execute(cmd.aggregate_id(), |order| match order.state() {
                OrderState::Booked => Ok(vec![]),
                _ => order.mark_as_booked(),
            })
            .await
    }

    /// Rejects an order.
    #[tracing::instrument(skip(self))]
    pub async fn reject_order(
        &self,
        cmd: RejectOrder,
    ) -> Result<CommandResult<Order>, DomainError> {
        self.handler
            .execute(cmd.aggregate_id(), |order| match order.state() {
                OrderState::Rejected => Ok(vec![]),
                _ => order.reject(),
            })
            .await
    }

    /// Expires an order.
    #[tracing::instrument(skip(self))]
    pub async fn expire_order(
        &self,
        cmd: ExpireOrder,
    ) -> Result<CommandResult<Order>, DomainError> {
        self.handler
            .execute(cmd.aggregate_id(), |order| order.expire())
            .await
    }

    /// Gets an order by ID.
    pub async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>, DomainError> {
        self.handler.load_existing(AggregateId::from(order_id)).await
    }
}
