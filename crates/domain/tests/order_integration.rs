//! Integration tests for the Order aggregate.
//!
//! These tests verify the order lifecycle including event persistence,
//! aggregate reconstruction, and concurrency handling.

use common::{AggregateId, ConferenceId, OrderId};
use domain::{
    Aggregate, DomainError, DomainEvent, ExpireOrder, MarkAsBooked, Order, OrderError, OrderEvent,
    OrderService, OrderState, PlaceOrder, RejectOrder,
};
use event_store::{CORRELATION_ID_KEY, EventStore, InMemoryEventStore, Version};

/// Helper to create a test order service
fn create_service() -> OrderService<InMemoryEventStore> {
    OrderService::new(InMemoryEventStore::new())
}

async fn placed(service: &OrderService<InMemoryEventStore>, tickets: u32) -> OrderId {
    let cmd = PlaceOrder::for_conference(ConferenceId::new(), tickets);
    let order_id = cmd.order_id;
    service.place_order(cmd).await.unwrap();
    order_id
}

mod order_lifecycle {
    use super::*;

    #[tokio::test]
    async fn booked_then_expired() {
        let service = create_service();
        let order_id = placed(&service, 2).await;

        let result = service
            .mark_as_booked(MarkAsBooked::new(order_id))
            .await
            .unwrap();
        assert_eq!(result.aggregate.state(), OrderState::Booked);
        assert_eq!(result.new_version, Version::new(2));

        let result = service
            .expire_order(ExpireOrder::new(order_id))
            .await
            .unwrap();
        assert!(result.aggregate.is_expired());
        assert_eq!(result.new_version, Version::new(3));

        // A second expiry changes nothing
        let again = service
            .expire_order(ExpireOrder::new(order_id))
            .await
            .unwrap();
        assert!(again.is_noop());
        assert_eq!(again.new_version, Version::new(3));
    }

    #[tokio::test]
    async fn rejected_order_stays_rejected() {
        let service = create_service();
        let order_id = placed(&service, 1).await;

        service
            .reject_order(RejectOrder::new(order_id))
            .await
            .unwrap();

        let order = service.get_order(order_id).await.unwrap().unwrap();
        assert_eq!(order.state(), OrderState::Rejected);

        let err = service
            .expire_order(ExpireOrder::new(order_id))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DomainError::Order(OrderError::InvalidState {
                current_state: OrderState::Rejected,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn aggregate_reconstruction_from_events() {
        let store = InMemoryEventStore::new();
        let service = OrderService::new(store.clone());
        let order_id = placed(&service, 3).await;
        service
            .mark_as_booked(MarkAsBooked::new(order_id))
            .await
            .unwrap();

        let envelopes = store
            .get_events_for_aggregate(AggregateId::from(order_id))
            .await
            .unwrap();
        assert_eq!(envelopes.len(), 2);
        assert_eq!(envelopes[0].event_type, "OrderPlaced");
        assert_eq!(envelopes[1].event_type, "MarkedAsBooked");
        assert_eq!(
            envelopes[0].metadata[CORRELATION_ID_KEY],
            order_id.to_string()
        );

        let events: Vec<OrderEvent> = envelopes
            .into_iter()
            .map(|e| serde_json::from_value(e.payload).unwrap())
            .collect();
        assert_eq!(events[1].event_type(), "MarkedAsBooked");

        let order = Order::from_history(events);
        assert_eq!(order.order_id(), Some(order_id));
        assert_eq!(order.number_of_tickets(), 3);
        assert_eq!(order.state(), OrderState::Booked);
        assert_eq!(order.version(), Version::new(2));
    }
}

mod placement {
    use super::*;

    #[tokio::test]
    async fn zero_tickets_are_refused_and_nothing_is_stored() {
        let store = InMemoryEventStore::new();
        let service = OrderService::new(store.clone());

        let result = service
            .place_order(PlaceOrder::for_conference(ConferenceId::new(), 0))
            .await;

        assert!(matches!(
            result,
            Err(DomainError::Order(OrderError::InvalidTicketCount { .. }))
        ));
        assert_eq!(store.event_count().await, 0);
    }

    #[tokio::test]
    async fn concurrent_identical_placements_record_one_order() {
        let store = InMemoryEventStore::new();
        let cmd = PlaceOrder::for_conference(ConferenceId::new(), 2);

        // Separate services do not share in-process locks, so the store decides
        let first = OrderService::new(store.clone());
        let second = OrderService::new(store.clone());
        let (a, b) = tokio::join!(first.place_order(cmd.clone()), second.place_order(cmd));

        let a = a.unwrap();
        let b = b.unwrap();
        assert_eq!(a.events.len() + b.events.len(), 1);
        assert_eq!(store.event_count().await, 1);
    }
}
