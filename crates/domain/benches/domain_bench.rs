use common::{AggregateId, ConferenceId, ReservationId};
use criterion::{Criterion, criterion_group, criterion_main};
use domain::{
    Aggregate, CreateSeatsAvailability, MakeSeatReservation, OrderService, PlaceOrder,
    SeatsAvailability, SeatsAvailabilityService, SeatsEvent,
};
use event_store::{AppendOptions, EventEnvelope, EventStore, InMemoryEventStore, Version};

fn make_envelope(aggregate_id: AggregateId, version: i64, event: &SeatsEvent) -> EventEnvelope {
    EventEnvelope::builder()
        .aggregate_id(aggregate_id)
        .aggregate_type("SeatsAvailability")
        .event_type(domain::DomainEvent::event_type(event))
        .version(Version::new(version))
        .payload(event)
        .unwrap()
        .build()
        .unwrap()
}

fn bench_place_order(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let service = OrderService::new(InMemoryEventStore::new());
    let conference_id = ConferenceId::new();

    c.bench_function("domain/place_order", |b| {
        b.iter(|| {
            rt.block_on(async {
                service
                    .place_order(PlaceOrder::for_conference(conference_id, 2))
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_make_reservation(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let service = SeatsAvailabilityService::new(InMemoryEventStore::new());
    let conference_id = ConferenceId::new();
    rt.block_on(async {
        service
            .create_if_absent(CreateSeatsAvailability::new(conference_id, u32::MAX))
            .await
            .unwrap()
    });

    // Snapshots keep the replayed tail short as the stream grows
    c.bench_function("domain/make_reservation", |b| {
        b.iter(|| {
            rt.block_on(async {
                service
                    .make_reservation(MakeSeatReservation::new(
                        conference_id,
                        ReservationId::new(),
                        1,
                    ))
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_reconstruction(c: &mut Criterion, reservations: i64) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryEventStore::new();
    let conference_id = ConferenceId::new();
    let agg_id = AggregateId::from(conference_id);

    rt.block_on(async {
        let mut events = vec![make_envelope(
            agg_id,
            1,
            &SeatsEvent::created(conference_id, 10_000),
        )];
        for v in 2..=reservations + 1 {
            let accepted = SeatsEvent::reservation_accepted(conference_id, ReservationId::new(), 1);
            events.push(make_envelope(agg_id, v, &accepted));
        }
        store.append(events, AppendOptions::new()).await.unwrap();
    });

    c.bench_function(&format!("domain/reconstruct_{reservations}_events"), |b| {
        b.iter(|| {
            rt.block_on(async {
                let events = store.get_events_for_aggregate(agg_id).await.unwrap();
                let mut seats = SeatsAvailability::default();
                for event in &events {
                    let domain_event: SeatsEvent =
                        serde_json::from_value(event.payload.clone()).unwrap();
                    seats.apply(domain_event);
                }
            });
        });
    });
}

fn bench_reconstruction_50(c: &mut Criterion) {
    bench_reconstruction(c, 50);
}

fn bench_reconstruction_100(c: &mut Criterion) {
    bench_reconstruction(c, 100);
}

criterion_group!(
    benches,
    bench_place_order,
    bench_make_reservation,
    bench_reconstruction_50,
    bench_reconstruction_100,
);
criterion_main!(benches);
