// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn chunk(uuid: &str, text: &str, sequence: u64) -> Event {
    Event::LogChunk { uuid: uuid.into(), bytes: text.as_bytes().to_vec(), sequence }
}

#[tokio::test]
async fn delivers_in_publication_order() {
    let bus = EventBus::new(16);
    let mut sub = bus.subscribe(TOPIC_JOBS);

    for i in 0..5 {
        bus.publish(TOPIC_JOBS, chunk("u", &format!("m{i}"), i)).unwrap();
    }
    for i in 0..5 {
        match sub.recv().await.unwrap() {
            Event::LogChunk { bytes, .. } => assert_eq!(bytes, format!("m{i}").into_bytes()),
            other => panic!("unexpected event {:?}", other),
        }
    }
}

#[tokio::test]
async fn fan_out_to_multiple_subscribers() {
    let bus = EventBus::new(16);
    let mut a = bus.subscribe(TOPIC_JOBS);
    let mut b = bus.subscribe(TOPIC_JOBS);

    bus.publish(TOPIC_JOBS, chunk("u", "hello", 1)).unwrap();
    assert!(a.recv().await.is_some());
    assert!(b.recv().await.is_some());
}

#[tokio::test]
async fn slow_subscriber_drops_not_blocks() {
    let bus = EventBus::new(2);
    let sub = bus.subscribe(TOPIC_JOBS);

    for i in 0..5 {
        bus.publish(TOPIC_JOBS, chunk("u", "x", i)).unwrap();
    }
    // Two buffered, three dropped; counter is monotonic
    assert_eq!(sub.dropped_count(), 3);

    for i in 5..8 {
        bus.publish(TOPIC_JOBS, chunk("u", "x", i)).unwrap();
    }
    assert_eq!(sub.dropped_count(), 6);
}

#[tokio::test]
async fn cancel_detaches_but_drains_buffered() {
    let bus = EventBus::new(16);
    let mut sub = bus.subscribe(TOPIC_JOBS);

    bus.publish(TOPIC_JOBS, chunk("u", "before", 1)).unwrap();
    sub.cancel();
    // Publish after cancel is a no-op for this subscriber
    bus.publish(TOPIC_JOBS, chunk("u", "after", 2)).unwrap();

    match sub.recv().await.unwrap() {
        Event::LogChunk { bytes, .. } => assert_eq!(bytes, b"before"),
        other => panic!("unexpected event {:?}", other),
    }
    assert!(sub.recv().await.is_none());
}

#[tokio::test]
async fn publish_without_subscribers_is_ok() {
    let bus = EventBus::new(16);
    bus.publish(TOPIC_JOBS, chunk("u", "x", 1)).unwrap();
}

#[tokio::test]
async fn close_cancels_everyone_and_refuses_publish() {
    let bus = EventBus::new(16);
    let mut sub = bus.subscribe(TOPIC_JOBS);
    bus.close();

    assert!(bus.publish(TOPIC_JOBS, chunk("u", "x", 1)).is_err());
    assert!(sub.recv().await.is_none());
    assert_eq!(bus.subscriber_count(TOPIC_JOBS), 0);
}

#[tokio::test]
async fn subscribe_after_close_yields_dead_subscription() {
    let bus = EventBus::new(16);
    bus.close();
    let mut sub = bus.subscribe(TOPIC_JOBS);
    assert!(sub.is_cancelled());
    assert!(sub.recv().await.is_none());
}

#[tokio::test]
async fn detach_removes_single_subscriber() {
    let bus = EventBus::new(16);
    let a = bus.subscribe(TOPIC_JOBS);
    let _b = bus.subscribe(TOPIC_JOBS);
    assert_eq!(bus.subscriber_count(TOPIC_JOBS), 2);

    bus.detach(TOPIC_JOBS, a.id());
    assert_eq!(bus.subscriber_count(TOPIC_JOBS), 1);
    assert!(a.is_cancelled());
}

#[tokio::test]
async fn dropped_receiver_is_pruned_on_publish() {
    let bus = EventBus::new(16);
    let sub = bus.subscribe(TOPIC_JOBS);
    drop(sub);

    bus.publish(TOPIC_JOBS, chunk("u", "x", 1)).unwrap();
    bus.publish(TOPIC_JOBS, chunk("u", "x", 2)).unwrap();
    assert_eq!(bus.subscriber_count(TOPIC_JOBS), 0);
}
