// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use sg_core::StopStatus;

#[tokio::test]
async fn subscribers_see_events_in_emission_order() {
    let bus = EventBus::new();
    let mut rx = bus.subscribe();

    bus.emit(TransportEvent::Stop { status: StopStatus::Requested });
    bus.emit(TransportEvent::Stop { status: StopStatus::Completed });

    assert_eq!(rx.recv().await.unwrap(), TransportEvent::Stop { status: StopStatus::Requested });
    assert_eq!(rx.recv().await.unwrap(), TransportEvent::Stop { status: StopStatus::Completed });
}

#[tokio::test]
async fn emitting_without_subscribers_is_fine() {
    let bus = EventBus::new();
    bus.emit(TransportEvent::Stop { status: StopStatus::Requested });
    assert_eq!(bus.subscriber_count(), 0);
}
