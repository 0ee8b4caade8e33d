// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use dl_core::ExecutionId;

#[tokio::test]
async fn emitted_events_reach_subscribers() {
    let (sink, mut rx) = EventSink::channel(16);
    sink.emit(Event::TestPreparing {
        execution_id: ExecutionId::new("e-1"),
    });
    let event = rx.recv().await.unwrap();
    assert_eq!(event.kind(), "test:preparing");
}

#[tokio::test]
async fn emit_without_subscribers_is_silent() {
    let (sink, rx) = EventSink::channel(16);
    drop(rx);
    // No receiver left: emit must not fail or block
    sink.emit(Event::TestPreparing {
        execution_id: ExecutionId::new("e-1"),
    });
}

#[tokio::test]
async fn disabled_sink_discards() {
    let sink = EventSink::disabled();
    sink.emit(Event::TestPreparing {
        execution_id: ExecutionId::new("e-1"),
    });
}

#[tokio::test]
async fn slow_subscriber_loses_events_but_never_blocks() {
    let (sink, mut rx) = EventSink::channel(4);
    for i in 0..32 {
        sink.emit(Event::TestPreparing {
            execution_id: ExecutionId::new(format!("e-{i}")),
        });
    }
    // The oldest events were dropped; the receiver reports the lag
    assert!(matches!(
        rx.try_recv(),
        Err(tokio::sync::broadcast::error::TryRecvError::Lagged(_))
    ));
}
