// crates/chat-core/tests/write_path_scenarios.rs
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chat_core::{
    ChannelSink, ChatError, ChatService, ClientId, ConnectionRegistry, HandleState, MemoryStore,
    Message, MessageStore, PushEvent, StoreError, Termination,
};
use tokio::sync::mpsc::Receiver;
use tokio::sync::oneshot;

fn client(id: &str) -> ClientId {
    ClientId::new(id).unwrap()
}

async fn connect(registry: &ConnectionRegistry, id: &str) -> Receiver<PushEvent> {
    let (sink, mut rx) = ChannelSink::new(32);
    registry.open_connection(client(id), sink).await.unwrap();
    assert_eq!(rx.recv().await, Some(PushEvent::Connect));
    rx
}

/// Store that refuses every write and counts attempts.
#[derive(Default)]
struct BrokenStore {
    attempts: AtomicUsize,
}

impl MessageStore for BrokenStore {
    fn save(&self, _content: &str) -> Result<Message, StoreError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(StoreError::Database("disk full".into()))
    }

    fn list_all(&self) -> Result<Vec<Message>, StoreError> {
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn connect_submit_reconnect_scenario() {
    let store = Arc::new(MemoryStore::new());
    let registry = ConnectionRegistry::default();
    let service = ChatService::new(store.clone(), registry.clone());

    // Register "s1": the keep-alive arrives before open_connection returns.
    let (sink, mut first_rx) = ChannelSink::new(32);
    let first = registry.open_connection(client("s1"), sink).await.unwrap();
    assert_eq!(first_rx.try_recv().unwrap(), PushEvent::Connect);

    // Submit "hello": stored with id 1 and pushed with that exact body.
    let saved = service.submit_message("hello").await.unwrap();
    assert_eq!(saved, Message::new(1, "hello"));
    assert_eq!(store.list_all().unwrap(), vec![Message::new(1, "hello")]);
    assert_eq!(first_rx.recv().await, Some(PushEvent::Chat(Message::new(1, "hello"))));

    // Reconnect as "s1": the first transport is closed, the registry keeps
    // only the second handle.
    let (sink, mut second_rx) = ChannelSink::new(32);
    let second = registry.open_connection(client("s1"), sink).await.unwrap();

    assert_eq!(first_rx.recv().await, None);
    assert_eq!(first.state(), HandleState::Closed);
    assert_eq!(second_rx.recv().await, Some(PushEvent::Connect));
    assert_eq!(registry.len(), 1);
    assert_eq!(registry.get(&client("s1")).unwrap().id(), second.id());
}

#[tokio::test]
async fn every_client_sees_messages_in_submission_order() {
    let registry = ConnectionRegistry::default();
    let service = ChatService::new(Arc::new(MemoryStore::new()), registry.clone());

    let mut receivers = Vec::new();
    for id in ["a", "b", "c"] {
        receivers.push(connect(&registry, id).await);
    }

    for text in ["one", "two", "three", "four"] {
        service.submit_message(text).await.unwrap();
    }

    for rx in &mut receivers {
        let mut seen = Vec::new();
        for _ in 0..4 {
            match rx.recv().await {
                Some(PushEvent::Chat(m)) => seen.push(m.content),
                other => panic!("unexpected {other:?}"),
            }
        }
        assert_eq!(seen, vec!["one", "two", "three", "four"]);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_writers_are_delivered_in_commit_order() {
    let registry = ConnectionRegistry::default();
    let service = Arc::new(ChatService::new(Arc::new(MemoryStore::new()), registry.clone()));
    let mut rx = connect(&registry, "watcher").await;

    let writers: Vec<_> = (0..20)
        .map(|i| {
            let service = service.clone();
            tokio::spawn(async move { service.submit_message(&format!("m{i}")).await })
        })
        .collect();
    for writer in writers {
        writer.await.unwrap().unwrap();
    }

    let mut ids = Vec::new();
    for _ in 0..20 {
        match rx.recv().await {
            Some(PushEvent::Chat(m)) => ids.push(m.id),
            other => panic!("unexpected {other:?}"),
        }
    }
    let mut sorted = ids.clone();
    sorted.sort();
    assert_eq!(ids, sorted);
}

#[tokio::test]
async fn broadcast_failures_do_not_fail_the_write() {
    let store = Arc::new(MemoryStore::new());
    let registry = ConnectionRegistry::default();
    let service = ChatService::new(store.clone(), registry.clone());

    for id in ["x", "y", "z"] {
        let rx = connect(&registry, id).await;
        drop(rx);
    }

    let saved = service.submit_message("still saved").await.unwrap();

    assert_eq!(saved.id, 1);
    assert_eq!(store.list_all().unwrap().len(), 1);
    assert!(registry.is_empty());
}

#[tokio::test]
async fn persistence_failure_skips_broadcast() {
    let store = Arc::new(BrokenStore::default());
    let registry = ConnectionRegistry::default();
    let service = ChatService::new(store.clone(), registry.clone());
    let mut rx = connect(&registry, "listener").await;

    let err = service.submit_message("lost").await.unwrap_err();

    assert_eq!(
        err,
        ChatError::PersistenceFailure(StoreError::Database("disk full".into()))
    );
    assert_eq!(store.attempts.load(Ordering::SeqCst), 1);
    assert!(rx.try_recv().is_err());
    assert_eq!(registry.len(), 1);
}

#[tokio::test]
async fn blank_message_is_rejected_before_the_store() {
    let store = Arc::new(BrokenStore::default());
    let service = ChatService::new(store.clone(), ConnectionRegistry::default());

    assert_eq!(service.submit_message("  ").await, Err(ChatError::InvalidMessage));
    assert_eq!(store.attempts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn listing_returns_newest_first() {
    let service = ChatService::new(Arc::new(MemoryStore::new()), ConnectionRegistry::default());
    service.submit_message("old").await.unwrap();
    service.submit_message("new").await.unwrap();

    let listed = service.list_messages().await.unwrap();
    assert_eq!(listed, vec![Message::new(2, "new"), Message::new(1, "old")]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn connect_is_first_event_while_writes_stream_in() {
    let registry = ConnectionRegistry::default();
    let service = Arc::new(ChatService::new(Arc::new(MemoryStore::new()), registry.clone()));
    let stop = Arc::new(AtomicBool::new(false));

    let writer = {
        let service = service.clone();
        let stop = stop.clone();
        tokio::spawn(async move {
            let mut n = 0u64;
            while !stop.load(Ordering::Relaxed) {
                service.submit_message(&format!("w{n}")).await.unwrap();
                n += 1;
            }
        })
    };

    let openers: Vec<_> = (0..500)
        .map(|i| {
            let registry = registry.clone();
            tokio::spawn(async move {
                let (sink, mut rx) = ChannelSink::new(1024);
                let handle = registry
                    .open_connection(client(&format!("c{i}")), sink)
                    .await
                    .unwrap();
                let first = rx.recv().await;
                handle.terminate(Termination::Complete);
                first
            })
        })
        .collect();

    for opener in openers {
        assert_eq!(opener.await.unwrap(), Some(PushEvent::Connect));
    }
    stop.store(true, Ordering::Relaxed);
    writer.await.unwrap();
}

/// Store whose `save` parks its thread until the test opens the gate.
struct GatedStore {
    started: Mutex<Option<oneshot::Sender<()>>>,
    gate: Mutex<std::sync::mpsc::Receiver<()>>,
    inner: MemoryStore,
}

impl MessageStore for GatedStore {
    fn save(&self, content: &str) -> Result<Message, StoreError> {
        if let Some(started) = self.started.lock().unwrap().take() {
            let _ = started.send(());
        }
        self.gate
            .lock()
            .unwrap()
            .recv_timeout(Duration::from_secs(2))
            .map_err(|_| StoreError::Io("gate never opened".into()))?;
        self.inner.save(content)
    }

    fn list_all(&self) -> Result<Vec<Message>, StoreError> {
        self.inner.list_all()
    }
}

#[tokio::test(flavor = "current_thread")]
async fn store_calls_leave_the_runtime_free() {
    let (started_tx, started_rx) = oneshot::channel();
    let (gate_tx, gate_rx) = std::sync::mpsc::channel();
    let store = Arc::new(GatedStore {
        started: Mutex::new(Some(started_tx)),
        gate: Mutex::new(gate_rx),
        inner: MemoryStore::new(),
    });
    let service = Arc::new(ChatService::new(store, ConnectionRegistry::default()));

    let submit = {
        let service = service.clone();
        tokio::spawn(async move { service.submit_message("gated").await })
    };

    // Only reachable if the blocked save is off the single runtime thread.
    started_rx.await.unwrap();
    gate_tx.send(()).unwrap();

    assert_eq!(submit.await.unwrap(), Ok(Message::new(1, "gated")));
}
