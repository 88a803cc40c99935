use kensaku_core::{
    BridgeState, Client, Continuation, IndexId, IndexValue, Namespace, QueryDescriptor,
    StreamError, Transport as _,
};

use crate::{MemError, MemTransport};

fn ns() -> Namespace {
    Namespace::with_type("default", "B")
}

async fn populated(transport: MemTransport) -> MemTransport {
    for (key, age, city) in [
        ("alice", 31, "paris"),
        ("bob", 25, "lyon"),
        ("carol", 47, "paris"),
        ("dave", 25, "nantes"),
        ("erin", 60, "lille"),
    ] {
        transport
            .put(
                &ns(),
                key,
                [
                    (IndexId::integer("age"), IndexValue::Integer(age)),
                    (IndexId::binary("city"), IndexValue::from(city)),
                ],
            )
            .await;
    }
    transport.put(&Namespace::new("other"), "zed", []).await;
    transport
}

fn keys(entries: &[kensaku_core::Entry]) -> Vec<&str> {
    entries
        .iter()
        .map(|e| std::str::from_utf8(e.key()).unwrap())
        .collect()
}

#[tokio::test]
async fn bucket_query_over_two_pages() -> eyre::Result<()> {
    let transport = populated(MemTransport::builder().page_size(3).build()).await;
    let client = Client::builder(transport.clone()).build()?;
    let q = QueryDescriptor::bucket(ns()).build()?;

    let first = transport.fetch_page(&q).await?;
    assert_eq!(first.len(), 3);
    assert!(first.has_more());

    let response = client.execute(&q).await?;
    assert_eq!(keys(response.entries()), ["alice", "bob", "carol", "dave", "erin"]);
    assert_eq!(response.continuation(), None);
    assert!(
        response
            .entries()
            .iter()
            .all(|e| e.term() == Some(&IndexValue::from("B")))
    );
    assert_eq!(transport.fetches(), 3);
    Ok(())
}

#[tokio::test]
async fn integer_range_sorted_by_term() -> eyre::Result<()> {
    let transport = populated(MemTransport::builder().page_size(2).build()).await;
    let client = Client::builder(transport).build()?;

    let q = QueryDescriptor::int_range(ns(), "age", 25, 47)
        .return_terms(true)
        .build()?;
    let response = client.execute(&q).await?;
    assert_eq!(keys(response.entries()), ["bob", "dave", "alice", "carol"]);
    let terms: Vec<_> = response
        .entries()
        .iter()
        .filter_map(|e| e.term()?.as_integer())
        .collect();
    assert_eq!(terms, [25, 25, 31, 47]);

    let q = QueryDescriptor::int_exact(ns(), "age", 25).build()?;
    let response = client.execute(&q).await?;
    assert_eq!(keys(response.entries()), ["bob", "dave"]);
    assert!(response.entries().iter().all(|e| e.term().is_none()));
    Ok(())
}

#[tokio::test]
async fn binary_range_with_term_filter() -> eyre::Result<()> {
    let transport = populated(MemTransport::new()).await;
    let client = Client::builder(transport).build()?;

    let q = QueryDescriptor::bin_range(ns(), "city", "a", "z")
        .term_filter("ll")
        .build()?;
    assert_eq!(keys(client.execute(&q).await?.entries()), ["erin"]);

    let q = QueryDescriptor::bin_range(ns(), "city", "l", "p").build()?;
    assert_eq!(keys(client.execute(&q).await?.entries()), ["erin", "bob", "dave"]);
    Ok(())
}

#[tokio::test]
async fn key_range_and_delete() -> eyre::Result<()> {
    let transport = populated(MemTransport::new()).await;
    let client = Client::builder(transport.clone()).build()?;
    let q = QueryDescriptor::key_range(ns(), "b", "d").build()?;
    assert_eq!(keys(client.execute(&q).await?.entries()), ["bob", "carol"]);

    assert!(transport.delete(&ns(), b"bob").await);
    assert!(!transport.delete(&ns(), b"bob").await);
    assert_eq!(keys(client.execute(&q).await?.entries()), ["carol"]);
    Ok(())
}

#[tokio::test]
async fn max_results_then_resume() -> eyre::Result<()> {
    let transport = populated(MemTransport::builder().page_size(3).build()).await;
    let client = Client::builder(transport).build()?;

    let q = QueryDescriptor::bucket(ns()).max_results(4).build()?;
    let (head, continuation) = client.execute(&q).await?.into_parts();
    assert_eq!(keys(&head), ["alice", "bob", "carol", "dave"]);
    let continuation = continuation.expect("truncated query has a continuation");

    let q = QueryDescriptor::bucket(ns())
        .continuation(continuation)
        .build()?;
    let tail = client.execute(&q).await?;
    assert_eq!(keys(tail.entries()), ["erin"]);
    assert_eq!(tail.continuation(), None);
    Ok(())
}

#[tokio::test]
async fn continuations_are_bound_to_the_query_shape() -> eyre::Result<()> {
    let transport = populated(MemTransport::builder().page_size(2).build()).await;
    let page = transport
        .fetch_page(&QueryDescriptor::bucket(ns()).build()?)
        .await?;
    let continuation = page.continuation.expect("more pages");

    let foreign = QueryDescriptor::key_range(ns(), "a", "z")
        .continuation(continuation)
        .build()?;
    assert!(matches!(
        transport.fetch_page(&foreign).await,
        Err(MemError::ForeignContinuation)
    ));

    let malformed = QueryDescriptor::bucket(ns())
        .continuation(Continuation::from_bytes(*b"c1"))
        .build()?;
    assert!(matches!(
        transport.fetch_page(&malformed).await,
        Err(MemError::MalformedContinuation)
    ));
    Ok(())
}

#[tokio::test]
async fn injected_failure_keeps_partial_result() -> eyre::Result<()> {
    let transport = populated(MemTransport::builder().page_size(3).failing_at(1).build()).await;
    let client = Client::builder(transport).build()?;
    let q = QueryDescriptor::bucket(ns()).build()?;

    let err = client.execute(&q).await.unwrap_err();
    assert!(matches!(err.source, MemError::Injected { page: 1 }));
    assert_eq!(keys(err.partial.entries()), ["alice", "bob", "carol"]);
    assert!(err.partial.has_continuation());
    Ok(())
}

#[test]
fn streaming_end_to_end() -> eyre::Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    let transport = rt.block_on(populated(MemTransport::builder().page_size(2).build()));
    let client = Client::builder(transport.clone())
        .runtime(rt.handle().clone())
        .prefetch(1)
        .build()?;
    let q = QueryDescriptor::int_range(ns(), "age", 0, 100).build()?;

    let (response, completion) = client.stream(&q)?;
    let entries = response.iter()?.collect::<Result<Vec<_>, _>>()?;
    assert_eq!(keys(&entries), ["bob", "dave", "alice", "carol", "erin"]);
    assert_eq!(response.continuation()?, None);
    assert_eq!(completion.wait()?, None);
    assert_eq!(transport.fetches(), 3);
    Ok(())
}

#[test]
fn stalled_stream_is_cancelled() -> eyre::Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    let transport = rt.block_on(populated(
        MemTransport::builder().page_size(2).stalling_at(1).build(),
    ));
    let client = Client::builder(transport)
        .runtime(rt.handle().clone())
        .build()?;
    let q = QueryDescriptor::bucket(ns()).build()?;

    let (response, completion) = client.execute_streaming(&q, 1)?;
    let mut entries = response.iter()?;
    assert!(matches!(entries.next(), Some(Ok(_))));
    assert!(matches!(entries.next(), Some(Ok(_))));
    assert!(completion.abort());
    assert!(matches!(entries.next(), Some(Err(StreamError::Cancelled))));
    assert!(matches!(completion.wait(), Err(StreamError::Cancelled)));
    assert_eq!(response.state(), BridgeState::Cancelled);
    Ok(())
}
