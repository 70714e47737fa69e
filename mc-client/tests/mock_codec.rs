//! Call-count expectations against a mocked codec

use async_trait::async_trait;
use mc_client::Session;
use mc_codec::{Codec, LinkEvents};
use mc_core::{ConnectionParams, ConnectionState, LinkIndicator, McError, McResult, ReadValues};
use mockall::mock;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

mock! {
    pub Plc {}

    #[async_trait]
    impl Codec for Plc {
        async fn open(&self, params: &ConnectionParams, events: LinkEvents) -> McResult<()>;
        fn close(&self);
        fn add_items(&self, addresses: &[String]) -> McResult<()>;
        fn remove_items(&self, addresses: &[String]) -> McResult<()>;
        async fn read_all(&self) -> McResult<ReadValues>;
        fn link_indicator(&self) -> LinkIndicator;
    }
}

fn params() -> ConnectionParams {
    ConnectionParams::new("10.0.0.1", 5007).with_reconnect_delay(Duration::from_millis(1000))
}

#[tokio::test]
async fn fail_fast_never_touches_the_codec() -> anyhow::Result<()> {
    let mut codec = MockPlc::new();
    codec
        .expect_link_indicator()
        .return_const(LinkIndicator::DISCONNECTED);
    codec.expect_open().never();
    codec.expect_add_items().never();
    codec.expect_read_all().never();
    codec.expect_remove_items().never();
    codec.expect_close().times(1).return_const(());

    let session = Session::builder()
        .params(params())
        .codec(Arc::new(codec))
        .auto_connect(false)
        .build()?;

    let result = session.submit(["D100"])?.await;
    assert_eq!(result, Err(McError::ConnectionUnavailable));
    // Never connected, so nothing to recover
    assert_eq!(session.current_state(), ConnectionState::Disconnected);
    session.shutdown().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn failed_open_is_retried_until_it_succeeds() -> anyhow::Result<()> {
    let attempts = Arc::new(AtomicUsize::new(0));
    let mut codec = MockPlc::new();
    let counter = Arc::clone(&attempts);
    codec.expect_open().times(4).returning(move |_, _| {
        if counter.fetch_add(1, Ordering::SeqCst) < 3 {
            Err(McError::LinkOpenFailure("connect ETIMEDOUT".to_string()))
        } else {
            Ok(())
        }
    });
    codec.expect_close().return_const(());
    codec
        .expect_link_indicator()
        .return_const(LinkIndicator::CONNECTED);

    let session = Session::spawn(Arc::new(codec), params())?;
    let mut state = session.watch_state();
    tokio::time::timeout(
        Duration::from_secs(10),
        state.wait_for(|s| *s == ConnectionState::Connected),
    )
    .await??;

    assert_eq!(attempts.load(Ordering::SeqCst), 4);
    session.shutdown().await;
    Ok(())
}
