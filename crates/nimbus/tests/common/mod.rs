//! Common test utilities and helpers

use async_trait::async_trait;
use nimbus::auth::AuthResolver;
use nimbus::transport::Transport;
use nimbus::{Client, FailCodeTable, ProviderProfile};
use nimbus_transport::MockTransport;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::watch;

/// Auth resolver the test releases by hand.
///
/// `authenticate` blocks until [`GateAuth::release`] or [`GateAuth::reject`]
/// is called and counts how often it ran.
#[derive(Debug, Clone)]
pub struct GateAuth {
    calls: Arc<AtomicUsize>,
    gate: watch::Sender<Option<bool>>,
}

#[allow(dead_code)]
impl GateAuth {
    pub fn new() -> Self {
        let (gate, _) = watch::channel(None);
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            gate,
        }
    }

    /// Let authentication succeed.
    pub fn release(&self) {
        self.gate.send_replace(Some(true));
    }

    /// Let authentication fail.
    pub fn reject(&self) {
        self.gate.send_replace(Some(false));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthResolver for GateAuth {
    async fn authenticate(&self, _transport: &dyn Transport) -> nimbus::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut rx = self.gate.subscribe();
        let decision = rx
            .wait_for(Option::is_some)
            .await
            .map(|v| *v)
            .map_err(|_| nimbus::Error::Auth("gate dropped".into()))?;
        match decision {
            Some(true) => Ok(()),
            _ => Err(nimbus::Error::Auth("credentials rejected".into())),
        }
    }
}

/// Gated client against `transport`, authenticating through `auth`.
#[allow(dead_code)]
pub fn gated_client(transport: &MockTransport, auth: &GateAuth) -> Client {
    Client::builder()
        .profile(
            ProviderProfile::builder("testcloud")
                .base_url("http://cloud.test/v1/acct")
                .unwrap()
                .fail_codes(FailCodeTable::openstack())
                .auth(auth.clone())
                .auth_gated(true)
                .build(),
        )
        .transport(Arc::new(transport.clone()))
        .build()
        .unwrap()
}

/// Ungated client against `transport`.
#[allow(dead_code)]
pub fn direct_client(transport: &MockTransport) -> Client {
    Client::builder()
        .profile(
            ProviderProfile::builder("testcloud")
                .base_url("http://cloud.test/v1/acct")
                .unwrap()
                .fail_codes(FailCodeTable::openstack())
                .build(),
        )
        .transport(Arc::new(transport.clone()))
        .build()
        .unwrap()
}

/// Let spawned request tasks make progress.
#[allow(dead_code)]
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}
