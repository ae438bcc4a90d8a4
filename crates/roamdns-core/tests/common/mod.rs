//! Test doubles and common utilities for contract tests
//!
//! `MockDnsProvider` keeps an in-memory record table and counts every call,
//! so tests can assert exactly which provider operations a flow issued.
//! Clones share the same table and counters. `FailingSink` rejects every
//! insert and counts the attempts.

#![allow(dead_code)]

use roamdns_core::error::{Error, Result};
use roamdns_core::protocol::{Request, Response, read_message, write_message};
use roamdns_core::traits::{AddressSink, DnsProvider, DnsRecord, RecordType};
use roamdns_core::{MemorySink, Reconciler, Server, ServerHandle};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpStream;

pub const DOMAIN: &str = "example.com";

/// A provider call, as seen by the mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Find { name: String },
    Create { name: String, record_type: RecordType, value: String },
    Update { id: String, name: String, record_type: RecordType, value: String },
    Delete { id: String },
}

#[derive(Default)]
struct MockState {
    records: Mutex<HashMap<String, DnsRecord>>,
    calls: Mutex<Vec<Call>>,
    next_id: AtomicUsize,
    find_count: AtomicUsize,
    create_count: AtomicUsize,
    update_count: AtomicUsize,
    delete_count: AtomicUsize,
    /// Lookups that fail before lookups start succeeding
    lookup_failures: AtomicUsize,
    /// Fail every create/update/delete
    fail_writes: AtomicBool,
}

/// A mock DnsProvider backed by a record table
#[derive(Clone, Default)]
pub struct MockDnsProvider {
    state: Arc<MockState>,
}

impl MockDnsProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate a record, returning its id
    pub fn seed(&self, name: &str, value: &str) -> String {
        let id = self.next_id();
        self.state.records.lock().unwrap().insert(
            name.to_string(),
            DnsRecord {
                id: id.clone(),
                name: name.to_string(),
                value: value.to_string(),
                record_type: RecordType::A,
            },
        );
        id
    }

    /// Make the next `n` lookups fail
    pub fn fail_lookups(&self, n: usize) {
        self.state.lookup_failures.store(n, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.state.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn record(&self, name: &str) -> Option<DnsRecord> {
        self.state.records.lock().unwrap().get(name).cloned()
    }

    pub fn record_count(&self) -> usize {
        self.state.records.lock().unwrap().len()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.calls.lock().unwrap().clone()
    }

    pub fn find_count(&self) -> usize {
        self.state.find_count.load(Ordering::SeqCst)
    }

    pub fn create_count(&self) -> usize {
        self.state.create_count.load(Ordering::SeqCst)
    }

    pub fn update_count(&self) -> usize {
        self.state.update_count.load(Ordering::SeqCst)
    }

    pub fn delete_count(&self) -> usize {
        self.state.delete_count.load(Ordering::SeqCst)
    }

    /// Number of create/update/delete calls
    pub fn mutation_count(&self) -> usize {
        self.create_count() + self.update_count() + self.delete_count()
    }

    fn next_id(&self) -> String {
        format!("rec-{}", self.state.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn log(&self, call: Call) {
        self.state.calls.lock().unwrap().push(call);
    }

    fn check_writes(&self) -> Result<()> {
        if self.state.fail_writes.load(Ordering::SeqCst) {
            Err(Error::provider("mock", "write rejected"))
        } else {
            Ok(())
        }
    }
}

#[async_trait::async_trait]
impl DnsProvider for MockDnsProvider {
    async fn find_record(&self, _domain: &str, record_name: &str) -> Result<Option<DnsRecord>> {
        self.state.find_count.fetch_add(1, Ordering::SeqCst);
        self.log(Call::Find {
            name: record_name.to_string(),
        });

        let failures = &self.state.lookup_failures;
        if failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(Error::dns_provider("lookup timed out"));
        }

        Ok(self.record(record_name))
    }

    async fn create_record(
        &self,
        _domain: &str,
        record_name: &str,
        record_type: RecordType,
        value: &str,
    ) -> Result<String> {
        self.state.create_count.fetch_add(1, Ordering::SeqCst);
        self.log(Call::Create {
            name: record_name.to_string(),
            record_type,
            value: value.to_string(),
        });
        self.check_writes()?;

        let id = self.next_id();
        self.state.records.lock().unwrap().insert(
            record_name.to_string(),
            DnsRecord {
                id: id.clone(),
                name: record_name.to_string(),
                value: value.to_string(),
                record_type,
            },
        );
        Ok(id)
    }

    async fn update_record(
        &self,
        record_id: &str,
        record_name: &str,
        record_type: RecordType,
        value: &str,
    ) -> Result<()> {
        self.state.update_count.fetch_add(1, Ordering::SeqCst);
        self.log(Call::Update {
            id: record_id.to_string(),
            name: record_name.to_string(),
            record_type,
            value: value.to_string(),
        });
        self.check_writes()?;

        let mut records = self.state.records.lock().unwrap();
        let record = records
            .values_mut()
            .find(|r| r.id == record_id)
            .ok_or_else(|| Error::not_found(format!("record {}", record_id)))?;
        record.value = value.to_string();
        record.record_type = record_type;
        Ok(())
    }

    async fn delete_record(&self, record_id: &str) -> Result<()> {
        self.state.delete_count.fetch_add(1, Ordering::SeqCst);
        self.log(Call::Delete {
            id: record_id.to_string(),
        });
        self.check_writes()?;

        self.state
            .records
            .lock()
            .unwrap()
            .retain(|_, r| r.id != record_id);
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

/// Reconciler over `provider` with no delay between lookup attempts
pub fn fast_reconciler(provider: &MockDnsProvider) -> Reconciler {
    Reconciler::new(Arc::new(provider.clone()), DOMAIN)
        .with_lookup_retry(3, Duration::ZERO)
}

/// A sink whose inserts always fail
#[derive(Clone, Default)]
pub struct FailingSink {
    attempts: Arc<AtomicUsize>,
}

impl FailingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl AddressSink for FailingSink {
    async fn insert_observed_address(&self, _name: &str, _address: &str) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(Error::sink("table unavailable"))
    }

    fn sink_name(&self) -> &'static str {
        "failing"
    }
}

/// Bind a server over `provider` and `sink` on an ephemeral loopback port
pub async fn bind_server(
    provider: &MockDnsProvider,
    sink: Arc<dyn AddressSink>,
    read_timeout: Duration,
) -> ServerHandle {
    Server::new(fast_reconciler(provider), sink)
        .with_read_timeout(read_timeout)
        .bind("127.0.0.1:0")
        .await
        .expect("bind to loopback succeeds")
}

/// A running server on an ephemeral loopback port
pub struct TestServer {
    pub handle: ServerHandle,
    pub provider: MockDnsProvider,
    pub sink: MemorySink,
}

impl TestServer {
    pub async fn start() -> Self {
        Self::start_with(MockDnsProvider::new()).await
    }

    pub async fn start_with(provider: MockDnsProvider) -> Self {
        let sink = MemorySink::new();
        let handle =
            bind_server(&provider, Arc::new(sink.clone()), Duration::from_secs(2)).await;

        Self {
            handle,
            provider,
            sink,
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.handle.local_addr()
    }
}

/// Send one request and read one response over a fresh connection
pub async fn exchange(addr: SocketAddr, request: &Request) -> Result<Response> {
    let mut stream = TcpStream::connect(addr).await?;
    write_message(&mut stream, request).await?;
    read_message(&mut stream).await
}

/// Report `name` to the server at `addr`
pub async fn report(addr: SocketAddr, name: &str) -> Result<Response> {
    exchange(addr, &Request::report_address(name)?).await
}
