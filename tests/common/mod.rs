//! Shared test instrument: a "bench" tool whose hooks and handlers count their calls.
#![allow(dead_code)]

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tool_server::command::{Command, HandlerResult, OperationCall, PartialReply};
use tool_server::configuration::ConfigPayload;
use tool_server::dispatcher::DispatchSettings;
use tool_server::driver::{Execution, Instrument, ToolDriver};
use tool_server::registry::{NoArgs, OperationRegistry};
use tool_server::server::ToolServer;

pub const BENCH: &str = "bench";

/// Invocation counters shared between the instrument, its drivers and the test.
#[derive(Debug, Default)]
pub struct Counters {
    pub connects: AtomicUsize,
    pub closes: AtomicUsize,
    pub handler_calls: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl Counters {
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn handler_calls(&self) -> usize {
        self.handler_calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

pub struct BenchInstrument {
    counters: Arc<Counters>,
}

pub struct BenchDriver {
    counters: Arc<Counters>,
}

#[async_trait]
impl ToolDriver for BenchDriver {
    async fn close(&self) -> Result<()> {
        self.counters.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct BenchParams {
    port: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wait {
    pub seconds: u64,
}

async fn open(counters: Arc<Counters>, payload: ConfigPayload) -> Result<BenchDriver> {
    counters.connects.fetch_add(1, Ordering::SeqCst);
    let params: BenchParams = payload.params_as()?;
    if params.port == "busy" {
        bail!("port busy");
    }
    Ok(BenchDriver { counters })
}

async fn ping(bench: Arc<BenchDriver>, _: NoArgs) -> HandlerResult {
    bench.counters.handler_calls.fetch_add(1, Ordering::SeqCst);
    Ok(None)
}

async fn fail(bench: Arc<BenchDriver>, _: NoArgs) -> HandlerResult {
    bench.counters.handler_calls.fetch_add(1, Ordering::SeqCst);
    Err(anyhow!("motor stalled"))
}

async fn tool_error(bench: Arc<BenchDriver>, _: NoArgs) -> HandlerResult {
    bench.counters.handler_calls.fetch_add(1, Ordering::SeqCst);
    Ok(Some(
        PartialReply::tool_error("sample missing").with_metadata("slot", 4),
    ))
}

async fn wait(bench: Arc<BenchDriver>, args: Wait) -> HandlerResult {
    let counters = &bench.counters;
    counters.handler_calls.fetch_add(1, Ordering::SeqCst);
    let now = counters.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    counters.max_in_flight.fetch_max(now, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_secs(args.seconds)).await;
    counters.in_flight.fetch_sub(1, Ordering::SeqCst);
    Ok(None)
}

impl Instrument for BenchInstrument {
    type Driver = BenchDriver;

    fn tool_type(&self) -> &'static str {
        BENCH
    }

    fn operations(&self) -> OperationRegistry<BenchDriver> {
        let counters = Arc::clone(&self.counters);
        let mut ops = OperationRegistry::new();
        ops.register("ping", ping, |_| Ok(2))
            .register("fail", fail, |_| Ok(1))
            .register("tool_error", tool_error, |_| Ok(1))
            .register("wait", wait, |args: &Wait| Ok(args.seconds))
            .register_simulation_aware(
                "run_program",
                move |execution: Execution<BenchDriver>, _: NoArgs| {
                    let counters = Arc::clone(&counters);
                    async move {
                        counters.handler_calls.fetch_add(1, Ordering::SeqCst);
                        Ok(Some(
                            PartialReply::success()
                                .with_metadata("simulated", execution.is_simulated()),
                        ))
                    }
                },
                |_| Ok(30),
            );
        ops
    }

    fn connect(&self, payload: ConfigPayload) -> BoxFuture<'static, Result<BenchDriver>> {
        open(Arc::clone(&self.counters), payload).boxed()
    }
}

pub fn bench_instrument() -> (BenchInstrument, Arc<Counters>) {
    let counters = Arc::new(Counters::default());
    (
        BenchInstrument {
            counters: Arc::clone(&counters),
        },
        counters,
    )
}

pub fn bench_server_with(
    settings: DispatchSettings,
) -> (Arc<ToolServer<BenchInstrument>>, Arc<Counters>) {
    let (instrument, counters) = bench_instrument();
    (Arc::new(ToolServer::new(instrument, settings)), counters)
}

pub fn bench_server() -> (Arc<ToolServer<BenchInstrument>>, Arc<Counters>) {
    bench_server_with(DispatchSettings::default())
}

pub fn hardware(port: &str) -> ConfigPayload {
    ConfigPayload::hardware(BENCH, json!({ "port": port }))
}

pub fn simulated() -> ConfigPayload {
    ConfigPayload::simulated(BENCH)
}

pub fn op(name: &str) -> Command {
    Command::new(BENCH, OperationCall::bare(name))
}

pub fn wait_for(seconds: u64) -> Command {
    Command::new(
        BENCH,
        OperationCall::new("wait", json!({ "seconds": seconds })),
    )
}
