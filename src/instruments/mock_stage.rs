//! Mock linear stage instrument.
//!
//! Simulated single-axis stage for bench testing the server without hardware:
//! - configurable speed (default 10 mm/s) and travel (default 100 mm)
//! - motion takes `distance / speed` of real (tokio) time
//! - moves outside the travel range are refused as `ERROR_FROM_TOOL`
//!
//! Operations: `move_absolute`, `move_relative`, `home`, `read_position` and the
//! simulation-aware `run_program`, which validates its path without moving when the
//! server is simulated.

use crate::command::{HandlerResult, PartialReply};
use crate::configuration::ConfigPayload;
use crate::driver::{Execution, Instrument, ToolDriver};
use crate::registry::{NoArgs, OperationRegistry};
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::{sleep, Duration};
use tracing::{debug, info};

/// Tool family tag of the mock stage.
pub const MOCK_STAGE_TOOL_TYPE: &str = "mock_stage";

/// Speed assumed by duration estimates, in mm/s.
pub const NOMINAL_SPEED_MM_PER_SEC: f64 = 10.0;

/// Travel assumed by duration estimates, in mm.
pub const NOMINAL_TRAVEL_MM: f64 = 100.0;

/// Connection parameters (`params` of the configuration payload).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MockStageParams {
    /// Serial port name; must be non-empty
    pub port: String,
    /// Motion speed
    #[serde(default = "default_speed")]
    pub speed_mm_per_sec: f64,
    /// Usable travel, starting at 0
    #[serde(default = "default_travel")]
    pub travel_mm: f64,
}

fn default_speed() -> f64 {
    NOMINAL_SPEED_MM_PER_SEC
}

fn default_travel() -> f64 {
    NOMINAL_TRAVEL_MM
}

/// Arguments of `move_absolute`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveAbsolute {
    /// Target position in mm
    pub position_mm: f64,
}

/// Arguments of `move_relative`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveRelative {
    /// Signed displacement in mm
    pub distance_mm: f64,
}

/// Arguments of `run_program`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunProgram {
    /// Absolute positions visited in order
    pub positions_mm: Vec<f64>,
    /// Pause at each position, in seconds
    #[serde(default)]
    pub dwell_secs: u64,
}

fn travel_secs(distance_mm: f64) -> Result<u64> {
    let secs = (distance_mm.abs() / NOMINAL_SPEED_MM_PER_SEC).ceil();
    // u64::MAX as f64 rounds up to 2^64, which is itself out of range.
    if !(secs.is_finite() && secs < u64::MAX as f64) {
        bail!("travel of {distance_mm} mm has no representable duration");
    }
    Ok(secs as u64)
}

fn check_finite(value: f64, what: &str) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(anyhow!("{what} must be a finite number"))
    }
}

/// Connected mock stage.
pub struct MockStageDriver {
    port: String,
    position: RwLock<f64>,
    speed_mm_per_sec: f64,
    travel_mm: f64,
    open: AtomicBool,
}

impl MockStageDriver {
    /// Open the stage on `params.port`, parked at 0 mm.
    pub fn open(params: MockStageParams) -> Result<Self> {
        if params.port.trim().is_empty() {
            bail!("mock stage requires a non-empty port");
        }
        if !(params.speed_mm_per_sec.is_finite() && params.speed_mm_per_sec > 0.0) {
            bail!("speed_mm_per_sec must be positive, got {}", params.speed_mm_per_sec);
        }
        if !(params.travel_mm.is_finite() && params.travel_mm > 0.0) {
            bail!("travel_mm must be positive, got {}", params.travel_mm);
        }

        info!(port = %params.port, "Mock stage opened");
        Ok(Self {
            port: params.port,
            position: RwLock::new(0.0),
            speed_mm_per_sec: params.speed_mm_per_sec,
            travel_mm: params.travel_mm,
            open: AtomicBool::new(true),
        })
    }

    /// Port the stage was opened on.
    pub fn port(&self) -> &str {
        &self.port
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    /// Usable travel in mm.
    pub fn travel_mm(&self) -> f64 {
        self.travel_mm
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(anyhow!("port {} is closed", self.port))
        }
    }

    fn in_travel(&self, position_mm: f64) -> bool {
        (0.0..=self.travel_mm).contains(&position_mm)
    }

    /// Current position in mm.
    pub async fn position(&self) -> Result<f64> {
        self.ensure_open()?;
        Ok(*self.position.read().await)
    }

    /// Move to `target` mm, taking `distance / speed` seconds.
    ///
    /// Returns `Ok(false)` without moving when the target is outside the travel range.
    pub async fn move_abs(&self, target: f64) -> Result<bool> {
        self.ensure_open()?;
        check_finite(target, "position_mm")?;
        if !self.in_travel(target) {
            return Ok(false);
        }

        let current = *self.position.read().await;
        let delay = Duration::try_from_secs_f64((target - current).abs() / self.speed_mm_per_sec)
            .map_err(|e| anyhow!("move from {current} to {target} mm is too slow to time: {e}"))?;
        debug!(from = current, to = target, ?delay, "Mock stage moving");
        sleep(delay).await;

        *self.position.write().await = target;
        Ok(true)
    }
}

#[async_trait]
impl ToolDriver for MockStageDriver {
    async fn close(&self) -> Result<()> {
        self.open.store(false, Ordering::SeqCst);
        info!(port = %self.port, "Mock stage closed");
        Ok(())
    }
}

async fn moved_to(stage: &MockStageDriver, target: f64) -> HandlerResult {
    if stage.move_abs(target).await? {
        Ok(Some(PartialReply::success().with_metadata("position_mm", target)))
    } else {
        Ok(Some(PartialReply::tool_error(format!(
            "target {target} mm is outside travel 0..={} mm",
            stage.travel_mm()
        ))))
    }
}

async fn move_absolute(stage: Arc<MockStageDriver>, args: MoveAbsolute) -> HandlerResult {
    moved_to(&stage, args.position_mm).await
}

async fn move_relative(stage: Arc<MockStageDriver>, args: MoveRelative) -> HandlerResult {
    check_finite(args.distance_mm, "distance_mm")?;
    let current = stage.position().await?;
    moved_to(&stage, current + args.distance_mm).await
}

async fn home(stage: Arc<MockStageDriver>, _: NoArgs) -> HandlerResult {
    stage.move_abs(0.0).await?;
    Ok(None)
}

async fn read_position(stage: Arc<MockStageDriver>, _: NoArgs) -> HandlerResult {
    let position = stage.position().await?;
    Ok(Some(PartialReply::success().with_metadata("position_mm", position)))
}

async fn run_program(execution: Execution<MockStageDriver>, args: RunProgram) -> HandlerResult {
    for position in &args.positions_mm {
        check_finite(*position, "positions_mm")?;
    }

    let Some(stage) = execution.driver() else {
        // Dry run: validate the path against nominal travel without moving.
        if let Some(bad) = args
            .positions_mm
            .iter()
            .find(|p| !(0.0..=NOMINAL_TRAVEL_MM).contains(*p))
        {
            return Ok(Some(PartialReply::tool_error(format!(
                "program visits {bad} mm, outside nominal travel"
            ))));
        }
        return Ok(Some(
            PartialReply::success().with_metadata("steps", args.positions_mm.len()),
        ));
    };

    for (step, position) in args.positions_mm.iter().enumerate() {
        if !stage.move_abs(*position).await? {
            return Ok(Some(
                PartialReply::tool_error(format!("step {step}: {position} mm is outside travel"))
                    .with_metadata("completed_steps", step),
            ));
        }
        sleep(Duration::from_secs(args.dwell_secs)).await;
    }

    let final_position = stage.position().await?;
    Ok(Some(
        PartialReply::success()
            .with_metadata("steps", args.positions_mm.len())
            .with_metadata("position_mm", final_position),
    ))
}

fn estimate_program(args: &RunProgram) -> Result<u64> {
    let mut last = 0.0;
    let mut secs: u64 = 0;
    for position in &args.positions_mm {
        check_finite(*position, "positions_mm")?;
        secs = travel_secs(position - last)?
            .checked_add(args.dwell_secs)
            .and_then(|step| secs.checked_add(step))
            .ok_or_else(|| anyhow!("program duration overflows"))?;
        last = *position;
    }
    Ok(secs)
}

/// Factory for [`MockStageDriver`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockStage;

impl MockStage {
    /// Create the instrument.
    pub fn new() -> Self {
        Self
    }
}

async fn connect_stage(payload: ConfigPayload) -> Result<MockStageDriver> {
    let params: MockStageParams = payload.params_as()?;
    MockStageDriver::open(params)
}

impl Instrument for MockStage {
    type Driver = MockStageDriver;

    fn tool_type(&self) -> &'static str {
        MOCK_STAGE_TOOL_TYPE
    }

    fn operations(&self) -> OperationRegistry<MockStageDriver> {
        let mut ops = OperationRegistry::new();
        ops.register("move_absolute", move_absolute, |args: &MoveAbsolute| {
            check_finite(args.position_mm, "position_mm")?;
            travel_secs(args.position_mm)
        })
        .register("move_relative", move_relative, |args: &MoveRelative| {
            check_finite(args.distance_mm, "distance_mm")?;
            travel_secs(args.distance_mm)
        })
        .register("home", home, |_| travel_secs(NOMINAL_TRAVEL_MM))
        .register("read_position", read_position, |_| Ok(0))
        .register_simulation_aware("run_program", run_program, estimate_program);
        ops
    }

    fn connect(&self, payload: ConfigPayload) -> BoxFuture<'static, Result<MockStageDriver>> {
        connect_stage(payload).boxed()
    }
}
