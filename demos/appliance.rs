//! # Example: appliance
//!
//! A desktop rendition of the appliance: three modules on a simulated heap,
//! a late configuration load, a network coming up and a text renderer.
//!
//! Shows how to:
//! - Implement [`Module`] for base and overlay widgets.
//! - Guard a memory-heavy step with [`MemoryArbiter::request`] / `release`.
//! - Register a cleanup callback the arbiter runs under pressure.
//! - Drive the [`Renderer`] and stop everything with the runtime token.
//! - Turn button presses and alarms into buzzer tones.
//!
//! ## Flow
//! ```text
//! main
//!   ├─► RuntimeBuilder (SimulatedHeap, StaticConfig not ready)
//!   ├─► Runtime::run_until_shutdown()   (spawns Clock, Fetcher, Memory threads)
//!   ├─► t=2s: config ready  → threads leave the readiness gate
//!   ├─► t=3s: network up    → renderer switches to Dashboard
//!   ├─► t=5s..9s: button press, alarm on, alarm off → buzzer
//!   └─► t=12s: token.cancel() (or Ctrl-C earlier)
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=info cargo run --example appliance
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use modvisor::{
    Canvas, ConfigSection, ConnectivityChanged, CriticalAlarm, CriticalAlarmOff, Layer, Module,
    ModuleConfig, ModuleContext, ModuleDescriptor, ModuleError, ModuleRef, Operation, Press,
    Priority, Runtime, RuntimeBuilder, RuntimeConfig, SimulatedHeap, StaticConfig, StepState,
    TerminalEvent, Tone,
};

/// Counts seconds since it started.
#[derive(Default)]
struct Clock {
    seconds: AtomicU64,
    ready: AtomicBool,
    placement: Mutex<ModuleConfig>,
}

#[async_trait]
impl Module for Clock {
    async fn setup(&self) -> Result<(), ModuleError> {
        Ok(())
    }

    async fn run(&self, ctx: ModuleContext) -> Result<(), ModuleError> {
        self.ready.store(true, Ordering::Release);
        loop {
            tokio::select! {
                _ = ctx.cancelled() => return Ok(()),
                _ = tokio::time::sleep(Duration::from_secs(1)) => {
                    self.seconds.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
    }

    fn draw(&self, canvas: &mut dyn Canvas) {
        let p = self.placement.lock().map(|p| p.clone()).unwrap_or_default();
        if !p.enable {
            return;
        }
        let s = self.seconds.load(Ordering::Relaxed);
        canvas.text(
            p.position_x,
            p.position_y,
            &format!("uptime {:02}:{:02}", s / 60, s % 60),
        );
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    fn configure(&self, config: &ModuleConfig) {
        if let Ok(mut p) = self.placement.lock() {
            *p = config.clone();
        }
    }

    fn configure_from_section(&self, section: &ConfigSection) -> bool {
        section.get_str("format", "mm:ss") == "mm:ss"
    }

    fn layer(&self) -> Layer {
        Layer::Base
    }
}

/// Pretends to download and parse a forecast every few seconds.
struct Fetcher {
    heap: Arc<SimulatedHeap>,
    cache_bytes: Arc<AtomicUsize>,
    fetched: AtomicU64,
}

impl Fetcher {
    const PAYLOAD: usize = 24 * 1024;
    const CACHE: usize = 8 * 1024;

    async fn fetch_once(&self, ctx: &ModuleContext) {
        let step = (self.fetched.load(Ordering::Relaxed) % 100) as i8;
        ctx.publish(&TerminalEvent::new(step, "FETCH", "Fetching forecast", StepState::Processing));

        let arbiter = ctx.arbiter();
        if let Err(e) = arbiter
            .request(Operation::JsonParsing, Priority::Important, Self::PAYLOAD, ctx.name())
            .await
        {
            ctx.publish(
                &TerminalEvent::new(step, "FETCH", "Fetch skipped", StepState::Failure)
                    .with_extra(format!("({})", e.as_label())),
            );
            return;
        }

        // Simulated parse: the payload lives on the heap until release; the
        // parsed result is cached.
        self.heap.reserve(Self::PAYLOAD);
        tokio::time::sleep(Duration::from_millis(300)).await;
        self.heap.free(Self::PAYLOAD);
        if self.cache_bytes.load(Ordering::Acquire) == 0 && self.heap.reserve(Self::CACHE) {
            self.cache_bytes.store(Self::CACHE, Ordering::Release);
        }
        if let Err(e) = arbiter.release(Operation::JsonParsing, ctx.name()).await {
            log::warn!("fetcher release failed: {e}");
        }

        let n = self.fetched.fetch_add(1, Ordering::Relaxed) + 1;
        ctx.publish(
            &TerminalEvent::new(step, "FETCH", "Forecast updated", StepState::Success)
                .with_extra(format!("#{n}")),
        );
    }
}

#[async_trait]
impl Module for Fetcher {
    async fn setup(&self) -> Result<(), ModuleError> {
        Ok(())
    }

    async fn run(&self, ctx: ModuleContext) -> Result<(), ModuleError> {
        let heap = Arc::clone(&self.heap);
        let cache = Arc::clone(&self.cache_bytes);
        let cleanup = ctx
            .arbiter()
            .register_cleanup(ctx.name(), move || {
                let bytes = cache.swap(0, Ordering::AcqRel);
                heap.free(bytes);
            })
            .map_err(|e| ModuleError::fatal(e.to_string()))?;

        loop {
            self.fetch_once(&ctx).await;
            tokio::select! {
                _ = ctx.cancelled() => break,
                _ = tokio::time::sleep(Duration::from_secs(4)) => {}
            }
        }

        ctx.arbiter().unregister_cleanup(cleanup);
        Err(ModuleError::Canceled)
    }

    fn draw(&self, canvas: &mut dyn Canvas) {
        canvas.text(0, 16, &format!("forecasts {}", self.fetched.load(Ordering::Relaxed)));
    }

    fn is_ready(&self) -> bool {
        self.fetched.load(Ordering::Relaxed) > 0
    }

    fn configure(&self, _config: &ModuleConfig) {}

    fn configure_from_section(&self, _section: &ConfigSection) -> bool {
        true
    }

    fn layer(&self) -> Layer {
        Layer::Base
    }
}

/// Overlay showing heap figures, refreshed with the quiet arbiter path.
#[derive(Default)]
struct MemoryOverlay {
    free: AtomicUsize,
    low: AtomicBool,
}

#[async_trait]
impl Module for MemoryOverlay {
    async fn setup(&self) -> Result<(), ModuleError> {
        Ok(())
    }

    async fn run(&self, ctx: ModuleContext) -> Result<(), ModuleError> {
        while !ctx.is_cancelled() {
            let arbiter = ctx.arbiter();
            if arbiter
                .request_quiet(Operation::DisplayUpdate, Priority::Background, 512, ctx.name())
                .await
                .is_ok()
            {
                self.free.store(arbiter.free_heap(), Ordering::Relaxed);
                self.low.store(arbiter.is_low(), Ordering::Relaxed);
                let released = arbiter.release_quiet(Operation::DisplayUpdate, ctx.name()).await;
                if let Err(e) = released {
                    log::debug!("memory overlay release skipped: {e}");
                }
            }
            tokio::select! {
                _ = ctx.cancelled() => {}
                _ = tokio::time::sleep(Duration::from_millis(500)) => {}
            }
        }
        Ok(())
    }

    fn draw(&self, canvas: &mut dyn Canvas) {
        let free = self.free.load(Ordering::Relaxed);
        let flag = if self.low.load(Ordering::Relaxed) { " LOW" } else { "" };
        canvas.rect(80, 0, 48, 10, true);
        canvas.text(82, 1, &format!("{}K{flag}", free / 1024));
    }

    fn is_ready(&self) -> bool {
        true
    }

    fn configure(&self, _config: &ModuleConfig) {}

    fn configure_from_section(&self, _section: &ConfigSection) -> bool {
        true
    }

    fn layer(&self) -> Layer {
        Layer::Overlay
    }
}

/// Prints text calls to stdout; one line per call.
struct PrintCanvas;

impl Canvas for PrintCanvas {
    fn text(&mut self, x: i32, y: i32, text: &str) {
        println!("  ({x:>3},{y:>3}) {text}");
    }

    fn rect(&mut self, _x: i32, _y: i32, _width: u32, _height: u32, _filled: bool) {}
}

/// Prints tones instead of driving a speaker.
struct PrintTone;

impl Tone for PrintTone {
    fn start(&self, frequency_hz: u32, volume: u8) {
        println!("  ♪ {frequency_hz} Hz (volume {volume})");
    }

    fn stop(&self) {}
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let heap = Arc::new(SimulatedHeap::new(96 * 1024));
    heap.reserve(40 * 1024);

    let config = Arc::new(StaticConfig::new());
    config.insert_section(
        ConfigSection::new("clock")
            .with("position_x", "4")
            .with("position_y", "2")
            .with("enable", "yes"),
    );

    let fetch_heap = Arc::clone(&heap);
    let runtime: Arc<Runtime> = Arc::new(
        RuntimeBuilder::new(RuntimeConfig {
            frame_interval: Duration::from_secs(1),
            ..RuntimeConfig::default()
        })
        .with_heap(heap.clone())
        .with_config_source(config.clone())
        .with_welcome("Appliance booting")
        .with_module(ModuleDescriptor::new("Clock", "clock", 5, 4096, || {
            Ok(Arc::new(Clock::default()) as ModuleRef)
        }))
        .with_module(ModuleDescriptor::new("Fetcher", "fetcher", 2, 8192, move || {
            Ok(Arc::new(Fetcher {
                heap: Arc::clone(&fetch_heap),
                cache_bytes: Arc::new(AtomicUsize::new(0)),
                fetched: AtomicU64::new(0),
            }) as ModuleRef)
        }))
        .with_module(ModuleDescriptor::new("Memory", "memory", 3, 4096, || {
            Ok(Arc::new(MemoryOverlay::default()) as ModuleRef)
        }))
        .build()?,
    );

    let renderer = runtime.renderer();
    let token = runtime.token().clone();
    let frame_interval = runtime.config().frame_interval_clamped();
    let render = tokio::spawn(async move {
        let mut canvas = PrintCanvas;
        renderer.run(&mut canvas, frame_interval, &token).await;
    });

    let buzzer = runtime.buzzer(Arc::new(PrintTone));
    let token = runtime.token().clone();
    let sound = tokio::spawn(async move { buzzer.run(&token).await });

    let rt = Arc::clone(&runtime);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(2)).await;
        config.set_ready(true);
        tokio::time::sleep(Duration::from_secs(1)).await;
        rt.bus().publish(&ConnectivityChanged {
            connected: true,
            network: "demo-net".into(),
        });
        rt.bus().publish(&TerminalEvent::new(0, "WIFI", "Connected", StepState::Success));

        tokio::time::sleep(Duration::from_secs(2)).await;
        rt.button(1).publish(rt.bus(), Press::Short(Duration::from_millis(90)));
        tokio::time::sleep(Duration::from_secs(2)).await;
        rt.bus().publish(&CriticalAlarm {
            message: "heap low".into(),
            severity: 2,
        });
        tokio::time::sleep(Duration::from_secs(2)).await;
        rt.bus().publish(&CriticalAlarmOff {
            reason: "heap recovered".into(),
        });

        tokio::time::sleep(Duration::from_secs(3)).await;
        rt.arbiter().log_status("demo end").await;
        rt.token().cancel();
    });

    runtime.run_until_shutdown().await?;
    render.await?;
    sound.await?;
    Ok(())
}
