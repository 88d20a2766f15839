use std::cell::RefCell;
use std::env;
use std::rc::Rc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use pixels::Error as PixelsError;
use thiserror::Error;
use tracing::{error, info, warn};
use winit::dpi::LogicalSize;
use winit::error::{EventLoopError, OsError};
use winit::event::{ElementState, Event, KeyEvent, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::WindowBuilder;

use crate::scene::{Controller, Flow, SceneLoadError, FRAME_DELAY_MS};

use super::metrics::MetricsAccumulator;
use super::rendering::Renderer;
use super::{ActionStates, InputAction, InputSnapshot, MetricsHandle};

pub const SLOW_FRAME_ENV_VAR: &str = "MAPENGINE_SLOW_FRAME_MS";

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub window_title: String,
    /// Pixel buffer size. Falls back to the initial scene's `display_size`.
    pub display_size: Option<(u32, u32)>,
    /// One tick per delay.
    pub frame_delay: Duration,
    pub max_frame_delta: Duration,
    pub max_ticks_per_frame: u32,
    pub metrics_log_interval: Duration,
    pub simulated_slow_frame_ms: u64,
    /// Turns godmode on for the controller. Never turns it off.
    pub godmode: bool,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            window_title: "mapengine".to_string(),
            display_size: None,
            frame_delay: Duration::from_millis(FRAME_DELAY_MS),
            max_frame_delta: Duration::from_millis(250),
            max_ticks_per_frame: 5,
            metrics_log_interval: Duration::from_secs(1),
            simulated_slow_frame_ms: 0,
            godmode: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to create event loop: {0}")]
    CreateEventLoop(#[source] EventLoopError),
    #[error("failed to create application window: {0}")]
    CreateWindow(#[source] OsError),
    #[error("failed to initialize renderer: {0}")]
    CreateRenderer(#[source] PixelsError),
    #[error("failed to present frame: {0}")]
    Present(#[source] PixelsError),
    #[error("restart failed: {0}")]
    Restart(#[from] SceneLoadError),
    #[error("event loop failed: {0}")]
    EventLoopRun(#[source] EventLoopError),
}

pub fn run_app(config: LoopConfig, controller: Controller) -> Result<(), AppError> {
    run_app_with_metrics(config, controller, MetricsHandle::default())
}

pub fn run_app_with_metrics(
    config: LoopConfig,
    mut controller: Controller,
    metrics_handle: MetricsHandle,
) -> Result<(), AppError> {
    if config.godmode {
        controller.set_godmode(true);
    }
    let (width, height) = config
        .display_size
        .unwrap_or(controller.scene().config().display_size);

    let event_loop = EventLoop::new().map_err(AppError::CreateEventLoop)?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title(config.window_title.clone())
            .with_inner_size(LogicalSize::new(width as f64, height as f64))
            .build(&event_loop)
            .map_err(AppError::CreateWindow)?,
    );
    let mut renderer =
        Renderer::new(Arc::clone(&window), width, height).map_err(AppError::CreateRenderer)?;

    event_loop.set_control_flow(ControlFlow::Poll);

    let fixed_dt =
        normalize_non_zero_duration(config.frame_delay, Duration::from_millis(FRAME_DELAY_MS));
    let max_frame_delta =
        normalize_non_zero_duration(config.max_frame_delta, Duration::from_millis(250));
    let max_ticks_per_frame = config.max_ticks_per_frame.max(1);
    let metrics_log_interval =
        normalize_non_zero_duration(config.metrics_log_interval, Duration::from_secs(1));
    let slow_frame_delay = resolve_slow_frame_delay(config.simulated_slow_frame_ms);
    let mut input_collector = InputCollector::default();

    info!(
        width,
        height,
        frame_delay_ms = fixed_dt.as_millis() as u64,
        max_frame_delta_ms = max_frame_delta.as_millis() as u64,
        max_ticks_per_frame,
        metrics_log_interval_ms = metrics_log_interval.as_millis() as u64,
        slow_frame_delay_ms = slow_frame_delay.as_millis() as u64,
        godmode = controller.godmode(),
        "loop_config"
    );

    let failure: Rc<RefCell<Option<AppError>>> = Rc::new(RefCell::new(None));
    let failure_in_loop = Rc::clone(&failure);
    let mut accumulator = Duration::ZERO;
    let mut last_frame_instant = Instant::now();
    let mut last_present_instant = Instant::now();
    let mut metrics_accumulator = MetricsAccumulator::new(metrics_log_interval);

    let run_result = event_loop.run(move |event, window_target| match event {
        Event::WindowEvent { window_id, event } if window_id == window.id() => match event {
            WindowEvent::CloseRequested => {
                input_collector.mark_quit_requested();
                info!(reason = "window_close", "shutdown_requested");
                window_target.exit();
            }
            WindowEvent::Resized(new_size) => {
                if let Err(error) = renderer.resize_surface(new_size.width, new_size.height) {
                    warn!(error = %error, "renderer_resize_failed");
                    window_target.exit();
                }
            }
            WindowEvent::KeyboardInput { event, .. } => {
                input_collector.handle_keyboard_input(&event);
            }
            WindowEvent::RedrawRequested => {
                if slow_frame_delay > Duration::ZERO {
                    thread::sleep(slow_frame_delay);
                }

                let now = Instant::now();
                let raw_frame_dt = now.saturating_duration_since(last_frame_instant);
                last_frame_instant = now;
                accumulator =
                    accumulator.saturating_add(clamp_frame_delta(raw_frame_dt, max_frame_delta));

                let step_plan = plan_sim_steps(accumulator, fixed_dt, max_ticks_per_frame);
                for _ in 0..step_plan.ticks_to_run {
                    let input = input_collector.snapshot_for_tick();
                    let Some(mut target) = renderer.frame_target() else {
                        error!(width, height, "frame_buffer_size_mismatch");
                        window_target.exit();
                        return;
                    };
                    let flow = controller.frame(&input, &mut target);
                    metrics_accumulator.record_tick(controller.last_stats().tiles_drawn);

                    match flow {
                        Flow::Continue => {}
                        Flow::Restart => {
                            if let Err(err) = controller.restart() {
                                error!(error = %err, "restart_failed");
                                *failure_in_loop.borrow_mut() = Some(AppError::Restart(err));
                                window_target.exit();
                                return;
                            }
                        }
                        Flow::GameOver => {
                            info!(reason = "game_over", "shutdown_requested");
                            window_target.exit();
                            return;
                        }
                    }
                }
                accumulator = step_plan.remaining_accumulator;

                if step_plan.dropped_backlog > Duration::ZERO {
                    warn!(
                        dropped_backlog_ms = step_plan.dropped_backlog.as_millis() as u64,
                        max_ticks_per_frame, "sim_clamp_triggered"
                    );
                }

                // Presents are paced to the tick rate; the buffer only changes on ticks.
                let elapsed = Instant::now().saturating_duration_since(last_present_instant);
                let cap_sleep = compute_cap_sleep(elapsed, fixed_dt);
                if cap_sleep > Duration::ZERO {
                    thread::sleep(cap_sleep);
                }

                if let Err(err) = renderer.present() {
                    warn!(error = %err, "renderer_draw_failed");
                    *failure_in_loop.borrow_mut() = Some(AppError::Present(err));
                    window_target.exit();
                    return;
                }
                last_present_instant = Instant::now();
                metrics_accumulator.record_frame(raw_frame_dt);

                if let Some(snapshot) = metrics_accumulator.maybe_snapshot(now) {
                    metrics_handle.publish(snapshot);
                    info!(
                        fps = snapshot.fps,
                        tps = snapshot.tps,
                        frame_time_ms = snapshot.frame_time_ms,
                        tiles_per_tick = snapshot.tiles_per_tick,
                        scene = controller.scene().name(),
                        actor_count = controller.actors().len(),
                        "loop_metrics"
                    );
                }
            }
            _ => {}
        },
        Event::AboutToWait => {
            window.request_redraw();
        }
        Event::LoopExiting => {
            info!("shutdown");
        }
        _ => {}
    });

    if let Some(err) = failure.borrow_mut().take() {
        return Err(err);
    }
    run_result.map_err(AppError::EventLoopRun)
}

/// Keyboard state between ticks.
#[derive(Debug, Default)]
struct InputCollector {
    quit_requested: bool,
    action_states: ActionStates,
}

impl InputCollector {
    fn mark_quit_requested(&mut self) {
        self.quit_requested = true;
    }

    fn handle_keyboard_input(&mut self, key_event: &KeyEvent) {
        if key_event.repeat {
            return;
        }
        let is_pressed = key_event.state == ElementState::Pressed;
        self.update_action_state_from_physical_key(key_event.physical_key, is_pressed);
    }

    // Escape is a game action rather than a window close: cuts use it to pick their
    // first option.
    fn update_action_state_from_physical_key(&mut self, key: PhysicalKey, is_pressed: bool) {
        let action = match key {
            PhysicalKey::Code(KeyCode::KeyW) | PhysicalKey::Code(KeyCode::ArrowUp) => {
                InputAction::MoveUp
            }
            PhysicalKey::Code(KeyCode::KeyS) | PhysicalKey::Code(KeyCode::ArrowDown) => {
                InputAction::MoveDown
            }
            PhysicalKey::Code(KeyCode::KeyA) | PhysicalKey::Code(KeyCode::ArrowLeft) => {
                InputAction::MoveLeft
            }
            PhysicalKey::Code(KeyCode::KeyD) | PhysicalKey::Code(KeyCode::ArrowRight) => {
                InputAction::MoveRight
            }
            PhysicalKey::Code(KeyCode::Space)
            | PhysicalKey::Code(KeyCode::Enter)
            | PhysicalKey::Code(KeyCode::NumpadEnter) => InputAction::Fire,
            PhysicalKey::Code(KeyCode::Escape) => InputAction::Quit,
            _ => return,
        };
        self.action_states.set(action, is_pressed);
    }

    fn snapshot_for_tick(&mut self) -> InputSnapshot {
        let snapshot = InputSnapshot::new(self.quit_requested, self.action_states);
        self.action_states.clear_edges();
        snapshot
    }
}

#[derive(Debug, Clone, Copy)]
struct StepPlan {
    ticks_to_run: u32,
    remaining_accumulator: Duration,
    dropped_backlog: Duration,
}

fn plan_sim_steps(
    mut accumulator: Duration,
    fixed_dt: Duration,
    max_ticks_per_frame: u32,
) -> StepPlan {
    let mut ticks_to_run = 0u32;
    while accumulator >= fixed_dt && ticks_to_run < max_ticks_per_frame {
        accumulator = accumulator.saturating_sub(fixed_dt);
        ticks_to_run = ticks_to_run.saturating_add(1);
    }

    let dropped_backlog = if accumulator >= fixed_dt {
        std::mem::take(&mut accumulator)
    } else {
        Duration::ZERO
    };
    StepPlan {
        ticks_to_run,
        remaining_accumulator: accumulator,
        dropped_backlog,
    }
}

fn clamp_frame_delta(frame_delta: Duration, max_frame_delta: Duration) -> Duration {
    frame_delta.min(max_frame_delta)
}

fn normalize_non_zero_duration(value: Duration, fallback: Duration) -> Duration {
    if value.is_zero() {
        fallback
    } else {
        value
    }
}

fn compute_cap_sleep(elapsed_since_present: Duration, frame_budget: Duration) -> Duration {
    frame_budget.saturating_sub(elapsed_since_present)
}

fn resolve_slow_frame_delay(config_ms: u64) -> Duration {
    let env_ms = env::var(SLOW_FRAME_ENV_VAR)
        .ok()
        .and_then(|raw| raw.parse::<u64>().ok());
    Duration::from_millis(env_ms.unwrap_or(config_ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> PhysicalKey {
        PhysicalKey::Code(code)
    }

    #[test]
    fn planner_runs_whole_ticks_and_keeps_the_remainder() {
        let plan = plan_sim_steps(Duration::from_millis(75), Duration::from_millis(30), 5);
        assert_eq!(plan.ticks_to_run, 2);
        assert_eq!(plan.remaining_accumulator, Duration::from_millis(15));
        assert_eq!(plan.dropped_backlog, Duration::ZERO);
    }

    #[test]
    fn planner_drops_backlog_past_the_tick_cap() {
        let plan = plan_sim_steps(Duration::from_millis(250), Duration::from_millis(30), 5);
        assert_eq!(plan.ticks_to_run, 5);
        assert_eq!(plan.remaining_accumulator, Duration::ZERO);
        assert_eq!(plan.dropped_backlog, Duration::from_millis(100));
    }

    #[test]
    fn planner_waits_for_a_full_tick() {
        let plan = plan_sim_steps(Duration::from_millis(29), Duration::from_millis(30), 5);
        assert_eq!(plan.ticks_to_run, 0);
        assert_eq!(plan.remaining_accumulator, Duration::from_millis(29));
    }

    #[test]
    fn long_frames_are_clamped() {
        let max = Duration::from_millis(250);
        assert_eq!(clamp_frame_delta(Duration::from_secs(3), max), max);
        assert_eq!(
            clamp_frame_delta(Duration::from_millis(16), max),
            Duration::from_millis(16)
        );
    }

    #[test]
    fn zero_durations_fall_back() {
        let fallback = Duration::from_millis(30);
        assert_eq!(normalize_non_zero_duration(Duration::ZERO, fallback), fallback);
        assert_eq!(
            normalize_non_zero_duration(Duration::from_millis(5), fallback),
            Duration::from_millis(5)
        );
    }

    #[test]
    fn cap_sleep_fills_the_rest_of_the_frame() {
        let budget = Duration::from_millis(30);
        assert_eq!(
            compute_cap_sleep(Duration::from_millis(12), budget),
            Duration::from_millis(18)
        );
        assert_eq!(compute_cap_sleep(Duration::from_millis(45), budget), Duration::ZERO);
    }

    #[test]
    fn wasd_and_arrow_keys_map_to_moves() {
        let mut input = InputCollector::default();
        input.update_action_state_from_physical_key(key(KeyCode::KeyW), true);
        input.update_action_state_from_physical_key(key(KeyCode::ArrowLeft), true);
        let snapshot = input.snapshot_for_tick();
        assert!(snapshot.is_down(InputAction::MoveUp));
        assert!(snapshot.is_down(InputAction::MoveLeft));
        assert!(!snapshot.is_down(InputAction::MoveDown));
    }

    #[test]
    fn space_and_enter_fire() {
        let mut input = InputCollector::default();
        input.update_action_state_from_physical_key(key(KeyCode::Space), true);
        assert!(input.snapshot_for_tick().was_pressed(InputAction::Fire));
        input.update_action_state_from_physical_key(key(KeyCode::Space), false);
        input.update_action_state_from_physical_key(key(KeyCode::Enter), true);
        assert!(input.snapshot_for_tick().was_pressed(InputAction::Fire));
    }

    #[test]
    fn press_edges_last_a_single_tick() {
        let mut input = InputCollector::default();
        input.update_action_state_from_physical_key(key(KeyCode::KeyD), true);
        let first = input.snapshot_for_tick();
        let second = input.snapshot_for_tick();
        assert!(first.was_pressed(InputAction::MoveRight));
        assert!(!second.was_pressed(InputAction::MoveRight));
        assert!(second.is_down(InputAction::MoveRight));
    }

    #[test]
    fn key_release_clears_action_state() {
        let mut input = InputCollector::default();
        input.update_action_state_from_physical_key(key(KeyCode::KeyD), true);
        input.update_action_state_from_physical_key(key(KeyCode::KeyD), false);
        let snapshot = input.snapshot_for_tick();
        assert!(!snapshot.is_down(InputAction::MoveRight));
    }

    #[test]
    fn escape_is_forwarded_instead_of_closing() {
        let mut input = InputCollector::default();
        input.update_action_state_from_physical_key(key(KeyCode::Escape), true);
        let snapshot = input.snapshot_for_tick();
        assert!(snapshot.was_pressed(InputAction::Quit));
        assert!(!snapshot.quit_requested());
    }

    #[test]
    fn window_close_is_sticky() {
        let mut input = InputCollector::default();
        input.mark_quit_requested();
        assert!(input.snapshot_for_tick().quit_requested());
        assert!(input.snapshot_for_tick().quit_requested());
    }

    #[test]
    fn unmapped_keys_are_ignored() {
        let mut input = InputCollector::default();
        input.update_action_state_from_physical_key(key(KeyCode::KeyQ), true);
        let snapshot = input.snapshot_for_tick();
        assert!(InputAction::ALL
            .iter()
            .all(|action| !snapshot.is_down(*action)));
    }
}
