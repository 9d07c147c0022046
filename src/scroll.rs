//! Auto-scroll controller.
//!
//! A three-state machine (`stopped`, `scrolling`, `at-bottom`) with an
//! explicit transition table, driven by a frame loop that advances a
//! [`Viewport`] a fixed number of pixels per frame. The host (a browser
//! binding, a terminal pager, a test) calls [`AutoScroller::frame`] from its
//! animation-frame callback and forwards wheel and scroll events.

use std::time::{Duration, Instant};

use serde::Serialize;

/// Pixels advanced per frame.
pub const SCROLL_SPEED: f64 = 1.0;

/// Minimum time between two advancing frames (~60fps).
pub const FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// Distance from the maximum scroll position that counts as the bottom.
pub const BOTTOM_THRESHOLD: f64 = 10.0;

/// The cached maximum scroll value is re-read every this many frames.
pub const MAX_SCROLL_REFRESH_FRAMES: u32 = 5;

// ============================================================================
// States
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScrollState {
    Stopped,
    Scrolling,
    AtBottom,
}

impl ScrollState {
    /// States reachable from `self` in one transition.
    pub fn allowed_transitions(self) -> &'static [ScrollState] {
        match self {
            ScrollState::Stopped => &[ScrollState::Scrolling],
            ScrollState::Scrolling => &[ScrollState::Stopped, ScrollState::AtBottom],
            ScrollState::AtBottom => &[ScrollState::Scrolling, ScrollState::Stopped],
        }
    }

    pub fn can_transition_to(self, to: ScrollState) -> bool {
        self.allowed_transitions().contains(&to)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ScrollState::Stopped => "stopped",
            ScrollState::Scrolling => "scrolling",
            ScrollState::AtBottom => "at-bottom",
        }
    }

    /// CSS class for the toggle button, if any.
    pub fn button_class(self) -> Option<&'static str> {
        match self {
            ScrollState::Stopped => None,
            ScrollState::Scrolling => Some("scrolling"),
            ScrollState::AtBottom => Some("at-bottom"),
        }
    }

    pub fn button_title(self) -> &'static str {
        match self {
            ScrollState::Scrolling => "Stop Auto Scroll",
            _ => "Auto Scroll",
        }
    }
}

impl std::fmt::Display for ScrollState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// State Machine
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateChange {
    pub from: ScrollState,
    pub to: ScrollState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerId(u64);

type Listener = Box<dyn FnMut(&StateChange)>;

pub struct StateMachine {
    state: ScrollState,
    history: Vec<ScrollState>,
    listeners: Vec<(ListenerId, Listener)>,
    next_listener: u64,
}

impl StateMachine {
    pub fn new(initial: ScrollState) -> Self {
        Self {
            state: initial,
            history: vec![initial],
            listeners: Vec::new(),
            next_listener: 0,
        }
    }

    pub fn state(&self) -> ScrollState {
        self.state
    }

    pub fn history(&self) -> &[ScrollState] {
        &self.history
    }

    /// Move to `to` if the transition table allows it, notifying listeners.
    /// Invalid transitions leave the state unchanged and return `false`.
    pub fn transition(&mut self, to: ScrollState) -> bool {
        if !self.state.can_transition_to(to) {
            log::warn!("Invalid transition from {} to {}", self.state, to);
            return false;
        }

        let change = StateChange {
            from: self.state,
            to,
        };
        self.state = to;
        self.history.push(to);
        for (_, listener) in self.listeners.iter_mut() {
            listener(&change);
        }
        true
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&StateChange) + 'static) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        self.listeners.len() != before
    }

    /// Back to the initial state, without notifying listeners.
    pub fn reset(&mut self) {
        self.state = self.history[0];
        self.history.truncate(1);
    }
}

// ============================================================================
// Viewport
// ============================================================================

/// The scrollable surface the controller drives.
pub trait Viewport {
    fn scroll_top(&self) -> f64;
    fn set_scroll_top(&mut self, top: f64);
    /// Largest reachable scroll position. May be expensive (forces layout
    /// in a browser), so the controller caches it.
    fn max_scroll(&self) -> f64;
}

/// What one call to [`AutoScroller::frame`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Not scrolling; the host should stop requesting frames.
    Idle,
    /// Too soon since the last advancing frame; request another.
    Throttled,
    Advanced,
    /// Hit the bottom; the loop is over.
    ReachedBottom,
}

impl FrameOutcome {
    pub fn wants_next_frame(self) -> bool {
        matches!(self, FrameOutcome::Throttled | FrameOutcome::Advanced)
    }
}

// ============================================================================
// Auto-Scroller
// ============================================================================

pub struct AutoScroller<V: Viewport> {
    machine: StateMachine,
    viewport: V,
    running: bool,
    last_frame: Option<Instant>,
    accumulator: f64,
    frames_since_refresh: u32,
    cached_max_scroll: Option<f64>,
    scroll_handling: bool,
    last_scroll_top: f64,
    last_max_scroll: f64,
}

impl<V: Viewport> AutoScroller<V> {
    pub fn new(viewport: V) -> Self {
        Self {
            machine: StateMachine::new(ScrollState::Stopped),
            viewport,
            running: false,
            last_frame: None,
            accumulator: 0.0,
            frames_since_refresh: 0,
            cached_max_scroll: None,
            scroll_handling: true,
            last_scroll_top: f64::NAN,
            last_max_scroll: f64::NAN,
        }
    }

    pub fn state(&self) -> ScrollState {
        self.machine.state()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn viewport(&self) -> &V {
        &self.viewport
    }

    pub fn viewport_mut(&mut self) -> &mut V {
        &mut self.viewport
    }

    pub fn machine(&self) -> &StateMachine {
        &self.machine
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&StateChange) + 'static) -> ListenerId {
        self.machine.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.machine.unsubscribe(id)
    }

    fn max_scroll(&mut self, refresh: bool) -> f64 {
        match self.cached_max_scroll {
            Some(cached) if !refresh => cached,
            _ => {
                let value = self.viewport.max_scroll();
                self.cached_max_scroll = Some(value);
                value
            }
        }
    }

    /// Forget the cached maximum scroll (content changed).
    pub fn invalidate_max_scroll(&mut self) {
        self.cached_max_scroll = None;
    }

    /// Start scrolling. Returns `false` if already scrolling.
    pub fn start(&mut self) -> bool {
        if self.state() == ScrollState::Scrolling {
            return false;
        }
        if !self.machine.transition(ScrollState::Scrolling) {
            return false;
        }
        self.running = true;
        self.last_frame = None;
        self.accumulator = 0.0;
        self.frames_since_refresh = 0;
        self.invalidate_max_scroll();
        true
    }

    /// Stop scrolling. A no-op unless currently scrolling.
    pub fn stop(&mut self) {
        self.running = false;
        if self.state() == ScrollState::Scrolling {
            self.machine.transition(ScrollState::Stopped);
        }
    }

    /// The toggle button was pressed.
    pub fn toggle(&mut self) {
        if self.state() == ScrollState::Scrolling {
            self.stop();
        } else {
            self.start();
        }
    }

    /// Manual wheel input cancels auto-scroll.
    pub fn on_wheel(&mut self) {
        if self.state() == ScrollState::Scrolling {
            self.stop();
        }
    }

    /// One animation frame at time `now`.
    pub fn frame(&mut self, now: Instant) -> FrameOutcome {
        if !self.running || self.state() != ScrollState::Scrolling {
            self.running = false;
            return FrameOutcome::Idle;
        }

        if let Some(last) = self.last_frame {
            if now.saturating_duration_since(last) < FRAME_INTERVAL {
                return FrameOutcome::Throttled;
            }
        }

        self.frames_since_refresh += 1;
        let refresh = self.frames_since_refresh >= MAX_SCROLL_REFRESH_FRAMES;
        if refresh {
            self.frames_since_refresh = 0;
        }
        let max_scroll = self.max_scroll(refresh);
        let current = self.viewport.scroll_top();

        if current >= max_scroll - BOTTOM_THRESHOLD {
            self.running = false;
            self.machine.transition(ScrollState::AtBottom);
            return FrameOutcome::ReachedBottom;
        }

        self.accumulator += SCROLL_SPEED;
        if self.accumulator >= 1.0 {
            let amount = self.accumulator.floor();
            self.viewport.set_scroll_top(current + amount);
            self.accumulator -= amount;
        }

        self.last_frame = Some(now);
        FrameOutcome::Advanced
    }

    /// A scroll event from the viewport (user or programmatic).
    pub fn on_scroll(&mut self) {
        if !self.scroll_handling {
            return;
        }

        let current = self.viewport.scroll_top();
        let max_scroll = self.max_scroll(false);
        if (current - self.last_scroll_top).abs() < 1.0
            && (max_scroll - self.last_max_scroll).abs() < 1.0
        {
            return;
        }
        self.last_scroll_top = current;
        self.last_max_scroll = max_scroll;

        let at_bottom = current >= max_scroll - BOTTOM_THRESHOLD;
        match self.state() {
            ScrollState::Scrolling if at_bottom => {
                self.running = false;
                self.machine.transition(ScrollState::AtBottom);
            }
            ScrollState::AtBottom if !at_bottom => {
                self.machine.transition(ScrollState::Stopped);
            }
            _ => {}
        }
    }

    /// Ignore scroll events while content is being replaced.
    pub fn disable_scroll_handling(&mut self) {
        self.scroll_handling = false;
    }

    pub fn enable_scroll_handling(&mut self) {
        self.scroll_handling = true;
    }

    pub fn scroll_handling_enabled(&self) -> bool {
        self.scroll_handling
    }

    /// New content was loaded: stop, leave the at-bottom state, jump to the
    /// top and re-evaluate the position against fresh measurements.
    pub fn reset_for_reload(&mut self) {
        self.stop();
        if self.state() == ScrollState::AtBottom {
            self.machine.transition(ScrollState::Stopped);
        }
        self.invalidate_max_scroll();
        self.last_scroll_top = f64::NAN;
        self.last_max_scroll = f64::NAN;
        self.viewport.set_scroll_top(0.0);
        self.on_scroll();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    /// Viewport over a document of fixed height that counts layout reads.
    struct FakeViewport {
        top: f64,
        max: f64,
        max_reads: Rc<Cell<u32>>,
    }

    impl FakeViewport {
        fn new(max: f64) -> Self {
            Self {
                top: 0.0,
                max,
                max_reads: Rc::new(Cell::new(0)),
            }
        }
    }

    impl Viewport for FakeViewport {
        fn scroll_top(&self) -> f64 {
            self.top
        }

        fn set_scroll_top(&mut self, top: f64) {
            self.top = top.clamp(0.0, self.max);
        }

        fn max_scroll(&self) -> f64 {
            self.max_reads.set(self.max_reads.get() + 1);
            self.max
        }
    }

    const ALL: [ScrollState; 3] = [ScrollState::Stopped, ScrollState::Scrolling, ScrollState::AtBottom];

    #[test]
    fn test_transition_table() {
        let allowed = [
            (ScrollState::Stopped, ScrollState::Scrolling),
            (ScrollState::Scrolling, ScrollState::Stopped),
            (ScrollState::Scrolling, ScrollState::AtBottom),
            (ScrollState::AtBottom, ScrollState::Scrolling),
            (ScrollState::AtBottom, ScrollState::Stopped),
        ];
        for from in ALL {
            for to in ALL {
                let mut machine = StateMachine::new(from);
                let ok = machine.transition(to);
                assert_eq!(ok, allowed.contains(&(from, to)), "{} -> {}", from, to);
                if !ok {
                    assert_eq!(machine.state(), from);
                    assert_eq!(machine.history(), &[from]);
                }
            }
        }
    }

    #[test]
    fn test_listeners_notified_and_unsubscribed() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut machine = StateMachine::new(ScrollState::Stopped);
        let sink = seen.clone();
        let id = machine.subscribe(move |change| sink.borrow_mut().push(*change));

        machine.transition(ScrollState::Scrolling);
        machine.transition(ScrollState::Stopped); // ok
        machine.transition(ScrollState::AtBottom); // rejected
        assert_eq!(
            *seen.borrow(),
            vec![
                StateChange { from: ScrollState::Stopped, to: ScrollState::Scrolling },
                StateChange { from: ScrollState::Scrolling, to: ScrollState::Stopped },
            ]
        );

        assert!(machine.unsubscribe(id));
        machine.transition(ScrollState::Scrolling);
        assert_eq!(seen.borrow().len(), 2);

        machine.reset();
        assert_eq!(machine.state(), ScrollState::Stopped);
        assert_eq!(machine.history(), &[ScrollState::Stopped]);
    }

    #[test]
    fn test_scrolls_to_bottom() {
        let mut scroller = AutoScroller::new(FakeViewport::new(100.0));
        let t0 = Instant::now();
        scroller.toggle();
        assert_eq!(scroller.state(), ScrollState::Scrolling);

        let mut frames = 0;
        let outcome = loop {
            let outcome = scroller.frame(t0 + FRAME_INTERVAL * frames);
            frames += 1;
            if !outcome.wants_next_frame() || frames > 1000 {
                break outcome;
            }
        };

        assert_eq!(outcome, FrameOutcome::ReachedBottom);
        assert_eq!(scroller.state(), ScrollState::AtBottom);
        assert_eq!(scroller.viewport().top, 90.0);
        assert!(!scroller.is_running());
        assert_eq!(scroller.frame(t0 + FRAME_INTERVAL * 2000), FrameOutcome::Idle);
    }

    #[test]
    fn test_frames_are_throttled() {
        let mut scroller = AutoScroller::new(FakeViewport::new(1000.0));
        let t0 = Instant::now();
        scroller.start();
        assert_eq!(scroller.frame(t0), FrameOutcome::Advanced);
        assert_eq!(scroller.frame(t0 + Duration::from_millis(5)), FrameOutcome::Throttled);
        assert_eq!(scroller.viewport().top, 1.0);
        assert_eq!(scroller.frame(t0 + FRAME_INTERVAL), FrameOutcome::Advanced);
        assert_eq!(scroller.viewport().top, 2.0);
    }

    #[test]
    fn test_max_scroll_read_periodically() {
        let viewport = FakeViewport::new(10_000.0);
        let reads = viewport.max_reads.clone();
        let mut scroller = AutoScroller::new(viewport);
        let t0 = Instant::now();
        scroller.start();
        for i in 0..20 {
            scroller.frame(t0 + FRAME_INTERVAL * i);
        }
        // One initial read, then one every MAX_SCROLL_REFRESH_FRAMES frames.
        assert_eq!(reads.get(), 1 + 20 / MAX_SCROLL_REFRESH_FRAMES);
    }

    #[test]
    fn test_wheel_cancels_scrolling() {
        let mut scroller = AutoScroller::new(FakeViewport::new(1000.0));
        let t0 = Instant::now();
        scroller.start();
        scroller.frame(t0);
        scroller.on_wheel();
        assert_eq!(scroller.state(), ScrollState::Stopped);
        assert_eq!(scroller.frame(t0 + FRAME_INTERVAL), FrameOutcome::Idle);

        // Wheel while stopped changes nothing.
        scroller.on_wheel();
        assert_eq!(scroller.state(), ScrollState::Stopped);
    }

    #[test]
    fn test_toggle_from_bottom_restarts() {
        let mut scroller = AutoScroller::new(FakeViewport::new(5.0));
        let t0 = Instant::now();
        scroller.start();
        assert_eq!(scroller.frame(t0), FrameOutcome::ReachedBottom);
        assert_eq!(scroller.state(), ScrollState::AtBottom);

        scroller.toggle();
        assert_eq!(scroller.state(), ScrollState::Scrolling);
        assert_eq!(
            scroller.machine().history(),
            &[ScrollState::Stopped, ScrollState::Scrolling, ScrollState::AtBottom, ScrollState::Scrolling]
        );
    }

    #[test]
    fn test_on_scroll_detects_bottom_and_leaving_it() {
        let mut scroller = AutoScroller::new(FakeViewport::new(500.0));
        scroller.start();
        scroller.viewport_mut().top = 495.0;
        scroller.on_scroll();
        assert_eq!(scroller.state(), ScrollState::AtBottom);

        scroller.viewport_mut().top = 100.0;
        scroller.on_scroll();
        assert_eq!(scroller.state(), ScrollState::Stopped);

        // Reaching the bottom by hand while stopped is not a legal edge.
        scroller.viewport_mut().top = 500.0;
        scroller.on_scroll();
        assert_eq!(scroller.state(), ScrollState::Stopped);
    }

    #[test]
    fn test_disabled_scroll_handling_ignores_events() {
        let mut scroller = AutoScroller::new(FakeViewport::new(500.0));
        scroller.start();
        scroller.disable_scroll_handling();
        scroller.viewport_mut().top = 500.0;
        scroller.on_scroll();
        assert_eq!(scroller.state(), ScrollState::Scrolling);
        scroller.enable_scroll_handling();
        scroller.on_scroll();
        assert_eq!(scroller.state(), ScrollState::AtBottom);
    }

    #[test]
    fn test_reset_for_reload() {
        let mut scroller = AutoScroller::new(FakeViewport::new(5.0));
        scroller.start();
        scroller.frame(Instant::now());
        assert_eq!(scroller.state(), ScrollState::AtBottom);

        scroller.viewport_mut().max = 2000.0;
        scroller.reset_for_reload();
        assert_eq!(scroller.state(), ScrollState::Stopped);
        assert_eq!(scroller.viewport().top, 0.0);
    }

    #[test]
    fn test_button_styling() {
        let classes = Rc::new(RefCell::new(Vec::new()));
        let sink = classes.clone();
        let mut scroller = AutoScroller::new(FakeViewport::new(1000.0));
        scroller.subscribe(move |change| {
            sink.borrow_mut()
                .push((change.to.button_class(), change.to.button_title()));
        });
        scroller.toggle();
        scroller.toggle();
        assert_eq!(
            *classes.borrow(),
            vec![
                (Some("scrolling"), "Stop Auto Scroll"),
                (None, "Auto Scroll"),
            ]
        );
        assert_eq!(serde_json::to_string(&ScrollState::AtBottom).unwrap(), "\"at-bottom\"");
    }
}
