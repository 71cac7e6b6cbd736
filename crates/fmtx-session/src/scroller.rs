use std::time::Duration;

/// Pause before the first character is consumed.
pub const SCROLL_START_DELAY: Duration = Duration::from_millis(1000);
/// Pause at the end of a full pass, with the complete string shown.
pub const SCROLL_RESTART_DELAY: Duration = Duration::from_millis(3000);
/// Per-character advance rate.
pub const SCROLL_TICK_DELAY: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollerMsg {
    Start,
    Tick,
    Restart,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScrollerPhase {
    #[default]
    Stopped,
    /// Armed, waiting out the start delay.
    Starting,
    Running,
}

/// A timer the owner should arm: deliver `msg` back after `delay`, tagged
/// with `gen` so ticks from a superseded cycle are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollerArm {
    pub msg: ScrollerMsg,
    pub delay: Duration,
    pub gen: u64,
}

/// Outcome of handling one timer message.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ScrollerStep {
    /// New text to display, when it changed.
    pub display: Option<String>,
    pub arm: Option<ScrollerArm>,
    /// The restart pause elapsed; the owner should re-capture the current
    /// radio text and call [`RadioTextScroller::start`] again.
    pub recapture: bool,
}

/// Marquee state machine for long radio-text lines.
///
/// Pure logic; the owner runs the timers and feeds expirations back through
/// [`handle`](Self::handle).  Each [`start`](Self::start) or
/// [`stop`](Self::stop) bumps the generation counter, which orphans every
/// timer armed for the previous cycle.  The display walks suffixes of the
/// captured text one character at a time; when the cursor wraps, the full
/// string is shown again during the restart pause.
#[derive(Debug, Default)]
pub struct RadioTextScroller {
    phase: ScrollerPhase,
    text: Vec<char>,
    cursor: usize,
    gen: u64,
}

impl RadioTextScroller {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> ScrollerPhase {
        self.phase
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Capture `text` and begin a new cycle.  Returns the start timer to
    /// arm, or `None` for empty text (nothing to scroll).
    pub fn start(&mut self, text: &str) -> Option<ScrollerArm> {
        self.gen += 1;
        self.cursor = 0;
        self.text = text.chars().collect();
        if self.text.is_empty() {
            self.phase = ScrollerPhase::Stopped;
            return None;
        }
        self.phase = ScrollerPhase::Starting;
        Some(ScrollerArm {
            msg: ScrollerMsg::Start,
            delay: SCROLL_START_DELAY,
            gen: self.gen,
        })
    }

    /// Halt scrolling and return the full captured text for display.
    pub fn stop(&mut self) -> String {
        self.phase = ScrollerPhase::Stopped;
        self.gen += 1;
        self.cursor = 0;
        self.text.iter().collect()
    }

    /// Process an expired timer.  Messages from a stale generation are
    /// no-ops.
    pub fn handle(&mut self, msg: ScrollerMsg, gen: u64) -> ScrollerStep {
        if gen != self.gen {
            return ScrollerStep::default();
        }
        match msg {
            ScrollerMsg::Start => {
                if self.phase != ScrollerPhase::Starting {
                    return ScrollerStep::default();
                }
                self.phase = ScrollerPhase::Running;
                self.advance()
            }
            ScrollerMsg::Tick => {
                if self.phase != ScrollerPhase::Running {
                    return ScrollerStep::default();
                }
                self.advance()
            }
            ScrollerMsg::Restart => {
                if self.phase != ScrollerPhase::Running {
                    return ScrollerStep::default();
                }
                ScrollerStep {
                    recapture: true,
                    ..ScrollerStep::default()
                }
            }
        }
    }

    fn advance(&mut self) -> ScrollerStep {
        self.cursor += 1;
        if self.cursor >= self.text.len() {
            // Full pass done: show the whole string and pause before the
            // next cycle.
            self.cursor = 0;
            return ScrollerStep {
                display: Some(self.text.iter().collect()),
                arm: Some(ScrollerArm {
                    msg: ScrollerMsg::Restart,
                    delay: SCROLL_RESTART_DELAY,
                    gen: self.gen,
                }),
                recapture: false,
            };
        }
        ScrollerStep {
            display: Some(self.text[self.cursor..].iter().collect()),
            arm: Some(ScrollerArm {
                msg: ScrollerMsg::Tick,
                delay: SCROLL_TICK_DELAY,
                gen: self.gen,
            }),
            recapture: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_one(scroller: &mut RadioTextScroller, arm: ScrollerArm) -> ScrollerStep {
        scroller.handle(arm.msg, arm.gen)
    }

    #[test]
    fn test_empty_text_never_starts() {
        let mut scroller = RadioTextScroller::new();
        assert_eq!(scroller.start(""), None);
        assert_eq!(scroller.phase(), ScrollerPhase::Stopped);
    }

    #[test]
    fn test_full_pass_returns_to_origin_and_pauses() {
        let mut scroller = RadioTextScroller::new();
        let text = "RADIO";
        let mut arm = scroller.start(text).unwrap();
        assert_eq!(arm.msg, ScrollerMsg::Start);
        assert_eq!(arm.delay, SCROLL_START_DELAY);

        // One Start plus len-1 ticks walks every suffix.
        let mut seen = Vec::new();
        for _ in 0..text.len() {
            let step = run_one(&mut scroller, arm);
            seen.push(step.display.unwrap());
            arm = step.arm.unwrap();
        }
        assert_eq!(seen, vec!["ADIO", "DIO", "IO", "O", "RADIO"]);
        assert_eq!(scroller.cursor(), 0);
        assert_eq!(arm.msg, ScrollerMsg::Restart);
        assert_eq!(arm.delay, SCROLL_RESTART_DELAY);

        // The restart pause asks the owner to re-capture the live text.
        let step = run_one(&mut scroller, arm);
        assert!(step.recapture);
        assert_eq!(step.arm, None);
    }

    #[test]
    fn test_stale_generation_is_ignored() {
        let mut scroller = RadioTextScroller::new();
        let old = scroller.start("FIRST").unwrap();
        let _ = scroller.start("SECOND").unwrap();

        let step = scroller.handle(old.msg, old.gen);
        assert_eq!(step, ScrollerStep::default());
        assert_eq!(scroller.cursor(), 0);
    }

    #[test]
    fn test_stop_restores_full_text() {
        let mut scroller = RadioTextScroller::new();
        let arm = scroller.start("HELLO").unwrap();
        let step = run_one(&mut scroller, arm);
        assert_eq!(step.display.as_deref(), Some("ELLO"));

        assert_eq!(scroller.stop(), "HELLO");
        assert_eq!(scroller.phase(), ScrollerPhase::Stopped);

        // Ticks armed before the stop are orphaned by the generation bump.
        let orphan = step.arm.unwrap();
        let step = scroller.handle(orphan.msg, orphan.gen);
        assert_eq!(step, ScrollerStep::default());
    }
}
