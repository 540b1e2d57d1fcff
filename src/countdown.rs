//! Shared countdown display.
//!
//! A countdown has a start and end time and an optional label. While visible
//! a periodic ticker redraws it for every subscriber with the elapsed
//! fraction and the time left. Only one ticker is ever live: starting a new
//! one cancels the previous, and ticks from an old ticker are ignored.

use crate::host::PlayerDirectory;
use crate::scheduler::{ScheduledTask, Scheduler, TaskHandle};
use crate::time::{Clock, Duration, format_remaining, millis};
use crate::types::{CountdownFrame, PlayerId};
use std::sync::Arc;
use tracing::debug;

pub struct Countdown {
    scheduler: Arc<dyn Scheduler>,
    clock: Arc<dyn Clock>,
    players: Arc<dyn PlayerDirectory>,
    refresh_interval: Duration,
    subscribers: Vec<PlayerId>,
    label: Option<String>,
    start_ms: Option<u64>,
    end_ms: Option<u64>,
    visible: bool,
    ticker: Option<TaskHandle>,
    ticker_id: u64,
}

impl Countdown {
    pub fn new(
        scheduler: Arc<dyn Scheduler>,
        clock: Arc<dyn Clock>,
        players: Arc<dyn PlayerDirectory>,
        refresh_interval: Duration,
    ) -> Self {
        Self {
            scheduler,
            clock,
            players,
            refresh_interval,
            subscribers: Vec::new(),
            label: None,
            start_ms: None,
            end_ms: None,
            visible: false,
            ticker: None,
            ticker_id: 0,
        }
    }

    pub fn set_label(&mut self, label: Option<String>) {
        self.label = label;
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn start_ms(&self) -> Option<u64> {
        self.start_ms
    }

    pub fn end_ms(&self) -> Option<u64> {
        self.end_ms
    }

    pub fn subscribers(&self) -> &[PlayerId] {
        &self.subscribers
    }

    /// Whether a ticker is scheduled and not cancelled
    pub fn is_ticking(&self) -> bool {
        self.ticker.as_ref().is_some_and(|t| !t.is_cancelled())
    }

    /// Count down `duration` from now and show it
    pub fn start_countdown(&mut self, duration: Duration) {
        let now = self.clock.now_ms();
        self.start_ms = Some(now);
        self.end_ms = Some(now.saturating_add(millis(duration)));
        self.set_visible(true);
    }

    /// Add viewers. They see the display straight away if it is showing.
    pub fn add_subscribers(&mut self, players: impl IntoIterator<Item = PlayerId>) {
        let added: Vec<PlayerId> = players
            .into_iter()
            .filter(|p| {
                if self.subscribers.contains(p) {
                    false
                } else {
                    self.subscribers.push(*p);
                    true
                }
            })
            .collect();

        if self.visible {
            let frame = self.frame();
            for player in added {
                if let Some(session) = self.players.session(player) {
                    session.show_countdown(&frame);
                }
            }
        }
    }

    pub fn remove_subscriber(&mut self, player: PlayerId) {
        let before = self.subscribers.len();
        self.subscribers.retain(|p| *p != player);

        if self.visible && self.subscribers.len() != before {
            if let Some(session) = self.players.session(player) {
                session.clear_countdown();
            }
        }
    }

    pub fn clear_subscribers(&mut self) {
        if self.visible {
            self.for_each_session(|s| s.clear_countdown());
        }
        self.subscribers.clear();
    }

    /// Show or hide the display.
    ///
    /// Showing (re)starts the ticker; hiding cancels it and clears every
    /// subscriber's display. Hiding an already hidden countdown does nothing.
    pub fn set_visible(&mut self, visible: bool) {
        self.cancel_ticker();

        if visible {
            self.ticker_id += 1;
            let task = ScheduledTask::CountdownRefresh {
                ticker: self.ticker_id,
            };
            self.ticker = Some(self.scheduler.run_periodic(self.refresh_interval, task));
            self.visible = true;
            self.refresh();
        } else if self.visible {
            self.visible = false;
            self.for_each_session(|s| s.clear_countdown());
        }
    }

    /// Run one tick. Ticks from a replaced or cancelled ticker are dropped.
    pub fn on_tick(&mut self, ticker: u64) -> Option<CountdownFrame> {
        if !self.visible || ticker != self.ticker_id || !self.is_ticking() {
            debug!("Ignoring stale countdown tick {}", ticker);
            return None;
        }
        Some(self.refresh())
    }

    /// Recompute and push the display to every subscriber
    pub fn refresh(&mut self) -> CountdownFrame {
        let frame = self.frame();
        self.for_each_session(|s| s.show_countdown(&frame));
        frame
    }

    /// Elapsed fraction at `now`, clamped to `[0, 1]`
    pub fn progress_at(&self, now: u64) -> Option<f64> {
        let (start, end) = (self.start_ms?, self.end_ms?);
        if end <= start {
            return Some(1.0);
        }
        let passed = now.saturating_sub(start) as f64;
        Some((passed / (end - start) as f64).clamp(0.0, 1.0))
    }

    /// What the display shows right now
    pub fn frame(&self) -> CountdownFrame {
        let now = self.clock.now_ms();

        let title = self.label.as_ref().map(|label| match self.end_ms {
            Some(end) if end > now => format!("{}{}", label, format_remaining(end - now)),
            _ => label.clone(),
        });

        CountdownFrame {
            title,
            progress: self.progress_at(now).unwrap_or(0.0),
        }
    }

    /// Cancel the ticker without touching the display
    pub fn cancel_ticker(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.cancel();
        }
    }

    fn for_each_session(&self, f: impl Fn(&dyn crate::host::PlayerSession)) {
        for player in &self.subscribers {
            match self.players.session(*player) {
                Some(session) => f(session.as_ref()),
                None => debug!("Skipping countdown update for offline player {}", player),
            }
        }
    }
}

impl Drop for Countdown {
    fn drop(&mut self) {
        self.cancel_ticker();
    }
}
