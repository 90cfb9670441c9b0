//! Two-phase action timer: an active window followed by a cooldown.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerPhase {
    Ready,
    Active,
    CoolingDown,
}

/// Edge reported by the call that caused it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerEvent {
    Started,
    Ended,
    Ready,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CancelMode {
    WithEndAction,
    NoEndAction,
}

#[derive(Clone, Debug)]
pub struct ActionTimer {
    phase: TimerPhase,
    active_remaining: f32,
    cooldown_remaining: f32,
    max_action: f32,
    max_cooldown: f32,
    delay: f32,
}

impl ActionTimer {
    pub fn new(max_action: f32, max_cooldown: f32, delay: f32) -> Self {
        Self {
            phase: TimerPhase::Ready,
            active_remaining: 0.0,
            cooldown_remaining: 0.0,
            max_action,
            max_cooldown,
            delay,
        }
    }

    pub fn phase(&self) -> TimerPhase {
        self.phase
    }

    pub fn is_ready(&self) -> bool {
        self.phase == TimerPhase::Ready
    }

    pub fn is_active(&self) -> bool {
        self.phase == TimerPhase::Active
    }

    pub fn is_cooling_down(&self) -> bool {
        self.phase == TimerPhase::CoolingDown
    }

    /// Time left in the active window.
    pub fn active_time(&self) -> f32 {
        self.active_remaining
    }

    /// Time left in the cooldown.
    pub fn cooldown_time(&self) -> f32 {
        self.cooldown_remaining
    }

    pub fn max_action(&self) -> f32 {
        self.max_action
    }

    pub fn max_cooldown(&self) -> f32 {
        self.max_cooldown
    }

    pub fn delay(&self) -> f32 {
        self.delay
    }

    /// Opens the active window. Does nothing unless the timer is ready.
    pub fn start(&mut self) -> Option<TimerEvent> {
        if self.phase != TimerPhase::Ready {
            return None;
        }
        self.phase = TimerPhase::Active;
        self.active_remaining = self.max_action + self.delay;
        Some(TimerEvent::Started)
    }

    /// Counts down the current phase. At most one phase ends per call.
    pub fn advance(&mut self, dt: f32) -> Option<TimerEvent> {
        let dt = dt.max(0.0);
        match self.phase {
            TimerPhase::Ready => None,
            TimerPhase::Active => {
                self.active_remaining -= dt;
                if self.active_remaining > 0.0 {
                    return None;
                }
                self.enter_cooldown();
                Some(TimerEvent::Ended)
            }
            TimerPhase::CoolingDown => {
                self.cooldown_remaining -= dt;
                if self.cooldown_remaining > 0.0 {
                    return None;
                }
                self.cooldown_remaining = 0.0;
                self.phase = TimerPhase::Ready;
                Some(TimerEvent::Ready)
            }
        }
    }

    /// Cuts the active window short and starts the cooldown.
    ///
    /// Only an active timer is affected; `Ended` is reported for
    /// [`CancelMode::WithEndAction`].
    pub fn cancel(&mut self, mode: CancelMode) -> Option<TimerEvent> {
        if self.phase != TimerPhase::Active {
            return None;
        }
        self.enter_cooldown();
        match mode {
            CancelMode::WithEndAction => Some(TimerEvent::Ended),
            CancelMode::NoEndAction => None,
        }
    }

    pub fn reduce_cooldown(&mut self, seconds: f32) {
        self.cooldown_remaining -= seconds;
    }

    /// Makes the timer ready immediately, dropping any active window or cooldown.
    pub fn refresh_cooldown(&mut self) {
        self.phase = TimerPhase::Ready;
        self.active_remaining = 0.0;
        self.cooldown_remaining = 0.0;
    }

    /// Reconfigures durations. Refused with a warning unless ready.
    pub fn set_times(&mut self, max_action: f32, max_cooldown: f32) -> bool {
        if !self.is_ready() {
            log::warn!("timer durations changed while {:?}; ignored", self.phase);
            return false;
        }
        self.active_remaining = 0.0;
        self.cooldown_remaining = 0.0;
        self.max_action = max_action;
        self.max_cooldown = max_cooldown;
        true
    }

    pub fn set_delay(&mut self, delay: f32) -> bool {
        if !self.is_ready() {
            log::warn!("timer delay changed while {:?}; ignored", self.phase);
            return false;
        }
        self.delay = delay;
        true
    }

    fn enter_cooldown(&mut self) {
        self.phase = TimerPhase::CoolingDown;
        self.active_remaining = 0.0;
        self.cooldown_remaining = self.max_cooldown;
    }
}
