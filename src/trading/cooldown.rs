//! Post-close re-entry delays.

use chrono::{DateTime, Duration, Utc};

/// Why a cooldown was armed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CooldownReason {
    /// Forced close on liquidation risk
    Risk,
    /// Take-profit, stop-loss or trend-reversal close
    Profit,
}

/// A single cooldown timer.
///
/// `Unarmed -> Armed(at) -> Unarmed` once elapsed. Re-arming while armed
/// overwrites the timestamp.
#[derive(Debug, Clone)]
pub struct CooldownTimer {
    duration: Duration,
    armed_at: Option<DateTime<Utc>>,
}

impl CooldownTimer {
    pub fn new(duration_secs: i64) -> Self {
        Self {
            duration: Duration::seconds(duration_secs),
            armed_at: None,
        }
    }

    pub fn arm(&mut self, now: DateTime<Utc>) {
        self.armed_at = Some(now);
    }

    pub fn disarm(&mut self) {
        self.armed_at = None;
    }

    #[cfg(test)]
    pub fn is_armed(&self) -> bool {
        self.armed_at.is_some()
    }

    /// True when unarmed, or when `now >= armed_at + duration`.
    ///
    /// An elapsed timer clears itself.
    pub fn is_elapsed(&mut self, now: DateTime<Utc>) -> bool {
        let Some(armed_at) = self.armed_at else {
            return true;
        };
        if now - armed_at >= self.duration {
            self.armed_at = None;
            return true;
        }
        false
    }

    /// Time left before the timer elapses, `None` when unarmed or elapsed.
    pub fn remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        let armed_at = self.armed_at?;
        let left = armed_at + self.duration - now;
        (left > Duration::zero()).then_some(left)
    }
}

/// The two independent timers kept per instrument.
#[derive(Debug, Clone)]
pub struct CooldownGate {
    risk: CooldownTimer,
    profit: CooldownTimer,
}

impl CooldownGate {
    pub fn new(risk_secs: i64, profit_secs: i64) -> Self {
        Self {
            risk: CooldownTimer::new(risk_secs),
            profit: CooldownTimer::new(profit_secs),
        }
    }

    pub fn timer(&self, reason: CooldownReason) -> &CooldownTimer {
        match reason {
            CooldownReason::Risk => &self.risk,
            CooldownReason::Profit => &self.profit,
        }
    }

    fn timer_mut(&mut self, reason: CooldownReason) -> &mut CooldownTimer {
        match reason {
            CooldownReason::Risk => &mut self.risk,
            CooldownReason::Profit => &mut self.profit,
        }
    }

    pub fn arm(&mut self, reason: CooldownReason, now: DateTime<Utc>) {
        self.timer_mut(reason).arm(now);
    }

    pub fn disarm(&mut self, reason: CooldownReason) {
        self.timer_mut(reason).disarm();
    }

    pub fn is_elapsed(&mut self, reason: CooldownReason, now: DateTime<Utc>) -> bool {
        self.timer_mut(reason).is_elapsed(now)
    }

    pub fn remaining(&self, reason: CooldownReason, now: DateTime<Utc>) -> Option<Duration> {
        self.timer(reason).remaining(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unarmed_is_elapsed() {
        let mut t = CooldownTimer::new(300);
        assert!(t.is_elapsed(Utc::now()));
        assert!(!t.is_armed());
    }

    #[test]
    fn test_elapsed_boundary() {
        let mut t = CooldownTimer::new(300);
        let t0 = Utc::now();
        t.arm(t0);

        assert!(!t.is_elapsed(t0));
        assert!(!t.is_elapsed(t0 + Duration::seconds(299)));
        assert!(!t.is_elapsed(t0 + Duration::milliseconds(299_999)));
        assert!(t.is_armed());

        assert!(t.is_elapsed(t0 + Duration::seconds(300)));
        // Self-cleared
        assert!(!t.is_armed());
        assert!(t.is_elapsed(t0));
    }

    #[test]
    fn test_rearm_overwrites() {
        let mut t = CooldownTimer::new(60);
        let t0 = Utc::now();
        t.arm(t0);
        t.arm(t0 + Duration::seconds(50));
        assert!(!t.is_elapsed(t0 + Duration::seconds(70)));
        assert!(t.is_elapsed(t0 + Duration::seconds(110)));
    }

    #[test]
    fn test_remaining() {
        let mut t = CooldownTimer::new(60);
        let t0 = Utc::now();
        assert_eq!(t.remaining(t0), None);
        t.arm(t0);
        assert_eq!(t.remaining(t0 + Duration::seconds(20)), Some(Duration::seconds(40)));
        assert_eq!(t.remaining(t0 + Duration::seconds(60)), None);
    }

    #[test]
    fn test_gate_timers_are_independent() {
        let mut gate = CooldownGate::new(300, 60);
        let t0 = Utc::now();
        gate.arm(CooldownReason::Risk, t0);

        assert!(gate.is_elapsed(CooldownReason::Profit, t0));
        assert!(!gate.is_elapsed(CooldownReason::Risk, t0 + Duration::seconds(60)));

        gate.disarm(CooldownReason::Risk);
        assert!(gate.is_elapsed(CooldownReason::Risk, t0));
    }
}
