use std::future::Future;
use std::time::Duration;

use portal_core::DocumentId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Easing {
    Linear,
    EaseInCircle,
    EaseOutCircle,
}

impl Easing {
    /// Maps linear progress `t` in `[0, 1]` to eased progress.
    pub fn apply(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => t,
            Easing::EaseInCircle => 1.0 - (1.0 - t * t).sqrt(),
            Easing::EaseOutCircle => (1.0 - (t - 1.0).powi(2)).sqrt(),
        }
    }
}

/// One opacity animation on a placed token.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fade {
    /// Starting opacity; `None` starts from the current one.
    pub from: Option<f64>,
    pub to: f64,
    pub duration: Duration,
    pub easing: Easing,
}

impl Fade {
    pub fn out(duration: Duration) -> Self {
        Self {
            from: None,
            to: 0.0,
            duration,
            easing: Easing::EaseOutCircle,
        }
    }

    pub fn back_in(alpha: f64, duration: Duration) -> Self {
        Self {
            from: Some(0.0),
            to: alpha,
            duration,
            easing: Easing::EaseInCircle,
        }
    }
}

/// Token animation supplied by the host's canvas.
pub trait TokenAnimator: Send + Sync {
    /// Current opacity of the token's visual.
    fn alpha(&self, token: &DocumentId) -> f64;

    /// Runs `fade` to completion.
    fn animate(&self, token: &DocumentId, fade: Fade) -> impl Future<Output = ()> + Send;
}

/// Animator for hosts without a canvas; completes immediately.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAnimation;

impl TokenAnimator for NoAnimation {
    fn alpha(&self, _token: &DocumentId) -> f64 {
        1.0
    }

    async fn animate(&self, _token: &DocumentId, _fade: Fade) {}
}
