use std::time::Instant;

/// 直前フレームとの間隔から求める瞬間 FPS
pub struct FpsMeter {
    prev: Option<Instant>,
}

impl FpsMeter {
    pub fn new() -> Self {
        Self { prev: None }
    }

    pub fn tick(&mut self) -> f32 {
        self.tick_at(Instant::now())
    }

    /// 初回と間隔 0 のときは 0
    pub fn tick_at(&mut self, now: Instant) -> f32 {
        let fps = match self.prev {
            Some(prev) => {
                let dt = now.saturating_duration_since(prev).as_secs_f32();
                if dt > 0.0 { 1.0 / dt } else { 0.0 }
            }
            None => 0.0,
        };
        self.prev = Some(now);
        fps
    }

    pub fn reset(&mut self) {
        self.prev = None;
    }
}

impl Default for FpsMeter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_first_tick_is_zero() {
        let mut m = FpsMeter::new();
        assert_eq!(m.tick_at(Instant::now()), 0.0);
    }

    #[test]
    fn test_interval() {
        let mut m = FpsMeter::new();
        let t0 = Instant::now();
        m.tick_at(t0);
        let fps = m.tick_at(t0 + Duration::from_millis(40));
        assert!((fps - 25.0).abs() < 0.01, "fps={}", fps);
    }

    #[test]
    fn test_zero_interval() {
        let mut m = FpsMeter::new();
        let t0 = Instant::now();
        m.tick_at(t0);
        assert_eq!(m.tick_at(t0), 0.0);
    }

    #[test]
    fn test_reset() {
        let mut m = FpsMeter::new();
        let t0 = Instant::now();
        m.tick_at(t0);
        m.reset();
        assert_eq!(m.tick_at(t0 + Duration::from_millis(10)), 0.0);
    }
}
