//! Wall-clock timing for render metadata

use std::time::Duration;

/// Smallest duration ever reported, so a measured render is never zero
const MIN_ELAPSED: Duration = Duration::from_nanos(1);

#[cfg(not(target_arch = "wasm32"))]
pub struct Stopwatch(std::time::Instant);

#[cfg(not(target_arch = "wasm32"))]
impl Stopwatch {
    pub fn start() -> Self {
        Self(std::time::Instant::now())
    }

    pub fn elapsed(&self) -> Duration {
        self.0.elapsed().max(MIN_ELAPSED)
    }
}

// `Instant::now` panics on wasm32-unknown-unknown
#[cfg(target_arch = "wasm32")]
pub struct Stopwatch(f64);

#[cfg(target_arch = "wasm32")]
impl Stopwatch {
    pub fn start() -> Self {
        Self(js_sys::Date::now())
    }

    pub fn elapsed(&self) -> Duration {
        let millis = (js_sys::Date::now() - self.0).max(0.0);
        Duration::from_secs_f64(millis / 1000.0).max(MIN_ELAPSED)
    }
}
