// [apps/gateway/src/rate_limit.rs]
/*!
 * =================================================================
 * APARATO: SLIDING WINDOW RATE LIMITER (ESTRATO L4)
 * RESPONSABILIDAD: 100 PETICIONES / 15 MIN POR IP DE ORIGEN
 *
 * No hay una crate de rate limiting en la pila heredada; se implementa
 * como un contador en memoria por IP, barrido periódicamente para no
 * acumular entradas de clientes que dejaron de pedir.
 * =================================================================
 */

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Mutex;
use std::time::{Duration, Instant};

const WINDOW: Duration = Duration::from_secs(15 * 60);
const MAX_REQUESTS_PER_WINDOW: u32 = 100;

struct WindowState {
    window_started_at: Instant,
    request_count: u32,
}

pub struct RateLimiter {
    windows: Mutex<HashMap<IpAddr, WindowState>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self { windows: Mutex::new(HashMap::new()) }
    }

    /// Returns `true` if the request is allowed, incrementing the
    /// source IP's counter; `false` if the window's cap is exceeded.
    pub fn check(&self, ip: IpAddr) -> bool {
        let now = Instant::now();
        let mut windows = self.windows.lock().expect("rate limiter lock poisoned");

        let state = windows.entry(ip).or_insert_with(|| WindowState {
            window_started_at: now,
            request_count: 0,
        });

        if now.duration_since(state.window_started_at) > WINDOW {
            state.window_started_at = now;
            state.request_count = 0;
        }

        state.request_count += 1;
        state.request_count <= MAX_REQUESTS_PER_WINDOW
    }

    /// Drops windows that have not seen a request in over `WINDOW`, run
    /// periodically so long-lived deployments do not accumulate one entry
    /// per distinct client IP forever.
    pub fn sweep(&self) {
        let now = Instant::now();
        let mut windows = self.windows.lock().expect("rate limiter lock poisoned");
        windows.retain(|_, state| now.duration_since(state.window_started_at) <= WINDOW);
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_the_cap_then_rejects() {
        let limiter = RateLimiter::new();
        let ip: IpAddr = "127.0.0.1".parse().unwrap();

        for _ in 0..MAX_REQUESTS_PER_WINDOW {
            assert!(limiter.check(ip));
        }
        assert!(!limiter.check(ip));
    }

    #[test]
    fn separate_ips_have_independent_windows() {
        let limiter = RateLimiter::new();
        let a: IpAddr = "10.0.0.1".parse().unwrap();
        let b: IpAddr = "10.0.0.2".parse().unwrap();

        for _ in 0..MAX_REQUESTS_PER_WINDOW {
            assert!(limiter.check(a));
        }
        assert!(limiter.check(b));
    }

    #[test]
    fn sweep_leaves_a_freshly_touched_window_in_place() {
        let limiter = RateLimiter::new();
        let ip: IpAddr = "10.0.0.3".parse().unwrap();
        limiter.check(ip);

        limiter.sweep();

        assert_eq!(limiter.windows.lock().unwrap().len(), 1);
    }

    #[test]
    fn sweep_drops_a_window_older_than_the_cap() {
        let limiter = RateLimiter::new();
        let ip: IpAddr = "10.0.0.4".parse().unwrap();
        limiter.check(ip);
        {
            let mut windows = limiter.windows.lock().unwrap();
            let state = windows.get_mut(&ip).unwrap();
            state.window_started_at = Instant::now() - WINDOW - Duration::from_secs(1);
        }

        limiter.sweep();

        assert!(limiter.windows.lock().unwrap().is_empty());
    }
}
