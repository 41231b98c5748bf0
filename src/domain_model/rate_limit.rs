use serde::Deserialize;
use std::fmt;
use std::time::Duration;

/// Selects which pair of windows applies to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateClass {
    Auth,
    Api,
}

impl fmt::Display for RateClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RateClass::Auth => "auth",
            RateClass::Api => "api",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateWindow {
    pub label: &'static str,
    pub size: Duration,
    pub limit: u32,
}

impl RateWindow {
    pub fn per_minute(limit: u32) -> Self {
        Self {
            label: "minute",
            size: Duration::from_secs(60),
            limit,
        }
    }

    pub fn per_hour(limit: u32) -> Self {
        Self {
            label: "hour",
            size: Duration::from_secs(60 * 60),
            limit,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ClassLimits {
    pub per_minute: u32,
    pub per_hour: u32,
}

/// Window limits per class. The minute window is always listed first.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RatePolicy {
    pub auth: ClassLimits,
    pub api: ClassLimits,
}

impl Default for RatePolicy {
    fn default() -> Self {
        Self {
            auth: ClassLimits {
                per_minute: 5,
                per_hour: 20,
            },
            api: ClassLimits {
                per_minute: 60,
                per_hour: 1000,
            },
        }
    }
}

impl RatePolicy {
    pub fn limits(&self, class: RateClass) -> ClassLimits {
        match class {
            RateClass::Auth => self.auth,
            RateClass::Api => self.api,
        }
    }

    pub fn windows(&self, class: RateClass) -> [RateWindow; 2] {
        let limits = self.limits(class);
        [
            RateWindow::per_minute(limits.per_minute),
            RateWindow::per_hour(limits.per_hour),
        ]
    }
}

/// Caller identity used as the rate-limit key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RateKey(pub String);

impl RateKey {
    pub fn ip(addr: impl fmt::Display) -> Self {
        RateKey(format!("ip:{}", addr))
    }

    pub fn user(id: impl fmt::Display) -> Self {
        RateKey(format!("user:{}", id))
    }
}

impl fmt::Display for RateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitInfo {
    pub per_minute: u32,
    pub per_hour: u32,
    pub remaining_this_minute: u64,
}
