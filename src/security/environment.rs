//! Runtime environment detection.
//!
//! The managed fabric exports `Fabric_ApplicationName` into every process it
//! hosts. Its presence is the "running inside the fabric" signal. The fact
//! comes from the host only; configuration cannot change it.

/// Variable set by the fabric host.
pub const FABRIC_ENV_VAR: &str = "Fabric_ApplicationName";

/// Where the fabric fact came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvironmentSource {
    HostSignal,
    /// Supplied by the embedding code, e.g. a test harness.
    Fixed,
}

/// Read-only fact resolved once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeEnvironmentContext {
    is_in_fabric: bool,
    source: EnvironmentSource,
}

impl RuntimeEnvironmentContext {
    /// Resolve from the process environment.
    pub fn detect() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let is_in_fabric = lookup(FABRIC_ENV_VAR)
            .map(|v| !v.trim().is_empty())
            .unwrap_or(false);
        Self {
            is_in_fabric,
            source: EnvironmentSource::HostSignal,
        }
    }

    pub fn fixed(is_in_fabric: bool) -> Self {
        Self {
            is_in_fabric,
            source: EnvironmentSource::Fixed,
        }
    }

    pub fn is_in_fabric(&self) -> bool {
        self.is_in_fabric
    }

    pub fn source(&self) -> EnvironmentSource {
        self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_fabric_variable() {
        let ctx = RuntimeEnvironmentContext::from_lookup(|key| {
            (key == FABRIC_ENV_VAR).then(|| "fabric:/Orders".to_string())
        });
        assert!(ctx.is_in_fabric());
        assert_eq!(ctx.source(), EnvironmentSource::HostSignal);
    }

    #[test]
    fn test_missing_or_blank_variable_means_local() {
        assert!(!RuntimeEnvironmentContext::from_lookup(|_| None).is_in_fabric());
        assert!(!RuntimeEnvironmentContext::from_lookup(|_| Some("  ".into())).is_in_fabric());
    }

    #[test]
    fn test_fixed_context() {
        let ctx = RuntimeEnvironmentContext::fixed(true);
        assert!(ctx.is_in_fabric());
        assert_eq!(ctx.source(), EnvironmentSource::Fixed);
    }
}
