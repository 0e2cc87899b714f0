/// Context-wide settings.
///
/// # Fields
///
/// * `is_production` - Forces recomputation diagnostics off everywhere,
///   regardless of selector or per-call flags.
/// * `recompute_metrics` - Default diagnostics flag for selectors and calls
///   that do not set their own.
///
/// # Examples
///
/// ```
/// use primeselect_core::{ConfigUpdate, PrimeSelectConfig};
///
/// let mut config = PrimeSelectConfig::default();
/// config.apply(ConfigUpdate::new().recompute_metrics(true));
/// assert!(config.effective_diagnostics(None, None));
///
/// config.apply(ConfigUpdate::new().is_production(true));
/// assert!(!config.effective_diagnostics(Some(true), Some(true)));
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PrimeSelectConfig {
    pub is_production: bool,
    pub recompute_metrics: bool,
}

impl PrimeSelectConfig {
    /// Merges a partial update; fields left as `None` keep their value.
    pub fn apply(&mut self, update: ConfigUpdate) {
        if let Some(is_production) = update.is_production {
            self.is_production = is_production;
        }
        if let Some(recompute_metrics) = update.recompute_metrics {
            self.recompute_metrics = recompute_metrics;
        }
    }

    /// Resolves the diagnostics flag for one call.
    ///
    /// Priority is per-call override, then the selector default, then this
    /// config's default. Production mode wins over all of them.
    pub fn effective_diagnostics(&self, call: Option<bool>, selector: Option<bool>) -> bool {
        if self.is_production {
            return false;
        }
        call.or(selector).unwrap_or(self.recompute_metrics)
    }
}

/// Partial update for [`PrimeSelectConfig`], last write wins.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ConfigUpdate {
    pub is_production: Option<bool>,
    pub recompute_metrics: Option<bool>,
}

impl ConfigUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_production(mut self, is_production: bool) -> Self {
        self.is_production = Some(is_production);
        self
    }

    pub fn recompute_metrics(mut self, recompute_metrics: bool) -> Self {
        self.recompute_metrics = Some(recompute_metrics);
        self
    }
}
