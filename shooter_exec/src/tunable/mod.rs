//! # Tunable parameters
//!
//! A tunable parameter is a named control constant whose current value lives in an external
//! [`TunableStore`] and can be changed at any time while the shooter runs (for example by editing
//! the tunables file). Consumers poll [`TunableParam::has_changed`] each cycle and call
//! [`TunableParam::acknowledge`] once they have applied the new value.
//!
//! Values which are not finite or fall outside a parameter's range are never used, the parameter
//! reads as its default until the store holds a valid value again.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod store;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::{info, warn};

pub use store::*;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Change threshold used for controller gains.
pub const GAIN_EPSILON: f64 = 1e-9;

/// Change threshold used for all other parameters (speeds, duty cycles, times).
pub const DEFAULT_EPSILON: f64 = 1e-3;

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// Source of tunable values.
///
/// The store is read-only from the point of view of the control loop, except for explicit
/// overrides which are written back so that telemetry reflects the active value.
pub trait TunableStore {
    /// Read the current value of the given key, or `None` if the store has no value for it.
    fn read(&self, key: &str) -> Option<f64>;

    /// Write a value into the store.
    fn write(&mut self, key: &str, value: f64);

    /// Poll the external source for new values.
    ///
    /// Returns `Ok(true)` if any value may have changed. Called once at the start of every cycle.
    fn refresh(&mut self) -> Result<bool, StoreError> {
        Ok(false)
    }
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A single tunable parameter with edge-triggered change detection.
#[derive(Debug, Clone)]
pub struct TunableParam {
    key: String,

    default: f64,

    /// Value seen at the last acknowledgement
    last_observed: f64,

    epsilon: f64,

    /// Inclusive range of accepted values
    min: f64,
    max: f64,

    /// The store currently holds a value which is not accepted
    rejected: bool,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl TunableParam {
    /// Create a new parameter called `<group>/<name>` with the default change threshold.
    pub fn new(group: &str, name: &str, default: f64) -> Self {
        Self {
            key: format!("{}/{}", group, name),
            default,
            last_observed: default,
            epsilon: DEFAULT_EPSILON,
            min: std::f64::NEG_INFINITY,
            max: std::f64::INFINITY,
            rejected: false,
        }
    }

    /// Set the change detection threshold.
    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    /// Only accept values within `[min, max]`.
    pub fn with_range(mut self, min: f64, max: f64) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns true if `value` is finite and within the parameter's range.
    pub fn accepts(&self, value: f64) -> bool {
        value.is_finite() && value >= self.min && value <= self.max
    }

    /// Current value of the parameter, or the default if the store has no valid value.
    ///
    /// Reading does not clear the change flag.
    pub fn get(&self, store: &dyn TunableStore) -> f64 {
        match store.read(&self.key) {
            Some(v) if self.accepts(v) => v,
            _ => self.default,
        }
    }

    /// Check the value held by the store, warning when it becomes invalid.
    ///
    /// Returns false while the store holds a value which is not accepted.
    pub fn check(&mut self, store: &dyn TunableStore) -> bool {
        let invalid = match store.read(&self.key) {
            Some(v) if !self.accepts(v) => Some(v),
            _ => None,
        };

        match (invalid, self.rejected) {
            (Some(v), false) => warn!(
                "Tunable {} = {} is invalid (accepted range [{}, {}]), using the default {}",
                self.key, v, self.min, self.max, self.default
            ),
            (None, true) => info!("Tunable {} is valid again", self.key),
            _ => (),
        }

        self.rejected = invalid.is_some();
        !self.rejected
    }

    /// Returns true if the current value differs from the last acknowledged one.
    pub fn has_changed(&self, store: &dyn TunableStore) -> bool {
        (self.get(store) - self.last_observed).abs() > self.epsilon
    }

    /// Mark the current value as applied, clearing the change flag. Returns the value.
    pub fn acknowledge(&mut self, store: &dyn TunableStore) -> f64 {
        self.last_observed = self.get(store);
        self.last_observed
    }

    /// Override the value in the store.
    pub fn set(&self, store: &mut dyn TunableStore, value: f64) {
        store.write(&self.key, value);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_default_when_unset() {
        let store = MemTunableStore::new();
        let p = TunableParam::new("Shooter", "TargetRPM", 1500.0);

        assert_eq!(p.key(), "Shooter/TargetRPM");
        assert_eq!(p.get(&store), 1500.0);
        assert!(!p.has_changed(&store));
    }

    #[test]
    fn test_change_edge() {
        let mut store = MemTunableStore::new();
        let mut p = TunableParam::new("Shooter", "kP", 0.1).with_epsilon(GAIN_EPSILON);

        store.write("Shooter/kP", 0.2);

        // Reading must not clear the edge
        assert_eq!(p.get(&store), 0.2);
        assert!(p.has_changed(&store));
        assert!(p.has_changed(&store));

        assert_eq!(p.acknowledge(&store), 0.2);
        assert!(!p.has_changed(&store));

        // Back to the default is a change too
        store.write("Shooter/kP", 0.1);
        assert!(p.has_changed(&store));
    }

    #[test]
    fn test_epsilon() {
        let mut store = MemTunableStore::new();
        let p = TunableParam::new("Shooter", "TargetRPM", 3000.0);

        store.write("Shooter/TargetRPM", 3000.0005);
        assert!(!p.has_changed(&store));

        store.write("Shooter/TargetRPM", 3000.01);
        assert!(p.has_changed(&store));
    }

    #[test]
    fn test_invalid_values_use_default() {
        let mut store = MemTunableStore::new();
        let mut p = TunableParam::new("Shooter", "SpinUpTimeout", 3.0).with_range(0.0, 60.0);

        for v in [std::f64::NAN, std::f64::INFINITY, -1.0, 61.0].iter() {
            store.write("Shooter/SpinUpTimeout", *v);
            assert_eq!(p.get(&store), 3.0);
            assert!(!p.has_changed(&store));
            assert!(!p.check(&store));
        }

        store.write("Shooter/SpinUpTimeout", 60.0);
        assert!(p.check(&store));
        assert_eq!(p.get(&store), 60.0);
        assert!(p.has_changed(&store));
    }

    #[test]
    fn test_set_writes_store() {
        let mut store = MemTunableStore::new();
        let p = TunableParam::new("Shooter", "TargetRPM", 0.0);

        p.set(&mut store, 4500.0);

        assert_eq!(store.read("Shooter/TargetRPM"), Some(4500.0));
        assert_eq!(p.get(&store), 4500.0);
        assert!(p.has_changed(&store));
    }
}
