//! Live tunables used by ShooterCtrl

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use super::TunableDefaults;
use crate::tunable::{TunableParam, TunableStore, GAIN_EPSILON};
use comms_if::eqpt::act::Gains;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Group all shooter tunables are stored under.
pub const TUNABLE_GROUP: &str = "Shooter";

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The shooter's tunable parameters, keyed `Shooter/<name>` in the store.
#[derive(Debug, Clone)]
pub struct ShooterTunables {
    /// `Shooter/TargetRPM`, flywheel rpm
    pub target_rpm: TunableParam,

    /// `Shooter/kP`
    pub k_p: TunableParam,

    /// `Shooter/kV`
    pub k_v: TunableParam,

    /// `Shooter/kS`
    pub k_s: TunableParam,

    /// `Shooter/FeedOutput`, duty cycle
    pub feed_output: TunableParam,

    /// `Shooter/SpinUpTolerance`, fraction of the target
    pub spin_up_tolerance: TunableParam,

    /// `Shooter/SpinUpTimeout`, seconds
    pub spin_up_timeout_s: TunableParam,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for ShooterTunables {
    fn default() -> Self {
        Self::new(&TunableDefaults::default())
    }
}

impl ShooterTunables {
    pub fn new(defaults: &TunableDefaults) -> Self {
        let param = |name, default| TunableParam::new(TUNABLE_GROUP, name, default);

        Self {
            target_rpm: param("TargetRPM", defaults.target_rpm),
            k_p: param("kP", defaults.k_p).with_epsilon(GAIN_EPSILON),
            k_v: param("kV", defaults.k_v).with_epsilon(GAIN_EPSILON),
            k_s: param("kS", defaults.k_s).with_epsilon(GAIN_EPSILON),
            feed_output: param("FeedOutput", defaults.feed_output).with_range(-1.0, 1.0),
            spin_up_tolerance: param("SpinUpTolerance", defaults.spin_up_tolerance)
                .with_range(0.0, std::f64::INFINITY),
            spin_up_timeout_s: param("SpinUpTimeout", defaults.spin_up_timeout_s)
                .with_range(0.0, std::f64::INFINITY),
        }
    }

    /// Check every value held by the store, returning false if any is invalid.
    ///
    /// Invalid values are never used, see [`TunableParam::get`].
    pub fn check_all(&mut self, store: &dyn TunableStore) -> bool {
        let mut params = [
            &mut self.target_rpm,
            &mut self.k_p,
            &mut self.k_v,
            &mut self.k_s,
            &mut self.feed_output,
            &mut self.spin_up_tolerance,
            &mut self.spin_up_timeout_s,
        ];

        let mut all_valid = true;
        for param in params.iter_mut() {
            all_valid &= param.check(store);
        }
        all_valid
    }

    /// Returns true if any of the gains changed since they were last acknowledged.
    pub fn gains_changed(&self, store: &dyn TunableStore) -> bool {
        self.k_p.has_changed(store) || self.k_v.has_changed(store) || self.k_s.has_changed(store)
    }

    /// Acknowledge all the gains together, returning them.
    pub fn acknowledge_gains(&mut self, store: &dyn TunableStore) -> Gains {
        Gains {
            k_p: self.k_p.acknowledge(store),
            k_v: self.k_v.acknowledge(store),
            k_s: self.k_s.acknowledge(store),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::tunable::MemTunableStore;

    #[test]
    fn test_gains_acknowledged_together() {
        let mut store = MemTunableStore::new();
        let mut t = ShooterTunables::default();

        assert!(!t.gains_changed(&store));

        store.write("Shooter/kV", 0.13);
        store.write("Shooter/kS", 0.2);
        assert!(t.gains_changed(&store));

        let gains = t.acknowledge_gains(&store);
        assert_eq!(gains, Gains { k_p: 0.1, k_v: 0.13, k_s: 0.2 });
        assert!(!t.gains_changed(&store));

        // Gains use a much finer threshold than the other tunables
        store.write("Shooter/kP", 0.1 + 1e-6);
        assert!(t.gains_changed(&store));
        store.write("Shooter/TargetRPM", 1e-4);
        assert!(!t.target_rpm.has_changed(&store));
    }

    #[test]
    fn test_check_all() {
        let mut store = MemTunableStore::new();
        let mut t = ShooterTunables::default();

        assert!(t.check_all(&store));

        store.write("Shooter/FeedOutput", 1.5);
        store.write("Shooter/SpinUpTolerance", -0.1);
        store.write("Shooter/kP", std::f64::NAN);
        assert!(!t.check_all(&store));
        assert_eq!(t.feed_output.get(&store), 0.25);
        assert_eq!(t.spin_up_tolerance.get(&store), 0.05);
        assert!(!t.gains_changed(&store));

        store.write("Shooter/FeedOutput", -1.0);
        store.write("Shooter/SpinUpTolerance", 0.0);
        store.write("Shooter/kP", 0.1);
        assert!(t.check_all(&store));
        assert_eq!(t.feed_output.get(&store), -1.0);
    }
}
