use crate::state::StateError;
use crate::timestep::Timestep;
use ndarray::Array1;
use num::Zero;

/// The volume of a storage node for every scenario combination.
///
/// `current_pc` is only updated by [`StorageState::set_volume`] and [`StorageState::integrate`], so
/// it always reflects the max volume in force when the volume last changed.
#[derive(Clone, Debug, Default)]
pub struct StorageState {
    volume: Array1<f64>,
    current_pc: Array1<f64>,
}

/// The proportional volume; NaN when `max_volume` is zero.
pub fn proportional_volume(volume: f64, max_volume: f64) -> f64 {
    if max_volume.is_zero() {
        f64::NAN
    } else {
        volume / max_volume
    }
}

impl StorageState {
    pub fn new(size: usize) -> Self {
        Self {
            volume: Array1::zeros(size),
            current_pc: Array1::from_elem(size, f64::NAN),
        }
    }

    pub fn setup(&mut self, size: usize) {
        if self.volume.len() != size {
            *self = Self::new(size);
        }
    }

    pub fn len(&self) -> usize {
        self.volume.len()
    }

    pub fn is_empty(&self) -> bool {
        self.volume.is_empty()
    }

    pub fn volume(&self) -> &Array1<f64> {
        &self.volume
    }

    pub fn current_pc(&self) -> &Array1<f64> {
        &self.current_pc
    }

    /// Set the volume of one combination directly.
    pub fn set_volume(&mut self, global_id: usize, volume: f64, max_volume: f64) -> Result<(), StateError> {
        let len = self.volume.len();
        let (v, pc) = self
            .volume
            .get_mut(global_id)
            .zip(self.current_pc.get_mut(global_id))
            .ok_or(StateError::IndexOutOfRange { index: global_id, len })?;
        *v = volume;
        *pc = proportional_volume(volume, max_volume);
        Ok(())
    }

    /// Integrate one combination's flow over the time-step.
    pub fn integrate(
        &mut self,
        global_id: usize,
        flow: f64,
        timestep: &Timestep,
        max_volume: f64,
    ) -> Result<(), StateError> {
        let volume = self.volume.get(global_id).copied().ok_or(StateError::IndexOutOfRange {
            index: global_id,
            len: self.volume.len(),
        })?;
        self.set_volume(global_id, volume + flow * timestep.days(), max_volume)
    }
}

#[cfg(test)]
mod tests {
    use super::StorageState;
    use crate::test_utils::default_time_domain;
    use float_cmp::assert_approx_eq;

    #[test]
    fn test_integrate() {
        let domain = default_time_domain();
        let ts = &domain.timesteps()[0];

        let mut state = StorageState::new(2);
        state.set_volume(0, 50.0, 100.0).unwrap();
        state.set_volume(1, 50.0, 0.0).unwrap();
        assert_approx_eq!(f64, state.current_pc()[0], 0.5);

        state.integrate(0, 10.0, ts, 100.0).unwrap();
        state.integrate(1, 10.0, ts, 0.0).unwrap();

        assert_approx_eq!(f64, state.volume()[0], 60.0);
        assert_approx_eq!(f64, state.current_pc()[0], 0.6);
        assert_approx_eq!(f64, state.volume()[1], 60.0);
        assert!(state.current_pc()[1].is_nan());
    }

    #[test]
    fn test_out_of_range() {
        let mut state = StorageState::new(1);
        assert!(state.set_volume(1, 1.0, 1.0).is_err());
    }
}
