use thiserror::Error;
use tracing::warn;

use crate::config::BandConfig;
use crate::prefs::{preset_key, PrefStore, PREF_LAST_TUNED};

pub const MAX_PRESETS: usize = 6;

/// An empty preset slot.
pub const EMPTY_SLOT: u32 = 0;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PresetError {
    #[error("preset index {0} out of range (0..{MAX_PRESETS})")]
    IndexOutOfRange(usize),
    #[error("frequency {khz} kHz outside band {lower}..={upper}")]
    FrequencyOutOfBand { khz: u32, lower: u32, upper: u32 },
}

/// Six quick-select frequency slots plus the last tuned frequency.
///
/// Loaded from the preference store at creation; every mutation persists the
/// full slot array and the tuned frequency as one batched commit.  Index
/// checks are strict `[0, MAX_PRESETS)` and never panic.
#[derive(Debug)]
pub struct PresetStore {
    slots: [u32; MAX_PRESETS],
    tuned_khz: u32,
    band: BandConfig,
    prefs: PrefStore,
}

impl PresetStore {
    pub fn load(prefs: PrefStore, band: BandConfig) -> Self {
        let tuned_khz = prefs.get_int(PREF_LAST_TUNED, band.default_khz as i64) as u32;
        let mut slots = [EMPTY_SLOT; MAX_PRESETS];
        for (index, slot) in slots.iter_mut().enumerate() {
            *slot = prefs.get_int(&preset_key(index), EMPTY_SLOT as i64) as u32;
        }
        Self {
            slots,
            tuned_khz: band.clamp(tuned_khz),
            band,
            prefs,
        }
    }

    pub fn slots(&self) -> &[u32; MAX_PRESETS] {
        &self.slots
    }

    pub fn tuned(&self) -> u32 {
        self.tuned_khz
    }

    pub fn get(&self, index: usize) -> Result<u32, PresetError> {
        self.check_index(index)?;
        Ok(self.slots[index])
    }

    pub fn set(&mut self, index: usize, khz: u32) -> Result<(), PresetError> {
        self.check_index(index)?;
        self.check_frequency(khz)?;
        self.slots[index] = khz;
        self.persist();
        Ok(())
    }

    pub fn clear(&mut self, index: usize) -> Result<(), PresetError> {
        self.check_index(index)?;
        self.slots[index] = EMPTY_SLOT;
        self.persist();
        Ok(())
    }

    /// Replace the slot with the currently tuned frequency.
    pub fn replace_with_current(&mut self, index: usize, current: u32) -> Result<(), PresetError> {
        self.set(index, current)
    }

    /// Overwrite slots in order from a completed weak-station scan, truncated
    /// to the smaller of the result length and the slot count.  Slots past
    /// the result list are left untouched.
    pub fn apply_scan_results(&mut self, results: &[u32]) {
        for (index, &khz) in results.iter().take(MAX_PRESETS).enumerate() {
            self.slots[index] = if khz == EMPTY_SLOT {
                EMPTY_SLOT
            } else {
                self.band.clamp(khz)
            };
        }
        self.persist();
    }

    /// Reset every slot and the tuned frequency to the band's lower limit.
    pub fn restore_defaults(&mut self) {
        self.slots = [self.band.lower_khz; MAX_PRESETS];
        self.tuned_khz = self.band.lower_khz;
        self.persist();
    }

    pub fn set_tuned(&mut self, khz: u32) {
        self.tuned_khz = self.band.clamp(khz);
        self.persist();
    }

    /// Flush slots and tuned frequency without mutating anything.  Used on
    /// suspension and on session teardown.
    pub fn persist(&mut self) {
        self.prefs.put_int(PREF_LAST_TUNED, self.tuned_khz as i64);
        for (index, &slot) in self.slots.iter().enumerate() {
            self.prefs.put_int(&preset_key(index), slot as i64);
        }
        if let Err(e) = self.prefs.commit() {
            warn!("failed to persist presets: {}", e);
        }
    }

    fn check_index(&self, index: usize) -> Result<(), PresetError> {
        if index >= MAX_PRESETS {
            return Err(PresetError::IndexOutOfRange(index));
        }
        Ok(())
    }

    fn check_frequency(&self, khz: u32) -> Result<(), PresetError> {
        if khz != EMPTY_SLOT && !self.band.contains(khz) {
            return Err(PresetError::FrequencyOutOfBand {
                khz,
                lower: self.band.lower_khz,
                upper: self.band.upper_khz,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &tempfile::TempDir) -> PresetStore {
        let prefs = PrefStore::load(dir.path().join("prefs.json"));
        PresetStore::load(prefs, BandConfig::default())
    }

    #[test]
    fn test_fresh_store_uses_band_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        assert_eq!(store.tuned(), 98_100);
        assert_eq!(store.slots(), &[EMPTY_SLOT; MAX_PRESETS]);
    }

    #[test]
    fn test_out_of_range_index_is_error_not_panic() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(&dir);
        assert_eq!(
            store.set(MAX_PRESETS, 98_100),
            Err(PresetError::IndexOutOfRange(MAX_PRESETS))
        );
        assert_eq!(
            store.clear(17),
            Err(PresetError::IndexOutOfRange(17))
        );
        assert!(store.get(MAX_PRESETS).is_err());
        assert!(store.replace_with_current(6, 98_100).is_err());
    }

    #[test]
    fn test_out_of_band_frequency_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(&dir);
        assert!(matches!(
            store.set(0, 50_000),
            Err(PresetError::FrequencyOutOfBand { khz: 50_000, .. })
        ));
        assert_eq!(store.get(0).unwrap(), EMPTY_SLOT);
    }

    #[test]
    fn test_mutations_persist_across_reload() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(&dir);
        store.set(2, 91_100).unwrap();
        store.set_tuned(99_500);

        let reloaded = store_in(&dir);
        assert_eq!(reloaded.get(2).unwrap(), 91_100);
        assert_eq!(reloaded.tuned(), 99_500);
    }

    #[test]
    fn test_scan_results_overwrite_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(&dir);
        store.set(5, 101_300).unwrap();

        store.apply_scan_results(&[88_500, 91_100, 94_700]);
        assert_eq!(
            store.slots(),
            &[88_500, 91_100, 94_700, EMPTY_SLOT, EMPTY_SLOT, 101_300]
        );

        // Longer lists are truncated to the slot count.
        store.apply_scan_results(&[88_500, 91_100, 94_700, 0, 0, 0, 106_900]);
        assert_eq!(store.slots(), &[88_500, 91_100, 94_700, 0, 0, 0]);
    }

    #[test]
    fn test_restore_defaults_uses_lower_limit() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_in(&dir);
        store.set(0, 99_900).unwrap();
        store.set_tuned(99_900);

        store.restore_defaults();
        assert_eq!(store.tuned(), 87_500);
        assert_eq!(store.slots(), &[87_500; MAX_PRESETS]);

        let reloaded = store_in(&dir);
        assert_eq!(reloaded.tuned(), 87_500);
    }
}
