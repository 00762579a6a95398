//! Control surface bridge (C11): `SfcFunc` handling and the multifunction
//! switch bank (spec.md §4.11).

use duotone_shared::{ParamHandle, SfcFunc, SfcFuncType};

/// A bank of N multifunction switches, each optionally bound to a parameter
/// and carrying its own per-control value (spec.md §4.11).
pub struct MultifnSwitchBank {
    slots: Vec<Option<ParamHandle>>,
    selected: Option<usize>,
}

impl MultifnSwitchBank {
    pub fn new(size: usize) -> Self {
        Self { slots: vec![None; size], selected: None }
    }

    pub fn configure(&mut self, index: usize, handle: ParamHandle) {
        if let Some(slot) = self.slots.get_mut(index) {
            *slot = Some(handle);
        }
    }

    pub fn select(&mut self, index: usize) -> Option<ParamHandle> {
        if index >= self.slots.len() {
            return None;
        }
        self.selected = Some(index);
        self.slots[index]
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn reset(&mut self) {
        self.slots.iter_mut().for_each(|s| *s = None);
        self.selected = None;
    }
}

pub struct SurfaceBridge {
    pub multifn: MultifnSwitchBank,
}

impl SurfaceBridge {
    pub fn new(multifn_size: usize) -> Self {
        Self { multifn: MultifnSwitchBank::new(multifn_size) }
    }

    /// Handle one outgoing `SfcFunc` command from the fanout/system layer.
    pub fn handle(&mut self, func: &SfcFunc) {
        match func.func_type {
            SfcFuncType::ConfigMultifnSwitches => {
                if let Some(handle) = func.param {
                    // Caller is expected to have already resolved the slot
                    // index into `func.switch_value` (cast from float).
                    if let Some(index) = func.switch_value {
                        self.multifn.configure(index as usize, handle);
                    }
                }
            }
            SfcFuncType::ResetMultifnSwitches => {
                self.multifn.reset();
            }
            SfcFuncType::SelectMultifnSwitch => {
                if let Some(value) = func.switch_value {
                    self.multifn.select(value as usize);
                }
            }
            SfcFuncType::SetSwitchValue | SfcFuncType::SetSwitchLedState => {
                // Physical-control rendering is out of scope; these are
                // consumed by the surface firmware, not re-derived here.
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use duotone_shared::ParamHandle;

    #[test]
    fn select_returns_configured_handle() {
        let mut bank = MultifnSwitchBank::new(4);
        bank.configure(2, ParamHandle(9));
        assert_eq!(bank.select(2), Some(ParamHandle(9)));
        assert_eq!(bank.selected(), Some(2));
    }

    #[test]
    fn reset_clears_all_slots() {
        let mut bank = MultifnSwitchBank::new(4);
        bank.configure(0, ParamHandle(1));
        bank.reset();
        assert_eq!(bank.select(0), None);
    }
}
