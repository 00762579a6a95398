//! DAW bridge (C9): the contract the out-of-scope audio DSP engine is
//! driven through (spec.md §4.9 / SPEC_FULL §1 — "external collaborator").

use crate::context::EngineContext;
use duotone_shared::{LayerId, LayerMask, ParamHandle, StateId};
use std::time::Duration;

/// The audio engine needs ~5ms to settle after a bulk parameter push before
/// it can be trusted to reflect the new state (same settle window used by
/// the patch-state toggle in `preset.rs`).
pub const DAW_SETTLE_DELAY: Duration = Duration::from_millis(5);

pub trait DawBridge {
    fn set_param(&mut self, handle: ParamHandle, value: f32);
}

pub struct DawBridgeDriver<'a, D: DawBridge> {
    pub ctx: &'a mut EngineContext,
    pub daw: &'a mut D,
}

impl<'a, D: DawBridge> DawBridgeDriver<'a, D> {
    pub fn set_param(&mut self, handle: ParamHandle, value: f32) {
        self.ctx.write_param(
            handle,
            value,
            LayerMask::BOTH,
            StateId::A,
            duotone_shared::ModuleId::Daw,
            Default::default(),
        );
        self.daw.set_param(handle, value);
    }

    pub fn set_global_params(&mut self, values: &[(ParamHandle, f32)]) {
        for &(handle, value) in values {
            self.set_param(handle, value);
        }
    }

    pub fn set_preset_common_params(&mut self, values: &[(ParamHandle, f32)]) {
        for &(handle, value) in values {
            self.set_param(handle, value);
        }
        std::thread::sleep(DAW_SETTLE_DELAY);
    }

    pub fn set_layer_params(&mut self, layer: LayerId, values: &[(ParamHandle, f32)]) {
        for &(handle, value) in values {
            self.ctx.write_param(
                handle,
                value,
                LayerMask::single(layer),
                StateId::A,
                duotone_shared::ModuleId::Daw,
                Default::default(),
            );
            self.daw.set_param(handle, value);
        }
        std::thread::sleep(DAW_SETTLE_DELAY);
    }

    pub fn set_layer_patch_state_params(
        &mut self,
        layer: LayerId,
        state: StateId,
        values: &[(ParamHandle, f32)],
    ) {
        for &(handle, value) in values {
            self.ctx.write_param(
                handle,
                value,
                LayerMask::single(layer),
                state,
                duotone_shared::ModuleId::Daw,
                Default::default(),
            );
            self.daw.set_param(handle, value);
        }
        std::thread::sleep(DAW_SETTLE_DELAY);
    }
}
