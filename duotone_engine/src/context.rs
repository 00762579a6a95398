//! Engine-wide shared state: the registry, the router, live layer/state
//! selectors, and the per-layer morph interpolator (spec.md §4.4, Design
//! Notes §9).
//!
//! Owned behind a single `parking_lot::Mutex` by whichever manager currently
//! holds the write — the preset mutex referenced throughout spec.md §4.5 is
//! this lock.

use crate::param::CauseSet;
use crate::registry::Registry;
use crate::router::EventRouter;
use duotone_shared::{
    Event, LayerId, LayerMask, ModuleId, ParamChange, ParamChangeFlags, ParamHandle, Scope,
    StateId, SystemFunc,
};
use std::sync::Arc;

/// Per-layer morph interpolator: `effective = lerp(A, B, morph)`. Writes to
/// the morph value move the interpolator; writes to a per-state cell only
/// move that endpoint. Disabled while `lock` is held (spec.md §4.4).
#[derive(Debug, Clone, Copy, Default)]
pub struct MorphState {
    pub morph: f32,
    pub lock: bool,
}

pub struct EngineContext {
    pub registry: Registry,
    pub router: Arc<EventRouter>,
    /// Which layer the UI/surface currently edits.
    pub live_layer: LayerId,
    /// Which patch state each layer currently edits (spec.md §4.5 "update
    /// live layer/state selectors").
    live_state: [StateId; 2],
    morph: [MorphState; 2],
}

impl EngineContext {
    pub fn new(router: Arc<EventRouter>) -> Self {
        Self {
            registry: Registry::new(),
            router,
            live_layer: LayerId::D0,
            live_state: [StateId::A, StateId::A],
            morph: [MorphState::default(); 2],
        }
    }

    pub fn live_state(&self, layer: LayerId) -> StateId {
        self.live_state[layer.index()]
    }

    pub fn set_live_state(&mut self, layer: LayerId, state: StateId) {
        self.live_state[layer.index()] = state;
    }

    pub fn morph(&self, layer: LayerId) -> MorphState {
        self.morph[layer.index()]
    }

    pub fn set_morph_lock(&mut self, layer: LayerId, lock: bool) {
        self.morph[layer.index()].lock = lock;
    }

    /// Effective interpolated value of a PatchState parameter for `layer`,
    /// honouring the morph lock (while locked, the live state's endpoint is
    /// used verbatim rather than interpolated).
    pub fn effective_value(&self, handle: ParamHandle, layer: LayerId) -> Option<f32> {
        let param = self.registry.get(handle)?;
        if !matches!(param.scope, Scope::PatchState) || param.state_a_only {
            return Some(param.value(layer, self.live_state(layer)));
        }
        let m = self.morph(layer);
        if m.lock {
            return Some(param.value(layer, self.live_state(layer)));
        }
        let a = param.value(layer, StateId::A);
        let b = param.value(layer, StateId::B);
        Some(a + (b - a) * m.morph.clamp(0.0, 1.0))
    }

    /// Set a layer's morph value directly (called when the morph-value
    /// parameter itself is written).
    pub fn set_morph_value(&mut self, layer: LayerId, value: f32) {
        self.morph[layer.index()].morph = value.clamp(0.0, 1.0);
    }

    /// Write `handle`'s normalised value and run the mapping fanout
    /// algorithm (spec.md §4.4 — "the central invariant").
    ///
    /// `mask` selects which layer cells the write (and recursive writes into
    /// Layer/PatchCommon/PatchState peers) touch; `state` selects which
    /// patch-state cell.
    pub fn write_param(
        &mut self,
        handle: ParamHandle,
        new_value: f32,
        mask: LayerMask,
        state: StateId,
        from_module: ModuleId,
        flags: ParamChangeFlags,
    ) {
        let mut cause = CauseSet::new();
        self.apply_write(handle, new_value, mask, state, from_module, flags, &mut cause, true);
    }

    /// Same as `write_param`, but the `ParamChange` for `handle` itself is
    /// marked `display = false` — used by the MIDI clock slave's tempo
    /// estimate, which updates the stored value without flashing the GUI
    /// (spec.md §8 S4). Fanout recursion (if any) still displays normally.
    pub fn write_param_silent(
        &mut self,
        handle: ParamHandle,
        new_value: f32,
        mask: LayerMask,
        state: StateId,
        from_module: ModuleId,
        flags: ParamChangeFlags,
    ) {
        let mut cause = CauseSet::new();
        self.apply_write(handle, new_value, mask, state, from_module, flags, &mut cause, false);
    }

    #[allow(clippy::too_many_arguments)]
    fn apply_write(
        &mut self,
        handle: ParamHandle,
        new_value: f32,
        mask: LayerMask,
        state: StateId,
        from_module: ModuleId,
        flags: ParamChangeFlags,
        cause: &mut CauseSet,
        display: bool,
    ) {
        let old_value = match self.registry.get(handle) {
            Some(p) => p.value(self.live_layer, state),
            None => return,
        };
        {
            let param = self.registry.get_mut(handle).unwrap();
            param.set_value(mask, state, new_value);
            if matches!(param.scope, Scope::PatchState) && !param.state_a_only {
                // endpoint move only; interpolator untouched here.
            }
        }
        let delta = new_value - old_value;
        let param_module = self.registry.get(handle).unwrap().module;
        let mut change = ParamChange::new(handle, from_module).with_layer_mask(mask);
        if !display {
            change = change.non_displaying();
        }
        self.router.emit(param_module, Event::ParamChange(change));

        cause.insert(handle);
        let mappings = self.registry.get(handle).unwrap().mappings.clone();
        for peer in mappings {
            if cause.contains(&peer) {
                continue;
            }
            self.fan_into_peer(handle, peer, delta, new_value, mask, state, from_module, flags, cause);
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn fan_into_peer(
        &mut self,
        source: ParamHandle,
        peer: ParamHandle,
        delta: f32,
        source_value: f32,
        mask: LayerMask,
        state: StateId,
        from_module: ModuleId,
        flags: ParamChangeFlags,
        cause: &mut CauseSet,
    ) {
        let (source_linked, source_linking_enabled) = {
            let s = self.registry.get(source).unwrap();
            (s.linked_param, s.linking_enabled)
        };
        let peer_scope = match self.registry.get(peer) {
            Some(p) => p.scope,
            None => return,
        };
        let (peer_linked, peer_linking_enabled) = {
            let p = self.registry.get(peer).unwrap();
            (p.linked_param, p.linking_enabled)
        };

        let differential = source_linked && peer_linked;
        if differential && !source_linking_enabled && !peer_linking_enabled {
            return;
        }

        match peer_scope {
            Scope::MidiShim => {
                self.emit_midi_shim(peer, source_value);
            }
            Scope::SurfaceControl => {
                {
                    let p = self.registry.get_mut(peer).unwrap();
                    p.set_value(LayerMask::BOTH, state, source_value);
                }
                self.router.emit(
                    ModuleId::SfcControl,
                    Event::ParamChange(
                        ParamChange::new(peer, from_module).non_displaying(),
                    ),
                );
            }
            Scope::SystemFunc => {
                let func_type = self.registry.get(peer).unwrap().system_func_type;
                if let Some(func_type) = func_type {
                    let mut sf = SystemFunc::new(func_type);
                    sf.value = source_value;
                    self.router.emit(from_module, Event::SystemFunc(sf));
                }
                // Do not recurse into a system-function parameter.
            }
            Scope::Global | Scope::PresetCommon => {
                let new_peer_value = if differential {
                    let cur = self.registry.get(peer).unwrap().value(LayerId::D0, state);
                    cur + delta
                } else {
                    source_value
                };
                self.apply_write(peer, new_peer_value, mask, state, from_module, flags, cause, true);
            }
            Scope::Layer | Scope::PatchCommon | Scope::PatchState => {
                let new_peer_value = if differential {
                    let cur = self.registry.get(peer).unwrap().value(self.live_layer, state);
                    cur + delta
                } else {
                    source_value
                };
                self.apply_write(peer, new_peer_value, mask, state, from_module, flags, cause, true);
            }
        }
    }

    fn emit_midi_shim(&self, handle: ParamHandle, value: f32) {
        let param = match self.registry.get(handle) {
            Some(p) => p,
            None => return,
        };
        let channel = param.midi_shim_channel;
        let kind = match param.midi_shim_cc {
            Some(cc) => duotone_shared::MidiEventKind::Cc {
                controller: cc,
                value: crate::convert::normalised_to_midi_cc(value) as u8,
            },
            None => duotone_shared::MidiEventKind::PitchBend {
                value: crate::convert::normalised_to_pitch_bend(value) as i16,
            },
        };
        self.router.emit(
            ModuleId::Midi,
            Event::Midi(duotone_shared::MidiEvent::new(
                duotone_shared::MidiSource::Usb,
                channel,
                kind,
            )),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::param::Param;

    fn setup() -> (EngineContext, ParamHandle, ParamHandle) {
        let router = Arc::new(EventRouter::new());
        let mut ctx = EngineContext::new(router);
        let a = ctx
            .registry
            .register(Param::new(ParamHandle(0), ModuleId::System, 1, "a", Scope::Global))
            .unwrap()
            .unwrap();
        let b = ctx
            .registry
            .register(Param::new(ParamHandle(0), ModuleId::System, 2, "b", Scope::Global))
            .unwrap()
            .unwrap();
        ctx.registry.get_mut(a).unwrap().mappings.push(b);
        (ctx, a, b)
    }

    #[test]
    fn mapped_param_receives_absolute_copy() {
        let (mut ctx, a, b) = setup();
        ctx.write_param(a, 0.75, LayerMask::BOTH, StateId::A, ModuleId::System, Default::default());
        assert_eq!(ctx.registry.get(b).unwrap().value(LayerId::D0, StateId::A), 0.75);
    }

    #[test]
    fn fanout_does_not_recurse_back_into_source() {
        let (mut ctx, a, b) = setup();
        ctx.registry.get_mut(b).unwrap().mappings.push(a);
        // should not infinite-loop or panic
        ctx.write_param(a, 0.5, LayerMask::BOTH, StateId::A, ModuleId::System, Default::default());
        assert_eq!(ctx.registry.get(a).unwrap().value(LayerId::D0, StateId::A), 0.5);
        assert_eq!(ctx.registry.get(b).unwrap().value(LayerId::D0, StateId::A), 0.5);
    }

    #[test]
    fn linked_params_apply_differential() {
        let (mut ctx, a, b) = setup();
        ctx.registry.get_mut(a).unwrap().linked_param = true;
        ctx.registry.get_mut(b).unwrap().linked_param = true;
        ctx.registry.get_mut(b).unwrap().set_value(LayerMask::BOTH, StateId::A, 0.2);
        ctx.write_param(a, 0.5, LayerMask::BOTH, StateId::A, ModuleId::System, Default::default());
        // a started at 0.0, delta = 0.5, so b: 0.2 + 0.5 = 0.7
        assert!((ctx.registry.get(b).unwrap().value(LayerId::D0, StateId::A) - 0.7).abs() < 1e-6);
    }
}
