//! Parameter Registry (C3): the single source of truth for every parameter
//! (spec.md §4.3). Registration is one-shot at startup; deriving subsets by
//! scanning the arena is acceptable since it never happens on a hot path.

use crate::error::RegistryError;
use crate::param::Param;
use duotone_shared::{ModuleId, ParamHandle, Scope};
use std::collections::{HashMap, HashSet};

#[derive(Default)]
pub struct Registry {
    arena: Vec<Param>,
    by_path: HashMap<String, ParamHandle>,
    by_module_id: HashMap<(ModuleId, u32), ParamHandle>,
    by_ref: HashMap<String, ParamHandle>,
    blacklist: HashSet<String>,
    /// Named lists and context-specific sub-lists (spec.md §4.5 step 5),
    /// keyed by list name. Unknown paths inside a list are dropped with a
    /// warning at load time rather than failing the whole list.
    named_lists: HashMap<String, Vec<ParamHandle>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `path` so that a later `register` call for it is silently
    /// dropped (spec.md §4.3 `blacklist`, supplemented in SPEC_FULL §4.5:
    /// loaded from `param_blacklist.json` and applied *before*
    /// registration — blacklisted params are never registered at all).
    pub fn blacklist(&mut self, path: impl Into<String>) {
        self.blacklist.insert(path.into());
    }

    pub fn is_blacklisted(&self, path: &str) -> bool {
        self.blacklist.contains(path)
    }

    /// Insert `param` by path and by `(module, id)`. Returns `Ok(None)` if
    /// the path was blacklisted (param silently dropped), `Ok(Some(handle))`
    /// on success. Path collision is fatal.
    pub fn register(&mut self, mut param: Param) -> Result<Option<ParamHandle>, RegistryError> {
        if self.blacklist.contains(&param.path) {
            return Ok(None);
        }
        if self.by_path.contains_key(&param.path) {
            return Err(RegistryError::Param(duotone_shared::ParamError::PathCollision(
                param.path.clone(),
            )));
        }
        let handle = ParamHandle(self.arena.len() as u32);
        param.handle = handle;
        if let Some(tag) = param.ref_tag.clone() {
            self.by_ref.insert(tag, handle);
        }
        self.by_path.insert(param.path.clone(), handle);
        self.by_module_id.insert((param.module, param.numeric_id), handle);
        self.arena.push(param);
        Ok(Some(handle))
    }

    pub fn get(&self, handle: ParamHandle) -> Option<&Param> {
        self.arena.get(handle.index())
    }

    pub fn get_mut(&mut self, handle: ParamHandle) -> Option<&mut Param> {
        self.arena.get_mut(handle.index())
    }

    pub fn lookup_by_path(&self, path: &str) -> Option<ParamHandle> {
        self.by_path.get(path).copied()
    }

    pub fn lookup_by_module_id(&self, module: ModuleId, id: u32) -> Option<ParamHandle> {
        self.by_module_id.get(&(module, id)).copied()
    }

    pub fn lookup_by_ref(&self, ref_tag: &str) -> Option<ParamHandle> {
        self.by_ref.get(ref_tag).copied()
    }

    /// `params_of_module(m)`: stable order = registration order.
    pub fn params_of_module(&self, module: ModuleId) -> impl Iterator<Item = ParamHandle> + '_ {
        self.arena.iter().filter(move |p| p.module == module).map(|p| p.handle)
    }

    pub fn preset_params(&self) -> impl Iterator<Item = ParamHandle> + '_ {
        self.arena.iter().filter(|p| p.flags.preset).map(|p| p.handle)
    }

    pub fn layer_params(&self) -> impl Iterator<Item = ParamHandle> + '_ {
        self.arena
            .iter()
            .filter(|p| matches!(p.scope, Scope::Layer | Scope::PatchCommon | Scope::PatchState))
            .map(|p| p.handle)
    }

    pub fn global_params(&self) -> impl Iterator<Item = ParamHandle> + '_ {
        self.arena.iter().filter(|p| matches!(p.scope, Scope::Global)).map(|p| p.handle)
    }

    pub fn mod_matrix_params(&self) -> impl Iterator<Item = ParamHandle> + '_ {
        self.arena.iter().filter(|p| p.flags.modmatrix).map(|p| p.handle)
    }

    /// Register (or replace) a named list's resolved member handles.
    pub fn set_named_list(&mut self, name: impl Into<String>, handles: Vec<ParamHandle>) {
        self.named_lists.insert(name.into(), handles);
    }

    pub fn named_list(&self, name: &str) -> Option<&[ParamHandle]> {
        self.named_lists.get(name).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use duotone_shared::ModuleId;

    fn param(path: &str) -> Param {
        Param::new(ParamHandle(0), ModuleId::System, 1, path, Scope::Global)
    }

    #[test]
    fn register_then_lookup_by_path() {
        let mut reg = Registry::new();
        let handle = reg.register(param("global/tempo")).unwrap().unwrap();
        assert_eq!(reg.lookup_by_path("global/tempo"), Some(handle));
    }

    #[test]
    fn blacklisted_path_is_silently_dropped() {
        let mut reg = Registry::new();
        reg.blacklist("daw/forbidden");
        let result = reg.register(param("daw/forbidden")).unwrap();
        assert!(result.is_none());
        assert_eq!(reg.len(), 0);
    }

    #[test]
    fn path_collision_is_fatal() {
        let mut reg = Registry::new();
        reg.register(param("dup")).unwrap();
        assert!(reg.register(param("dup")).is_err());
    }

    #[test]
    fn module_id_collision_across_different_paths_is_allowed_by_storage() {
        let mut reg = Registry::new();
        let mut p1 = param("a");
        p1.numeric_id = 5;
        let mut p2 = param("b");
        p2.numeric_id = 5;
        reg.register(p1).unwrap();
        reg.register(p2).unwrap();
        // Later registration wins the (module,id) slot — registration order
        // matters, same as path-scan derived subsets.
        assert!(reg.lookup_by_module_id(ModuleId::System, 5).is_some());
    }

    #[test]
    fn named_list_round_trips() {
        let mut reg = Registry::new();
        let handle = reg.register(param("daw/osc1/wave")).unwrap().unwrap();
        reg.set_named_list("osc_waves", vec![handle]);
        assert_eq!(reg.named_list("osc_waves"), Some(&[handle][..]));
        assert_eq!(reg.named_list("missing"), None);
    }
}
