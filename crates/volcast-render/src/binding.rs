//! Device binding state and scoped guards that restore it.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::{Deref, DerefMut};

use crate::device::{BlendFactor, Capability, GpuDevice, ProgramHandle, TextureHandle, TextureTarget};

/// Everything a draw can leave behind on a device: current program, active
/// texture unit, per-unit texture bindings, enabled capabilities and the
/// blend function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingState {
    program: Option<ProgramHandle>,
    active_unit: u32,
    textures: BTreeMap<(u32, TextureTarget), TextureHandle>,
    enabled: BTreeSet<Capability>,
    blend: (BlendFactor, BlendFactor),
}

impl Default for BindingState {
    fn default() -> Self {
        Self {
            program: None,
            active_unit: 0,
            textures: BTreeMap::new(),
            enabled: BTreeSet::new(),
            blend: (BlendFactor::One, BlendFactor::Zero),
        }
    }
}

impl BindingState {
    #[must_use]
    pub fn program(&self) -> Option<ProgramHandle> {
        self.program
    }

    #[must_use]
    pub fn active_unit(&self) -> u32 {
        self.active_unit
    }

    /// Texture bound to `target` on `unit`.
    #[must_use]
    pub fn bound_texture(&self, unit: u32, target: TextureTarget) -> Option<TextureHandle> {
        self.textures.get(&(unit, target)).copied()
    }

    /// All `(unit, target) -> texture` bindings.
    pub fn texture_bindings(&self) -> impl Iterator<Item = ((u32, TextureTarget), TextureHandle)> + '_ {
        self.textures.iter().map(|(k, v)| (*k, *v))
    }

    #[must_use]
    pub fn is_enabled(&self, capability: Capability) -> bool {
        self.enabled.contains(&capability)
    }

    #[must_use]
    pub fn blend_func(&self) -> (BlendFactor, BlendFactor) {
        self.blend
    }

    pub fn set_program(&mut self, program: Option<ProgramHandle>) {
        self.program = program;
    }

    pub fn set_active_unit(&mut self, unit: u32) {
        self.active_unit = unit;
    }

    /// Binds on the active unit.
    pub fn bind_texture(&mut self, target: TextureTarget, texture: Option<TextureHandle>) {
        let key = (self.active_unit, target);
        match texture {
            Some(texture) => self.textures.insert(key, texture),
            None => self.textures.remove(&key),
        };
    }

    pub fn set_enabled(&mut self, capability: Capability, enabled: bool) {
        if enabled {
            self.enabled.insert(capability);
        } else {
            self.enabled.remove(&capability);
        }
    }

    pub fn set_blend_func(&mut self, src: BlendFactor, dst: BlendFactor) {
        self.blend = (src, dst);
    }

    /// Drops every binding of a deleted texture.
    pub fn forget_texture(&mut self, texture: TextureHandle) {
        self.textures.retain(|_, bound| *bound != texture);
    }

    /// Clears the current program if it was deleted.
    pub fn forget_program(&mut self, program: ProgramHandle) {
        if self.program == Some(program) {
            self.program = None;
        }
    }
}

/// Issues the device calls that bring its bindings back to `saved`.
pub fn restore_bindings<D: GpuDevice + ?Sized>(device: &mut D, saved: &BindingState) {
    let current = device.bindings().clone();

    for capability in Capability::ALL {
        let wanted = saved.is_enabled(capability);
        if current.is_enabled(capability) != wanted {
            device.set_enabled(capability, wanted);
        }
    }

    if current.blend_func() != saved.blend_func() {
        let (src, dst) = saved.blend_func();
        device.blend_func(src, dst);
    }

    if current.program() != saved.program() {
        device.use_program(saved.program());
    }

    let slots: BTreeSet<(u32, TextureTarget)> = current
        .textures
        .keys()
        .chain(saved.textures.keys())
        .copied()
        .collect();
    for (unit, target) in slots {
        let wanted = saved.bound_texture(unit, target);
        if current.bound_texture(unit, target) != wanted {
            device.active_texture(unit);
            device.bind_texture(target, wanted);
        }
    }

    if device.bindings().active_unit() != saved.active_unit() {
        device.active_texture(saved.active_unit());
    }
}

/// Snapshots the full binding state and restores it when dropped.
///
/// Derefs to the device so work inside the scope goes through the guard.
pub struct StateGuard<'a, D: GpuDevice + ?Sized> {
    device: &'a mut D,
    saved: BindingState,
}

impl<'a, D: GpuDevice + ?Sized> StateGuard<'a, D> {
    pub fn new(device: &'a mut D) -> Self {
        let saved = device.bindings().clone();
        Self { device, saved }
    }

    /// The state that will be restored.
    #[must_use]
    pub fn saved(&self) -> &BindingState {
        &self.saved
    }
}

impl<D: GpuDevice + ?Sized> Deref for StateGuard<'_, D> {
    type Target = D;

    fn deref(&self) -> &D {
        &*self.device
    }
}

impl<D: GpuDevice + ?Sized> DerefMut for StateGuard<'_, D> {
    fn deref_mut(&mut self) -> &mut D {
        &mut *self.device
    }
}

impl<D: GpuDevice + ?Sized> Drop for StateGuard<'_, D> {
    fn drop(&mut self) {
        restore_bindings(&mut *self.device, &self.saved);
    }
}

/// Restores only the active texture unit when dropped.
pub struct TextureUnitGuard<'a, D: GpuDevice + ?Sized> {
    device: &'a mut D,
    saved_unit: u32,
}

impl<'a, D: GpuDevice + ?Sized> TextureUnitGuard<'a, D> {
    pub fn new(device: &'a mut D) -> Self {
        let saved_unit = device.bindings().active_unit();
        Self { device, saved_unit }
    }
}

impl<D: GpuDevice + ?Sized> Deref for TextureUnitGuard<'_, D> {
    type Target = D;

    fn deref(&self) -> &D {
        &*self.device
    }
}

impl<D: GpuDevice + ?Sized> DerefMut for TextureUnitGuard<'_, D> {
    fn deref_mut(&mut self) -> &mut D {
        &mut *self.device
    }
}

impl<D: GpuDevice + ?Sized> Drop for TextureUnitGuard<'_, D> {
    fn drop(&mut self) {
        if self.device.bindings().active_unit() != self.saved_unit {
            self.device.active_texture(self.saved_unit);
        }
    }
}
