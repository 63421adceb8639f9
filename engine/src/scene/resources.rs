use slab::Slab;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    MeshBuffers,
    Material,
    Skeleton,
    HelperGeometry,
    HelperMaterial,
}

/// Handle to a graphics resource owned by the scene.
///
/// Handles carry the generation of the slot, so releasing a handle twice
/// never frees a resource allocated later into the same slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ResourceHandle {
    index: usize,
    generation: u64,
    kind: ResourceKind,
}

impl ResourceHandle {
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }
}

#[derive(Debug)]
struct Slot {
    generation: u64,
    kind: ResourceKind,
}

/// Book-keeping of every live scene resource.
#[derive(Debug, Default)]
pub struct ResourceRegistry {
    slots: Slab<Slot>,
    generation: u64,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        ResourceRegistry::default()
    }

    pub fn allocate(&mut self, kind: ResourceKind) -> ResourceHandle {
        self.generation += 1;
        let generation = self.generation;
        let index = self.slots.insert(Slot { generation, kind });
        ResourceHandle {
            index,
            generation,
            kind,
        }
    }

    /// Releases resource. Returns `false` if handle is stale.
    pub fn release(&mut self, handle: ResourceHandle) -> bool {
        match self.slots.get(handle.index) {
            Some(slot) if slot.generation == handle.generation => {
                self.slots.remove(handle.index);
                true
            }
            _ => {
                tracing::warn!("Releasing stale resource {:?}", handle);
                false
            }
        }
    }

    pub fn release_all(
        &mut self,
        handles: impl IntoIterator<Item = ResourceHandle>,
    ) {
        for handle in handles {
            self.release(handle);
        }
    }

    pub fn is_live(&self, handle: ResourceHandle) -> bool {
        self.slots
            .get(handle.index)
            .map_or(false, |slot| slot.generation == handle.generation)
    }

    pub fn live(&self) -> usize {
        self.slots.len()
    }

    pub fn live_of(&self, kind: ResourceKind) -> usize {
        self.slots.iter().filter(|(_, slot)| slot.kind == kind).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn double_release_does_not_touch_reused_slot() {
        let mut registry = ResourceRegistry::new();
        let first = registry.allocate(ResourceKind::Material);
        assert!(registry.release(first));

        let second = registry.allocate(ResourceKind::Skeleton);
        assert!(!registry.release(first));
        assert!(registry.is_live(second));
        assert_eq!(registry.live(), 1);
        assert_eq!(registry.live_of(ResourceKind::Skeleton), 1);
        assert_eq!(registry.live_of(ResourceKind::Material), 0);
    }
}
