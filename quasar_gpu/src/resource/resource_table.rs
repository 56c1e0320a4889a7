/// Fixed-capacity table of records addressed by typed handles

use crate::error::Result;
use crate::resource::Handle;
use crate::utils::HandlePool;

pub struct ResourceTable<T, R> {
    pool: HandlePool,
    slots: Vec<Option<R>>,
    _tag: std::marker::PhantomData<fn() -> T>,
}

impl<T, R> ResourceTable<T, R> {
    pub fn new(name: &'static str, capacity: u32) -> Self {
        Self {
            pool: HandlePool::new(name, capacity),
            slots: (0..capacity).map(|_| None).collect(),
            _tag: std::marker::PhantomData,
        }
    }

    /// Store a record under a fresh handle
    pub fn insert(&mut self, record: R) -> Result<Handle<T>> {
        let index = self.pool.acquire()?;
        self.slots[index as usize] = Some(record);
        Ok(Handle::from_index(index))
    }

    pub fn get(&self, handle: Handle<T>) -> Result<&R> {
        match self.slots.get(handle.index() as usize).and_then(|s| s.as_ref()) {
            Some(record) => Ok(record),
            None => crate::engine_bail!(InvalidHandle => "quasar::ResourceTable",
                "{} handle {} is not live", self.name(), handle.index()),
        }
    }

    pub fn get_mut(&mut self, handle: Handle<T>) -> Result<&mut R> {
        let name = self.name();
        match self.slots.get_mut(handle.index() as usize).and_then(|s| s.as_mut()) {
            Some(record) => Ok(record),
            None => crate::engine_bail!(InvalidHandle => "quasar::ResourceTable",
                "{} handle {} is not live", name, handle.index()),
        }
    }

    /// Take the record out and recycle its handle
    pub fn remove(&mut self, handle: Handle<T>) -> Result<R> {
        self.pool.free(handle.index())?;
        match self.slots[handle.index() as usize].take() {
            Some(record) => Ok(record),
            None => crate::engine_bail!(InvalidHandle => "quasar::ResourceTable",
                "{} handle {} has no record", self.name(), handle.index()),
        }
    }

    pub fn contains(&self, handle: Handle<T>) -> bool {
        self.pool.is_live(handle.index())
    }

    /// Live handles, in index order
    pub fn handles(&self) -> Vec<Handle<T>> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_some())
            .map(|(i, _)| Handle::from_index(i as u32))
            .collect()
    }

    pub fn len(&self) -> u32 {
        self.pool.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    /// Records that can still be inserted
    pub fn available(&self) -> u32 {
        self.pool.available()
    }

    fn name(&self) -> &'static str {
        std::any::type_name::<T>().rsplit("::").next().unwrap_or("resource")
    }
}

#[cfg(test)]
#[path = "resource_table_tests.rs"]
mod tests;
