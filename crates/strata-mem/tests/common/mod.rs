// Shared fixtures for strata-mem integration tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::ptr::NonNull;
use strata_mem::{DebugOptions, DebugResource, MemoryResource, Result, system_resource};

/// One call observed by a `RecordingResource`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Allocate { size: usize, align: usize },
    Deallocate { size: usize, align: usize },
}

/// System-backed resource that records every call it receives, in order.
#[derive(Default)]
pub struct RecordingResource {
    events: RefCell<Vec<Event>>,
}

impl RecordingResource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.borrow().clone()
    }

    pub fn allocations(&self) -> Vec<usize> {
        self.events
            .borrow()
            .iter()
            .filter_map(|event| match event {
                Event::Allocate { size, .. } => Some(*size),
                Event::Deallocate { .. } => None,
            })
            .collect()
    }

    pub fn deallocations(&self) -> Vec<usize> {
        self.events
            .borrow()
            .iter()
            .filter_map(|event| match event {
                Event::Deallocate { size, .. } => Some(*size),
                Event::Allocate { .. } => None,
            })
            .collect()
    }
}

impl MemoryResource for RecordingResource {
    fn allocate(&self, size: usize, align: usize) -> Result<NonNull<u8>> {
        let ptr = system_resource().allocate(size, align)?;
        self.events.borrow_mut().push(Event::Allocate { size, align });
        Ok(ptr)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, size: usize, align: usize) {
        self.events.borrow_mut().push(Event::Deallocate { size, align });
        unsafe { system_resource().deallocate(ptr, size, align) }
    }
}

/// Debug decorator with live tracking forced on, regardless of build profile.
pub fn tracking_debug(upstream: &dyn MemoryResource) -> DebugResource<'_> {
    DebugResource::with_options(upstream, DebugOptions { track_live: true })
}
