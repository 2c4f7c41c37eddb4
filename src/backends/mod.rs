// Backend seams and in-process reference implementations
// The real platform adapters live in the host applications; the memory
// backends document the contracts and drive the test suite

pub mod memory;

pub use memory::{MemoryExecution, MemoryPresenter, MemorySink, MemorySource, StaticSettings};
