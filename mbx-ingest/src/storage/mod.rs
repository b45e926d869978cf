//! Storage collaborators

pub mod object_store;

pub use object_store::{
    sanitize_object_name, FsObjectStore, MemoryObjectStore, ObjectKeyAllocator, ObjectStore,
    ObjectStoreError,
};
