//! Shared-ownership smart pointers built on an indirect control block.
//!
//! [`SharedPtr`] owns an object through a heap-allocated control block that
//! counts strong and weak references and hides the concrete cleanup logic
//! (custom deleter, custom allocator) behind a uniform, type-erased interface.
//! [`WeakPtr`] observes the same block without keeping the object alive.
//!
//! **Two-phase teardown**:
//! - The release that drops the strong count to zero runs the deleter, exactly
//!   once, whatever the number and order of handles involved.
//! - The release that drops the weak count to zero frees the control block.
//!   Owners collectively hold one weak reference, so observers can always ask
//!   whether the object is still alive.
//!
//! **Aliasing**: a `SharedPtr` may expose a different pointer than the one its
//! block releases (see [`SharedPtr::aliasing`] and [`SharedPtr::project`]).
//!
//! **Allocators and rollback**: blocks can live in memory from any
//! [`Allocator`]. If block allocation fails after a raw pointer has been
//! adopted, the supplied deleter releases it before the error is returned.
//!
//! ```
//! use shared_ptr::{SharedPtr, WeakPtr};
//!
//! let shared = SharedPtr::new(vec![1, 2, 3]);
//! let weak = WeakPtr::from(&shared);
//! assert_eq!(weak.use_count(), 1);
//!
//! let promoted = SharedPtr::try_from(&weak).unwrap();
//! assert_eq!(promoted.len(), 3);
//! drop((shared, promoted));
//!
//! assert!(weak.expired());
//! assert!(SharedPtr::try_from(&weak).is_err());
//! ```
//!
//! 基于间接控制块的共享所有权智能指针。
//!
//! [`SharedPtr`] 通过堆上分配的控制块拥有对象。控制块统计强引用和弱引用，
//! 并把具体的清理逻辑（自定义删除器、自定义分配器）隐藏在统一的类型擦除接口之后。
//! [`WeakPtr`] 观察同一个控制块，但不保持对象存活。

mod alloc;
mod atomic;
mod block;
mod builder;
mod count;
mod deleter;
mod error;
mod shared;
mod state;
mod sync;
mod weak;

pub use crate::alloc::{Allocator, Global};
pub use crate::atomic::{AtomicSharedPtr, CompareExchangeError};
pub use crate::builder::SharedPtrBuilder;
pub use crate::deleter::{DefaultDelete, Deleter};
pub use crate::error::{AllocError, BadWeakPtr};
pub use crate::shared::SharedPtr;
pub use crate::weak::WeakPtr;

#[cfg(test)]
mod tests;
