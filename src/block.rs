use crate::alloc::{AllocGuard, Allocator};
use crate::deleter::Deleter;
use crate::error::AllocError;
use crate::state::BlockHeader;
use std::alloc::Layout;
use std::any::TypeId;
use std::mem::{self, ManuallyDrop};
use std::ptr::{self, NonNull};

/// Type-erased teardown operations of a control block.
///
/// One static table exists per concrete block type. Handles only ever see a
/// `NonNull<BlockHeader>`; the table recovers the concrete type.
///
/// 控制块的类型擦除拆除操作。
/// 每种具体控制块类型对应一个静态表。句柄只持有 `NonNull<BlockHeader>`，
/// 由该表恢复具体类型。
#[derive(Debug)]
pub(crate) struct BlockVTable {
    /// Run the deleter (or the pointee's destructor). Called at most once.
    pub(crate) release_pointee: unsafe fn(NonNull<BlockHeader>),
    /// Free the block's own storage. Called at most once, after `release_pointee`.
    pub(crate) destroy_self: unsafe fn(NonNull<BlockHeader>),
    /// Address of the stored deleter if its type matches.
    pub(crate) deleter: unsafe fn(NonNull<BlockHeader>, TypeId) -> Option<NonNull<()>>,
}

/// A concrete control block.
///
/// # Safety
/// Implementors must be `#[repr(C)]` with a `BlockHeader` as their first
/// field, so that a `NonNull<BlockHeader>` can be cast back to `NonNull<Self>`.
pub(crate) unsafe trait ControlBlock: Sized {
    /// # Safety
    /// `this` is live and its strong count just reached zero.
    unsafe fn release_pointee(this: NonNull<Self>);

    /// # Safety
    /// `this` is live, `release_pointee` has completed and the weak count just
    /// reached zero. `this` is dangling afterwards.
    unsafe fn destroy_self(this: NonNull<Self>);

    /// # Safety
    /// `this` is live.
    unsafe fn deleter(_this: NonNull<Self>, _type_id: TypeId) -> Option<NonNull<()>> {
        None
    }
}

#[inline]
fn vtable<B: ControlBlock>() -> &'static BlockVTable {
    &BlockVTable {
        release_pointee: release_pointee::<B>,
        destroy_self: destroy_self::<B>,
        deleter: deleter::<B>,
    }
}

unsafe fn release_pointee<B: ControlBlock>(block: NonNull<BlockHeader>) {
    log::trace!("releasing pointee of control block {:p}", block);
    let bomb = AbortOnUnwind;
    unsafe { B::release_pointee(block.cast()) };
    mem::forget(bomb);
}

unsafe fn destroy_self<B: ControlBlock>(block: NonNull<BlockHeader>) {
    log::trace!("destroying control block {:p}", block);
    unsafe { B::destroy_self(block.cast()) }
}

unsafe fn deleter<B: ControlBlock>(
    block: NonNull<BlockHeader>,
    type_id: TypeId,
) -> Option<NonNull<()>> {
    unsafe { B::deleter(block.cast(), type_id) }
}

/// Armed around pointee teardown: a deleter or destructor that unwinds leaves
/// the counters in an unrecoverable state.
struct AbortOnUnwind;

impl Drop for AbortOnUnwind {
    fn drop(&mut self) {
        log::error!("deleter panicked while releasing a shared pointee, aborting");
        std::process::abort();
    }
}

/// Control block for a separately allocated pointee: owns the raw pointer, the
/// deleter that releases it and the allocator that provided this block.
///
/// 单独分配的指向对象所用的控制块：持有原始指针、释放它的删除器，
/// 以及为本控制块提供存储的分配器。
#[repr(C)]
pub(crate) struct PointerBlock<T, D, A> {
    header: BlockHeader,
    ptr: *mut T,
    deleter: ManuallyDrop<D>,
    alloc: ManuallyDrop<A>,
}

unsafe impl<T, D, A> ControlBlock for PointerBlock<T, D, A>
where
    D: Deleter<T> + 'static,
    A: Allocator,
{
    unsafe fn release_pointee(this: NonNull<Self>) {
        let raw = this.as_ptr();
        unsafe {
            let ptr = ptr::addr_of!((*raw).ptr).read();
            // Observers may read the header concurrently, so only the deleter
            // field is borrowed mutably.
            let deleter = &mut *ptr::addr_of_mut!((*raw).deleter);
            <D as Deleter<T>>::delete(&mut **deleter, ptr);
        }
    }

    unsafe fn destroy_self(this: NonNull<Self>) {
        let raw = this.as_ptr();
        unsafe {
            let alloc = ManuallyDrop::take(&mut (*raw).alloc);
            ManuallyDrop::drop(&mut (*raw).deleter);
            ptr::drop_in_place(ptr::addr_of_mut!((*raw).header));
            alloc.deallocate(this.cast(), Layout::new::<Self>());
        }
    }

    unsafe fn deleter(this: NonNull<Self>, type_id: TypeId) -> Option<NonNull<()>> {
        if type_id != TypeId::of::<D>() {
            return None;
        }
        let deleter = unsafe { ptr::addr_of_mut!((*this.as_ptr()).deleter) };
        NonNull::new(deleter).map(NonNull::cast)
    }
}

/// Control block co-located with its pointee in a single allocation.
///
/// 与指向对象位于同一次分配中的控制块。
#[repr(C)]
pub(crate) struct InlineBlock<T, A> {
    header: BlockHeader,
    alloc: ManuallyDrop<A>,
    value: ManuallyDrop<T>,
}

unsafe impl<T, A> ControlBlock for InlineBlock<T, A>
where
    A: Allocator,
{
    unsafe fn release_pointee(this: NonNull<Self>) {
        unsafe { ManuallyDrop::drop(&mut *ptr::addr_of_mut!((*this.as_ptr()).value)) }
    }

    unsafe fn destroy_self(this: NonNull<Self>) {
        let raw = this.as_ptr();
        unsafe {
            let alloc = ManuallyDrop::take(&mut (*raw).alloc);
            ptr::drop_in_place(ptr::addr_of_mut!((*raw).header));
            alloc.deallocate(this.cast(), Layout::new::<Self>());
        }
    }
}

/// A raw pointer whose deleter has not been handed to a control block yet.
///
/// Dropping it runs the deleter, so a constructor that fails after adopting
/// the pointer still releases it.
///
/// 删除器尚未交给控制块的原始指针。
/// drop 时运行删除器，因此接管指针后失败的构造仍然会释放它。
struct Adopted<T, D: Deleter<T>> {
    ptr: *mut T,
    deleter: ManuallyDrop<D>,
}

impl<T, D: Deleter<T>> Adopted<T, D> {
    #[inline]
    fn into_parts(self) -> (*mut T, D) {
        let mut this = ManuallyDrop::new(self);
        let deleter = unsafe { ManuallyDrop::take(&mut this.deleter) };
        (this.ptr, deleter)
    }
}

impl<T, D: Deleter<T>> Drop for Adopted<T, D> {
    fn drop(&mut self) {
        unsafe {
            <D as Deleter<T>>::delete(&mut *self.deleter, self.ptr);
            ManuallyDrop::drop(&mut self.deleter);
        }
    }
}

/// Build a control block taking ownership of `ptr`.
///
/// On failure `deleter` has already been applied to `ptr`.
///
/// # Safety
/// `deleter` must be able to release `ptr` once every owner is gone.
pub(crate) unsafe fn new_pointer_block<T, D, A>(
    ptr: *mut T,
    deleter: D,
    alloc: A,
) -> Result<NonNull<BlockHeader>, AllocError>
where
    T: Send + Sync + 'static,
    D: Deleter<T> + Send + Sync + 'static,
    A: Allocator + Send + Sync + 'static,
{
    let adopted = Adopted {
        ptr,
        deleter: ManuallyDrop::new(deleter),
    };

    let layout = Layout::new::<PointerBlock<T, D, A>>();
    let storage = match AllocGuard::new(alloc, layout) {
        Ok(storage) => storage,
        Err(err) => {
            log::debug!("control block allocation failed, releasing adopted pointer {ptr:p}");
            drop(adopted);
            return Err(err);
        }
    };

    let (raw, alloc) = storage.commit();
    let (ptr, deleter) = adopted.into_parts();
    let block = raw.cast::<PointerBlock<T, D, A>>();
    unsafe {
        block.as_ptr().write(PointerBlock {
            header: BlockHeader::new(vtable::<PointerBlock<T, D, A>>()),
            ptr,
            deleter: ManuallyDrop::new(deleter),
            alloc: ManuallyDrop::new(alloc),
        });
    }

    log::trace!("created control block {block:p} owning {ptr:p}");
    Ok(block.cast())
}

/// Build a co-located block and initialize its pointee with `init`.
///
/// Storage is acquired before `init` runs; if `init` unwinds the storage is
/// returned to `alloc`.
///
/// Returns the block and the address of the pointee inside it.
pub(crate) fn new_inline_block<T, A>(
    init: impl FnOnce() -> T,
    alloc: A,
) -> Result<(NonNull<BlockHeader>, NonNull<T>), AllocError>
where
    T: Send + Sync + 'static,
    A: Allocator + Send + Sync + 'static,
{
    let storage = AllocGuard::new(alloc, Layout::new::<InlineBlock<T, A>>())?;
    let value = init();
    let (raw, alloc) = storage.commit();

    let block = raw.cast::<InlineBlock<T, A>>();
    let value = unsafe {
        block.as_ptr().write(InlineBlock {
            header: BlockHeader::new(vtable::<InlineBlock<T, A>>()),
            alloc: ManuallyDrop::new(alloc),
            value: ManuallyDrop::new(value),
        });
        // `ManuallyDrop<T>` is `repr(transparent)`.
        NonNull::new_unchecked(ptr::addr_of_mut!((*block.as_ptr()).value)).cast::<T>()
    };

    log::trace!("created co-located control block {block:p}");
    Ok((block.cast(), value))
}
