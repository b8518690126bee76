use thiserror::Error;

/// Returned when an owning handle is requested from a `WeakPtr` whose pointee
/// has already been released.
///
/// This is the loud counterpart of `WeakPtr::lock()`, which reports the same
/// situation as an empty `SharedPtr` instead.
///
/// 当从一个指向对象已被释放的 `WeakPtr` 请求拥有型句柄时返回。
/// 这是 `WeakPtr::lock()` 的"显式失败"版本，后者以空 `SharedPtr` 报告同样的情况。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("bad weak pointer: the observed object has already been released")]
pub struct BadWeakPtr;

/// The allocator could not provide storage for a control block.
///
/// Any raw pointer handed to the failing constructor has already been passed
/// to its deleter by the time this error reaches the caller.
///
/// 分配器无法为控制块提供存储。
/// 当该错误到达调用者时，传给构造函数的原始指针已经交给了它的删除器。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("memory allocation for a control block failed")]
pub struct AllocError;
