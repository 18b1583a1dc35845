use std::sync::{Arc, Mutex, PoisonError};

/// A resource that can be released once and queried afterwards.
pub trait Disposable: Send + Sync {
    /// Release the resource. Calling this more than once has no further effect.
    fn dispose(&self);

    fn is_disposed(&self) -> bool;
}

impl<T: Disposable + ?Sized> Disposable for Box<T> {
    fn dispose(&self) {
        (**self).dispose()
    }

    fn is_disposed(&self) -> bool {
        (**self).is_disposed()
    }
}

impl<T: Disposable + ?Sized> Disposable for Arc<T> {
    fn dispose(&self) {
        (**self).dispose()
    }

    fn is_disposed(&self) -> bool {
        (**self).is_disposed()
    }
}

/// A thread-safe group of disposables released together.
///
/// `None` marks the composite as disposed; the set is never revived.
pub struct CompositeDisposable<D: Disposable = Box<dyn Disposable>> {
    items: Mutex<Option<Vec<D>>>,
}

impl<D: Disposable> CompositeDisposable<D> {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(Some(Vec::new())),
        }
    }

    /// Track `item`. If the composite is already disposed the item is handed
    /// back untouched so the caller decides how to release it.
    pub fn add(&self, item: D) -> Result<(), D> {
        let mut items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        match items.as_mut() {
            Some(items) => {
                items.push(item);
                Ok(())
            }
            None => Err(item),
        }
    }

    /// Number of tracked items (0 once disposed).
    pub fn len(&self) -> usize {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Dispose every tracked item and reject further additions.
    ///
    /// Items are drained under the lock and disposed after it is released.
    pub fn dispose(&self) {
        let drained = self
            .items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(items) = drained {
            for item in &items {
                item.dispose();
            }
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

impl<D: Disposable> Default for CompositeDisposable<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Disposable> Disposable for CompositeDisposable<D> {
    fn dispose(&self) {
        CompositeDisposable::dispose(self)
    }

    fn is_disposed(&self) -> bool {
        CompositeDisposable::is_disposed(self)
    }
}
