use std::{
    cell::{Ref, RefCell, RefMut},
    fmt,
    rc::Rc,
};

// Shared lets cooperative tasks mutably share harness objects (scoreboard,
// reference model, coverage). Every task runs on the scheduler's thread, so
// Rc/RefCell is enough. Borrows must never be held across an `.await`.
pub struct Shared<T: ?Sized>(Rc<RefCell<T>>);

impl<T> Shared<T> {
    pub fn new(data: T) -> Shared<T> {
        Shared(Rc::new(RefCell::new(data)))
    }
}

impl<T: ?Sized> Shared<T> {
    pub fn from_rc(rc: Rc<RefCell<T>>) -> Shared<T> {
        Shared(rc)
    }
    pub fn get(&self) -> Ref<'_, T> {
        (*self.0).borrow()
    }
    pub fn get_mut(&self) -> RefMut<'_, T> {
        (*self.0).borrow_mut()
    }
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.get())
    }
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut self.get_mut())
    }
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl<T: ?Sized> Clone for Shared<T> {
    fn clone(&self) -> Self {
        Shared(self.0.clone())
    }
}

impl<T: ?Sized> fmt::Debug for Shared<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Shared({} refs)", Rc::strong_count(&self.0))
    }
}
