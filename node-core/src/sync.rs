//! Interrupt-safe ownership cell for state shared between the interrupt
//! handlers and the foreground loop.

use core::cell::RefCell;

use critical_section::Mutex;

/// Single-owner cell guarded by a critical section.
///
/// The value is installed once during start-up and is afterwards only
/// reachable through [`Shared::with`], which masks the interrupt for the
/// duration of the closure. Each access therefore sees every multi-field
/// invariant (ring head/tail/count, frame state) either fully before or fully
/// after an interrupt-side update.
pub struct Shared<T> {
    cell: Mutex<RefCell<Option<T>>>,
}

impl<T> Shared<T> {
    /// Creates an empty cell, suitable for a `static`.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            cell: Mutex::new(RefCell::new(None)),
        }
    }

    /// Creates a cell that already owns `value`.
    #[must_use]
    pub const fn with_value(value: T) -> Self {
        Self {
            cell: Mutex::new(RefCell::new(Some(value))),
        }
    }

    /// Installs `value`, returning whatever was installed before.
    #[must_use]
    pub fn install(&self, value: T) -> Option<T> {
        critical_section::with(|cs| self.cell.borrow_ref_mut(cs).replace(value))
    }

    /// Removes and returns the installed value.
    #[must_use]
    pub fn take(&self) -> Option<T> {
        critical_section::with(|cs| self.cell.borrow_ref_mut(cs).take())
    }

    /// Returns `true` once a value has been installed.
    #[must_use]
    pub fn is_installed(&self) -> bool {
        critical_section::with(|cs| self.cell.borrow_ref(cs).is_some())
    }

    /// Runs `f` against the installed value inside a critical section.
    ///
    /// Returns `None` when nothing has been installed yet, which lets
    /// interrupt handlers firing before start-up completes fall through
    /// silently.
    ///
    /// # Panics
    ///
    /// Panics if `f` re-enters the same cell.
    #[must_use]
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        critical_section::with(|cs| self.cell.borrow_ref_mut(cs).as_mut().map(f))
    }
}

impl<T> Default for Shared<T> {
    fn default() -> Self {
        Self::new()
    }
}
