//! Opaque identities used as registry keys.
//!
//! Both identities are derived from Rust type identity: every controller is a
//! (usually zero-sized) marker type, and every `fn` item or closure literal has
//! its own unique type. Registering the same function twice therefore yields
//! the same [`HandlerId`], while two different functions never collide.

use std::any::{type_name, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Strip the module path (and generic arguments) from a type name for display.
fn short_type_name(full: &'static str) -> &'static str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// Identity of a declared controller.
#[derive(Clone, Copy)]
pub struct ControllerId {
    type_id: TypeId,
    name: &'static str,
}

impl ControllerId {
    /// Identity of the controller declared by marker type `T`.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            name: short_type_name(type_name::<T>()),
        }
    }

    /// Short type name, used in logs and error messages.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for ControllerId {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for ControllerId {}

impl Hash for ControllerId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl fmt::Debug for ControllerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ControllerId({})", self.name)
    }
}

impl fmt::Display for ControllerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name)
    }
}

/// Identity of a request-handling function.
#[derive(Clone, Copy)]
pub struct HandlerId {
    type_id: TypeId,
    name: &'static str,
}

impl HandlerId {
    /// Identity of the handler whose type is `F`.
    pub fn of<F: ?Sized + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<F>(),
            name: short_type_name(type_name::<F>()),
        }
    }

    /// Identity of the handler value `f` (inferred from its type).
    pub fn of_val<F: 'static>(_f: &F) -> Self {
        Self::of::<F>()
    }

    /// Short function name, used in logs.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for HandlerId {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for HandlerId {}

impl Hash for HandlerId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl fmt::Debug for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HandlerId({})", self.name)
    }
}

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name)
    }
}

/// A host handler paired with the identity route middleware is keyed by.
#[derive(Clone)]
pub struct Endpoint<T> {
    id: HandlerId,
    handler: T,
}

impl<T> Endpoint<T> {
    pub fn new(id: HandlerId, handler: T) -> Self {
        Self { id, handler }
    }

    pub fn id(&self) -> HandlerId {
        self.id
    }

    pub fn handler(&self) -> &T {
        &self.handler
    }
}

impl<T> fmt::Debug for Endpoint<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint").field("id", &self.id).finish()
    }
}
