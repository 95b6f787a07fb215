use crate::error::NativeError;
use crate::function::WrappedFunction;
use crate::types::{AggregateDescriptor, AggregateId, Field, NativeType};
use indexmap::IndexMap;
use std::any::Any;
use std::fmt;
use std::rc::Rc;

/// A value bound to a name in a [`NameTable`].
#[derive(Clone)]
pub enum Binding {
    /// A lowered native type; aggregates are bound as `NativeType::Struct`.
    Type(NativeType),
    /// Field names to use when the struct of the same name gets lowered.
    FieldNames(Vec<String>),
    Function(Rc<WrappedFunction>),
    /// An opaque owner kept alive by the table (loaded module, execution engine, ...).
    Handle(Rc<dyn Any>),
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Binding::Type(ty) => f.debug_tuple("Type").field(ty).finish(),
            Binding::FieldNames(names) => f.debug_tuple("FieldNames").field(names).finish(),
            Binding::Function(func) => f.debug_tuple("Function").field(&func.name()).finish(),
            Binding::Handle(_) => f.write_str("Handle(..)"),
        }
    }
}

/// The destination namespace: names bound to types, wrapped functions and handles,
/// plus the arena owning every aggregate descriptor created through it.
///
/// The table is single-threaded; concurrent wraps into one table need
/// external locking.
#[derive(Default)]
pub struct NameTable {
    entries: IndexMap<String, Binding>,
    aggregates: Vec<AggregateDescriptor>,
}

impl NameTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Binding> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Binds `name`, returning whatever was bound there before.
    pub fn set(&mut self, name: impl Into<String>, binding: Binding) -> Option<Binding> {
        self.entries.insert(name.into(), binding)
    }

    pub fn remove(&mut self, name: &str) -> Option<Binding> {
        self.entries.shift_remove(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn function(&self, name: &str) -> Option<Rc<WrappedFunction>> {
        match self.entries.get(name) {
            Some(Binding::Function(func)) => Some(Rc::clone(func)),
            _ => None,
        }
    }

    pub fn native_type(&self, name: &str) -> Option<&NativeType> {
        match self.entries.get(name) {
            Some(Binding::Type(ty)) => Some(ty),
            _ => None,
        }
    }

    pub fn handle(&self, name: &str) -> Option<Rc<dyn Any>> {
        match self.entries.get(name) {
            Some(Binding::Handle(handle)) => Some(Rc::clone(handle)),
            _ => None,
        }
    }

    /// Pre-declares the field names of a struct that has not been lowered yet.
    pub fn declare_field_names<S: Into<String>>(&mut self, struct_name: &str, names: impl IntoIterator<Item = S>) {
        let names = names.into_iter().map(Into::into).collect();
        self.set(struct_name, Binding::FieldNames(names));
    }

    // --- Aggregates --- //

    /// The aggregate bound to `name`, if `name` is bound to one.
    pub fn lookup_aggregate(&self, name: &str) -> Option<AggregateId> {
        match self.entries.get(name) {
            Some(Binding::Type(NativeType::Struct(id))) => Some(*id),
            _ => None,
        }
    }

    /// Registers an aggregate with no fields yet.
    ///
    /// A non-empty `name` is bound immediately, so lookups made before
    /// [`NameTable::finish_aggregate`] see this same descriptor.
    pub fn begin_aggregate(&mut self, name: &str) -> AggregateId {
        let id = AggregateId(self.aggregates.len());
        self.aggregates.push(AggregateDescriptor {
            name: name.to_string(),
            fields: None,
        });
        if !name.is_empty() {
            if let Some(previous) = self.set(name, Binding::Type(NativeType::Struct(id))) {
                if !matches!(previous, Binding::FieldNames(_)) {
                    log::warn!("Binding for '{}' replaced by aggregate type: {:?}", name, previous);
                }
            }
        }
        id
    }

    /// Attaches the field list of an aggregate registered with [`NameTable::begin_aggregate`].
    pub fn finish_aggregate(&mut self, id: AggregateId, fields: Vec<Field>) -> Result<(), NativeError> {
        let aggregate = self
            .aggregates
            .get_mut(id.0)
            .ok_or(NativeError::UnknownAggregate(id.0))?;
        if aggregate.fields.is_some() {
            return Err(NativeError::AggregateAlreadyDefined(aggregate.name.clone()));
        }
        aggregate.fields = Some(fields);
        Ok(())
    }

    pub fn aggregate(&self, id: AggregateId) -> Option<&AggregateDescriptor> {
        self.aggregates.get(id.0)
    }

    pub(crate) fn aggregate_or_err(&self, id: AggregateId) -> Result<&AggregateDescriptor, NativeError> {
        self.aggregate(id).ok_or(NativeError::UnknownAggregate(id.0))
    }

    pub fn aggregates(&self) -> impl Iterator<Item = (AggregateId, &AggregateDescriptor)> {
        self.aggregates
            .iter()
            .enumerate()
            .map(|(i, agg)| (AggregateId(i), agg))
    }
}

impl fmt::Debug for NameTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NameTable")
            .field("entries", &self.entries)
            .field("aggregates", &self.aggregates)
            .finish()
    }
}
