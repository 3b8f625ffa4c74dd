use std::{cell::RefCell, collections::HashMap, rc::Rc};

use crate::value::Value;

/// One scope in the lexical chain. Block and call activations get a child
/// environment; the handles are reference-counted because closures capture
/// their defining scope and may outlive its block.
#[derive(Debug, Default)]
pub struct Environment<'src> {
    values: HashMap<String, Value<'src>>,
    parent: Option<Rc<RefCell<Environment<'src>>>>,
}

impl<'src> Environment<'src> {
    pub fn new() -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self::default()))
    }

    pub fn with_parent(parent: Rc<RefCell<Environment<'src>>>) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self { values: HashMap::new(), parent: Some(parent) }))
    }

    /// Binds `name` in this scope, shadowing any outer binding.
    pub fn define(&mut self, name: &str, value: Value<'src>) {
        self.values.insert(name.to_string(), value);
    }

    /// Looks `name` up, walking the chain innermost to outermost.
    pub fn get(&self, name: &str) -> Option<Value<'src>> {
        match self.values.get(name) {
            Some(value) => Some(value.clone()),
            None => self.parent.as_ref().and_then(|parent| parent.borrow().get(name)),
        }
    }

    /// Mutates the nearest existing binding of `name`. Never declares;
    /// returns false if no enclosing scope binds the name.
    pub fn assign(&mut self, name: &str, value: Value<'src>) -> bool {
        if let Some(slot) = self.values.get_mut(name) {
            *slot = value;
            true
        } else if let Some(parent) = &self.parent {
            parent.borrow_mut().assign(name, value)
        } else {
            false
        }
    }
}
