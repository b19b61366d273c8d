use std::{cell::RefCell, fmt::Debug, rc::Rc};

use rustc_hash::FxHashMap;

use super::Value;

/// One scope frame. Lookups and assignments walk the parent chain.
pub struct Environment {
    values: FxHashMap<String, Value>,
    parent: Option<Rc<RefCell<Environment>>>,
}

impl Environment {
    pub fn boxed(parent: Option<Rc<RefCell<Environment>>>) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self::new(parent)))
    }

    pub fn new(parent: Option<Rc<RefCell<Environment>>>) -> Self {
        Self {
            values: FxHashMap::default(),
            parent,
        }
    }

    /// Binds `name` in this frame, replacing any previous binding here.
    pub fn define(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.values.get(name) {
            Some(value.clone())
        } else if let Some(parent) = &self.parent {
            parent.borrow().get(name)
        } else {
            None
        }
    }

    /// Rebinds the nearest existing `name`; `None` if no frame binds it.
    pub fn assign(&mut self, name: &str, value: Value) -> Option<()> {
        if let Some(slot) = self.values.get_mut(name) {
            *slot = value;
            Some(())
        } else if let Some(parent) = &self.parent {
            parent.borrow_mut().assign(name, value)
        } else {
            None
        }
    }
}

impl Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(format!("Environment<{:?}>", std::ptr::from_ref(self)).as_str())
            .field(
                "values",
                &self
                    .values
                    .iter()
                    .map(|(name, value)| (name.clone(), value.to_string()))
                    .collect::<Vec<_>>(),
            )
            .field("parent", &self.parent.as_ref().map(|p| p.as_ptr()))
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_lookup_walks_parents() {
        let global = Environment::boxed(None);
        global.borrow_mut().define("x", Value::Number(1.0));
        let local = Environment::boxed(Some(global.clone()));

        assert!(matches!(local.borrow().get("x"), Some(Value::Number(n)) if n == 1.0));
        assert!(local.borrow().get("y").is_none());
    }

    #[test]
    fn test_assign_updates_defining_frame() {
        let global = Environment::boxed(None);
        global.borrow_mut().define("x", Value::Number(1.0));
        let local = Environment::boxed(Some(global.clone()));

        assert!(local.borrow_mut().assign("x", Value::Number(2.0)).is_some());
        assert!(matches!(global.borrow().get("x"), Some(Value::Number(n)) if n == 2.0));
        assert!(local.borrow_mut().assign("missing", Value::Null).is_none());
    }

    #[test]
    fn test_define_shadows_parent() {
        let global = Environment::boxed(None);
        global.borrow_mut().define("x", Value::Number(1.0));
        let local = Environment::boxed(Some(global.clone()));
        local.borrow_mut().define("x", Value::Number(5.0));

        assert!(matches!(local.borrow().get("x"), Some(Value::Number(n)) if n == 5.0));
        assert!(matches!(global.borrow().get("x"), Some(Value::Number(n)) if n == 1.0));
    }
}
