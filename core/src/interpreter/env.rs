//! Variable Environment
//!
//! Run-scoped bindings from identifier to value. Created empty for each run
//! and dropped with it; only assignment statements mutate it.

use std::collections::HashMap;

use super::values::Val;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Environment {
    vars: HashMap<String, Val>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name`, replacing any previous value
    pub fn assign(&mut self, name: impl Into<String>, value: Val) {
        self.vars.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Val> {
        self.vars.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

impl From<HashMap<String, Val>> for Environment {
    fn from(vars: HashMap<String, Val>) -> Self {
        Self { vars }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maplit::hashmap;

    #[test]
    fn test_assign_and_get() {
        let mut env = Environment::new();
        assert!(env.is_empty());
        assert_eq!(env.get("x"), None);

        env.assign("x", Val::Int(1));
        env.assign("x", Val::Str("one".to_string()));
        assert_eq!(env.get("x"), Some(&Val::Str("one".to_string())));
        assert_eq!(env.len(), 1);
    }

    #[test]
    fn test_from_map() {
        let env = Environment::from(hashmap! {
            "name".to_string() => Val::Str("Ada".to_string()),
            "age".to_string() => Val::Int(36),
        });
        assert!(env.contains("name"));
        assert_eq!(env.get("age"), Some(&Val::Int(36)));
    }
}
