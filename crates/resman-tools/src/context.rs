use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Variable bindings shared by command-tool calls within one chat session.
///
/// Passed explicitly to every dispatch. `version` increases on each binding
/// change so callers can tell whether anything moved between two calls.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ToolContext {
    version: u64,
    vars: BTreeMap<String, Value>,
}

impl ToolContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    /// Bind `name`, returning the previous value. Rebinding to an equal
    /// value is not a change.
    pub fn set(&mut self, name: impl Into<String>, value: Value) -> Option<Value> {
        let name = name.into();
        if self.vars.get(&name) == Some(&value) {
            return Some(value);
        }
        self.version += 1;
        self.vars.insert(name, value)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        let prev = self.vars.remove(name);
        if prev.is_some() {
            self.version += 1;
        }
        prev
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.vars.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn version_tracks_changes() {
        let mut ctx = ToolContext::new();
        assert_eq!(ctx.version(), 0);
        assert_eq!(ctx.set("topic", json!("attention")), None);
        assert_eq!(ctx.version(), 1);
        ctx.set("topic", json!("attention"));
        assert_eq!(ctx.version(), 1);
        assert_eq!(ctx.set("topic", json!("sparsity")), Some(json!("attention")));
        assert_eq!(ctx.version(), 2);
        assert_eq!(ctx.get("topic"), Some(&json!("sparsity")));
    }

    #[test]
    fn remove_bumps_only_when_bound() {
        let mut ctx = ToolContext::new();
        assert_eq!(ctx.remove("x"), None);
        assert_eq!(ctx.version(), 0);
        ctx.set("x", json!(1));
        ctx.set("a", json!(2));
        assert_eq!(ctx.names().collect::<Vec<_>>(), vec!["a", "x"]);
        assert_eq!(ctx.remove("x"), Some(json!(1)));
        assert_eq!(ctx.version(), 3);
    }
}
