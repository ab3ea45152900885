use super::ast::Projection;
use crate::collection::Document;
use crate::common::json::{parse_index, value_at, value_at_mut};
use serde_json::{Map, Value};

impl Projection {
    /// Shapes a matched document for the visitor.
    ///
    /// Included paths are copied into a fresh object (missing paths are
    /// skipped, array positions become object keys); `all` starts from the
    /// whole document. Excluded paths are removed afterwards.
    pub(crate) fn apply(&self, document: &Document) -> Document {
        let source = document.as_value();
        let mut shaped = if self.all {
            source.clone()
        } else {
            let mut target = Value::Object(Map::new());
            for path in &self.include {
                if let Some(value) = value_at(source, path) {
                    insert_at(&mut target, path, value.clone());
                }
            }
            target
        };
        for path in &self.exclude {
            remove_at(&mut shaped, path);
        }
        Document::from_value(shaped)
    }
}

fn insert_at(target: &mut Value, path: &[String], value: Value) {
    let Some((last, parents)) = path.split_last() else {
        *target = value;
        return;
    };
    let mut current = target;
    for token in parents {
        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        let Value::Object(map) = current else {
            return;
        };
        current = map
            .entry(token.clone())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    if !current.is_object() {
        *current = Value::Object(Map::new());
    }
    if let Value::Object(map) = current {
        map.insert(last.clone(), value);
    }
}

fn remove_at(target: &mut Value, path: &[String]) {
    let Some((last, parents)) = path.split_last() else {
        return;
    };
    match value_at_mut(target, parents) {
        Some(Value::Object(map)) => {
            map.shift_remove(last);
        }
        Some(Value::Array(items)) => {
            if let Some(index) = parse_index(last).filter(|i| *i < items.len()) {
                items.remove(index);
            }
        }
        _ => {}
    }
}
