use crate::SchemaNode;

/// Trait for schema introspection
///
/// This trait provides methods for examining and querying schemas
/// without modifying them. Paths are dot-separated field names relative to
/// the root (`address.city`); list items, map keys/values and union
/// variants are addressed as `item`, `key`, `value` and their index.
pub trait SchemaInspector {
    /// Get the total number of fields (including nested)
    fn field_count(&self) -> usize;

    /// Get field by path (e.g., "address.city")
    fn get_field_by_path(&self, path: &str) -> Option<&SchemaNode>;

    /// Check if schema contains a specific field
    fn has_field(&self, name: &str) -> bool;

    /// Get all field paths in the schema, in column order
    fn all_field_paths(&self) -> Vec<String>;

    /// Column id of the node at `path`; the root is column 0
    fn column_id(&self, path: &str) -> Option<usize>;
}

impl SchemaInspector for crate::Schema {
    fn field_count(&self) -> usize {
        self.root.column_count() - 1
    }

    fn get_field_by_path(&self, path: &str) -> Option<&SchemaNode> {
        let parts: Vec<&str> = path.split('.').collect();
        get_field_by_path_parts(&self.root, &parts)
    }

    fn has_field(&self, name: &str) -> bool {
        self.get_field_by_path(name).is_some()
    }

    fn all_field_paths(&self) -> Vec<String> {
        let mut paths = Vec::new();
        for child in self.root.children() {
            collect_field_paths(child, String::new(), &mut paths);
        }
        paths
    }

    fn column_id(&self, path: &str) -> Option<usize> {
        if path.is_empty() {
            return Some(0);
        }
        // paths are produced in pre-order, so position + 1 is the column id
        self.all_field_paths()
            .iter()
            .position(|p| p == path)
            .map(|idx| idx + 1)
    }
}

fn get_field_by_path_parts<'a>(node: &'a SchemaNode, parts: &[&str]) -> Option<&'a SchemaNode> {
    if parts.is_empty() {
        return Some(node);
    }

    let first = parts[0];
    let rest = &parts[1..];

    match node {
        SchemaNode::Struct { fields, .. } => fields
            .iter()
            .find(|f| f.name() == first)
            .and_then(|f| get_field_by_path_parts(f, rest)),
        SchemaNode::List { item, .. } if first == "item" => get_field_by_path_parts(item, rest),
        SchemaNode::Map { key, value, .. } => match first {
            "key" => get_field_by_path_parts(key, rest),
            "value" => get_field_by_path_parts(value, rest),
            _ => None,
        },
        SchemaNode::Union { variants, .. } => variants
            .iter()
            .find(|v| v.name() == first)
            .and_then(|v| get_field_by_path_parts(v, rest)),
        _ => None,
    }
}

fn collect_field_paths(node: &SchemaNode, prefix: String, paths: &mut Vec<String>) {
    let current_path = if prefix.is_empty() {
        node.name().to_string()
    } else {
        format!("{}.{}", prefix, node.name())
    };

    paths.push(current_path.clone());

    for child in node.children() {
        collect_field_paths(child, current_path.clone(), paths);
    }
}
