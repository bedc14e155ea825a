//! Per-server tool registry and the built-in tool names.

use crate::protocol::ToolDescriptor;
use std::collections::BTreeMap;

/// Tool that enumerates the server's tables.
pub const LIST_TABLES: &str = "ListTables";
/// Tool that returns one table's columns.
pub const DESCRIBE_TABLE: &str = "DescribeTable";
/// Tool that runs a read-only statement.
pub const READ_DATA: &str = "ReadData";

/// Descriptors for the three built-in operations, used when discovery
/// returns nothing.
pub fn fallback_descriptors() -> Vec<ToolDescriptor> {
    vec![
        ToolDescriptor::new(LIST_TABLES, "Lists all tables in the SQL Database"),
        ToolDescriptor::new(DESCRIBE_TABLE, "Returns table schema")
            .with_string_param("name", "Name of table to get schema for"),
        ToolDescriptor::new(READ_DATA, "Executes SQL queries against SQL Database to read data")
            .with_string_param("sql", "SQL query to execute"),
    ]
}

/// The set of tools known for one server, keyed by name.
///
/// Deduplication keeps the first descriptor seen for a name; later ones
/// with the same name are ignored.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, ToolDescriptor>,
}

impl ToolRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Discard the current contents and load `descriptors`.
    pub fn replace(&mut self, descriptors: impl IntoIterator<Item = ToolDescriptor>) {
        self.tools.clear();
        self.extend_missing(descriptors);
    }

    /// Like [`replace`](Self::replace), but loads the built-in descriptors
    /// when `descriptors` is empty. Returns `true` if the fallback was used.
    pub fn replace_or_fallback(&mut self, descriptors: Vec<ToolDescriptor>) -> bool {
        if descriptors.is_empty() {
            self.replace(fallback_descriptors());
            true
        } else {
            self.replace(descriptors);
            false
        }
    }

    /// Add descriptors whose names are not present yet. Existing entries are
    /// never overwritten.
    pub fn extend_missing(&mut self, descriptors: impl IntoIterator<Item = ToolDescriptor>) {
        for descriptor in descriptors {
            self.tools
                .entry(descriptor.name.clone())
                .or_insert(descriptor);
        }
    }

    /// Whether a tool named `name` is known.
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Descriptor for `name`.
    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.get(name)
    }

    /// Snapshot of every descriptor, ordered by name.
    pub fn all(&self) -> Vec<ToolDescriptor> {
        self.tools.values().cloned().collect()
    }

    /// Tool names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    /// Number of known tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether no tools are known.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Forget every tool.
    pub fn clear(&mut self) {
        self.tools.clear();
    }
}
