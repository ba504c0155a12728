/// How many children of one kind a parent owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// A list of children matched by key (rules, interfaces, routes).
    Many,
    /// A single nested child object (for example a BGP configuration).
    One,
}

/// A child collection owned by a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildSchema {
    /// Field holding the children in both desired and existing objects.
    pub field: String,
    pub cardinality: Cardinality,
    pub schema: NodeSchema,
}

/// Location of inline service definitions that have no stable identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomServiceField {
    /// List field containing both references and inline definitions.
    pub list_field: String,
    /// Key of the inline definition inside a list entry.
    pub entry_key: String,
}

/// Comparison shape of one resource kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSchema {
    /// Kind label used in diff paths.
    pub kind: String,
    /// Field used to pair desired children with existing children.
    pub key_field: String,
    /// Fields holding `{target_type, target_id}` reference lists.
    pub reference_lists: Vec<String>,
    pub custom_services: Option<CustomServiceField>,
    /// Extra fields excluded from comparison (write-only or server-populated).
    pub ignored_fields: Vec<String>,
    pub children: Vec<ChildSchema>,
}

impl NodeSchema {
    /// Create a schema keyed by `display_name` with no lists or children.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            key_field: "display_name".to_string(),
            reference_lists: Vec::new(),
            custom_services: None,
            ignored_fields: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_reference_lists(mut self, fields: &[&str]) -> Self {
        self.reference_lists
            .extend(fields.iter().map(|f| (*f).to_string()));
        self
    }

    pub fn with_custom_services(mut self, list_field: &str, entry_key: &str) -> Self {
        self.custom_services = Some(CustomServiceField {
            list_field: list_field.to_string(),
            entry_key: entry_key.to_string(),
        });
        self
    }

    pub fn ignoring(mut self, fields: &[&str]) -> Self {
        self.ignored_fields
            .extend(fields.iter().map(|f| (*f).to_string()));
        self
    }

    pub fn with_child(
        mut self,
        field: &str,
        cardinality: Cardinality,
        schema: NodeSchema,
    ) -> Self {
        self.children.push(ChildSchema {
            field: field.to_string(),
            cardinality,
            schema,
        });
        self
    }

    /// Return true if the field is compared by a list or child rule rather than as a scalar.
    pub fn is_structural(&self, field: &str) -> bool {
        self.reference_lists.iter().any(|f| f == field)
            || self
                .custom_services
                .as_ref()
                .is_some_and(|cs| cs.list_field == field)
            || self.children.iter().any(|c| c.field == field)
    }

    /// Look up the child collection stored under `field`.
    pub fn child(&self, field: &str) -> Option<&ChildSchema> {
        self.children.iter().find(|c| c.field == field)
    }
}
