//! Syntax tree for annotated struct blocks

/// A `struct Name { ... };` block
#[derive(Debug, Clone, PartialEq)]
pub struct StructBlock {
    pub name: String,
    pub fields: Vec<FieldDecl>,
    /// Line of the `struct` keyword (1-based)
    pub line: usize,
}

/// One declared field. `float a, b;` produces two declarations sharing the
/// same type and annotation.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    pub type_name: String,
    pub name: String,
    pub array_length: Option<usize>,
    pub annotation: Option<Annotation>,
    pub line: usize,
}

/// Parsed trailing `//` comment
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Annotation {
    pub clauses: Vec<Clause>,
}

impl Annotation {
    /// First clause with the given key
    pub fn clause(&self, key: &str) -> Option<&ClauseBody> {
        self.clauses.iter().find(|c| c.key == key).map(|c| &c.body)
    }
}

/// `key: body`
#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    pub key: String,
    pub body: ClauseBody,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClauseBody {
    /// Numeric or boolean literals
    Values(Vec<Literal>),
    /// Free-form labels (dropdown options)
    Labels(Vec<String>),
    /// Body that could not be read; the raw text is kept for logging
    Malformed(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Literal {
    Number(f64),
    Bool(bool),
}
