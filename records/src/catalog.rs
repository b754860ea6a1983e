//!
//! Table definitions an engine resolves field paths against.
//!

use std::collections::BTreeMap;

use crate::engine::EngineError;
use crate::expr::PATH_SEPARATOR;
use crate::project::Select;

#[derive(Clone, Debug, Default)]
pub struct Catalog {
    tables: BTreeMap<String, TableDef>,
}

#[derive(Clone, Debug)]
pub struct TableDef {
    pub name: String,
    pub primary_key: String,
    pub columns: Vec<String>,
    pub relations: Vec<Relation>,
}

/// A foreign key: `column` of this table references the primary key of `target`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Relation {
    pub name: String,
    pub column: String,
    pub target: String,
}

/// One hop over a relation while resolving a path.
#[derive(Clone, Debug)]
pub struct Hop<'c> {
    /// Path prefix up to and including this relation, e.g. `orbits__orbits`.
    pub prefix: String,
    pub from: &'c TableDef,
    pub relation: &'c Relation,
    pub to: &'c TableDef,
}

/// A field path resolved to a column of some (possibly joined) table.
#[derive(Clone, Debug)]
pub struct ResolvedPath<'c> {
    pub hops: Vec<Hop<'c>>,
    pub table: &'c TableDef,
    pub column: &'c str,
}

impl TableDef {
    /// A table with an `id` primary key.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            primary_key: "id".to_string(),
            columns: vec!["id".to_string()],
            relations: vec![],
        }
    }

    pub fn primary_key(mut self, column: impl Into<String>) -> Self {
        let column = column.into();
        self.columns.retain(|existing| existing != &self.primary_key);
        self.columns.insert(0, column.clone());
        self.primary_key = column;
        self
    }

    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.columns.push(column.into());
        self
    }

    /// Declare a relation `name` through foreign key `column` into `target`.
    /// The foreign key column is added to the table's columns.
    pub fn relation(
        mut self,
        name: impl Into<String>,
        column: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        let column = column.into();
        if !self.columns.contains(&column) {
            self.columns.push(column.clone());
        }
        self.relations.push(Relation {
            name: name.into(),
            column,
            target: target.into(),
        });
        self
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|existing| existing == column)
    }

    pub fn relation_named(&self, name: &str) -> Option<&Relation> {
        self.relations.iter().find(|relation| relation.name == name)
    }
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(mut self, table: TableDef) -> Self {
        self.tables.insert(table.name.clone(), table);
        self
    }

    pub fn get(&self, name: &str) -> Result<&TableDef, EngineError> {
        self.tables
            .get(name)
            .ok_or_else(|| EngineError::UnknownEntity(name.to_string()))
    }

    /// Resolve `path` starting at table `from`.
    ///
    /// Every segment but the last must name a relation. The last segment is
    /// a column, `pk`, or a relation name (standing for its foreign key).
    pub fn resolve_path<'c>(
        &'c self,
        from: &str,
        path: &str,
    ) -> Result<ResolvedPath<'c>, EngineError> {
        let unknown = || EngineError::UnknownField {
            entity: from.to_string(),
            field: path.to_string(),
        };

        let mut table = self.get(from)?;
        let mut hops = vec![];
        let mut segments = path.split(PATH_SEPARATOR).peekable();
        let mut prefix = String::new();

        while let Some(segment) = segments.next() {
            if segment.is_empty() {
                return Err(unknown());
            }

            if segments.peek().is_some() {
                let relation = table.relation_named(segment).ok_or_else(unknown)?;
                let to = self.get(&relation.target)?;
                if !prefix.is_empty() {
                    prefix.push_str(PATH_SEPARATOR);
                }
                prefix.push_str(segment);
                hops.push(Hop {
                    prefix: prefix.clone(),
                    from: table,
                    relation,
                    to,
                });
                table = to;
                continue;
            }

            let column = if segment == "pk" {
                table.primary_key.as_str()
            } else if let Some(relation) = table.relation_named(segment) {
                relation.column.as_str()
            } else if let Some(column) = table.columns.iter().find(|c| c.as_str() == segment) {
                column.as_str()
            } else {
                return Err(unknown());
            };

            return Ok(ResolvedPath {
                hops,
                table,
                column,
            });
        }

        Err(unknown())
    }

    /// Validate a select, defaulting an empty one to every column of its
    /// table.
    pub fn prepare(&self, mut select: Select) -> Result<Select, EngineError> {
        if select.columns.is_empty() && select.expressions.is_empty() {
            select.columns = self.get(select.from)?.columns.clone();
        }
        self.validate(&select)?;
        Ok(select)
    }

    /// Check that every path a select refers to resolves, and that no two
    /// positions of a raw row share a name.
    pub fn validate(&self, select: &Select) -> Result<(), EngineError> {
        self.get(select.from)?;

        let names = select.row_names();
        for (index, name) in names.iter().enumerate() {
            if names[..index].contains(name) {
                return Err(EngineError::DuplicateName(name.clone()));
            }
        }

        let mut result = Ok(());
        let mut check = |path: &str| {
            if result.is_ok() {
                result = self.resolve_path(select.from, path).map(|_| ());
            }
        };

        for column in &select.columns {
            check(column.as_str());
        }
        for (_, expr) in select.extra.iter().chain(&select.expressions) {
            expr.visit_fields(&mut check);
        }
        if let Some(predicate) = &select.predicate {
            predicate.visit_fields(&mut check);
        }

        result
    }
}
