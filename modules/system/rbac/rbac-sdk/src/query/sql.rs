//! Mapping of residual variables onto SQL columns.

use regex::Regex;

use super::ast::{Variable, sql_quote};

/// How a mapped column is typed in SQL, which decides how membership renders.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ColumnType {
    #[default]
    Text,
    /// A `jsonb` array of text: membership renders as `col ? needle`.
    JsonbTextArray,
    /// Compared with a boolean literal, renders as the bare column or `NOT col`.
    Boolean,
    /// The table has no such column. Membership in it renders as `false`.
    Skip,
}

#[derive(Debug, Clone)]
enum Matcher {
    Exact(Vec<String>),
    /// Matches the prefix plus exactly one more segment, bound to `$1`.
    Prefix(Vec<String>),
    /// Matches the dotted variable name; captures bind to `$1`, `$2`, ...
    Regex(Regex),
}

/// One variable-to-column rule.
#[derive(Debug, Clone)]
pub struct SqlColumn {
    matcher: Matcher,
    select: String,
    column_type: ColumnType,
}

impl SqlColumn {
    /// Map exactly `path` (dotted) to `select`.
    #[must_use]
    pub fn exact(path: &str, select: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            matcher: Matcher::Exact(split_path(path)),
            select: select.into(),
            column_type,
        }
    }

    /// Map `path.<key>` to `select`, with `$1` replaced by `key` as a quoted SQL string.
    #[must_use]
    pub fn prefix(path: &str, select: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            matcher: Matcher::Prefix(split_path(path)),
            select: select.into(),
            column_type,
        }
    }

    /// Map every dotted variable name fully matching `pattern` to `select`.
    ///
    /// Capture groups are substituted for `$1`, `$2`, ... as quoted SQL strings.
    ///
    /// # Errors
    /// Returns the regex error if `pattern` does not compile.
    pub fn regex(
        pattern: &str,
        select: impl Into<String>,
        column_type: ColumnType,
    ) -> Result<Self, regex::Error> {
        let re = Regex::new(&format!("^(?:{pattern})$"))?;
        Ok(Self {
            matcher: Matcher::Regex(re),
            select: select.into(),
            column_type,
        })
    }

    fn render(&self, var: &Variable) -> Option<String> {
        match &self.matcher {
            Matcher::Exact(path) => (var.path() == path.as_slice()).then(|| self.select.clone()),
            Matcher::Prefix(prefix) => match var.path().strip_prefix(prefix.as_slice()) {
                Some([key]) => Some(self.select.replace("$1", &sql_quote(key))),
                _ => None,
            },
            Matcher::Regex(re) => {
                let name = var.name();
                let caps = re.captures(&name)?;
                let mut select = self.select.clone();
                for i in (1..caps.len()).rev() {
                    let value = caps.get(i).map_or("", |m| m.as_str());
                    select = select.replace(&format!("${i}"), &sql_quote(value));
                }
                Some(select)
            }
        }
    }
}

fn split_path(path: &str) -> Vec<String> {
    path.split('.').map(str::to_owned).collect()
}

/// Variable-to-column mapping used when rendering SQL.
///
/// Unmapped variables render as their dotted path.
#[derive(Debug, Clone, Default)]
pub struct SqlConfig {
    columns: Vec<SqlColumn>,
}

impl SqlConfig {
    /// No mappings: every variable renders verbatim.
    #[must_use]
    pub fn verbatim() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn new(columns: Vec<SqlColumn>) -> Self {
        Self { columns }
    }

    /// Add a rule. Earlier rules win.
    #[must_use]
    pub fn with_column(mut self, column: SqlColumn) -> Self {
        self.columns.push(column);
        self
    }

    /// Columns of a table with `organization_id`, `owner_id`, `id` and jsonb
    /// `user_acl` / `group_acl` columns.
    #[must_use]
    pub fn with_acl() -> Self {
        Self::object_columns("", ColumnType::JsonbTextArray)
    }

    /// Same as [`SqlConfig::with_acl`] for tables that have no ACL columns.
    #[must_use]
    pub fn without_acl() -> Self {
        Self::object_columns("", ColumnType::Skip)
    }

    /// Same as [`SqlConfig::with_acl`] with every column qualified by the
    /// `workspaces` table, for queries joining workspaces with other tables.
    #[must_use]
    pub fn workspaces() -> Self {
        Self::object_columns("workspaces.", ColumnType::JsonbTextArray)
    }

    fn object_columns(table: &str, acl: ColumnType) -> Self {
        Self::new(vec![
            SqlColumn::exact("input.object.id", format!("{table}id :: text"), ColumnType::Text),
            SqlColumn::exact(
                "input.object.owner",
                format!("{table}owner_id :: text"),
                ColumnType::Text,
            ),
            SqlColumn::exact(
                "input.object.org_owner",
                format!("{table}organization_id :: text"),
                ColumnType::Text,
            ),
            SqlColumn::prefix(
                "input.object.acl_user_list",
                format!("{table}user_acl->$1"),
                acl,
            ),
            SqlColumn::prefix(
                "input.object.acl_group_list",
                format!("{table}group_acl->$1"),
                acl,
            ),
        ])
    }

    pub(crate) fn resolve(&self, var: &Variable) -> Option<(String, ColumnType)> {
        self.columns
            .iter()
            .find_map(|c| c.render(var).map(|select| (select, c.column_type)))
    }
}
