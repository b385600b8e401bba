//! Schema compiler: model metadata to table and index definitions.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::config::SchemaConfig;
use crate::error::{Result, SchemaError};
use crate::metadata::{extract, table_name, FieldDescriptor, FieldKind, MetadataProvider};
use crate::parser::{canonical_fragment, constraint_keyword};
use crate::schema::{
    ColumnDefinition, IndexDefinition, TableDefinition, AUTO_INCREMENT, NOT_NULL, UNIQUE,
};

/// Length used for string columns without a `size` annotation.
pub const DEFAULT_VARCHAR_SIZE: &str = "255";

/// Output of compiling one model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledTable {
    /// Structured table definition.
    pub table: TableDefinition,
    /// Index definitions, sorted by name.
    pub indexes: Vec<IndexDefinition>,
    /// Rendered `CREATE TABLE` statement.
    pub create_sql: String,
    /// Rendered `CREATE INDEX` statements, sorted lexicographically.
    pub index_sql: Vec<String>,
}

impl CompiledTable {
    /// The table name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.table.name
    }
}

/// Compiles a model into its table definition and canonical SQL.
///
/// # Errors
///
/// Returns [`SchemaError::Metadata`] when a field's annotations are
/// malformed, or when a `type` override is empty or carries a column
/// constraint.
pub fn compile(provider: &dyn MetadataProvider, config: &SchemaConfig) -> Result<CompiledTable> {
    let fields = extract(provider)?;
    let name = table_name(provider);

    let mut table = TableDefinition::new(&name);
    let mut indexes: BTreeMap<String, IndexDefinition> = BTreeMap::new();

    for field in &fields {
        check_type_override(provider.type_name(), field)?;
        table.columns.push(column_definition(field));
        if field.is_primary_key() {
            table.primary_key.push(field.column.clone());
        }
        collect_index(provider.type_name(), field, "index", false, &mut indexes);
        collect_index(provider.type_name(), field, "uniqueIndex", true, &mut indexes);
    }

    let create_sql = table.to_sql(config.quote);
    let mut index_sql: Vec<String> = indexes
        .values()
        .map(|idx| idx.to_sql(&name, config.quote))
        .collect();
    index_sql.sort();

    debug!(
        table = %name,
        columns = table.columns.len(),
        indexes = index_sql.len(),
        "compiled model {}",
        provider.type_name()
    );

    Ok(CompiledTable {
        table,
        indexes: indexes.into_values().collect(),
        create_sql,
        index_sql,
    })
}

/// Builds the column definition for one field.
#[must_use]
pub fn column_definition(field: &FieldDescriptor) -> ColumnDefinition {
    let a = &field.annotations;
    let mut column = ColumnDefinition::new(&field.column, sql_type(field));

    if a.has("autoIncrement") {
        column.constraints.push(AUTO_INCREMENT.to_string());
    }
    if let Some(check) = a.value("check") {
        column.constraints.push(format!("CHECK ({check})"));
    }
    if a.has("unique") {
        column.constraints.push(UNIQUE.to_string());
    }
    if a.has("not null") || !field.optional || field.is_primary_key() {
        column.constraints.push(NOT_NULL.to_string());
    }
    if let Some(default) = a.value("default") {
        column.constraints.push(format!("DEFAULT {}", canonical_fragment(default)));
    }
    if let Some(comment) = a.value("comment") {
        let comment = comment
            .strip_prefix('\'')
            .and_then(|c| c.strip_suffix('\''))
            .unwrap_or(comment);
        column.constraints.push(format!("COMMENT '{comment}'"));
    }

    column
}

/// Derives the SQL type for a field, including the `NULL` marker for
/// nullable columns.
#[must_use]
pub fn sql_type(field: &FieldDescriptor) -> String {
    let a = &field.annotations;
    let base = if let Some(explicit) = a.value("type") {
        canonical_fragment(explicit).to_uppercase()
    } else if let Some(precision) = a.value("precision") {
        match a.value("scale") {
            Some(scale) => format!("DECIMAL({precision},{scale})"),
            None => format!("DECIMAL({precision})"),
        }
    } else {
        kind_sql_type(&field.kind, a.value("size"))
    };

    if field.optional && !field.is_primary_key() && !a.has("not null") {
        format!("{base} NULL")
    } else {
        base
    }
}

/// Fixed mapping from declared kind to SQL type.
#[must_use]
pub fn kind_sql_type(kind: &FieldKind, size: Option<&str>) -> String {
    match kind {
        FieldKind::Bool => "BOOLEAN".into(),
        FieldKind::Int | FieldKind::I32 => "INTEGER".into(),
        FieldKind::I8 => "TINYINT".into(),
        FieldKind::I16 => "SMALLINT".into(),
        FieldKind::I64 => "BIGINT".into(),
        FieldKind::Uint | FieldKind::U32 => "INTEGER UNSIGNED".into(),
        FieldKind::U8 => "TINYINT UNSIGNED".into(),
        FieldKind::U16 => "SMALLINT UNSIGNED".into(),
        FieldKind::U64 => "BIGINT UNSIGNED".into(),
        FieldKind::F32 => "FLOAT".into(),
        FieldKind::F64 => "DOUBLE".into(),
        FieldKind::String => format!("VARCHAR({})", size.unwrap_or(DEFAULT_VARCHAR_SIZE)),
        FieldKind::Bytes => "BLOB".into(),
        FieldKind::Timestamp => "DATETIME".into(),
        FieldKind::Struct { .. } | FieldKind::Other(_) => {
            format!("VARCHAR({DEFAULT_VARCHAR_SIZE})")
        }
    }
}

/// Rejects `type` overrides the parser could not read back as a type.
fn check_type_override(model: &str, field: &FieldDescriptor) -> Result<()> {
    let Some(explicit) = field.annotations.value("type") else {
        return Ok(());
    };
    if explicit.trim().is_empty() {
        return Err(SchemaError::metadata(model, &field.name, "empty type override"));
    }
    match constraint_keyword(explicit) {
        Some(keyword) => Err(SchemaError::metadata(
            model,
            &field.name,
            format!("type override '{explicit}' contains the constraint '{keyword}'"),
        )),
        None => Ok(()),
    }
}

/// Splits an index annotation value into name and priority.
///
/// `idx_name,priority:2` yields `("idx_name", 2)`. A priority that is not an
/// integer counts as 0.
fn parse_index_value<'a>(model: &str, field: &str, value: &'a str) -> (&'a str, i64) {
    let mut parts = value.split(',');
    let name = parts.next().unwrap_or_default().trim();
    let mut priority = 0;
    for option in parts {
        if let Some((key, raw)) = option.split_once(':') {
            if key.trim().eq_ignore_ascii_case("priority") {
                priority = raw.trim().parse().unwrap_or_else(|_| {
                    warn!(model, field, value = raw.trim(), "non-numeric index priority, using 0");
                    0
                });
            }
        }
    }
    (name, priority)
}

fn collect_index(
    model: &str,
    field: &FieldDescriptor,
    key: &str,
    unique: bool,
    indexes: &mut BTreeMap<String, IndexDefinition>,
) {
    if !field.annotations.has(key) {
        return;
    }
    let value = field.annotations.value(key).unwrap_or_default();
    let (name, priority) = parse_index_value(model, &field.name, value);
    let name = if name.is_empty() {
        let prefix = if unique { "udx" } else { "idx" };
        format!("{prefix}_{}", field.column)
    } else {
        name.to_string()
    };

    indexes
        .entry(name.clone())
        .or_insert_with(|| IndexDefinition::new(name, unique))
        .push(field.column.clone(), priority);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::Annotations;
    use crate::config::Quote;
    use crate::metadata::{FieldMeta, Model};

    fn descriptor(kind: FieldKind, optional: bool, tag: &str) -> FieldDescriptor {
        FieldDescriptor {
            name: "F".into(),
            column: "f".into(),
            kind,
            optional,
            annotations: Annotations::parse(tag).unwrap(),
            embedded: false,
            prefix: String::new(),
        }
    }

    #[test]
    fn kind_mapping_table() {
        let cases = [
            (FieldKind::Bool, "BOOLEAN"),
            (FieldKind::Int, "INTEGER"),
            (FieldKind::I8, "TINYINT"),
            (FieldKind::I16, "SMALLINT"),
            (FieldKind::I32, "INTEGER"),
            (FieldKind::I64, "BIGINT"),
            (FieldKind::Uint, "INTEGER UNSIGNED"),
            (FieldKind::U8, "TINYINT UNSIGNED"),
            (FieldKind::U16, "SMALLINT UNSIGNED"),
            (FieldKind::U32, "INTEGER UNSIGNED"),
            (FieldKind::U64, "BIGINT UNSIGNED"),
            (FieldKind::F32, "FLOAT"),
            (FieldKind::F64, "DOUBLE"),
            (FieldKind::String, "VARCHAR(255)"),
            (FieldKind::Bytes, "BLOB"),
            (FieldKind::Timestamp, "DATETIME"),
            (FieldKind::Other("map".into()), "VARCHAR(255)"),
        ];
        for (kind, expected) in cases {
            assert_eq!(kind_sql_type(&kind, None), expected, "{kind:?}");
        }
        assert_eq!(kind_sql_type(&FieldKind::String, Some("100")), "VARCHAR(100)");
    }

    #[test]
    fn type_precedence() {
        let explicit = descriptor(FieldKind::String, false, "type:varchar(36);precision:10");
        assert_eq!(sql_type(&explicit), "VARCHAR(36)");

        let decimal = descriptor(FieldKind::F64, false, "precision:10;scale:2");
        assert_eq!(sql_type(&decimal), "DECIMAL(10,2)");

        let precision_only = descriptor(FieldKind::F64, false, "precision:8");
        assert_eq!(sql_type(&precision_only), "DECIMAL(8)");
    }

    #[test]
    fn nullable_marker() {
        assert_eq!(sql_type(&descriptor(FieldKind::String, true, "")), "VARCHAR(255) NULL");
        assert_eq!(sql_type(&descriptor(FieldKind::Int, true, "type:bigint")), "BIGINT NULL");
        assert_eq!(sql_type(&descriptor(FieldKind::Uint, true, "primaryKey")), "INTEGER UNSIGNED");
        assert_eq!(sql_type(&descriptor(FieldKind::Int, true, "not null")), "INTEGER");
    }

    #[test]
    fn constraint_order_is_canonical() {
        let field = descriptor(
            FieldKind::Int,
            false,
            "comment:'Age in years';default:18;unique;check:age > 0",
        );
        assert_eq!(
            column_definition(&field).to_sql(Quote::BACKTICK),
            "`f` INTEGER CHECK (age > 0) UNIQUE NOT NULL DEFAULT 18 COMMENT 'Age in years'"
        );
    }

    #[test]
    fn optional_with_default_is_nullable() {
        let field = descriptor(FieldKind::Int, true, "default:18");
        assert_eq!(
            column_definition(&field).to_sql(Quote::BACKTICK),
            "`f` INTEGER NULL DEFAULT 18"
        );
    }

    #[test]
    fn comment_surrounding_quotes_are_optional() {
        let bare = descriptor(FieldKind::String, false, "comment:User name");
        let quoted = descriptor(FieldKind::String, false, "comment:'User name'");
        assert_eq!(column_definition(&bare), column_definition(&quoted));
        assert_eq!(
            column_definition(&bare).constraints.last().unwrap(),
            "COMMENT 'User name'"
        );
    }

    #[test]
    fn index_value_parsing() {
        assert_eq!(parse_index_value("M", "f", ""), ("", 0));
        assert_eq!(parse_index_value("M", "f", "idx_a,priority:3"), ("idx_a", 3));
        assert_eq!(parse_index_value("M", "f", ",priority:2"), ("", 2));
        assert_eq!(parse_index_value("M", "f", "idx_a,priority:high"), ("idx_a", 0));
        assert_eq!(parse_index_value("M", "f", "idx_a,sort:desc"), ("idx_a", 0));
    }

    struct Account;

    impl Model for Account {
        const TYPE_NAME: &'static str = "Account";

        fn fields() -> Vec<FieldMeta> {
            vec![
                FieldMeta::new("TenantID", FieldKind::U64)
                    .tag("primaryKey;index:idx_owner,priority:2"),
                FieldMeta::new("UserID", FieldKind::U64)
                    .tag("primaryKey;index:idx_owner,priority:1"),
                FieldMeta::new("Email", FieldKind::String).tag("uniqueIndex"),
                FieldMeta::new("Nick", FieldKind::String).tag("index;index"),
            ]
        }
    }

    #[test]
    fn composite_primary_key_and_indexes() {
        let compiled = compile(&Account::model(), &SchemaConfig::default()).unwrap();
        assert_eq!(compiled.name(), "accounts");
        assert_eq!(compiled.table.primary_key, ["tenant_id", "user_id"]);
        assert!(compiled
            .create_sql
            .ends_with("PRIMARY KEY (`tenant_id`, `user_id`)\n);"));
        assert_eq!(
            compiled.index_sql,
            [
                "CREATE INDEX `idx_nick` ON `accounts` (`nick`);",
                "CREATE INDEX `idx_owner` ON `accounts` (`user_id`, `tenant_id`);",
                "CREATE UNIQUE INDEX `udx_email` ON `accounts` (`email`);",
            ]
        );
        let names: Vec<&str> = compiled.indexes.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, ["idx_nick", "idx_owner", "udx_email"]);
    }

    struct Everything;

    impl MetadataProvider for Everything {
        fn type_name(&self) -> &str {
            "Everything"
        }

        fn fields(&self) -> Vec<FieldMeta> {
            let address = FieldKind::Struct {
                name: "Address".into(),
                fields: vec![
                    FieldMeta::new("City", FieldKind::String).tag("size:80;index:idx_city"),
                    FieldMeta::new("Zip", FieldKind::String).optional(),
                ],
            };
            vec![
                FieldMeta::new("ID", FieldKind::Uint).tag("primaryKey;autoIncrement"),
                FieldMeta::new("Code", FieldKind::String).tag("type:char(4)  binary;uniqueIndex"),
                FieldMeta::new("Price", FieldKind::F64).tag("precision:10;scale:2;default:0.00"),
                FieldMeta::new("Age", FieldKind::Int)
                    .optional()
                    .tag("check:age > 0;default:18;comment:'Age, in years'"),
                FieldMeta::new("Email", FieldKind::String)
                    .tag("size:150;unique;not null;index:idx_contact,priority:2"),
                FieldMeta::new("Nick", FieldKind::String)
                    .optional()
                    .tag("default:'a  b';index:idx_contact,priority:1"),
                FieldMeta::new("Ratio", FieldKind::F32).tag("default:1  +  1"),
                FieldMeta::new("Created", FieldKind::Timestamp).tag("default:CURRENT_TIMESTAMP"),
                FieldMeta::new("Home", address).tag("embedded;embeddedPrefix:home_"),
                FieldMeta::new("Secret", FieldKind::String).tag("-"),
            ]
        }
    }

    #[test]
    fn compiled_text_parses_back_to_the_same_definitions() {
        for quote in [Quote::BACKTICK, Quote::DOUBLE, Quote::BRACKETS] {
            let config = SchemaConfig::new().with_quote(quote);
            let compiled = compile(&Everything, &config).unwrap();

            let parsed = crate::parser::parse_create_table(&compiled.create_sql).unwrap();
            assert_eq!(parsed, compiled.table, "{quote}");

            let indexes = crate::parser::parse_indexes(&compiled.index_sql).unwrap();
            assert_eq!(indexes.len(), compiled.indexes.len());
            for index in &compiled.indexes {
                let reparsed = &indexes[&index.name];
                assert!(reparsed.same_shape(index), "{}", index.name);
                assert_eq!(
                    reparsed.to_sql(compiled.name(), quote),
                    index.to_sql(compiled.name(), quote)
                );
            }
        }
    }

    #[test]
    fn type_and_default_use_single_spaces() {
        let compiled = compile(&Everything, &SchemaConfig::default()).unwrap();
        let column = |name: &str| compiled.table.column(name).unwrap();
        assert_eq!(column("code").sql_type, "CHAR(4) BINARY");
        assert_eq!(column("ratio").constraints, ["NOT NULL", "DEFAULT 1 + 1"]);
        assert_eq!(column("nick").constraints, ["DEFAULT 'a  b'"]);
    }

    struct Override(&'static str);

    impl MetadataProvider for Override {
        fn type_name(&self) -> &str {
            "Override"
        }

        fn fields(&self) -> Vec<FieldMeta> {
            vec![FieldMeta::new("At", FieldKind::Timestamp).tag(self.0)]
        }
    }

    #[test]
    fn type_override_with_constraint_is_rejected() {
        for tag in [
            "type:timestamp default current_timestamp",
            "type:int not null",
            "type:int unique",
            "type:int auto_increment",
            "type:int check(at > 0)",
        ] {
            let err = compile(&Override(tag), &SchemaConfig::default()).unwrap_err();
            let SchemaError::Metadata { model, field, .. } = &err else {
                panic!("{tag}: {err}");
            };
            assert_eq!((model.as_str(), field.as_str()), ("Override", "At"));
        }
        assert!(compile(&Override("type:timestamp(6)"), &SchemaConfig::default()).is_ok());
    }
}
