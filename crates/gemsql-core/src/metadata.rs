//! Model metadata and the field extractor.
//!
//! A model exposes its fields through [`MetadataProvider`]. The provider can
//! be generated by `#[derive(Model)]`, loaded from a declarative
//! [`ModelSpec`](crate::manifest::ModelSpec), or written by hand; the
//! compiler only sees the ordered [`FieldMeta`] list.

use std::marker::PhantomData;

use serde::{Deserialize, Serialize};

use crate::annotation::Annotations;
use crate::error::{Result, SchemaError};
use crate::naming::{default_table_name, to_snake_case};

/// The declared kind of a model field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Boolean.
    Bool,
    /// Platform-sized signed integer.
    Int,
    /// 8-bit signed integer.
    I8,
    /// 16-bit signed integer.
    I16,
    /// 32-bit signed integer.
    I32,
    /// 64-bit signed integer.
    I64,
    /// Platform-sized unsigned integer.
    Uint,
    /// 8-bit unsigned integer.
    U8,
    /// 16-bit unsigned integer.
    U16,
    /// 32-bit unsigned integer.
    U32,
    /// 64-bit unsigned integer.
    U64,
    /// 32-bit float.
    F32,
    /// 64-bit float.
    F64,
    /// Text.
    String,
    /// Byte sequence.
    Bytes,
    /// Point in time.
    Timestamp,
    /// A nested structure with its own fields. Flattened into the parent
    /// table when the field is anonymous or tagged `embedded`.
    Struct {
        /// Type name of the nested structure.
        name: String,
        /// Its fields in declaration order.
        fields: Vec<FieldMeta>,
    },
    /// Any other type, identified by name.
    Other(String),
}

/// Raw metadata for one declared field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMeta {
    /// Declared field name (`CreatedAt`, `created_at`, ...).
    pub name: String,
    /// Declared kind.
    pub kind: FieldKind,
    /// Whether the field may hold no value (pointer, `Option`, nullable).
    #[serde(default)]
    pub optional: bool,
    /// Raw annotation string.
    #[serde(default)]
    pub tag: String,
    /// Whether the field is an anonymous (always embedded) structure.
    #[serde(default)]
    pub anonymous: bool,
}

impl FieldMeta {
    /// Creates a required, untagged field.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            optional: false,
            tag: String::new(),
            anonymous: false,
        }
    }

    /// Sets the raw annotation string.
    #[must_use]
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    /// Marks the field as optional.
    #[must_use]
    pub const fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Marks the field as an anonymous embedded structure.
    #[must_use]
    pub const fn anonymous(mut self) -> Self {
        self.anonymous = true;
        self
    }
}

/// Object-safe access to a model's metadata.
pub trait MetadataProvider {
    /// The model's type name, used for the default table name and in errors.
    fn type_name(&self) -> &str;

    /// An explicit table name, overriding the derived one.
    fn table_name(&self) -> Option<&str> {
        None
    }

    /// The model's fields in declaration order.
    fn fields(&self) -> Vec<FieldMeta>;
}

/// Statically described models, implemented by `#[derive(Model)]`.
pub trait Model {
    /// The Rust type name.
    const TYPE_NAME: &'static str;

    /// Explicit table name, if any.
    const TABLE_NAME: Option<&'static str> = None;

    /// Field metadata in declaration order.
    fn fields() -> Vec<FieldMeta>;

    /// Returns an object-safe provider for this model.
    #[must_use]
    fn model() -> ModelOf<Self>
    where
        Self: Sized,
    {
        ModelOf::new()
    }
}

/// Adapts a [`Model`] type to the object-safe [`MetadataProvider`].
pub struct ModelOf<T>(PhantomData<fn() -> T>);

impl<T> ModelOf<T> {
    /// Creates the adapter.
    #[must_use]
    pub const fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for ModelOf<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for ModelOf<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ModelOf")
            .field(&std::any::type_name::<T>())
            .finish()
    }
}

impl<T: Model> MetadataProvider for ModelOf<T> {
    fn type_name(&self) -> &str {
        T::TYPE_NAME
    }

    fn table_name(&self) -> Option<&str> {
        T::TABLE_NAME
    }

    fn fields(&self) -> Vec<FieldMeta> {
        T::fields()
    }
}

/// Returns the table name a provider maps to.
#[must_use]
pub fn table_name(provider: &dyn MetadataProvider) -> String {
    provider.table_name().map_or_else(
        || default_table_name(provider.type_name()),
        ToString::to_string,
    )
}

/// A field after tag parsing and embedded-structure flattening.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Declared field name.
    pub name: String,
    /// Resolved column name, including any embedding prefix.
    pub column: String,
    /// Declared kind.
    pub kind: FieldKind,
    /// Whether the field may hold no value.
    pub optional: bool,
    /// Parsed annotations.
    pub annotations: Annotations,
    /// Whether the field came from a flattened embedded structure.
    pub embedded: bool,
    /// Prefix applied to the column name (empty when none).
    pub prefix: String,
}

impl FieldDescriptor {
    /// Returns `true` if the field is tagged as (part of) the primary key.
    #[must_use]
    pub fn is_primary_key(&self) -> bool {
        self.annotations.has("primaryKey")
    }
}

/// How a field is excluded by its `-` annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exclusion {
    /// `-` or `-:all`: ignored everywhere.
    All,
    /// `-:migration`: ignored by schema generation only.
    Migration,
}

/// Returns the exclusion requested by a field's annotations, if any.
#[must_use]
pub fn exclusion(annotations: &Annotations) -> Option<Exclusion> {
    let annotation = annotations.iter().find(|a| a.key.trim() == "-")?;
    match annotation.value.as_deref().map(str::trim) {
        Some("migration") => Some(Exclusion::Migration),
        Some("all" | "") | None => Some(Exclusion::All),
        // Permission-style values such as `-:create` do not exclude.
        Some(_) => None,
    }
}

/// Flattens a model's fields into descriptors, in declaration order.
///
/// # Errors
///
/// Returns [`SchemaError::Metadata`] if a tag is malformed or an `embedded`
/// field is not a structure.
pub fn extract(provider: &dyn MetadataProvider) -> Result<Vec<FieldDescriptor>> {
    let mut out = Vec::new();
    flatten(
        provider.type_name(),
        &provider.fields(),
        "",
        false,
        &mut out,
    )?;
    Ok(out)
}

fn flatten(
    model: &str,
    fields: &[FieldMeta],
    prefix: &str,
    embedded: bool,
    out: &mut Vec<FieldDescriptor>,
) -> Result<()> {
    for field in fields {
        let annotations = Annotations::parse(&field.tag)
            .map_err(|message| SchemaError::metadata(model, &field.name, message))?;

        if exclusion(&annotations).is_some() {
            continue;
        }

        if field.anonymous || annotations.has("embedded") {
            let FieldKind::Struct { fields: nested, .. } = &field.kind else {
                return Err(SchemaError::metadata(
                    model,
                    &field.name,
                    "embedded field is not a structure",
                ));
            };
            let nested_prefix = format!(
                "{prefix}{}",
                annotations.value("embeddedPrefix").unwrap_or_default()
            );
            flatten(model, nested, &nested_prefix, true, out)?;
            continue;
        }

        let base = annotations
            .value("column")
            .map_or_else(|| to_snake_case(&field.name), ToString::to_string);

        out.push(FieldDescriptor {
            name: field.name.clone(),
            column: format!("{prefix}{base}"),
            kind: field.kind.clone(),
            optional: field.optional,
            annotations,
            embedded,
            prefix: prefix.to_string(),
        });
    }
    Ok(())
}
