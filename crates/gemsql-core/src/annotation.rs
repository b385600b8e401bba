//! Field annotation (tag) parsing.
//!
//! Annotations are written as `key[:value]` segments separated by
//! `;`. A backslash before a `;` keeps it inside the current value.

/// One `key[:value]` segment of a tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    /// The key as written.
    pub key: String,
    /// The value, if a `:` was present.
    pub value: Option<String>,
}

/// An ordered set of annotations attached to one field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Annotations(Vec<Annotation>);

impl Annotations {
    /// Parses a raw tag string.
    ///
    /// # Errors
    ///
    /// Returns a description of the problem when a segment has a value but
    /// no key, or when a value has unbalanced parentheses or an unterminated
    /// single quote.
    pub fn parse(tag: &str) -> Result<Self, String> {
        let mut annotations = Vec::new();
        for segment in split_segments(tag) {
            let segment = segment.trim();
            if segment.is_empty() {
                continue;
            }
            let (key, value) = match segment.split_once(':') {
                Some((k, v)) => (k.trim(), Some(v.trim().to_string())),
                None => (segment, None),
            };
            if key.is_empty() {
                return Err(format!("annotation '{segment}' has no key"));
            }
            if let Some(v) = &value {
                check_balanced(key, v)?;
            }
            annotations.push(Annotation {
                key: key.to_string(),
                value,
            });
        }
        Ok(Self(annotations))
    }

    /// Returns `true` if the key is present, with or without a value.
    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.find(key).is_some()
    }

    /// Returns the non-empty value of the first annotation with this key.
    #[must_use]
    pub fn value(&self, key: &str) -> Option<&str> {
        self.find(key)
            .and_then(|a| a.value.as_deref())
            .filter(|v| !v.is_empty())
    }

    /// Iterates annotations in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Annotation> {
        self.0.iter()
    }

    /// Number of annotations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if there are no annotations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn find(&self, key: &str) -> Option<&Annotation> {
        let wanted = normalize_key(key);
        self.0.iter().find(|a| normalize_key(&a.key) == wanted)
    }
}

/// Keys compare case-insensitively and ignore underscores, so
/// `primaryKey`, `PRIMARY_KEY` and `primarykey` are the same key.
fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|c| *c != '_')
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

fn split_segments(tag: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = tag.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&';') => {
                current.push(';');
                chars.next();
            }
            ';' => segments.push(std::mem::take(&mut current)),
            c => current.push(c),
        }
    }
    segments.push(current);
    segments
}

fn check_balanced(key: &str, value: &str) -> Result<(), String> {
    let mut depth = 0i32;
    let mut in_quote = false;
    for c in value.chars() {
        match c {
            '\'' => in_quote = !in_quote,
            '(' if !in_quote => depth += 1,
            ')' if !in_quote => {
                depth -= 1;
                if depth < 0 {
                    return Err(format!("unbalanced ')' in value of '{key}'"));
                }
            }
            _ => {}
        }
    }
    if in_quote {
        return Err(format!("unterminated quote in value of '{key}'"));
    }
    if depth != 0 {
        return Err(format!("unbalanced '(' in value of '{key}'"));
    }
    Ok(())
}
