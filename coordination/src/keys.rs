//! Hierarchical key construction for cache, lock and special entries.
//!
//! # Key Format
//!
//! ```text
//! {prefix}:{module}:{version}:list:{identifier}
//! {prefix}:{module}:{version}:item:{identifier}
//! {prefix}:{module}:{version}:field:{field}:{identifier}
//! {prefix}:{module}:{version}:special:{identifier}
//! {prefix}:{module}:{version}:lock:{identifier}
//! ```
//!
//! Every segment is escaped before joining (`%` → `%25`, `:` → `%3A`), so segments never
//! contain the separator and two distinct [`CacheKey`]s can never format to the same string.
//! Patterns additionally backslash-escape glob metacharacters in literal segments.

const SEPARATOR: char = ':';
const WILDCARD: &str = "*";

/// Kind of entry a key addresses.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Qualifier {
    /// Cached list or aggregate
    List,
    /// Single entity
    Entity,
    /// Lookup by one field, holding the field name
    Field(String),
    /// Reserved entry exempt from TTL expiry
    Special,
    /// Distributed lock
    Lock,
}

impl Qualifier {
    const LIST: &'static str = "list";
    const ENTITY: &'static str = "item";
    const FIELD: &'static str = "field";
    const SPECIAL: &'static str = "special";
    const LOCK: &'static str = "lock";

    fn tag(&self) -> &'static str {
        match self {
            Self::List => Self::LIST,
            Self::Entity => Self::ENTITY,
            Self::Field(_) => Self::FIELD,
            Self::Special => Self::SPECIAL,
            Self::Lock => Self::LOCK,
        }
    }
}

/// Logical address of a cache or lock entry within a namespace.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Owning module (e.g. `device`, `order`)
    pub module: String,
    /// Entry kind
    pub qualifier: Qualifier,
    /// Entity id, list identifier or field value
    pub identifier: String,
}

impl CacheKey {
    /// Creates a new key
    #[must_use]
    pub fn new(module: impl Into<String>, qualifier: Qualifier, identifier: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            qualifier,
            identifier: identifier.into(),
        }
    }
}

fn escape(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for c in segment.chars() {
        match c {
            '%' => out.push_str("%25"),
            ':' => out.push_str("%3A"),
            other => out.push(other),
        }
    }
    out
}

fn unescape(segment: &str) -> Option<String> {
    let mut out = String::with_capacity(segment.len());
    let mut rest = segment;
    while let Some(pos) = rest.find('%') {
        out.push_str(&rest[..pos]);
        let code = rest.get(pos..pos + 3)?;
        match code {
            "%25" => out.push('%'),
            "%3A" => out.push(':'),
            _ => return None,
        }
        rest = &rest[pos + 3..];
    }
    out.push_str(rest);
    Some(out)
}

// Escaped segment safe to embed literally in a glob pattern.
fn pattern_literal(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for c in escape(segment).chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Builds and parses keys under one global prefix and version.
///
/// # Example
///
/// ```
/// use opsorder_coordination::keys::KeyNamespace;
///
/// let ns = KeyNamespace::new("opsorder", "v1");
/// assert_eq!(ns.entity_key("device", "dev-42"), "opsorder:device:v1:item:dev-42");
/// assert_eq!(ns.list_pattern("device"), "opsorder:device:v1:list:*");
/// assert_eq!(ns.module_of("opsorder:device:v1:item:dev-42"), "device");
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyNamespace {
    prefix: String,
    version: String,
}

impl KeyNamespace {
    /// Creates a namespace
    #[must_use]
    pub fn new(prefix: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            version: version.into(),
        }
    }

    /// Global prefix
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Version tag
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Format a logical key.
    #[must_use]
    pub fn format(&self, key: &CacheKey) -> String {
        let mut segments = vec![
            escape(&self.prefix),
            escape(&key.module),
            escape(&self.version),
            key.qualifier.tag().to_string(),
        ];
        if let Qualifier::Field(field) = &key.qualifier {
            segments.push(escape(field));
        }
        segments.push(escape(&key.identifier));
        segments.join(&SEPARATOR.to_string())
    }

    /// Parse a formatted key back into its logical parts.
    ///
    /// Returns `None` for keys from another prefix or version and for malformed input.
    #[must_use]
    pub fn parse(&self, raw: &str) -> Option<CacheKey> {
        let segments: Vec<&str> = raw.split(SEPARATOR).collect();
        let (head, tail) = segments.split_at_checked(4)?;
        if unescape(head[0])? != self.prefix || unescape(head[2])? != self.version {
            return None;
        }
        let module = unescape(head[1])?;

        let (qualifier, identifier) = match (head[3], tail) {
            (Qualifier::LIST, [id]) => (Qualifier::List, id),
            (Qualifier::ENTITY, [id]) => (Qualifier::Entity, id),
            (Qualifier::SPECIAL, [id]) => (Qualifier::Special, id),
            (Qualifier::LOCK, [id]) => (Qualifier::Lock, id),
            (Qualifier::FIELD, [field, id]) => (Qualifier::Field(unescape(field)?), id),
            _ => return None,
        };

        Some(CacheKey {
            module,
            qualifier,
            identifier: unescape(identifier)?,
        })
    }

    /// Module segment of any key built by a namespace, empty if it cannot be read.
    ///
    /// Only the segment layout is checked, not the prefix or version, so keys from other
    /// namespaces can still be attributed in diagnostics.
    #[must_use]
    pub fn module_of(&self, raw: &str) -> String {
        let mut segments = raw.split(SEPARATOR);
        match (segments.next(), segments.next(), segments.next(), segments.next()) {
            (Some(_), Some(module), Some(_), Some(_)) => unescape(module).unwrap_or_default(),
            _ => String::new(),
        }
    }

    /// Key for a cached list or aggregate
    #[must_use]
    pub fn list_key(&self, module: &str, identifier: &str) -> String {
        self.format(&CacheKey::new(module, Qualifier::List, identifier))
    }

    /// Key for one entity
    #[must_use]
    pub fn entity_key(&self, module: &str, id: &str) -> String {
        self.format(&CacheKey::new(module, Qualifier::Entity, id))
    }

    /// Key for a lookup by field value
    #[must_use]
    pub fn field_key(&self, module: &str, field: &str, value: &str) -> String {
        self.format(&CacheKey::new(module, Qualifier::Field(field.to_string()), value))
    }

    /// Key for a reserved, non-expiring entry
    #[must_use]
    pub fn special_key(&self, module: &str, name: &str) -> String {
        self.format(&CacheKey::new(module, Qualifier::Special, name))
    }

    /// Key for a distributed lock
    #[must_use]
    pub fn lock_key(&self, module: &str, id: &str) -> String {
        self.format(&CacheKey::new(module, Qualifier::Lock, id))
    }

    fn pattern(&self, module: &str, tail: &[&str]) -> String {
        let mut segments = vec![
            pattern_literal(&self.prefix),
            pattern_literal(module),
            pattern_literal(&self.version),
        ];
        segments.extend(tail.iter().map(|s| (*s).to_string()));
        segments.join(&SEPARATOR.to_string())
    }

    /// Pattern matching every list entry of a module
    #[must_use]
    pub fn list_pattern(&self, module: &str) -> String {
        self.pattern(module, &[Qualifier::LIST, WILDCARD])
    }

    /// Pattern matching every field entry of a module
    #[must_use]
    pub fn field_pattern(&self, module: &str) -> String {
        self.pattern(module, &[Qualifier::FIELD, WILDCARD])
    }

    /// Pattern matching every entity entry of a module
    #[must_use]
    pub fn entity_pattern(&self, module: &str) -> String {
        self.pattern(module, &[Qualifier::ENTITY, WILDCARD])
    }

    /// Pattern matching every entry of a module, whatever its qualifier
    #[must_use]
    pub fn module_pattern(&self, module: &str) -> String {
        self.pattern(module, &[WILDCARD])
    }
}
