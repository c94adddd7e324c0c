//! Allow-listed pure functions and the forbidden-name classifier.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use kgen_canonical::{hash_bytes, stable_serialize, CanonicalNumber, CanonicalValue, DigestAlg};

use crate::error::{ConstructCategory, RenderError};

/// Signature of a template function: piped input plus explicit arguments.
pub type PureFn = fn(&CanonicalValue, &[CanonicalValue]) -> Result<CanonicalValue, String>;

/// What a function receives as input when called in primary position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputScope {
    /// `f(x, a)` behaves as `x | f(a)`.
    Value,
    /// `f(a)` reads from the whole context, as `<context> | f(a)`.
    Context,
}

/// One entry of a [`FunctionTable`].
#[derive(Debug, Clone)]
pub struct FunctionDef {
    /// Name used in templates.
    pub name: String,
    /// Minimum explicit arguments (not counting the input).
    pub min_args: usize,
    /// Maximum explicit arguments (not counting the input).
    pub max_args: usize,
    /// Input binding in primary position.
    pub scope: InputScope,
    /// Implementation.
    pub func: PureFn,
}

impl FunctionDef {
    /// Value-scoped function definition.
    pub fn new(name: impl Into<String>, min_args: usize, max_args: usize, func: PureFn) -> Self {
        Self {
            name: name.into(),
            min_args,
            max_args,
            scope: InputScope::Value,
            func,
        }
    }

    /// Switches the primary-position input binding.
    pub fn with_scope(mut self, scope: InputScope) -> Self {
        self.scope = scope;
        self
    }

    pub(crate) fn check_arity(&self, count: usize) -> Result<(), RenderError> {
        if count < self.min_args || count > self.max_args {
            let expected = if self.min_args == self.max_args {
                self.min_args.to_string()
            } else {
                format!("{} to {}", self.min_args, self.max_args)
            };
            return Err(RenderError::InvalidArgument {
                function: self.name.clone(),
                message: format!("expected {} argument(s), got {}", expected, count),
            });
        }
        Ok(())
    }
}

/// The only names a template may call.
#[derive(Debug, Clone, Default)]
pub struct FunctionTable {
    functions: BTreeMap<String, FunctionDef>,
}

impl FunctionTable {
    /// Table with no functions.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Table with the built-in pure functions.
    pub fn standard() -> Self {
        let mut table = Self::empty();
        let builtins = [
            FunctionDef::new("sort", 0, 0, sort),
            FunctionDef::new("sort_by", 1, 1, sort_by),
            FunctionDef::new("stable_hash", 0, 0, stable_hash),
            FunctionDef::new("default", 1, 1, default),
            FunctionDef::new("get", 1, 2, get).with_scope(InputScope::Context),
            FunctionDef::new("json", 0, 0, json),
            FunctionDef::new("join", 0, 1, join),
            FunctionDef::new("upper", 0, 0, upper),
            FunctionDef::new("lower", 0, 0, lower),
            FunctionDef::new("trim", 0, 0, trim),
            FunctionDef::new("length", 0, 0, length),
            FunctionDef::new("keys", 0, 0, keys),
        ];
        for def in builtins {
            table.functions.insert(def.name.clone(), def);
        }
        table
    }

    /// Adds a function. Names of forbidden constructs are refused.
    pub fn register(&mut self, def: FunctionDef) -> Result<(), RenderError> {
        if let Some(category) = forbidden_category(&def.name) {
            return Err(RenderError::NonDeterministicConstruct {
                name: def.name,
                category,
                offset: 0,
            });
        }
        self.functions.insert(def.name.clone(), def);
        Ok(())
    }

    /// Looks up a function by name.
    pub fn get(&self, name: &str) -> Option<&FunctionDef> {
        self.functions.get(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }
}

const TIME: &[&str] = &["now", "today", "timestamp", "date", "time", "utcnow"];
const RANDOMNESS: &[&str] = &["random", "rand", "uuid", "shuffle", "nonce"];
const ENVIRONMENT: &[&str] = &["env", "getenv", "hostname", "pid", "cwd", "user"];

/// Family of a forbidden name, matched case-insensitively.
pub fn forbidden_category(name: &str) -> Option<ConstructCategory> {
    let lower = name.to_ascii_lowercase();
    let name = lower.as_str();
    if TIME.contains(&name) {
        Some(ConstructCategory::Time)
    } else if RANDOMNESS.contains(&name) {
        Some(ConstructCategory::Randomness)
    } else if ENVIRONMENT.contains(&name) {
        Some(ConstructCategory::Environment)
    } else {
        None
    }
}

/// Text form of a value in rendered output.
pub fn text_of(value: &CanonicalValue) -> String {
    match value {
        CanonicalValue::Null => String::new(),
        CanonicalValue::Bool(b) => b.to_string(),
        CanonicalValue::Number(n) => n.as_str().to_string(),
        CanonicalValue::String(s) => s.clone(),
        other => String::from_utf8_lossy(&stable_serialize(other)).into_owned(),
    }
}

/// Total order used by `sort` and `sort_by`.
pub fn compare(a: &CanonicalValue, b: &CanonicalValue) -> Ordering {
    fn rank(value: &CanonicalValue) -> u8 {
        match value {
            CanonicalValue::Null => 0,
            CanonicalValue::Bool(_) => 1,
            CanonicalValue::Number(_) => 2,
            CanonicalValue::String(_) => 3,
            CanonicalValue::Bytes(_) => 4,
            CanonicalValue::List(_) => 5,
            CanonicalValue::Map(_) => 6,
        }
    }

    match (a, b) {
        (CanonicalValue::Bool(x), CanonicalValue::Bool(y)) => x.cmp(y),
        (CanonicalValue::Number(x), CanonicalValue::Number(y)) => {
            let (fx, fy) = (numeric(x), numeric(y));
            fx.total_cmp(&fy).then_with(|| x.as_str().cmp(y.as_str()))
        }
        (CanonicalValue::String(x), CanonicalValue::String(y)) => x.as_bytes().cmp(y.as_bytes()),
        (CanonicalValue::Bytes(x), CanonicalValue::Bytes(y)) => x.cmp(y),
        _ if rank(a) == rank(b) => stable_serialize(a).cmp(&stable_serialize(b)),
        _ => rank(a).cmp(&rank(b)),
    }
}

fn numeric(n: &CanonicalNumber) -> f64 {
    n.as_str().parse::<f64>().unwrap_or(0.0)
}

/// Walks a dotted path such as `a.b[0].c`.
pub fn lookup_path<'v>(root: &'v CanonicalValue, path: &str) -> Result<Option<&'v CanonicalValue>, String> {
    let mut current = root;
    for part in path.split('.') {
        let (key, mut rest) = match part.find('[') {
            Some(idx) => (&part[..idx], &part[idx..]),
            None => (part, ""),
        };
        if key.is_empty() && rest.is_empty() {
            return Err(format!("empty segment in path `{}`", path));
        }
        if !key.is_empty() {
            current = match current.get(key) {
                Some(next) => next,
                None => return Ok(None),
            };
        }
        while !rest.is_empty() {
            let close = rest
                .find(']')
                .ok_or_else(|| format!("unclosed index in path `{}`", path))?;
            let idx: usize = rest[1..close]
                .parse()
                .map_err(|_| format!("invalid index in path `{}`", path))?;
            current = match current.index(idx) {
                Some(next) => next,
                None => return Ok(None),
            };
            rest = &rest[close + 1..];
            if !rest.is_empty() && !rest.starts_with('[') {
                return Err(format!("unexpected `{}` in path `{}`", rest, path));
            }
        }
    }
    Ok(Some(current))
}

fn expect_list(value: &CanonicalValue) -> Result<&[CanonicalValue], String> {
    match value {
        CanonicalValue::List(items) => Ok(items),
        other => Err(format!("expected list, found {}", other.kind())),
    }
}

fn first_arg(args: &[CanonicalValue]) -> Result<&CanonicalValue, String> {
    args.first().ok_or_else(|| "missing argument".to_string())
}

fn expect_str(value: &CanonicalValue) -> Result<&str, String> {
    value
        .as_str()
        .ok_or_else(|| format!("expected string, found {}", value.kind()))
}

fn sort(input: &CanonicalValue, _args: &[CanonicalValue]) -> Result<CanonicalValue, String> {
    let mut items = expect_list(input)?.to_vec();
    items.sort_by(compare);
    Ok(CanonicalValue::List(items))
}

fn sort_by(input: &CanonicalValue, args: &[CanonicalValue]) -> Result<CanonicalValue, String> {
    let key = expect_str(first_arg(args)?)?;
    let mut keyed = Vec::new();
    for item in expect_list(input)? {
        let sort_key = lookup_path(item, key)?.cloned().unwrap_or(CanonicalValue::Null);
        keyed.push((sort_key, item.clone()));
    }
    keyed.sort_by(|a, b| compare(&a.0, &b.0));
    Ok(CanonicalValue::List(keyed.into_iter().map(|(_, item)| item).collect()))
}

fn stable_hash(input: &CanonicalValue, _args: &[CanonicalValue]) -> Result<CanonicalValue, String> {
    let cid = hash_bytes(&stable_serialize(input), DigestAlg::Sha256);
    Ok(CanonicalValue::String(cid.digest))
}

fn default(input: &CanonicalValue, args: &[CanonicalValue]) -> Result<CanonicalValue, String> {
    match input {
        CanonicalValue::Null => first_arg(args).cloned(),
        other => Ok(other.clone()),
    }
}

fn get(input: &CanonicalValue, args: &[CanonicalValue]) -> Result<CanonicalValue, String> {
    let path = expect_str(first_arg(args)?)?;
    let fallback = args.get(1).cloned().unwrap_or(CanonicalValue::Null);
    Ok(lookup_path(input, path)?.cloned().unwrap_or(fallback))
}

fn json(input: &CanonicalValue, _args: &[CanonicalValue]) -> Result<CanonicalValue, String> {
    String::from_utf8(stable_serialize(input))
        .map(CanonicalValue::String)
        .map_err(|err| err.to_string())
}

fn join(input: &CanonicalValue, args: &[CanonicalValue]) -> Result<CanonicalValue, String> {
    let separator = match args.first() {
        Some(sep) => expect_str(sep)?,
        None => "",
    };
    let parts: Vec<String> = expect_list(input)?.iter().map(text_of).collect();
    Ok(CanonicalValue::String(parts.join(separator)))
}

fn upper(input: &CanonicalValue, _args: &[CanonicalValue]) -> Result<CanonicalValue, String> {
    Ok(CanonicalValue::String(expect_str(input)?.to_uppercase()))
}

fn lower(input: &CanonicalValue, _args: &[CanonicalValue]) -> Result<CanonicalValue, String> {
    Ok(CanonicalValue::String(expect_str(input)?.to_lowercase()))
}

fn trim(input: &CanonicalValue, _args: &[CanonicalValue]) -> Result<CanonicalValue, String> {
    Ok(CanonicalValue::String(expect_str(input)?.trim().to_string()))
}

fn length(input: &CanonicalValue, _args: &[CanonicalValue]) -> Result<CanonicalValue, String> {
    let len = match input {
        CanonicalValue::String(s) => s.chars().count(),
        CanonicalValue::Bytes(b) => b.len(),
        CanonicalValue::List(items) => items.len(),
        CanonicalValue::Map(entries) => entries.len(),
        other => return Err(format!("{} has no length", other.kind())),
    };
    Ok(CanonicalValue::Number(CanonicalNumber::from_u64(len as u64)))
}

fn keys(input: &CanonicalValue, _args: &[CanonicalValue]) -> Result<CanonicalValue, String> {
    match input {
        CanonicalValue::Map(entries) => Ok(CanonicalValue::List(
            entries
                .iter()
                .map(|(key, _)| CanonicalValue::String(key.clone()))
                .collect(),
        )),
        other => Err(format!("expected map, found {}", other.kind())),
    }
}
