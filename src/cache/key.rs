//! Cache Key Module
//!
//! Call arguments, their canonical rendering, and the digest used as the
//! entry store key.
//!
//! A call `(model, operation, args)` renders as
//! `{"type":"User","prop":"find_one","args":[...]}`. Plain values use JSON
//! syntax with map keys sorted. Values JSON cannot express render as bare
//! tokens (`fn#7("mapper")`, `bytes(00ff)`, `symbol("tag")`, `transaction#3`)
//! that no JSON value can collide with.

use std::collections::BTreeMap;
use std::fmt;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::{CacheError, Result};

static NEXT_FN_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_TRANSACTION_ID: AtomicU64 = AtomicU64::new(1);

// == Function Reference ==
/// A callable passed as a call argument.
///
/// Two `FnRef`s are equal iff one is a clone of the other.
#[derive(Clone)]
pub struct FnRef {
    id: u64,
    name: Arc<str>,
    func: Arc<dyn Fn(Value) -> Value + Send + Sync>,
}

impl FnRef {
    /// Wraps `func` under a fresh identity.
    pub fn new<F>(name: impl Into<Arc<str>>, func: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        Self {
            id: NEXT_FN_ID.fetch_add(1, Ordering::Relaxed),
            name: name.into(),
            func: Arc::new(func),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, value: Value) -> Value {
        (self.func)(value)
    }
}

impl PartialEq for FnRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl fmt::Debug for FnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FnRef#{}({})", self.id, self.name)
    }
}

// == Transaction ==
/// Marker for a data-layer transaction.
///
/// Calls carrying an active transaction never touch the cache.
#[derive(Debug, Clone)]
pub struct Transaction {
    id: u64,
    active: Arc<AtomicBool>,
}

impl Transaction {
    /// Starts a new, active transaction.
    pub fn begin() -> Self {
        Self {
            id: NEXT_TRANSACTION_ID.fetch_add(1, Ordering::Relaxed),
            active: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub fn commit(&self) {
        self.active.store(false, Ordering::SeqCst);
    }

    pub fn rollback(&self) {
        self.active.store(false, Ordering::SeqCst);
    }
}

impl PartialEq for Transaction {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

// == Map Key ==
/// Key of a map argument. Symbol keys (query operators such as `gt`) render
/// as bare tokens, so they never collide with a string key of the same text.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MapKey {
    Str(String),
    Symbol(String),
}

impl MapKey {
    /// The key's text, without its kind.
    pub fn as_str(&self) -> &str {
        match self {
            MapKey::Str(s) | MapKey::Symbol(s) => s,
        }
    }

    fn render_into(&self, out: &mut String) -> Result<()> {
        match self {
            MapKey::Str(s) => push_json_str(out, s),
            MapKey::Symbol(desc) => {
                out.push_str("symbol(");
                push_json_str(out, desc)?;
                out.push(')');
                Ok(())
            }
        }
    }
}

impl From<&str> for MapKey {
    fn from(s: &str) -> Self {
        MapKey::Str(s.to_string())
    }
}

impl From<String> for MapKey {
    fn from(s: String) -> Self {
        MapKey::Str(s)
    }
}

// == Arg ==
/// One argument of an intercepted call.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    List(Vec<Arg>),
    Map(BTreeMap<MapKey, Arg>),
    Func(FnRef),
    Symbol(String),
    Transaction(Transaction),
}

impl Arg {
    /// Builds a map argument from `(key, value)` pairs.
    pub fn map<K, I>(pairs: I) -> Self
    where
        K: Into<MapKey>,
        I: IntoIterator<Item = (K, Arg)>,
    {
        Arg::Map(pairs.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// True if this argument is an active transaction or holds one at any
    /// depth, such as the usual `{ transaction: t }` options shape or a list
    /// of such options.
    pub fn carries_active_transaction(&self) -> bool {
        match self {
            Arg::Transaction(t) => t.is_active(),
            Arg::Map(fields) => fields.values().any(Arg::carries_active_transaction),
            Arg::List(items) => items.iter().any(Arg::carries_active_transaction),
            _ => false,
        }
    }

    /// Looks up a field of a map argument.
    pub fn get(&self, field: &str) -> Option<&Arg> {
        match self {
            Arg::Map(fields) => fields.get(&MapKey::from(field)),
            _ => None,
        }
    }

    /// Converts to JSON for data layers that work on plain values.
    ///
    /// Functions, symbols and transactions have no JSON form and are dropped
    /// from maps and lists, as are map fields under symbol keys.
    pub fn to_json(&self) -> Option<Value> {
        match self {
            Arg::Null => Some(Value::Null),
            Arg::Bool(b) => Some(Value::Bool(*b)),
            Arg::Int(i) => Some(Value::from(*i)),
            Arg::UInt(u) => Some(Value::from(*u)),
            Arg::Float(f) => serde_json::Number::from_f64(*f).map(Value::Number),
            Arg::Str(s) => Some(Value::String(s.clone())),
            Arg::Bytes(b) => Some(Value::String(hex::encode(b))),
            Arg::List(items) => Some(Value::Array(
                items.iter().filter_map(Arg::to_json).collect(),
            )),
            Arg::Map(fields) => Some(Value::Object(
                fields
                    .iter()
                    .filter_map(|(k, v)| match k {
                        MapKey::Str(k) => v.to_json().map(|v| (k.clone(), v)),
                        MapKey::Symbol(_) => None,
                    })
                    .collect(),
            )),
            Arg::Func(_) | Arg::Symbol(_) | Arg::Transaction(_) => None,
        }
    }

    fn render_into(&self, out: &mut String) -> Result<()> {
        match self {
            Arg::Null => out.push_str("null"),
            Arg::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
            Arg::Int(i) => {
                let _ = write!(out, "{}", i);
            }
            Arg::UInt(u) => {
                let _ = write!(out, "{}", u);
            }
            Arg::Float(f) => {
                let number = serde_json::Number::from_f64(*f).ok_or_else(|| {
                    CacheError::KeyDerivation(format!("non-finite float argument: {}", f))
                })?;
                let _ = write!(out, "{}", number);
            }
            Arg::Str(s) => push_json_str(out, s)?,
            Arg::Bytes(b) => {
                let _ = write!(out, "bytes({})", hex::encode(b));
            }
            Arg::List(items) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    item.render_into(out)?;
                }
                out.push(']');
            }
            Arg::Map(fields) => {
                out.push('{');
                for (i, (key, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    key.render_into(out)?;
                    out.push(':');
                    value.render_into(out)?;
                }
                out.push('}');
            }
            Arg::Func(f) => {
                let _ = write!(out, "fn#{}(", f.id());
                push_json_str(out, f.name())?;
                out.push(')');
            }
            Arg::Symbol(desc) => {
                out.push_str("symbol(");
                push_json_str(out, desc)?;
                out.push(')');
            }
            Arg::Transaction(t) => {
                let _ = write!(out, "transaction#{}", t.id());
            }
        }
        Ok(())
    }
}

fn push_json_str(out: &mut String, s: &str) -> Result<()> {
    let quoted =
        serde_json::to_string(s).map_err(|e| CacheError::KeyDerivation(e.to_string()))?;
    out.push_str(&quoted);
    Ok(())
}

impl From<Value> for Arg {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Arg::Null,
            Value::Bool(b) => Arg::Bool(b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Arg::Int(i)
                } else if let Some(u) = n.as_u64() {
                    Arg::UInt(u)
                } else {
                    Arg::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Value::String(s) => Arg::Str(s),
            Value::Array(items) => Arg::List(items.into_iter().map(Arg::from).collect()),
            Value::Object(fields) => {
                Arg::Map(
                    fields
                        .into_iter()
                        .map(|(k, v)| (MapKey::Str(k), Arg::from(v)))
                        .collect(),
                )
            }
        }
    }
}

impl From<&str> for Arg {
    fn from(s: &str) -> Self {
        Arg::Str(s.to_string())
    }
}

impl From<String> for Arg {
    fn from(s: String) -> Self {
        Arg::Str(s)
    }
}

impl From<i64> for Arg {
    fn from(i: i64) -> Self {
        Arg::Int(i)
    }
}

impl From<bool> for Arg {
    fn from(b: bool) -> Self {
        Arg::Bool(b)
    }
}

impl From<FnRef> for Arg {
    fn from(f: FnRef) -> Self {
        Arg::Func(f)
    }
}

impl From<Transaction> for Arg {
    fn from(t: Transaction) -> Self {
        Arg::Transaction(t)
    }
}

// == Key Derivation ==
/// Renders a call into its canonical key string.
///
/// # Errors
/// Returns `CacheError::KeyDerivation` when an argument has no stable
/// rendering (NaN and infinite floats).
pub fn derive_key(model: &str, operation: &str, args: &[Arg]) -> Result<String> {
    let mut out = String::with_capacity(64);
    out.push_str("{\"type\":");
    push_json_str(&mut out, model)?;
    out.push_str(",\"prop\":");
    push_json_str(&mut out, operation)?;
    out.push_str(",\"args\":[");
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        arg.render_into(&mut out)?;
    }
    out.push_str("]}");
    Ok(out)
}

/// SHA-256 digest of a derived key, hex encoded (64 chars).
pub fn hash_key(key: &str) -> String {
    hex::encode(Sha256::digest(key.as_bytes()))
}
