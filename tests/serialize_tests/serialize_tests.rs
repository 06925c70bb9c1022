//! Serializer Tests
//!
//! Tests for rendering Lua values as Lua literals.

use cartremote::serialize::{serialize, SerializeError, MAX_DEPTH};
use mlua::{Lua, Value};

const LIMIT: usize = 64 * 1024;

fn eval(lua: &Lua, expr: &str) -> Value {
    lua.load(format!("return {}", expr)).eval().unwrap()
}

fn render(expr: &str) -> Result<String, SerializeError> {
    let lua = Lua::new();
    let value = eval(&lua, expr);
    serialize(&value, LIMIT)
}

fn render_chunk(chunk: &str) -> Result<String, SerializeError> {
    let lua = Lua::new();
    let value: Value = lua.load(chunk).eval().unwrap();
    serialize(&value, LIMIT)
}

// =============================================================================
// Scalar Tests
// =============================================================================

#[test]
fn test_nil_and_booleans() {
    assert_eq!(render("nil").unwrap(), "nil");
    assert_eq!(render("true").unwrap(), "true");
    assert_eq!(render("false").unwrap(), "false");
}

#[test]
fn test_integers() {
    assert_eq!(render("42").unwrap(), "42");
    assert_eq!(render("-7").unwrap(), "-7");
    assert_eq!(render("math.maxinteger").unwrap(), "9223372036854775807");
}

#[test]
fn test_floats_match_tostring() {
    assert_eq!(render("0.5").unwrap(), "0.5");
    assert_eq!(render("3.0").unwrap(), "3.0");
    assert_eq!(render("1/0").unwrap(), "inf");
    assert_eq!(render("2^53").unwrap(), "9.007199254741e+15");
}

#[test]
fn test_string_escapes() {
    assert_eq!(render(r#""plain""#).unwrap(), r#""plain""#);
    assert_eq!(render(r#""a\"b\\c""#).unwrap(), r#""a\"b\\c""#);
    assert_eq!(render(r#""l1\nl2\r\t""#).unwrap(), r#""l1\nl2\r\t""#);
    assert_eq!(render(r#""\0\x7f\x80\xff""#).unwrap(), r#""\x00\x7F\x80\xFF""#);
}

#[test]
fn test_output_is_ascii() {
    let out = render(r#""h\xc3\xa9llo""#).unwrap();
    assert!(out.is_ascii());
    assert_eq!(out, r#""h\xC3\xA9llo""#);
}

#[test]
fn test_unsupported_value_types() {
    let err = render("print").unwrap_err();
    assert_eq!(err.to_string(), "unsupported result type: function");

    let err = render("coroutine.create(function() end)").unwrap_err();
    assert_eq!(err.to_string(), "unsupported result type: thread");
}

// =============================================================================
// Table Tests
// =============================================================================

#[test]
fn test_empty_table() {
    assert_eq!(render("{}").unwrap(), "{}");
}

#[test]
fn test_array_then_hash_part() {
    assert_eq!(render(r#"{1,2,3,foo="bar"}"#).unwrap(), r#"{1,2,3,foo="bar"}"#);
}

#[test]
fn test_nested_tables() {
    assert_eq!(render("{a={b={}}}").unwrap(), "{a={b={}}}");
    assert_eq!(render("{{1},{2}}").unwrap(), "{{1},{2}}");
}

#[test]
fn test_bracketed_keys() {
    assert_eq!(render(r#"{["a b"]=1}"#).unwrap(), r#"{["a b"]=1}"#);
    assert_eq!(render("{[10]=true}").unwrap(), "{[10]=true}");
    assert_eq!(render("{[1.5]=0}").unwrap(), "{[1.5]=0}");
    assert_eq!(render("{[false]=1}").unwrap(), "{[false]=1}");
}

#[test]
fn test_table_key_rejected() {
    let err = render("{[{}]=1}").unwrap_err();
    assert_eq!(err.to_string(), "unsupported key type: table");
}

#[test]
fn test_unsupported_value_inside_table() {
    let err = render("{f=print}").unwrap_err();
    assert_eq!(err.to_string(), "unsupported result type: function");
}

// =============================================================================
// Cycle and Depth Tests
// =============================================================================

#[test]
fn test_self_reference_is_cycle() {
    let err = render_chunk("local t = {} t.self = t return t").unwrap_err();
    assert!(matches!(err, SerializeError::Cycle));
    assert_eq!(err.to_string(), "cycle detected");
}

#[test]
fn test_indirect_cycle() {
    let err = render_chunk("local a, b = {}, {} a.b = b b.a = a return a").unwrap_err();
    assert!(matches!(err, SerializeError::Cycle));
}

#[test]
fn test_shared_subtable_rejected() {
    let err = render_chunk("local s = {} return {s, s}").unwrap_err();
    assert!(matches!(err, SerializeError::Cycle));
}

#[test]
fn test_depth_limit() {
    // MAX_DEPTH + 1 nested tables fit (root is depth 0)
    let ok = render_chunk(&format!(
        "local t = {{}} for i = 1, {} do t = {{t}} end return t",
        MAX_DEPTH
    ))
    .unwrap();
    assert_eq!(ok.matches('{').count(), MAX_DEPTH + 1);

    let err = render_chunk(&format!(
        "local t = {{}} for i = 1, {} do t = {{t}} end return t",
        MAX_DEPTH + 1
    ))
    .unwrap_err();
    assert!(matches!(err, SerializeError::TooDeep));
    assert_eq!(err.to_string(), "table too deep");
}

// =============================================================================
// Size Limit Tests
// =============================================================================

#[test]
fn test_result_too_large() {
    let lua = Lua::new();
    let value = eval(&lua, r#""hello""#);

    assert_eq!(serialize(&value, 7).unwrap(), r#""hello""#);

    let err = serialize(&value, 6).unwrap_err();
    assert!(matches!(err, SerializeError::TooLarge));
    assert_eq!(err.to_string(), "result too large");
}

#[test]
fn test_large_table_hits_limit() {
    let lua = Lua::new();
    let value = eval(&lua, "(function() local t = {} for i = 1, 1000 do t[i] = i end return t end)()");
    assert!(matches!(serialize(&value, 100), Err(SerializeError::TooLarge)));
}
