//! Dispatcher Tests
//!
//! Tests for command routing, argument validation and capability handling.

use std::cell::RefCell;
use std::rc::Rc;

use cartremote::config::ParseLimits;
use cartremote::dispatch::{join_globals, Callbacks, Dispatcher};
use cartremote::{HostError, LuaScript};
use mlua::Lua;

fn bare() -> Dispatcher {
    Dispatcher::new(Callbacks::new(), ParseLimits::default())
}

fn send(dispatcher: &mut Dispatcher, line: &str) -> String {
    send_fps(dispatcher, line, 0)
}

fn send_fps(dispatcher: &mut Dispatcher, line: &str, fps: u32) -> String {
    let response = dispatcher
        .handle_line(line.as_bytes(), fps)
        .expect("expected a response");
    String::from_utf8(response.encode()).unwrap()
}

/// Dispatcher whose peek/poke operate on a shared 64-byte RAM
fn with_ram() -> (Dispatcher, Rc<RefCell<Vec<u8>>>) {
    let ram = Rc::new(RefCell::new((0u8..64).collect::<Vec<u8>>()));
    let peek_ram = Rc::clone(&ram);
    let poke_ram = Rc::clone(&ram);

    let callbacks = Callbacks::new()
        .on_peek(move |addr, out| {
            let ram = peek_ram.borrow();
            let start = addr as usize;
            let end = start + out.len();
            if end > ram.len() {
                return Err(HostError::new("address out of range"));
            }
            out.copy_from_slice(&ram[start..end]);
            Ok(())
        })
        .on_poke(move |addr, data| {
            let mut ram = poke_ram.borrow_mut();
            let start = addr as usize;
            let end = start + data.len();
            if end > ram.len() {
                return Err(HostError::new("address out of range"));
            }
            ram[start..end].copy_from_slice(data);
            Ok(())
        });

    let limits = ParseLimits {
        max_line_length: 1024,
        max_bytes_arg: 32,
    };
    (Dispatcher::new(callbacks, limits), ram)
}

// =============================================================================
// Built-in Commands
// =============================================================================

#[test]
fn test_ping() {
    let mut d = bare();
    assert_eq!(send(&mut d, "5 ping"), "5 OK PONG\n");
    assert_eq!(send(&mut d, "6 PING"), "6 OK PONG\n");
}

#[test]
fn test_ping_rejects_args() {
    let mut d = bare();
    assert_eq!(send(&mut d, "5 ping 1"), "5 ERR \"usage: <id> ping\"\n");
}

#[test]
fn test_unknown_command() {
    let mut d = bare();
    assert_eq!(send(&mut d, "5 frobnicate"), "5 ERR \"unknown command\"\n");
}

#[test]
fn test_blank_line_has_no_response() {
    let mut d = bare();
    assert!(d.handle_line(b"", 0).is_none());
    assert!(d.handle_line(b"  \t", 0).is_none());
}

#[test]
fn test_parse_errors_become_responses() {
    let mut d = bare();
    assert_eq!(send(&mut d, "x ping"), "0 ERR \"invalid id\"\n");
    assert_eq!(send(&mut d, "4 poke 1 <a>"), "4 ERR \"binary hex digit count must be even\"\n");
}

#[test]
fn test_hello_default_banner() {
    let mut d = bare();
    assert_eq!(send(&mut d, "1 hello"), "1 OK \"cartremote v1\"\n");

    let mut d = bare().with_banner("my host");
    assert_eq!(send(&mut d, "1 hello"), "1 OK \"my host\"\n");
}

#[test]
fn test_hello_callback() {
    let callbacks = Callbacks::new().on_hello(|| "fancy \"host\"".to_string());
    let mut d = Dispatcher::new(callbacks, ParseLimits::default());
    assert_eq!(send(&mut d, "2 hello"), "2 OK \"fancy \\\"host\\\"\"\n");
}

#[test]
fn test_getfps() {
    let mut d = bare();
    assert_eq!(send_fps(&mut d, "1 getfps", 59), "1 OK 59\n");
    assert_eq!(send_fps(&mut d, "2 getfps", 0), "2 OK 0\n");
    assert_eq!(send(&mut d, "3 getfps 1"), "3 ERR \"usage: <id> getfps\"\n");
}

// =============================================================================
// Capability Tests
// =============================================================================

#[test]
fn test_missing_callbacks_not_supported() {
    let mut d = bare();
    assert_eq!(send(&mut d, "1 sync 0"), "1 ERR \"sync not supported\"\n");
    assert_eq!(send(&mut d, "2 poke 0 <00>"), "2 ERR \"poke not supported\"\n");
    assert_eq!(send(&mut d, "3 peek 0 1"), "3 ERR \"peek not supported\"\n");
    assert_eq!(send(&mut d, "4 load \"a.lua\" 1"), "4 ERR \"load not supported\"\n");
    assert_eq!(send(&mut d, "5 restart"), "5 ERR \"restart not supported\"\n");
    assert_eq!(send(&mut d, "6 quit"), "6 ERR \"quit not supported\"\n");
    assert_eq!(send(&mut d, "7 eval \"x=1\""), "7 ERR \"eval not supported\"\n");
    assert_eq!(send(&mut d, "8 evalexpr \"1\""), "8 ERR \"evalexpr not supported\"\n");
    assert_eq!(send(&mut d, "9 listglobals"), "9 ERR \"listglobals not supported\"\n");
    assert_eq!(send(&mut d, "10 cartpath"), "10 ERR \"cartpath not supported\"\n");
    assert_eq!(send(&mut d, "11 fs"), "11 ERR \"fs not supported\"\n");
    assert_eq!(send(&mut d, "12 metadata \"title\""), "12 ERR \"metadata not supported\"\n");
}

#[test]
fn test_usage_checked_before_support() {
    let mut d = bare();
    assert_eq!(send(&mut d, "1 sync"), "1 ERR \"usage: <id> sync <flags>\"\n");
    assert_eq!(
        send(&mut d, "2 poke <00> 1"),
        "2 ERR \"usage: <id> poke <addr> <data>\"\n"
    );
    assert_eq!(
        send(&mut d, "3 load 1 1"),
        "3 ERR \"usage: <id> load \\\"path\\\" <run:1|0>\"\n"
    );
    assert_eq!(
        send(&mut d, "4 cartpath 1"),
        "4 ERR \"usage: <id> cartpath [\\\"key\\\"]\"\n"
    );
}

#[test]
fn test_installed_reports_callbacks() {
    let callbacks = Callbacks::new().on_sync(|_| Ok(())).on_quit(|| Ok(()));
    assert_eq!(callbacks.installed(), vec!["quit", "sync"]);
    assert!(Callbacks::new().installed().is_empty());
}

#[test]
fn test_host_error_forwarded() {
    let callbacks = Callbacks::new().on_restart(|| Err(HostError::new("no cart loaded")));
    let mut d = Dispatcher::new(callbacks, ParseLimits::default());
    assert_eq!(send(&mut d, "3 restart"), "3 ERR \"no cart loaded\"\n");
}

#[test]
fn test_action_arguments_forwarded() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sync_seen = Rc::clone(&seen);
    let load_seen = Rc::clone(&seen);

    let callbacks = Callbacks::new()
        .on_sync(move |flags| {
            sync_seen.borrow_mut().push(format!("sync {}", flags));
            Ok(())
        })
        .on_load(move |path, run| {
            load_seen.borrow_mut().push(format!("load {} {}", path, run));
            Ok(())
        });
    let mut d = Dispatcher::new(callbacks, ParseLimits::default());

    assert_eq!(send(&mut d, "1 sync 0x3"), "1 OK\n");
    assert_eq!(send(&mut d, "2 load \"carts/a b.lua\" 1"), "2 OK\n");
    assert_eq!(send(&mut d, "3 load \"x.lua\" 0"), "3 OK\n");

    assert_eq!(
        *seen.borrow(),
        vec!["sync 3", "load carts/a b.lua true", "load x.lua false"]
    );
}

// =============================================================================
// Memory Commands
// =============================================================================

#[test]
fn test_peek_returns_hex() {
    let (mut d, _) = with_ram();
    assert_eq!(send(&mut d, "1 peek 0x10 4"), "1 OK <10 11 12 13>\n");
}

#[test]
fn test_peek_invalid_size() {
    let (mut d, _) = with_ram();
    assert_eq!(send(&mut d, "1 peek 0 0"), "1 ERR \"invalid size\"\n");
    assert_eq!(send(&mut d, "2 peek 0 33"), "2 ERR \"invalid size\"\n");
    assert_eq!(send(&mut d, "3 peek 0 32"), format!("3 OK <{}>\n", hex_range(0, 32)));
}

#[test]
fn test_peek_host_error() {
    let (mut d, _) = with_ram();
    assert_eq!(send(&mut d, "1 peek 60 8"), "1 ERR \"address out of range\"\n");
}

#[test]
fn test_poke_then_peek() {
    let (mut d, ram) = with_ram();
    assert_eq!(send(&mut d, "1 poke 0x20 <de ad be ef>"), "1 OK\n");
    assert_eq!(&ram.borrow()[0x20..0x24], &[0xde, 0xad, 0xbe, 0xef]);
    assert_eq!(send(&mut d, "2 peek 0x1f 6"), "2 OK <1f de ad be ef 24>\n");
}

#[test]
fn test_poke_literal_over_limit() {
    let (mut d, _) = with_ram();
    let line = format!("1 poke 0 <{}>", "00".repeat(33));
    assert_eq!(send(&mut d, &line), "1 ERR \"binary too large\"\n");
}

fn hex_range(start: u8, len: u8) -> String {
    (start..start + len)
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

// =============================================================================
// Query Commands
// =============================================================================

#[test]
fn test_query_commands() {
    let callbacks = Callbacks::new()
        .on_cart_path(|_| Ok("carts/game.lua".to_string()))
        .on_fs_path(|_| Ok("/home/user/carts".to_string()))
        .on_metadata(|key| match key {
            Some("title") => Ok("Demo".to_string()),
            Some(other) => Err(HostError::new(format!("no metadata for {}", other))),
            None => Ok("author,title".to_string()),
        });
    let mut d = Dispatcher::new(callbacks, ParseLimits::default());

    assert_eq!(send(&mut d, "1 cartpath"), "1 OK \"carts/game.lua\"\n");
    assert_eq!(send(&mut d, "2 fs"), "2 OK \"/home/user/carts\"\n");
    assert_eq!(send(&mut d, "3 metadata \"title\""), "3 OK \"Demo\"\n");
    assert_eq!(send(&mut d, "4 metadata"), "4 OK \"author,title\"\n");
    assert_eq!(send(&mut d, "5 metadata \"x\""), "5 ERR \"no metadata for x\"\n");
}

// =============================================================================
// Lua Commands
// =============================================================================

fn lua_dispatcher() -> (Dispatcher, Rc<LuaScript>) {
    let script = Rc::new(LuaScript::new(Lua::new()));
    let callbacks = script.install(Callbacks::new());
    (Dispatcher::new(callbacks, ParseLimits::default()), script)
}

#[test]
fn test_join_globals_filters_and_sorts() {
    let names = vec![
        "zeta".to_string(),
        "Alpha".to_string(),
        "_G".to_string(),
        "end".to_string(),
        "has space".to_string(),
        "9lives".to_string(),
        "zeta".to_string(),
        "".to_string(),
    ];
    assert_eq!(join_globals(names), "Alpha,_G,zeta");
}

#[test]
fn test_listglobals_from_lua() {
    let (mut d, script) = lua_dispatcher();
    script.eval("myvar = 1; _G['bad name'] = 2; _G[10] = 3").unwrap();

    let line = send(&mut d, "1 listglobals");
    let body = line.strip_prefix("1 OK ").unwrap().trim_end();
    let names: Vec<&str> = body.split(',').collect();

    assert!(names.contains(&"myvar"));
    assert!(names.contains(&"print"));
    assert!(!names.iter().any(|n| n.contains(' ')));
    let mut sorted = names.clone();
    sorted.sort();
    assert_eq!(names, sorted);
}

#[test]
fn test_eval_and_evalexpr() {
    let (mut d, _) = lua_dispatcher();
    assert_eq!(send(&mut d, "1 eval \"x = 40\""), "1 OK\n");
    assert_eq!(send(&mut d, "2 evalexpr \"x + 2\""), "2 OK 42\n");
    assert_eq!(
        send(&mut d, r#"3 evalexpr "{x, name=\"ab\"}""#),
        "3 OK {40,name=\"ab\"}\n"
    );
}

#[test]
fn test_evalexpr_errors() {
    let (mut d, _) = lua_dispatcher();
    assert_eq!(send(&mut d, "1 evalexpr \"  \""), "1 ERR \"missing expression\"\n");
    assert_eq!(
        send(&mut d, "2 evalexpr \"print\""),
        "2 ERR \"unsupported result type: function\"\n"
    );

    let line = send(&mut d, "3 evalexpr \"nothing.here\"");
    assert!(line.starts_with("3 ERR \"remote:1:"), "{}", line);
    assert!(line.ends_with("\"\n"));
    assert_eq!(line.matches('\n').count(), 1);
}

#[test]
fn test_eval_syntax_error() {
    let (mut d, _) = lua_dispatcher();
    let line = send(&mut d, "1 eval \"x = = 1\"");
    assert!(line.starts_with("1 ERR \""), "{}", line);
}
