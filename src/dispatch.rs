//! Command Dispatcher
//!
//! Maps parsed invocations onto the host callback table and produces exactly
//! one [`Response`] per non-blank line.
//!
//! ## Capabilities
//! Every host entry point is optional. A command whose callback is missing
//! answers `ERR "<command> not supported"`; the host decides what it exposes
//! when it builds its [`Callbacks`].

use std::fmt;

use crate::config::ParseLimits;
use crate::error::HostResult;
use crate::protocol::{parse_line, Arg, ArgType, Invocation, Response, PROTOCOL_VERSION};
use crate::serialize::{is_identifier, is_reserved_word};

type HelloFn = Box<dyn FnMut() -> String>;
type LoadFn = Box<dyn FnMut(&str, bool) -> HostResult<()>>;
type ActionFn = Box<dyn FnMut() -> HostResult<()>>;
type SyncFn = Box<dyn FnMut(u32) -> HostResult<()>>;
type PokeFn = Box<dyn FnMut(u32, &[u8]) -> HostResult<()>>;
type PeekFn = Box<dyn FnMut(u32, &mut [u8]) -> HostResult<()>>;
type EvalFn = Box<dyn FnMut(&str) -> HostResult<()>>;
type EvalExprFn = Box<dyn FnMut(&str) -> HostResult<String>>;
type ListGlobalsFn = Box<dyn FnMut() -> HostResult<Vec<String>>>;
type QueryFn = Box<dyn FnMut(Option<&str>) -> HostResult<String>>;

/// Host callback table
///
/// Built once by the host with the `on_*` methods; anything left unset is
/// reported to clients as not supported.
#[derive(Default)]
pub struct Callbacks {
    pub(crate) hello: Option<HelloFn>,
    pub(crate) load: Option<LoadFn>,
    pub(crate) restart: Option<ActionFn>,
    pub(crate) quit: Option<ActionFn>,
    pub(crate) sync: Option<SyncFn>,
    pub(crate) poke: Option<PokeFn>,
    pub(crate) peek: Option<PeekFn>,
    pub(crate) eval: Option<EvalFn>,
    pub(crate) eval_expr: Option<EvalExprFn>,
    pub(crate) list_globals: Option<ListGlobalsFn>,
    pub(crate) cart_path: Option<QueryFn>,
    pub(crate) fs_path: Option<QueryFn>,
    pub(crate) metadata: Option<QueryFn>,
}

impl Callbacks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Banner returned by `hello`
    pub fn on_hello(mut self, f: impl FnMut() -> String + 'static) -> Self {
        self.hello = Some(Box::new(f));
        self
    }

    /// `load "path" <run>`
    pub fn on_load(mut self, f: impl FnMut(&str, bool) -> HostResult<()> + 'static) -> Self {
        self.load = Some(Box::new(f));
        self
    }

    pub fn on_restart(mut self, f: impl FnMut() -> HostResult<()> + 'static) -> Self {
        self.restart = Some(Box::new(f));
        self
    }

    pub fn on_quit(mut self, f: impl FnMut() -> HostResult<()> + 'static) -> Self {
        self.quit = Some(Box::new(f));
        self
    }

    pub fn on_sync(mut self, f: impl FnMut(u32) -> HostResult<()> + 'static) -> Self {
        self.sync = Some(Box::new(f));
        self
    }

    /// Write `data` at `addr`
    pub fn on_poke(mut self, f: impl FnMut(u32, &[u8]) -> HostResult<()> + 'static) -> Self {
        self.poke = Some(Box::new(f));
        self
    }

    /// Fill the buffer from `addr`; the buffer length is the requested size
    pub fn on_peek(mut self, f: impl FnMut(u32, &mut [u8]) -> HostResult<()> + 'static) -> Self {
        self.peek = Some(Box::new(f));
        self
    }

    /// Run a statement, discarding results
    pub fn on_eval(mut self, f: impl FnMut(&str) -> HostResult<()> + 'static) -> Self {
        self.eval = Some(Box::new(f));
        self
    }

    /// Evaluate an expression and return its serialized literal
    pub fn on_eval_expr(mut self, f: impl FnMut(&str) -> HostResult<String> + 'static) -> Self {
        self.eval_expr = Some(Box::new(f));
        self
    }

    /// Names of globals; filtering and ordering happen in the dispatcher
    pub fn on_list_globals(
        mut self,
        f: impl FnMut() -> HostResult<Vec<String>> + 'static,
    ) -> Self {
        self.list_globals = Some(Box::new(f));
        self
    }

    pub fn on_cart_path(
        mut self,
        f: impl FnMut(Option<&str>) -> HostResult<String> + 'static,
    ) -> Self {
        self.cart_path = Some(Box::new(f));
        self
    }

    pub fn on_fs_path(
        mut self,
        f: impl FnMut(Option<&str>) -> HostResult<String> + 'static,
    ) -> Self {
        self.fs_path = Some(Box::new(f));
        self
    }

    pub fn on_metadata(
        mut self,
        f: impl FnMut(Option<&str>) -> HostResult<String> + 'static,
    ) -> Self {
        self.metadata = Some(Box::new(f));
        self
    }

    /// Names of the commands backed by an installed callback
    pub fn installed(&self) -> Vec<&'static str> {
        let table: [(&'static str, bool); 13] = [
            ("hello", self.hello.is_some()),
            ("load", self.load.is_some()),
            ("restart", self.restart.is_some()),
            ("quit", self.quit.is_some()),
            ("sync", self.sync.is_some()),
            ("poke", self.poke.is_some()),
            ("peek", self.peek.is_some()),
            ("eval", self.eval.is_some()),
            ("evalexpr", self.eval_expr.is_some()),
            ("listglobals", self.list_globals.is_some()),
            ("cartpath", self.cart_path.is_some()),
            ("fs", self.fs_path.is_some()),
            ("metadata", self.metadata.is_some()),
        ];
        table
            .iter()
            .filter(|(_, set)| *set)
            .map(|(name, _)| *name)
            .collect()
    }
}

impl fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks")
            .field("installed", &self.installed())
            .finish()
    }
}

/// Routes request lines to the host
#[derive(Debug)]
pub struct Dispatcher {
    callbacks: Callbacks,
    limits: ParseLimits,
    banner: String,
}

impl Dispatcher {
    pub fn new(callbacks: Callbacks, limits: ParseLimits) -> Self {
        Self {
            callbacks,
            limits,
            banner: default_banner(),
        }
    }

    /// Replace the banner used when no `hello` callback is installed
    pub fn with_banner(mut self, banner: impl Into<String>) -> Self {
        self.banner = banner.into();
        self
    }

    pub fn limits(&self) -> &ParseLimits {
        &self.limits
    }

    /// Parse and execute one framed line.
    ///
    /// `fps` is the current rounded frame rate reported by `getfps`.
    /// Returns `None` for blank lines.
    pub fn handle_line(&mut self, line: &[u8], fps: u32) -> Option<Response> {
        match parse_line(line, &self.limits) {
            Ok(Some(invocation)) => Some(self.execute(&invocation, fps)),
            Ok(None) => None,
            Err(err) => Some(Response::error(err.id, err.message)),
        }
    }

    /// Execute an already parsed invocation
    pub fn execute(&mut self, inv: &Invocation, fps: u32) -> Response {
        let id = inv.id;
        let cb = &mut self.callbacks;

        match inv.command.as_str() {
            "ping" => {
                if !inv.args.is_empty() {
                    return usage(id, "ping");
                }
                Response::token(id, "PONG")
            }

            "hello" => {
                if !inv.args.is_empty() {
                    return usage(id, "hello");
                }
                let banner = match cb.hello.as_mut() {
                    Some(hello) => hello(),
                    None => self.banner.clone(),
                };
                Response::text(id, banner)
            }

            "sync" => {
                if !inv.matches(&[ArgType::Int]) {
                    return usage(id, "sync <flags>");
                }
                let Some(sync) = cb.sync.as_mut() else {
                    return not_supported(id, "sync");
                };
                done(id, sync(int_arg(&inv.args[0]) as u32))
            }

            "poke" => {
                if !inv.matches(&[ArgType::Int, ArgType::Bytes]) {
                    return usage(id, "poke <addr> <data>");
                }
                let Some(poke) = cb.poke.as_mut() else {
                    return not_supported(id, "poke");
                };
                let data = inv.args[1].as_bytes().unwrap_or_default();
                done(id, poke(int_arg(&inv.args[0]) as u32, data))
            }

            "peek" => {
                if !inv.matches(&[ArgType::Int, ArgType::Int]) {
                    return usage(id, "peek <addr> <size>");
                }
                let Some(peek) = cb.peek.as_mut() else {
                    return not_supported(id, "peek");
                };
                let size = int_arg(&inv.args[1]) as u32 as usize;
                if size == 0 || size > self.limits.max_bytes_arg {
                    return Response::error(id, "invalid size");
                }
                let mut buf = vec![0u8; size];
                match peek(int_arg(&inv.args[0]) as u32, &mut buf) {
                    Ok(()) => Response::bytes(id, buf),
                    Err(err) => Response::error(id, err.0),
                }
            }

            "load" => {
                if !inv.matches(&[ArgType::Str, ArgType::Int]) {
                    return usage(id, "load \"path\" <run:1|0>");
                }
                let Some(load) = cb.load.as_mut() else {
                    return not_supported(id, "load");
                };
                let path = inv.args[0].as_str().unwrap_or_default();
                done(id, load(path, int_arg(&inv.args[1]) != 0))
            }

            "restart" => {
                if !inv.args.is_empty() {
                    return usage(id, "restart");
                }
                let Some(restart) = cb.restart.as_mut() else {
                    return not_supported(id, "restart");
                };
                done(id, restart())
            }

            "quit" => {
                if !inv.args.is_empty() {
                    return usage(id, "quit");
                }
                let Some(quit) = cb.quit.as_mut() else {
                    return not_supported(id, "quit");
                };
                done(id, quit())
            }

            "eval" => {
                if !inv.matches(&[ArgType::Str]) {
                    return usage(id, "eval \"code\"");
                }
                let Some(eval) = cb.eval.as_mut() else {
                    return not_supported(id, "eval");
                };
                done(id, eval(inv.args[0].as_str().unwrap_or_default()))
            }

            "evalexpr" => {
                if !inv.matches(&[ArgType::Str]) {
                    return usage(id, "evalexpr \"expr\"");
                }
                let Some(eval_expr) = cb.eval_expr.as_mut() else {
                    return not_supported(id, "evalexpr");
                };
                match eval_expr(inv.args[0].as_str().unwrap_or_default()) {
                    Ok(literal) => Response::token(id, literal),
                    Err(err) => Response::error(id, err.0),
                }
            }

            "listglobals" => {
                if !inv.args.is_empty() {
                    return usage(id, "listglobals");
                }
                let Some(list_globals) = cb.list_globals.as_mut() else {
                    return not_supported(id, "listglobals");
                };
                match list_globals() {
                    Ok(names) => Response::token(id, join_globals(names)),
                    Err(err) => Response::error(id, err.0),
                }
            }

            "getfps" => {
                if !inv.args.is_empty() {
                    return usage(id, "getfps");
                }
                Response::token(id, fps.to_string())
            }

            "cartpath" => query(id, "cartpath", cb.cart_path.as_mut(), &inv.args),
            "fs" => query(id, "fs", cb.fs_path.as_mut(), &inv.args),
            "metadata" => query(id, "metadata", cb.metadata.as_mut(), &inv.args),

            _ => Response::error(id, "unknown command"),
        }
    }
}

/// Banner used by `hello` when neither host nor config provide one
pub fn default_banner() -> String {
    format!("cartremote {}", PROTOCOL_VERSION)
}

/// Sort, deduplicate and comma-join the identifier-like, non-reserved names
pub fn join_globals(mut names: Vec<String>) -> String {
    names.retain(|name| is_identifier(name.as_bytes()) && !is_reserved_word(name));
    names.sort();
    names.dedup();
    names.join(",")
}

// =============================================================================
// Helpers
// =============================================================================

fn query(id: i64, name: &str, f: Option<&mut QueryFn>, args: &[Arg]) -> Response {
    let key = match args {
        [] => None,
        [Arg::Str(s)] => Some(s.as_str()),
        _ => return usage(id, &format!("{} [\"key\"]", name)),
    };
    let Some(f) = f else {
        return not_supported(id, name);
    };
    match f(key) {
        Ok(value) => Response::text(id, value),
        Err(err) => Response::error(id, err.0),
    }
}

fn done(id: i64, result: HostResult<()>) -> Response {
    match result {
        Ok(()) => Response::ok(id),
        Err(err) => Response::error(id, err.0),
    }
}

fn int_arg(arg: &Arg) -> i64 {
    arg.as_int().unwrap_or_default()
}

fn usage(id: i64, form: &str) -> Response {
    Response::error(id, format!("usage: <id> {}", form))
}

fn not_supported(id: i64, name: &str) -> Response {
    Response::error(id, format!("{} not supported", name))
}
