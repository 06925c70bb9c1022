//! Lua scripting capabilities
//!
//! Adapts an embedded [`mlua::Lua`] state to the `eval`, `evalexpr` and
//! `listglobals` entries of the callback table.

use std::rc::Rc;

use mlua::{Lua, Value};

use crate::dispatch::Callbacks;
use crate::error::{HostError, HostResult};
use crate::serialize::serialize;

/// Chunk name used for remotely submitted code in Lua error messages
const CHUNK_NAME: &str = "=remote";

/// Default cap on a serialized `evalexpr` result
pub const DEFAULT_RESULT_LIMIT: usize = 1024 * 1024 - 128;

/// Lua state exposed to remote clients
pub struct LuaScript {
    lua: Lua,
    result_limit: usize,
}

impl LuaScript {
    pub fn new(lua: Lua) -> Self {
        Self {
            lua,
            result_limit: DEFAULT_RESULT_LIMIT,
        }
    }

    /// Cap the size of serialized `evalexpr` results
    pub fn with_result_limit(mut self, limit: usize) -> Self {
        self.result_limit = limit;
        self
    }

    pub fn lua(&self) -> &Lua {
        &self.lua
    }

    /// Execute a chunk, discarding any results
    pub fn eval(&self, code: &str) -> HostResult<()> {
        self.lua.load(code).set_name(CHUNK_NAME).exec()?;
        Ok(())
    }

    /// Evaluate `expr` and serialize its first result
    pub fn eval_expr(&self, expr: &str) -> HostResult<String> {
        if expr.trim().is_empty() {
            return Err(HostError::new("missing expression"));
        }

        let value: Value = self
            .lua
            .load(format!("return {}", expr))
            .set_name(CHUNK_NAME)
            .eval()?;

        Ok(serialize(&value, self.result_limit)?)
    }

    /// Every string key of the global table
    pub fn global_names(&self) -> HostResult<Vec<String>> {
        let mut names = Vec::new();
        for pair in self.lua.globals().pairs::<Value, Value>() {
            let (key, _) = pair?;
            if let Value::String(s) = key {
                names.push(s.to_string_lossy().to_string());
            }
        }
        Ok(names)
    }

    /// Register `eval`, `evalexpr` and `listglobals` on `callbacks`
    pub fn install(self: &Rc<Self>, callbacks: Callbacks) -> Callbacks {
        let eval = Rc::clone(self);
        let eval_expr = Rc::clone(self);
        let globals = Rc::clone(self);

        callbacks
            .on_eval(move |code| eval.eval(code))
            .on_eval_expr(move |expr| eval_expr.eval_expr(expr))
            .on_list_globals(move || globals.global_names())
    }
}

impl std::fmt::Debug for LuaScript {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LuaScript")
            .field("result_limit", &self.result_limit)
            .finish_non_exhaustive()
    }
}
