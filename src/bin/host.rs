//! cartremote Demo Host
//!
//! A minimal tick loop standing in for the cartridge runtime: a flat RAM
//! array, a Lua state running the cart's `TIC()` once per frame, and the
//! remoting server serviced between frames.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::{Duration, Instant};

use cartremote::timing::{FrameTimer, Phase};
use cartremote::{Callbacks, Config, HostError, HostResult, LuaScript, Server};
use clap::Parser;
use mlua::{Function, Lua};
use tracing_subscriber::{fmt, EnvFilter};

/// Size of the emulated RAM
const RAM_SIZE: usize = 96 * 1024;

/// cartremote demo host
#[derive(Parser, Debug)]
#[command(name = "cartremote-host")]
#[command(about = "Demo cartridge host exposing the remoting protocol")]
#[command(version)]
struct Args {
    /// Loopback port to listen on
    #[arg(short, long, default_value = "8000")]
    port: u16,

    /// Target frames per second
    #[arg(short, long, default_value = "60")]
    fps: u32,

    /// Lua cart to load and run at startup
    #[arg(short, long)]
    cart: Option<PathBuf>,

    /// Do not publish a discovery record
    #[arg(long)]
    no_discovery: bool,
}

/// Cart currently loaded in the host
#[derive(Default)]
struct Cart {
    path: Option<PathBuf>,
    source: String,
    running: bool,
    metadata: HashMap<String, String>,
}

impl Cart {
    /// `-- key: value` comment lines at the top of the source
    fn parse_metadata(source: &str) -> HashMap<String, String> {
        source
            .lines()
            .map_while(|line| line.trim().strip_prefix("--"))
            .filter_map(|line| line.split_once(':'))
            .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
            .collect()
    }
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,cartremote=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    let args = Args::parse();

    tracing::info!("cartremote host v{}", cartremote::VERSION);

    let ram = Rc::new(RefCell::new(vec![0u8; RAM_SIZE]));
    let cart = Rc::new(RefCell::new(Cart::default()));
    let quit = Rc::new(Cell::new(false));
    let script = Rc::new(LuaScript::new(Lua::new()));

    let callbacks = script.install(build_callbacks(&ram, &cart, &quit, &script));

    let config = Config::builder()
        .port(args.port)
        .discovery(!args.no_discovery)
        .build();

    let mut server = match Server::new(config, callbacks) {
        Ok(server) => server,
        Err(e) => {
            tracing::error!("Failed to create server: {}", e);
            std::process::exit(1);
        }
    };

    if let Some(err) = server.last_error() {
        tracing::warn!("{}; will keep retrying", err);
    }

    if let Some(path) = &args.cart {
        if let Err(e) = load_cart(&script, &cart, path, true) {
            tracing::error!("Failed to load {}: {}", path.display(), e);
        }
    }

    let frame = Duration::from_secs(1) / args.fps.max(1);
    let clock = Instant::now();
    let mut timer = FrameTimer::new();

    while !quit.get() {
        let frame_start = Instant::now();

        if cart.borrow().running {
            let result = timer.measure(Phase::Tick, || run_tic(&script));
            if let Err(e) = result {
                tracing::error!("TIC() failed, stopping cart: {}", e);
                cart.borrow_mut().running = false;
            }
        }
        server.set_user_times(timer.end_frame());
        server.on_frame(clock.elapsed().as_nanos() as u64, 1_000_000_000);

        server.tick();

        if server.take_status_dirty() {
            tracing::info!("{}", server.title_info());
        }

        if let Some(rest) = frame.checked_sub(frame_start.elapsed()) {
            std::thread::sleep(rest);
        }
    }

    server.shutdown();
    tracing::info!("Host stopped");
}

fn build_callbacks(
    ram: &Rc<RefCell<Vec<u8>>>,
    cart: &Rc<RefCell<Cart>>,
    quit: &Rc<Cell<bool>>,
    script: &Rc<LuaScript>,
) -> Callbacks {
    let peek_ram = Rc::clone(ram);
    let poke_ram = Rc::clone(ram);
    let load_cart_state = Rc::clone(cart);
    let load_script = Rc::clone(script);
    let restart_cart = Rc::clone(cart);
    let restart_script = Rc::clone(script);
    let path_cart = Rc::clone(cart);
    let meta_cart = Rc::clone(cart);
    let quit_flag = Rc::clone(quit);

    Callbacks::new()
        .on_peek(move |addr, out| {
            let ram = peek_ram.borrow();
            let range = ram_range(addr, out.len())?;
            out.copy_from_slice(&ram[range]);
            Ok(())
        })
        .on_poke(move |addr, data| {
            let mut ram = poke_ram.borrow_mut();
            let range = ram_range(addr, data.len())?;
            ram[range].copy_from_slice(data);
            Ok(())
        })
        .on_sync(|flags| {
            tracing::debug!("sync requested (flags=0x{:x})", flags);
            Ok(())
        })
        .on_load(move |path, run| load_cart(&load_script, &load_cart_state, &PathBuf::from(path), run))
        .on_restart(move || {
            let source = restart_cart.borrow().source.clone();
            if source.is_empty() {
                return Err(HostError::new("no cart loaded"));
            }
            restart_script.eval(&source)?;
            restart_cart.borrow_mut().running = true;
            Ok(())
        })
        .on_quit(move || {
            quit_flag.set(true);
            Ok(())
        })
        .on_cart_path(move |_| {
            path_cart
                .borrow()
                .path
                .as_ref()
                .map(|p| p.display().to_string())
                .ok_or_else(|| HostError::new("no cart loaded"))
        })
        .on_fs_path(|_| {
            std::env::current_dir()
                .map(|p| p.display().to_string())
                .map_err(|e| HostError::new(e.to_string()))
        })
        .on_metadata(move |key| {
            let cart = meta_cart.borrow();
            match key {
                Some(key) => cart
                    .metadata
                    .get(&key.to_ascii_lowercase())
                    .cloned()
                    .ok_or_else(|| HostError::new(format!("no metadata for {}", key))),
                None => {
                    let mut keys: Vec<&str> = cart.metadata.keys().map(String::as_str).collect();
                    keys.sort_unstable();
                    Ok(keys.join(","))
                }
            }
        })
}

fn ram_range(addr: u32, len: usize) -> HostResult<std::ops::Range<usize>> {
    let start = addr as usize;
    match start.checked_add(len) {
        Some(end) if end <= RAM_SIZE => Ok(start..end),
        _ => Err(HostError::new("address out of range")),
    }
}

fn load_cart(
    script: &LuaScript,
    cart: &RefCell<Cart>,
    path: &std::path::Path,
    run: bool,
) -> HostResult<()> {
    let source = std::fs::read_to_string(path)
        .map_err(|e| HostError::new(format!("failed to read {}: {}", path.display(), e)))?;

    if run {
        script.eval(&source)?;
    }

    let mut cart = cart.borrow_mut();
    cart.metadata = Cart::parse_metadata(&source);
    cart.path = Some(path.to_path_buf());
    cart.source = source;
    cart.running = run;

    tracing::info!("Loaded cart {} (run={})", path.display(), run);
    Ok(())
}

fn run_tic(script: &LuaScript) -> mlua::Result<()> {
    match script.lua().globals().get::<Option<Function>>("TIC")? {
        Some(tic) => tic.call::<()>(()),
        None => Ok(()),
    }
}
