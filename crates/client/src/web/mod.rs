// Browser bindings: JS-facing wrapper, animation loop and keyboard handlers
use std::cell::RefCell;
use std::rc::Rc;

use js_sys::Math;
use protocol::Color;
use wasm_bindgen::prelude::*;
use web_sys::{KeyboardEvent, window};

use crate::chunk::Backends;
use crate::config::Config;
use crate::game::GameLoop;
use crate::session::Identity;

mod fetch;
mod socket;
mod storage;

use fetch::{FetchDirectory, FetchMaps};
use socket::WebSocketTransport;
use storage::SessionStorageStore;

/// Initialize panic hook and console logging
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
    // tracing events reach the console through the `log` bridge.
    console_log::init_with_level(log::Level::Debug).ok();
}

/// Get the current high-precision timestamp in milliseconds
fn now() -> f64 {
    window()
        .and_then(|w| w.performance())
        .map(|p| p.now())
        .unwrap_or_else(js_sys::Date::now)
}

fn random_identity() -> Identity {
    let channel = || (Math::random() * 256.0) as u8;
    let suffix = (Math::random() * f64::from(u32::MAX)) as u32;
    Identity {
        id: format!("player-{:08x}", suffix),
        color: Color::new(channel(), channel(), channel()),
    }
}

/// JS handle on one running client
#[wasm_bindgen]
pub struct ChunkClient {
    game: Rc<RefCell<GameLoop>>,
}

#[wasm_bindgen]
impl ChunkClient {
    /// Start a client. `config_toml` overrides the built-in defaults.
    #[wasm_bindgen(constructor)]
    pub fn new(config_toml: Option<String>) -> Result<ChunkClient, JsValue> {
        init();

        let config = match config_toml {
            Some(text) => Config::from_toml_str(&text).map_err(|e| JsValue::from_str(&e.to_string()))?,
            None => Config::default(),
        };
        let backends = Backends {
            directory: Box::new(FetchDirectory::new(&config.network.directory_url)),
            maps: Box::new(FetchMaps::default()),
            transport: Box::new(WebSocketTransport),
        };
        let game = GameLoop::new(
            config,
            backends,
            Box::new(SessionStorageStore::new()),
            random_identity(),
        );
        let game = Rc::new(RefCell::new(game));

        setup_animation_loop(game.clone())?;
        setup_input_handlers(game.clone())?;
        setup_unload_handler(game.clone())?;

        Ok(ChunkClient { game })
    }

    /// Current frame for the renderer, or `null` before the first map loads.
    pub fn view(&self) -> JsValue {
        let Ok(game) = self.game.try_borrow() else {
            return JsValue::NULL;
        };
        match game.view() {
            Some(view) => serde_wasm_bindgen::to_value(&view).unwrap_or(JsValue::NULL),
            None => JsValue::NULL,
        }
    }

    pub fn score(&self) -> u32 {
        self.game.borrow().player().map_or(0, |p| p.score)
    }

    pub fn is_over(&self) -> bool {
        self.game.borrow().is_over()
    }

    /// Leave the world now. The saved session is kept.
    pub fn leave(&self) {
        self.game.borrow_mut().shutdown();
    }
}

fn setup_animation_loop(game: Rc<RefCell<GameLoop>>) -> Result<(), JsValue> {
    let window = window().ok_or("No window")?;

    let f: Rc<RefCell<Option<Closure<dyn FnMut()>>>> = Rc::new(RefCell::new(None));
    let g = f.clone();

    *g.borrow_mut() = Some(Closure::wrap(Box::new(move || {
        let over = {
            let mut game = game.borrow_mut();
            game.tick(now());
            game.is_over()
        };
        if over {
            tracing::info!("Game over, stopping animation loop");
            return;
        }

        if let (Some(win), Some(cb)) = (web_sys::window(), f.borrow().as_ref()) {
            win.request_animation_frame(cb.as_ref().unchecked_ref()).ok();
        }
    }) as Box<dyn FnMut()>));

    if let Some(cb) = g.borrow().as_ref() {
        window.request_animation_frame(cb.as_ref().unchecked_ref())?;
    }
    Ok(())
}

fn setup_input_handlers(game: Rc<RefCell<GameLoop>>) -> Result<(), JsValue> {
    let window = window().ok_or("No window")?;
    let document = window.document().ok_or("No document")?;

    // Keydown handler
    {
        let game = game.clone();
        let closure = Closure::wrap(Box::new(move |event: KeyboardEvent| {
            if let Ok(mut game) = game.try_borrow_mut() {
                if game.input_mut().key_down(&event.key()) {
                    // Arrow keys would otherwise scroll the page.
                    event.prevent_default();
                }
            }
        }) as Box<dyn FnMut(_)>);
        document.add_event_listener_with_callback("keydown", closure.as_ref().unchecked_ref())?;
        closure.forget();
    }

    // Keyup handler
    {
        let closure = Closure::wrap(Box::new(move |event: KeyboardEvent| {
            if let Ok(mut game) = game.try_borrow_mut() {
                game.input_mut().key_up(&event.key());
            }
        }) as Box<dyn FnMut(_)>);
        document.add_event_listener_with_callback("keyup", closure.as_ref().unchecked_ref())?;
        closure.forget();
    }

    Ok(())
}

fn setup_unload_handler(game: Rc<RefCell<GameLoop>>) -> Result<(), JsValue> {
    let window = window().ok_or("No window")?;
    let closure = Closure::wrap(Box::new(move |_event: JsValue| {
        if let Ok(mut game) = game.try_borrow_mut() {
            game.shutdown();
        }
    }) as Box<dyn FnMut(_)>);
    window.add_event_listener_with_callback("pagehide", closure.as_ref().unchecked_ref())?;
    closure.forget();
    Ok(())
}
